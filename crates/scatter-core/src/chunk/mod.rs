//! Fixed-size stream splitter.
//!
//! Reads an input stream into ordered segments of exactly `chunk_size`
//! bytes (the final segment may be shorter). Segments are yielded one at a
//! time so the whole stream is never held in memory; ordering is read
//! order and nothing downstream may reorder it.

use std::io::Read;

/// Default plaintext segment size: 8 MiB, matching the flagship provider's
/// advertised chunk ceiling.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// One plaintext segment with its position in the stream.
#[derive(Debug)]
pub struct Segment {
    pub order: u32,
    pub data: Vec<u8>,
}

/// Pull-based splitter over any [`Read`] source.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    next_order: u32,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Create a splitter producing segments of `chunk_size` bytes.
    ///
    /// # Panics
    /// Panics if `chunk_size` is zero.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be at least 1");
        Self {
            reader,
            chunk_size,
            next_order: 0,
            done: false,
        }
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = std::io::Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut total_read = 0;
        // Fill the buffer completely or read to EOF; short reads from the
        // underlying source must not produce short interior segments.
        while total_read < self.chunk_size {
            match self.reader.read(&mut buf[total_read..]) {
                Ok(0) => break,
                Ok(n) => total_read += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        if total_read == 0 {
            self.done = true;
            return None;
        }
        if total_read < self.chunk_size {
            buf.truncate(total_read);
            self.done = true;
        }

        let order = self.next_order;
        self.next_order += 1;
        Some(Ok(Segment { order, data: buf }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(data: &[u8], chunk_size: usize) -> Vec<Segment> {
        ChunkReader::new(Cursor::new(data.to_vec()), chunk_size)
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn exact_multiple() {
        let segments = collect(&[0xAB; 2048], 1024);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].data.len(), 1024);
        assert_eq!(segments[1].data.len(), 1024);
        assert_eq!(segments[0].order, 0);
        assert_eq!(segments[1].order, 1);
    }

    #[test]
    fn final_segment_may_be_short() {
        let segments = collect(&[0xAB; 1500], 1024);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].data.len(), 1024);
        assert_eq!(segments[1].data.len(), 476);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let segments = collect(&[], 1024);
        assert!(segments.is_empty());
    }

    #[test]
    fn chunk_size_one() {
        let segments = collect(b"abc", 1);
        assert_eq!(segments.len(), 3);
        let orders: Vec<u32> = segments.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(segments[2].data, b"c");
    }

    #[test]
    fn segments_reassemble_to_input() {
        let input: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut reassembled = Vec::new();
        for seg in collect(&input, 769) {
            reassembled.extend_from_slice(&seg.data);
        }
        assert_eq!(reassembled, input);
    }

    #[test]
    #[should_panic(expected = "chunk_size must be at least 1")]
    fn zero_chunk_size_panics() {
        let _ = ChunkReader::new(Cursor::new(vec![]), 0);
    }
}
