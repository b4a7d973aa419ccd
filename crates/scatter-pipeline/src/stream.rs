use std::sync::Arc;

use scatter_core::types::{ChunkRecord, FileKey, StorageContext};
use scatter_core::{Result, ScatterError, crypto};
use scatter_storage::{StorageProvider, StorageRouter};

/// Lazy sequence of decrypted plaintext segments, strictly in ascending
/// chunk order.
///
/// Single-pass, forward-only, non-restartable: each call to
/// [`next_chunk`](Self::next_chunk) downloads and decrypts exactly one
/// chunk, so at most one chunk is materialized at a time. A download or
/// decrypt failure is returned once and fuses the stream — no partial or
/// garbage plaintext is ever yielded after an error. Dropping the stream
/// early releases everything it holds.
pub struct DecryptedStream {
    router: Arc<StorageRouter>,
    provider: Arc<dyn StorageProvider>,
    context: StorageContext,
    key: FileKey,
    file_id: String,
    chunks: std::vec::IntoIter<ChunkRecord>,
    done: bool,
}

impl std::fmt::Debug for DecryptedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptedStream")
            .field("file_id", &self.file_id)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl DecryptedStream {
    pub(crate) fn new(
        router: Arc<StorageRouter>,
        provider: Arc<dyn StorageProvider>,
        context: StorageContext,
        key: FileKey,
        file_id: String,
        chunks: Vec<ChunkRecord>,
    ) -> Self {
        Self {
            router,
            provider,
            context,
            key,
            file_id,
            chunks: chunks.into_iter(),
            done: false,
        }
    }

    /// Download and decrypt the next chunk. Returns `Ok(None)` once the
    /// sequence is exhausted (or after an error has fused it).
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let Some(chunk) = self.chunks.next() else {
            self.done = true;
            return Ok(None);
        };

        let chunk_ref = chunk.chunk_ref.as_ref().ok_or_else(|| {
            ScatterError::InvalidStatus(format!(
                "chunk {} of file {} has no provider reference",
                chunk.chunk_order, self.file_id
            ))
        })?;

        let blob = match self
            .router
            .download_chunk(self.provider.as_ref(), chunk_ref, &self.context)
            .await
        {
            Ok(blob) => blob,
            Err(e) => {
                self.done = true;
                return Err(
                    ScatterError::from(e).for_chunk(&self.file_id, chunk.chunk_order)
                );
            }
        };

        match crypto::decrypt(&self.key, &blob) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(e) => {
                self.done = true;
                Err(ScatterError::from(e).for_chunk(&self.file_id, chunk.chunk_order))
            }
        }
    }

    /// Chunks not yet yielded.
    pub fn remaining(&self) -> usize {
        self.chunks.len()
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }
}
