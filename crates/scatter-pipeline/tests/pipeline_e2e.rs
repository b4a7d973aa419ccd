//! End-to-end pipeline tests against a real filesystem provider and an
//! in-memory catalog.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scatter_core::catalog::CatalogDb;
use scatter_core::types::{ChunkStatus, FileStatus, Platform};
use scatter_core::{ScatterError, crypto};
use scatter_pipeline::{ChunkPipeline, UploadOptions};
use scatter_storage::{RetryPolicy, StorageRouter};
use tempfile::TempDir;

const PROVIDER_MAX: usize = 64 * 1024;

fn setup(tmp: &TempDir) -> (ChunkPipeline, Arc<Mutex<CatalogDb>>) {
    let catalog = Arc::new(Mutex::new(CatalogDb::open_in_memory().unwrap()));
    catalog
        .lock()
        .unwrap()
        .insert_provider_config(
            "local-test",
            Platform::Local,
            &serde_json::json!({
                "base_path": tmp.path().join("store"),
                "max_chunk_size": PROVIDER_MAX,
            }),
        )
        .unwrap();

    let router = Arc::new(StorageRouter::new(
        RetryPolicy {
            max_retries: 2,
            base: Duration::from_millis(1),
            max: Duration::from_millis(10),
            multiplier: 2.0,
        },
        Duration::from_secs(5),
    ));
    let pipeline = ChunkPipeline::new(catalog.clone(), router, "local-test", 8 * 1024).unwrap();
    (pipeline, catalog)
}

fn opts(filename: &str, chunk_size: Option<usize>) -> UploadOptions {
    UploadOptions {
        filename: filename.to_string(),
        description: None,
        chunk_size,
    }
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn read_back(pipeline: &ChunkPipeline, file_id: &str) -> Vec<u8> {
    let mut stream = pipeline.get_decrypted_stream(file_id).await.unwrap();
    let mut data = Vec::new();
    while let Some(chunk) = stream.next_chunk().await.unwrap() {
        data.extend_from_slice(&chunk);
    }
    data
}

#[tokio::test]
async fn round_trip_various_sizes_and_chunk_sizes() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, _catalog) = setup(&tmp);

    for (len, chunk_size) in [
        (0usize, None),
        (1, Some(1)),
        (1, None),
        (4096, Some(1024)),   // exact multiple
        (5000, Some(1024)),   // remainder
        (1023, Some(1024)),   // single short chunk
        (30_000, Some(7919)), // prime-sized chunks
    ] {
        let data = patterned(len);
        let file = pipeline
            .upload_file(Cursor::new(data.clone()), opts("sample.bin", chunk_size))
            .await
            .unwrap();

        assert_eq!(file.status, FileStatus::Completed);
        assert_eq!(file.size, len as u64);

        let restored = read_back(&pipeline, &file.id).await;
        assert_eq!(restored, data, "len={len} chunk_size={chunk_size:?}");
    }
}

#[tokio::test]
async fn twenty_units_with_eight_unit_chunks_make_three_chunks() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, catalog) = setup(&tmp);

    let data = patterned(20_000);
    let file = pipeline
        .upload_file(Cursor::new(data.clone()), opts("big.bin", Some(8_000)))
        .await
        .unwrap();

    assert_eq!(file.status, FileStatus::Completed);

    let chunks = catalog.lock().unwrap().list_chunks(&file.id).unwrap();
    assert_eq!(chunks.len(), 3);
    let orders: Vec<u32> = chunks.iter().map(|c| c.chunk_order).collect();
    assert_eq!(orders, vec![0, 1, 2]);
    let sizes: Vec<u64> = chunks.iter().map(|c| c.size_plain).collect();
    assert_eq!(sizes, vec![8_000, 8_000, 4_000]);
    for chunk in &chunks {
        assert_eq!(chunk.status, ChunkStatus::Stored);
        assert!(chunk.chunk_ref.is_some());
        // IV plus PKCS#7 padding on top of the plaintext.
        assert_eq!(
            chunk.size_encrypted,
            crypto::encrypted_len(chunk.size_plain as usize) as u64
        );
    }

    assert_eq!(read_back(&pipeline, &file.id).await, data);
}

#[tokio::test]
async fn records_whole_file_signature() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, _catalog) = setup(&tmp);

    let data = b"known content".to_vec();
    let file = pipeline
        .upload_file(Cursor::new(data.clone()), opts("known.txt", None))
        .await
        .unwrap();

    use sha2::{Digest, Sha256};
    let expected = hex::encode(Sha256::digest(&data));
    assert_eq!(file.sha256.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn identical_uploads_get_distinct_keys_and_refs() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, catalog) = setup(&tmp);

    let data = patterned(3000);
    let a = pipeline
        .upload_file(Cursor::new(data.clone()), opts("dup.bin", Some(1024)))
        .await
        .unwrap();
    let b = pipeline
        .upload_file(Cursor::new(data), opts("dup.bin", Some(1024)))
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    // No deduplication: fresh key per file, fresh references per chunk.
    assert_ne!(a.key.as_bytes(), b.key.as_bytes());

    let catalog = catalog.lock().unwrap();
    let refs_a = catalog.list_chunks(&a.id).unwrap();
    let refs_b = catalog.list_chunks(&b.id).unwrap();
    for (ca, cb) in refs_a.iter().zip(&refs_b) {
        assert_ne!(ca.chunk_ref, cb.chunk_ref);
    }
}

#[tokio::test]
async fn oversized_chunk_request_fails_before_any_record() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, catalog) = setup(&tmp);

    let err = pipeline
        .upload_file(
            Cursor::new(patterned(100)),
            opts("big.bin", Some(PROVIDER_MAX + 1)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ScatterError::Config(_)));
    // Refused before the file record or any remote traffic.
    assert!(catalog.lock().unwrap().list_files().unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_remote_objects_and_records() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, catalog) = setup(&tmp);

    let file = pipeline
        .upload_file(Cursor::new(patterned(20_000)), opts("gone.bin", Some(8_000)))
        .await
        .unwrap();

    let container = tmp.path().join("store").join(&file.id);
    assert_eq!(count_files(&container), 3);

    pipeline.delete_file(&file.id).await.unwrap();

    assert_eq!(count_files(&container), 0);
    let catalog = catalog.lock().unwrap();
    assert!(catalog.list_chunks(&file.id).unwrap().is_empty());
    assert!(matches!(
        catalog.get_file(&file.id),
        Err(ScatterError::FileNotFound(_))
    ));
}

#[tokio::test]
async fn corrupted_blob_aborts_stream_without_yielding_garbage() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, _catalog) = setup(&tmp);

    let file = pipeline
        .upload_file(Cursor::new(patterned(5000)), opts("c.bin", Some(2048)))
        .await
        .unwrap();

    // Truncate the first stored blob below the IV length.
    let container = tmp.path().join("store").join(&file.id);
    let mut blobs: Vec<_> = std::fs::read_dir(&container)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    blobs.sort();
    std::fs::write(&blobs[0], [0u8; 15]).unwrap();

    let mut stream = pipeline.get_decrypted_stream(&file.id).await.unwrap();
    let mut yielded = 0usize;
    let mut saw_error = false;
    loop {
        match stream.next_chunk().await {
            Ok(Some(_)) => yielded += 1,
            Ok(None) => break,
            Err(e) => {
                saw_error = true;
                assert!(matches!(
                    e,
                    ScatterError::Chunk { .. } | ScatterError::Crypto(_)
                ));
                break;
            }
        }
    }
    assert!(saw_error);
    // The corrupted chunk is the first one the stream touches; nothing was
    // yielded before the abort, and the stream is fused afterwards.
    assert_eq!(yielded, 0);
    assert!(stream.next_chunk().await.unwrap().is_none());
}

#[tokio::test]
async fn stream_requires_completed_file() {
    let tmp = TempDir::new().unwrap();
    let (pipeline, catalog) = setup(&tmp);

    let file = pipeline
        .upload_file(Cursor::new(patterned(100)), opts("s.bin", None))
        .await
        .unwrap();
    catalog
        .lock()
        .unwrap()
        .set_file_status(&file.id, FileStatus::Uploading)
        .unwrap();

    let err = pipeline.get_decrypted_stream(&file.id).await.unwrap_err();
    assert!(matches!(err, ScatterError::InvalidStatus(_)));
}

#[tokio::test]
async fn read_error_mid_stream_marks_file_failed_and_keeps_chunks() {
    struct FailingReader {
        good: Cursor<Vec<u8>>,
        tripped: bool,
    }

    impl std::io::Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.good.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            if self.tripped {
                return Ok(0);
            }
            self.tripped = true;
            Err(std::io::Error::other("source went away"))
        }
    }

    let tmp = TempDir::new().unwrap();
    let (pipeline, catalog) = setup(&tmp);

    // One full segment succeeds, then the source errors.
    let reader = FailingReader {
        good: Cursor::new(patterned(1024)),
        tripped: false,
    };
    let err = pipeline
        .upload_file(reader, opts("flaky.bin", Some(1024)))
        .await
        .unwrap_err();
    assert!(matches!(err, ScatterError::Chunk { chunk_order: 1, .. }));

    let catalog = catalog.lock().unwrap();
    let files = catalog.list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].status, FileStatus::Failed);

    // The chunk that made it stays referenced for a future resumption or
    // manual cleanup; it is never silently deleted.
    let chunks = catalog.list_chunks(&files[0].id).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].status, ChunkStatus::Stored);
}

fn count_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
