use async_trait::async_trait;

use scatter_core::StorageError;
use scatter_core::types::{ChunkRef, FileMetadata, Platform, StorageContext};

/// Contract implemented by every storage backend.
///
/// Providers only ever see fully encrypted payloads; plaintext never
/// crosses this boundary. New platforms are added by implementing this
/// trait and registering the variant in the factory — the pipeline is never
/// touched.
#[async_trait]
pub trait StorageProvider: Send + Sync + std::fmt::Debug {
    /// Platform this provider talks to.
    fn platform(&self) -> Platform;

    /// Create the per-file container on the remote platform (e.g. a
    /// discussion thread) and return the routing context threaded through
    /// all subsequent chunk operations. Called once per file. Providers
    /// without a container concept return a context carrying only routing
    /// identifiers.
    async fn prepare_storage(&self, meta: &FileMetadata)
    -> Result<StorageContext, StorageError>;

    /// Store one encrypted payload and return an opaque reference
    /// sufficient to retrieve the exact bytes later.
    async fn upload_chunk(
        &self,
        data: &[u8],
        context: &StorageContext,
    ) -> Result<ChunkRef, StorageError>;

    /// Retrieve the exact bytes previously stored under `chunk_ref`.
    async fn download_chunk(
        &self,
        chunk_ref: &ChunkRef,
        context: &StorageContext,
    ) -> Result<Vec<u8>, StorageError>;

    /// Remove the stored object. An already-missing object is not an error.
    async fn delete_chunk(
        &self,
        chunk_ref: &ChunkRef,
        context: &StorageContext,
    ) -> Result<(), StorageError>;

    /// Upper bound (bytes) on `upload_chunk` payloads, driven by the remote
    /// platform's own attachment limits. Callers must never exceed it.
    fn max_chunk_size(&self) -> usize;

    /// Live credential/reachability check, performed once at construction
    /// unless explicitly skipped (tests).
    async fn validate_config(&self) -> Result<(), StorageError>;
}
