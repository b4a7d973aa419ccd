//! The chunk pipeline: splits an input stream into ordered segments,
//! encrypts each one independently, ships the blobs through the storage
//! router, and records per-chunk references and ordering in the catalog so
//! the stream can be reassembled later.
//!
//! Each pipeline is bound to one provider configuration, passed in
//! explicitly at construction. Operations on one file run sequentially —
//! one outstanding provider request at a time — while different files may
//! be processed concurrently by independent calls.

mod stream;

pub use stream::DecryptedStream;

use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use scatter_core::catalog::CatalogDb;
use scatter_core::chunk::{ChunkReader, Segment};
use scatter_core::types::{
    ChunkStatus, FileKey, FileMetadata, FileRecord, FileStatus, ProviderConfigRecord,
    StorageContext,
};
use scatter_core::{Result, ScatterError, crypto};
use scatter_storage::{StorageProvider, StorageRouter};

/// Options for a single upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub filename: String,
    pub description: Option<String>,
    /// Explicit plaintext chunk size. Refused with a configuration error if
    /// it exceeds the provider's chunk ceiling.
    pub chunk_size: Option<usize>,
}

pub struct ChunkPipeline {
    catalog: Arc<Mutex<CatalogDb>>,
    router: Arc<StorageRouter>,
    provider_config: ProviderConfigRecord,
    default_chunk_size: usize,
}

impl ChunkPipeline {
    /// Bind a pipeline to the named provider configuration.
    pub fn new(
        catalog: Arc<Mutex<CatalogDb>>,
        router: Arc<StorageRouter>,
        provider_name: &str,
        default_chunk_size: usize,
    ) -> Result<Self> {
        let provider_config = lock(&catalog)?.get_provider_config(provider_name)?;
        Ok(Self {
            catalog,
            router,
            provider_config,
            default_chunk_size,
        })
    }

    fn catalog(&self) -> Result<MutexGuard<'_, CatalogDb>> {
        lock(&self.catalog)
    }

    /// Upload a stream: split, encrypt, store, record — in strict read
    /// order, one chunk in memory at a time.
    pub async fn upload_file<R: Read>(
        &self,
        reader: R,
        opts: UploadOptions,
    ) -> Result<FileRecord> {
        let provider = self.router.resolve(&self.provider_config).await?;
        let chunk_size = effective_chunk_size(
            opts.chunk_size,
            self.default_chunk_size,
            provider.max_chunk_size(),
        )?;

        let key = crypto::generate_key();
        let file_id = uuid::Uuid::now_v7().to_string();
        self.catalog()?.create_file(
            &file_id,
            &opts.filename,
            opts.description.as_deref(),
            &key,
            self.provider_config.id,
        )?;
        info!(%file_id, filename = %opts.filename, chunk_size, "upload started");

        let meta = FileMetadata {
            file_id: file_id.clone(),
            filename: opts.filename.clone(),
        };
        let context = match self.router.prepare_storage(provider.as_ref(), &meta).await {
            Ok(context) => context,
            Err(e) => {
                self.fail_file(&file_id);
                return Err(ScatterError::from(e));
            }
        };
        self.catalog()?.set_storage_context(&file_id, &context)?;
        self.catalog()?.set_file_status(&file_id, FileStatus::Uploading)?;

        let mut hasher = Sha256::new();
        let mut total_bytes = 0u64;
        let mut chunk_count = 0u32;

        for segment in ChunkReader::new(reader, chunk_size) {
            let segment = match segment {
                Ok(segment) => segment,
                Err(e) => {
                    self.fail_file(&file_id);
                    return Err(ScatterError::Io(e).for_chunk(&file_id, chunk_count));
                }
            };
            hasher.update(&segment.data);
            total_bytes += segment.data.len() as u64;

            if let Err(e) = self
                .store_segment(provider.as_ref(), &file_id, &key, &context, &segment)
                .await
            {
                let _ = self
                    .catalog()
                    .and_then(|db| db.mark_chunk_failed(&file_id, segment.order));
                self.fail_file(&file_id);
                return Err(e.for_chunk(&file_id, segment.order));
            }
            chunk_count += 1;
        }

        let sha256 = hex::encode(hasher.finalize());
        self.catalog()?
            .complete_file(&file_id, total_bytes, &sha256)?;
        info!(%file_id, chunks = chunk_count, bytes = total_bytes, "upload completed");

        self.catalog()?.get_file(&file_id)
    }

    async fn store_segment(
        &self,
        provider: &dyn StorageProvider,
        file_id: &str,
        key: &FileKey,
        context: &StorageContext,
        segment: &Segment,
    ) -> Result<()> {
        let blob = crypto::encrypt(key, &segment.data);
        // The splitter is sized so this cannot happen; refuse rather than
        // hand the provider an oversized payload.
        if blob.len() > provider.max_chunk_size() {
            return Err(ScatterError::Config(format!(
                "encrypted chunk of {} bytes exceeds provider maximum {}",
                blob.len(),
                provider.max_chunk_size()
            )));
        }

        self.catalog()?
            .insert_chunk_pending(file_id, segment.order, segment.data.len() as u64)?;
        let chunk_ref = self.router.upload_chunk(provider, &blob, context).await?;
        self.catalog()?
            .mark_chunk_stored(file_id, segment.order, &chunk_ref, blob.len() as u64)?;
        Ok(())
    }

    /// A failed file keeps its already-stored chunks: remote deletes are
    /// themselves fallible, so nothing is rolled back automatically.
    fn fail_file(&self, file_id: &str) {
        if let Err(e) = self
            .catalog()
            .and_then(|db| db.set_file_status(file_id, FileStatus::Failed))
        {
            warn!(file_id, error = %e, "could not mark file failed");
        }
    }

    /// Open a lazy decrypt stream over a completed file.
    pub async fn get_decrypted_stream(&self, file_id: &str) -> Result<DecryptedStream> {
        let file = self.catalog()?.get_file(file_id)?;
        if file.status != FileStatus::Completed {
            return Err(ScatterError::InvalidStatus(format!(
                "file {file_id} is {}, not completed",
                file.status
            )));
        }

        let chunks = self.catalog()?.list_chunks(file_id)?;
        // The set of orders must be exactly [0, N): gapless and duplicate-
        // free (duplicates are impossible by schema), every chunk stored.
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.chunk_order != i as u32 {
                return Err(ScatterError::ChunkGap {
                    file_id: file_id.to_string(),
                    chunk_order: i as u32,
                });
            }
            if chunk.status != ChunkStatus::Stored || chunk.chunk_ref.is_none() {
                return Err(ScatterError::InvalidStatus(format!(
                    "chunk {} of file {file_id} is {}",
                    chunk.chunk_order, chunk.status
                )));
            }
        }

        // Resolve the config that produced the chunks, not the pipeline's
        // active one — historic files stay retrievable after a config change.
        let config = self
            .catalog()?
            .get_provider_config_by_id(file.provider_config_id)?;
        let provider = self.router.resolve(&config).await?;

        Ok(DecryptedStream::new(
            self.router.clone(),
            provider,
            file.storage_context.clone(),
            file.key.clone(),
            file.id,
            chunks,
        ))
    }

    /// Remove a file: remote objects first, chunk rows as each removal is
    /// confirmed, the file row last.
    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let file = self.catalog()?.get_file(file_id)?;
        let config = self
            .catalog()?
            .get_provider_config_by_id(file.provider_config_id)?;
        let provider = self.router.resolve(&config).await?;

        self.catalog()?
            .set_file_status(file_id, FileStatus::Deleting)?;

        let chunks = self.catalog()?.list_chunks(file_id)?;
        for chunk in chunks {
            if let Some(chunk_ref) = &chunk.chunk_ref {
                self.router
                    .delete_chunk(provider.as_ref(), chunk_ref, &file.storage_context)
                    .await
                    .map_err(|e| {
                        ScatterError::from(e).for_chunk(file_id, chunk.chunk_order)
                    })?;
            }
            self.catalog()?
                .delete_chunk_record(file_id, chunk.chunk_order)?;
        }

        self.catalog()?.delete_file_record(file_id)?;
        info!(file_id, "file deleted");
        Ok(())
    }
}

fn lock(catalog: &Mutex<CatalogDb>) -> Result<MutexGuard<'_, CatalogDb>> {
    catalog
        .lock()
        .map_err(|_| ScatterError::Internal("catalog mutex poisoned".into()))
}

/// Effective plaintext segment size for a provider ceiling.
///
/// The ceiling applies to the *encrypted* payload, so the plaintext size is
/// clamped below the provider maximum by the encryption overhead. An
/// explicitly requested size above the provider maximum is a configuration
/// error, caught before any network traffic.
fn effective_chunk_size(
    requested: Option<usize>,
    default_size: usize,
    provider_max: usize,
) -> Result<usize> {
    if let Some(size) = requested {
        if size == 0 {
            return Err(ScatterError::Config(
                "chunk size must be at least 1 byte".into(),
            ));
        }
        if size > provider_max {
            return Err(ScatterError::Config(format!(
                "requested chunk size {size} exceeds provider maximum {provider_max}"
            )));
        }
    }

    let ceiling = provider_max.saturating_sub(crypto::max_overhead());
    if ceiling == 0 {
        return Err(ScatterError::Config(format!(
            "provider maximum {provider_max} leaves no room for encrypted payloads"
        )));
    }
    Ok(requested.unwrap_or(default_size).min(ceiling))
}
