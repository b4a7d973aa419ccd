use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use scatter_core::StorageError;
use scatter_core::types::{ChunkRef, FileMetadata, Platform, StorageContext};

use crate::provider::StorageProvider;

const DEFAULT_LOCAL_MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Configuration for the filesystem backend.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    pub base_path: PathBuf,
    #[serde(default = "default_local_max_chunk_size")]
    pub max_chunk_size: usize,
}

fn default_local_max_chunk_size() -> usize {
    DEFAULT_LOCAL_MAX_CHUNK_SIZE
}

/// Filesystem-based storage provider for development and testing.
///
/// The per-file "container" is a directory under the base path; chunk
/// references are plain file paths inside it.
#[derive(Debug)]
pub struct LocalProvider {
    base_path: PathBuf,
    max_chunk_size: usize,
}

impl LocalProvider {
    pub fn new(config: LocalConfig) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&config.base_path)
            .map_err(|e| StorageError::Transient(format!("cannot create base path: {e}")))?;
        Ok(Self {
            base_path: config.base_path,
            max_chunk_size: config.max_chunk_size,
        })
    }

    pub fn at(base_path: &Path) -> Result<Self, StorageError> {
        Self::new(LocalConfig {
            base_path: base_path.to_path_buf(),
            max_chunk_size: DEFAULT_LOCAL_MAX_CHUNK_SIZE,
        })
    }

    fn container_dir(&self, context: &StorageContext) -> Result<PathBuf, StorageError> {
        let dir = context
            .get_str("dir")
            .ok_or_else(|| StorageError::Api("storage context is missing dir".into()))?;
        Ok(self.base_path.join(dir))
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn platform(&self) -> Platform {
        Platform::Local
    }

    async fn prepare_storage(
        &self,
        meta: &FileMetadata,
    ) -> Result<StorageContext, StorageError> {
        let dir = meta.file_id.clone();
        std::fs::create_dir_all(self.base_path.join(&dir))
            .map_err(|e| StorageError::Transient(format!("cannot create container: {e}")))?;
        Ok(StorageContext(serde_json::json!({ "dir": dir })))
    }

    async fn upload_chunk(
        &self,
        data: &[u8],
        context: &StorageContext,
    ) -> Result<ChunkRef, StorageError> {
        let dir = self.container_dir(context)?;
        let name = format!("{}.bin", uuid::Uuid::now_v7());
        std::fs::write(dir.join(&name), data)
            .map_err(|e| StorageError::Transient(format!("write failed: {e}")))?;

        let rel = format!(
            "{}/{name}",
            context.get_str("dir").unwrap_or_default()
        );
        Ok(ChunkRef(serde_json::json!({ "path": rel })))
    }

    async fn download_chunk(
        &self,
        chunk_ref: &ChunkRef,
        _context: &StorageContext,
    ) -> Result<Vec<u8>, StorageError> {
        let rel = chunk_ref
            .get_str("path")
            .ok_or_else(|| StorageError::Api("chunk reference is missing path".into()))?;
        let path = self.base_path.join(rel);
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(rel.to_string()))
            }
            Err(e) => Err(StorageError::Transient(format!("read failed: {e}"))),
        }
    }

    async fn delete_chunk(
        &self,
        chunk_ref: &ChunkRef,
        _context: &StorageContext,
    ) -> Result<(), StorageError> {
        let rel = chunk_ref
            .get_str("path")
            .ok_or_else(|| StorageError::Api("chunk reference is missing path".into()))?;
        let path = self.base_path.join(rel);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Transient(format!("delete failed: {e}"))),
        }
    }

    fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    async fn validate_config(&self) -> Result<(), StorageError> {
        if !self.base_path.exists() {
            return Err(StorageError::NotFound(format!(
                "base path does not exist: {}",
                self.base_path.display()
            )));
        }
        Ok(())
    }
}
