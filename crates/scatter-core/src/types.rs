use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Per-file AES-256 key — zeroized on drop, redacted in Debug output.
///
/// Generated exactly once when an upload begins and immutable thereafter;
/// every chunk of the file is encrypted under this key and no other.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey(pub [u8; 32]);

impl FileKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileKey").field(&"[REDACTED]").finish()
    }
}

/// Storage platform selector, one variant per provider implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Chunks live as message attachments in a Discord thread.
    Discord,
    /// Chunks live as files under a local directory.
    Local,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Discord => write!(f, "discord"),
            Platform::Local => write!(f, "local"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = crate::error::ScatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discord" => Ok(Platform::Discord),
            "local" => Ok(Platform::Local),
            _ => Err(crate::error::ScatterError::InvalidPlatform(s.to_string())),
        }
    }
}

/// File lifecycle status.
///
/// `pending → uploading → completed | failed`; a completed file moves to
/// `deleting` while its remote chunks are being removed. A fully deleted
/// file has no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Pending,
    Uploading,
    Completed,
    Failed,
    Deleting,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::Uploading => write!(f, "uploading"),
            FileStatus::Completed => write!(f, "completed"),
            FileStatus::Failed => write!(f, "failed"),
            FileStatus::Deleting => write!(f, "deleting"),
        }
    }
}

impl std::str::FromStr for FileStatus {
    type Err = crate::error::ScatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FileStatus::Pending),
            "uploading" => Ok(FileStatus::Uploading),
            "completed" => Ok(FileStatus::Completed),
            "failed" => Ok(FileStatus::Failed),
            "deleting" => Ok(FileStatus::Deleting),
            _ => Err(crate::error::ScatterError::InvalidStatus(s.to_string())),
        }
    }
}

/// Chunk lifecycle status: a row is created `pending` before the provider
/// upload and promoted to `stored` only once a reference is in hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    Pending,
    Stored,
    Failed,
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStatus::Pending => write!(f, "pending"),
            ChunkStatus::Stored => write!(f, "stored"),
            ChunkStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ChunkStatus {
    type Err = crate::error::ScatterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChunkStatus::Pending),
            "stored" => Ok(ChunkStatus::Stored),
            "failed" => Ok(ChunkStatus::Failed),
            _ => Err(crate::error::ScatterError::InvalidStatus(s.to_string())),
        }
    }
}

/// Opaque per-file routing data produced by `prepare_storage` and threaded
/// through every chunk operation of that file (e.g. `{"thread_id": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageContext(pub serde_json::Value);

impl StorageContext {
    pub fn empty() -> Self {
        Self(serde_json::json!({}))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}

/// Opaque provider-specific locator for one stored chunk
/// (e.g. `{"thread_id": ..., "message_id": ..., "attachment_url": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef(pub serde_json::Value);

impl ChunkRef {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }
}

/// One logical uploaded object as persisted in the catalog.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    pub description: Option<String>,
    pub size: u64,
    pub sha256: Option<String>,
    pub key: FileKey,
    pub status: FileStatus,
    pub provider_config_id: i64,
    pub storage_context: StorageContext,
    pub created_at: String,
}

/// One encrypted unit of a file, addressed by `(file_id, chunk_order)`.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub file_id: String,
    pub chunk_order: u32,
    pub size_plain: u64,
    pub size_encrypted: u64,
    pub chunk_ref: Option<ChunkRef>,
    pub status: ChunkStatus,
}

/// Named configuration for one storage backend instance. Referenced (not
/// owned) by files; must not be deleted while any file references it.
#[derive(Debug, Clone)]
pub struct ProviderConfigRecord {
    pub id: i64,
    pub name: String,
    pub platform: Platform,
    pub config: serde_json::Value,
    pub created_at: String,
}

/// File-level metadata handed to `prepare_storage` so providers can name
/// their per-file container.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub file_id: String,
    pub filename: String,
}
