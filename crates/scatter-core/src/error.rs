use std::time::Duration;

use thiserror::Error;

/// Failures from the encryption engine.
///
/// Neither variant is retryable: retrying cannot repair a truncated or
/// corrupted blob, and a wrong key stays wrong.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The blob is shorter than an IV, or the ciphertext after the IV is
    /// empty or not a whole number of cipher blocks.
    #[error("encrypted blob has invalid length: {0} bytes")]
    InvalidLength(usize),

    /// PKCS#7 unpadding failed — wrong key or corrupted ciphertext.
    #[error("padding check failed (wrong key or corrupted data)")]
    PaddingInvalid,
}

/// Failures from a storage provider or the transport underneath it.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The platform asked us to slow down. `retry_after` carries the
    /// platform-specified cooldown when one was given.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// The referenced object no longer resolves on the remote platform.
    #[error("not found: {0}")]
    NotFound(String),

    /// A transport-level or 5xx failure that may succeed on retry.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// Credentials rejected or insufficient permissions.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The platform rejected the request for a non-transient reason
    /// (malformed request, payload too large, ...).
    #[error("provider API error: {0}")]
    Api(String),

    /// The provider call did not complete within the bounded timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl StorageError {
    /// Returns `true` if the error is transient and the operation may
    /// succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Transient(_) | Self::Timeout(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ScatterError {
    // IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found at {0} — run `scatter init` first")]
    ConfigNotFound(String),

    // Crypto
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    // Storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Provider config not found: {0}")]
    ProviderNotFound(String),

    #[error("Unsupported storage platform: {0}")]
    InvalidPlatform(String),

    // Files & chunks
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Chunk {chunk_order} of file {file_id} failed: {source}")]
    Chunk {
        file_id: String,
        chunk_order: u32,
        #[source]
        source: Box<ScatterError>,
    },

    #[error("Chunk set for file {file_id} is not contiguous at order {chunk_order}")]
    ChunkGap { file_id: String, chunk_order: u32 },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // Database
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

impl ScatterError {
    /// Wrap an error with the file/chunk coordinates it occurred at, so
    /// callers can decide whether to retry the whole upload or abandon it.
    pub fn for_chunk(self, file_id: &str, chunk_order: u32) -> Self {
        Self::Chunk {
            file_id: file_id.to_string(),
            chunk_order,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScatterError>;
