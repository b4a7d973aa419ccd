use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScatterError};

/// Top-level Scatter configuration stored as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterConfig {
    pub scatter: ScatterSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScatterSettings {
    /// Path to the SQLite catalog database.
    pub catalog_path: String,
    /// Name of the provider config used when an upload does not name one.
    pub default_provider: String,
    /// Plaintext chunk size in bytes; clamped to the provider ceiling.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Retry tuning for provider calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-call timeout for provider operations, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry attempts after the initial call.
    pub max_retries: u32,
    /// Initial backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on any computed backoff delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 30_000,
        }
    }
}

fn default_chunk_size() -> usize {
    crate::chunk::DEFAULT_CHUNK_SIZE
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl ScatterConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ScatterError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ScatterError::TomlDe(e.to_string()))
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ScatterError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config for `scatter init`.
    pub fn default_config(base_dir: &Path) -> Self {
        Self {
            scatter: ScatterSettings {
                catalog_path: base_dir.join("scatter.db").display().to_string(),
                default_provider: "default".to_string(),
                chunk_size: default_chunk_size(),
                retry: RetryConfig::default(),
                request_timeout_secs: default_request_timeout_secs(),
            },
        }
    }

    /// Resolve the config file path: `<base_dir>/scatter.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("scatter.toml")
    }

    /// Resolve the default scatter home directory: `~/.scatter`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".scatter"))
            .ok_or_else(|| ScatterError::Config("Cannot determine home directory".to_string()))
    }
}
