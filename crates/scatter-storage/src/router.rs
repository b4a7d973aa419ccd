//! Storage router: resolves named provider configurations to live provider
//! instances and wraps every provider call with a bounded timeout and
//! bounded exponential-backoff retry.
//!
//! This is the only layer that applies retry policy. Rate-limit errors that
//! carry a platform cooldown sleep for that cooldown instead of the
//! computed backoff; non-retryable errors surface immediately.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use scatter_core::types::{ChunkRef, FileMetadata, ProviderConfigRecord, StorageContext};
use scatter_core::{Result, ScatterError, StorageError};

use crate::factory::build_provider;
use crate::provider::StorageProvider;
use crate::retry::RetryPolicy;

pub struct StorageRouter {
    policy: RetryPolicy,
    timeout: Duration,
    skip_validation: bool,
    // One instance per distinct configuration for the process lifetime;
    // holding the lock across construction gives at-most-once validation
    // under concurrent first use.
    cache: Mutex<HashMap<String, Arc<dyn StorageProvider>>>,
}

impl StorageRouter {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            policy,
            timeout,
            skip_validation: false,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Router that skips the live credential check at construction.
    /// Intended for tests and offline inspection.
    pub fn without_validation(policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            skip_validation: true,
            ..Self::new(policy, timeout)
        }
    }

    /// Resolve a configuration record to a constructed, validated provider,
    /// reusing the cached instance when one exists.
    pub async fn resolve(
        &self,
        record: &ProviderConfigRecord,
    ) -> Result<Arc<dyn StorageProvider>> {
        let mut cache = self.cache.lock().await;
        if let Some(provider) = cache.get(&record.name) {
            return Ok(provider.clone());
        }

        debug!(provider = %record.name, platform = %record.platform, "constructing provider");
        let provider: Arc<dyn StorageProvider> = Arc::from(build_provider(record)?);

        if !self.skip_validation {
            // Validation failures are configuration errors: fatal, surfaced
            // immediately, never retried.
            match tokio::time::timeout(self.timeout, provider.validate_config()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(ScatterError::Config(format!(
                        "provider '{}' failed validation: {e}",
                        record.name
                    )));
                }
                Err(_) => {
                    return Err(ScatterError::Config(format!(
                        "provider '{}' validation timed out",
                        record.name
                    )));
                }
            }
        }

        cache.insert(record.name.clone(), provider.clone());
        Ok(provider)
    }

    pub async fn prepare_storage(
        &self,
        provider: &dyn StorageProvider,
        meta: &FileMetadata,
    ) -> std::result::Result<StorageContext, StorageError> {
        self.with_retry("prepare_storage", || provider.prepare_storage(meta))
            .await
    }

    pub async fn upload_chunk(
        &self,
        provider: &dyn StorageProvider,
        data: &[u8],
        context: &StorageContext,
    ) -> std::result::Result<ChunkRef, StorageError> {
        self.with_retry("upload_chunk", || provider.upload_chunk(data, context))
            .await
    }

    pub async fn download_chunk(
        &self,
        provider: &dyn StorageProvider,
        chunk_ref: &ChunkRef,
        context: &StorageContext,
    ) -> std::result::Result<Vec<u8>, StorageError> {
        self.with_retry("download_chunk", || {
            provider.download_chunk(chunk_ref, context)
        })
        .await
    }

    pub async fn delete_chunk(
        &self,
        provider: &dyn StorageProvider,
        chunk_ref: &ChunkRef,
        context: &StorageContext,
    ) -> std::result::Result<(), StorageError> {
        self.with_retry("delete_chunk", || provider.delete_chunk(chunk_ref, context))
            .await
    }

    async fn with_retry<T, F, Fut>(
        &self,
        op: &str,
        mut call: F,
    ) -> std::result::Result<T, StorageError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, StorageError>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(self.timeout, call()).await {
                Ok(r) => r,
                Err(_) => Err(StorageError::Timeout(self.timeout)),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = match &e {
                        StorageError::RateLimited {
                            retry_after: Some(cooldown),
                        } => *cooldown,
                        _ => self.policy.delay_for(attempt),
                    };
                    warn!(op, attempt, ?delay, error = %e, "provider call failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
