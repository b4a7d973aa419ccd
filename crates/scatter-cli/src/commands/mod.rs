pub mod config;
pub mod delete;
pub mod download;
pub mod init;
pub mod list;
pub mod providers;
pub mod status;
pub mod upload;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scatter_core::catalog::CatalogDb;
use scatter_core::config::ScatterConfig;
use scatter_storage::{RetryPolicy, StorageRouter};

/// Everything a command needs: loaded config, open catalog, and a router.
pub(crate) struct Ctx {
    pub config: ScatterConfig,
    pub catalog: Arc<Mutex<CatalogDb>>,
    pub router: Arc<StorageRouter>,
}

pub(crate) fn open(base_dir: &Path) -> anyhow::Result<Ctx> {
    let config_path = ScatterConfig::default_path(base_dir);
    let config = ScatterConfig::load(&config_path)?;

    let catalog = Arc::new(Mutex::new(CatalogDb::open(Path::new(
        &config.scatter.catalog_path,
    ))?));
    let router = Arc::new(StorageRouter::new(
        RetryPolicy::from(&config.scatter.retry),
        Duration::from_secs(config.scatter.request_timeout_secs),
    ));

    Ok(Ctx {
        config,
        catalog,
        router,
    })
}

impl Ctx {
    /// Build a pipeline bound to the named provider, falling back to the
    /// configured default.
    pub(crate) fn pipeline(
        &self,
        provider: Option<&str>,
    ) -> anyhow::Result<scatter_pipeline::ChunkPipeline> {
        let name = provider.unwrap_or(&self.config.scatter.default_provider);
        Ok(scatter_pipeline::ChunkPipeline::new(
            self.catalog.clone(),
            self.router.clone(),
            name,
            self.config.scatter.chunk_size,
        )?)
    }

    /// Build a pipeline bound to the provider config that produced the
    /// given file, so historic files stay retrievable after the default
    /// changes.
    pub(crate) fn pipeline_for_file(
        &self,
        file_id: &str,
    ) -> anyhow::Result<scatter_pipeline::ChunkPipeline> {
        let provider_name = {
            let catalog = self
                .catalog
                .lock()
                .map_err(|_| anyhow::anyhow!("catalog mutex poisoned"))?;
            let file = catalog.get_file(file_id)?;
            catalog
                .get_provider_config_by_id(file.provider_config_id)?
                .name
        };
        self.pipeline(Some(&provider_name))
    }
}
