use anyhow::Result;
use std::path::Path;

use scatter_core::catalog::CatalogDb;
use scatter_core::config::ScatterConfig;

pub fn run(base_dir: &Path) -> Result<()> {
    println!("Initializing Scatter in {}", base_dir.display());

    std::fs::create_dir_all(base_dir)?;

    let config_path = ScatterConfig::default_path(base_dir);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let config = ScatterConfig::default_config(base_dir);
        config.save(&config_path)?;
        println!("Created config: {}", config_path.display());
    }

    let config = ScatterConfig::load(&config_path)?;
    let catalog_path = Path::new(&config.scatter.catalog_path);
    let _catalog = CatalogDb::open(catalog_path)?;
    println!("Initialized catalog: {}", catalog_path.display());

    println!("\nScatter initialized. Next steps:");
    println!("  1. Register a provider: `scatter providers add-discord <name> --bot-token ... --channel-id ...`");
    println!("  2. Upload your first file: `scatter upload <path>`");

    Ok(())
}
