use anyhow::Result;
use std::path::Path;

use scatter_core::config::ScatterConfig;

pub fn run(base_dir: &Path) -> Result<()> {
    let config_path = ScatterConfig::default_path(base_dir);
    let config = ScatterConfig::load(&config_path)?;

    println!("Config file: {}", config_path.display());
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
