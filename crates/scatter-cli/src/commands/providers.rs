use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Subcommand;

use scatter_core::types::{Platform, ProviderConfigRecord};

#[derive(Subcommand)]
pub enum ProvidersCommand {
    /// Register a Discord attachment provider
    AddDiscord {
        /// Unique provider config name
        name: String,

        /// Bot token used for API calls
        #[arg(long, env = "SCATTER_BOT_TOKEN")]
        bot_token: String,

        /// Channel the per-file threads are created in
        #[arg(long)]
        channel_id: String,

        /// Advertised chunk ceiling in bytes (default 8 MiB, capped at the
        /// platform's 10 MiB attachment limit)
        #[arg(long)]
        max_chunk_size: Option<usize>,

        /// Skip the live credential check
        #[arg(long)]
        skip_validation: bool,
    },

    /// Register a local filesystem provider
    AddLocal {
        /// Unique provider config name
        name: String,

        /// Directory the chunks are stored under
        #[arg(long)]
        base_path: PathBuf,

        /// Chunk ceiling in bytes
        #[arg(long)]
        max_chunk_size: Option<usize>,
    },

    /// List registered provider configurations
    List,

    /// Remove a provider configuration (refused while files reference it)
    Remove {
        /// Provider config name
        name: String,
    },
}

pub async fn run(base_dir: &Path, command: ProvidersCommand) -> Result<()> {
    let ctx = super::open(base_dir)?;

    match command {
        ProvidersCommand::AddDiscord {
            name,
            bot_token,
            channel_id,
            max_chunk_size,
            skip_validation,
        } => {
            let mut config = serde_json::json!({
                "bot_token": bot_token,
                "channel_id": channel_id,
            });
            if let Some(size) = max_chunk_size {
                config["max_chunk_size"] = serde_json::json!(size);
            }
            add(&ctx, &name, Platform::Discord, config, skip_validation).await
        }
        ProvidersCommand::AddLocal {
            name,
            base_path,
            max_chunk_size,
        } => {
            let mut config = serde_json::json!({ "base_path": base_path });
            if let Some(size) = max_chunk_size {
                config["max_chunk_size"] = serde_json::json!(size);
            }
            add(&ctx, &name, Platform::Local, config, false).await
        }
        ProvidersCommand::List => {
            let configs = ctx
                .catalog
                .lock()
                .map_err(|_| anyhow::anyhow!("catalog mutex poisoned"))?
                .list_provider_configs()?;
            if configs.is_empty() {
                println!("No provider configurations registered.");
                return Ok(());
            }
            println!("{:<20} {:<10} {}", "NAME", "PLATFORM", "CREATED");
            for cfg in configs {
                println!("{:<20} {:<10} {}", cfg.name, cfg.platform.to_string(), cfg.created_at);
            }
            Ok(())
        }
        ProvidersCommand::Remove { name } => {
            ctx.catalog
                .lock()
                .map_err(|_| anyhow::anyhow!("catalog mutex poisoned"))?
                .delete_provider_config(&name)?;
            println!("Removed provider config '{name}'");
            Ok(())
        }
    }
}

/// Validate against the live platform, then persist the config.
async fn add(
    ctx: &super::Ctx,
    name: &str,
    platform: Platform,
    config: serde_json::Value,
    skip_validation: bool,
) -> Result<()> {
    if !skip_validation {
        let candidate = ProviderConfigRecord {
            id: 0,
            name: name.to_string(),
            platform,
            config: config.clone(),
            created_at: String::new(),
        };
        ctx.router.resolve(&candidate).await?;
        println!("Validated {platform} provider '{name}'");
    }

    let id = ctx
        .catalog
        .lock()
        .map_err(|_| anyhow::anyhow!("catalog mutex poisoned"))?
        .insert_provider_config(name, platform, &config)?;
    println!("Registered provider config '{name}' (id {id})");
    Ok(())
}
