mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scatter")]
#[command(about = "Encrypted chunked file storage on chat platforms")]
#[command(version)]
struct Cli {
    /// Path to the Scatter config directory (default: ~/.scatter)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Scatter configuration and catalog
    Init,

    /// Manage storage provider configurations
    Providers {
        #[command(subcommand)]
        command: commands::providers::ProvidersCommand,
    },

    /// Upload a file
    Upload {
        /// Path to the file to upload
        path: PathBuf,

        /// Free-text description stored with the file
        #[arg(long)]
        description: Option<String>,

        /// Plaintext chunk size in bytes (default from config, clamped to
        /// the provider ceiling)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Provider config name (default from config)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Download a file
    Download {
        /// File id to download
        file_id: String,
        /// Destination path
        dest: PathBuf,
    },

    /// List uploaded files
    List,

    /// Delete a file (remote chunks first, catalog records after)
    Delete {
        /// File id to delete
        file_id: String,
    },

    /// Show catalog totals
    Status,

    /// Show current configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scatter=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let base_dir = match cli.config_dir {
        Some(ref dir) => dir.clone(),
        None => scatter_core::config::ScatterConfig::default_base_dir()?,
    };

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Init => commands::init::run(&base_dir),
        Commands::Providers { command } => {
            rt.block_on(commands::providers::run(&base_dir, command))
        }
        Commands::Upload {
            ref path,
            ref description,
            chunk_size,
            ref provider,
        } => rt.block_on(commands::upload::run(
            &base_dir,
            path,
            description.as_deref(),
            chunk_size,
            provider.as_deref(),
        )),
        Commands::Download {
            ref file_id,
            ref dest,
        } => rt.block_on(commands::download::run(&base_dir, file_id, dest)),
        Commands::List => commands::list::run(&base_dir),
        Commands::Delete { ref file_id } => {
            rt.block_on(commands::delete::run(&base_dir, file_id))
        }
        Commands::Status => commands::status::run(&base_dir),
        Commands::Config => commands::config::run(&base_dir),
    }
}
