//! Dockhand CLI - Command-line access to registry records

use anyhow::Context;
use clap::Parser;
use dockhand_core::{DockhandConfig, Registry, RegistryService, Response};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "Dockhand - Container registry records with safe partial updates")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/dockhand.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Apply a partial update to a registry
    Update {
        /// Registry identifier
        id: String,

        /// JSON payload, e.g. '{"authentication": false}'
        #[arg(short, long, conflicts_with = "payload_file")]
        payload: Option<String>,

        /// Read the JSON payload from a file
        #[arg(long)]
        payload_file: Option<PathBuf>,
    },
    /// Show one registry
    Get {
        /// Registry identifier
        id: String,
    },
    /// List all registries
    List,
    /// Seed the database from a JSON array of registries
    Import {
        /// File holding the registries
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = DockhandConfig::load_or_default(&cli.config)?;
    init_logging(&config);
    tracing::debug!("Using database at {}", config.storage.db_path.display());

    let service = RegistryService::open(&config)?;

    let response = match cli.command {
        Commands::Update {
            id,
            payload,
            payload_file,
        } => {
            let payload = match (payload, payload_file) {
                (Some(inline), _) => inline.into_bytes(),
                (None, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("reading payload from {}", path.display()))?,
                (None, None) => b"{}".to_vec(),
            };
            service.handle_update(&id, &payload).await
        }
        Commands::Get { id } => Response::from(service.get(&id).await.map(|r| r.redacted())),
        Commands::List => Response::from(
            service
                .list()
                .await
                .map(|all| all.iter().map(Registry::redacted).collect::<Vec<_>>()),
        ),
        Commands::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading registries from {}", file.display()))?;
            let registries: Vec<Registry> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing registries from {}", file.display()))?;
            Response::from(service.import(registries).await)
        }
    };

    service.store().flush()?;

    println!("{}", serde_json::to_string_pretty(&response.body)?);
    if !response.is_success() {
        eprintln!("dockhand: request failed with status {}", response.status);
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(config: &DockhandConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
