pub mod api;
pub mod client;
pub mod collector;
pub mod config;
pub mod metrics;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::Config;
use crate::registry::DeviceRegistry;

#[derive(Parser)]
#[command(name = "gocoax-exporter")]
#[command(about = "Prometheus exporter for goCoax MoCA adapters", version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, env = "GOCOAX_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve /metrics (default)
    Serve,
    /// Scrape every device once and print the decoded snapshots as JSON
    Scrape,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_address = %config.listen_address,
        devices = config.devices.len(),
        "Starting goCoax exporter"
    );

    let registry = DeviceRegistry::from_config(&config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            info!(collectors = registry.len(), "Registered collectors");
            let bind = config.bind_address();
            let state = Arc::new(AppState {
                registry,
                listen_address: config.listen_address.clone(),
            });
            api::run_server(state, &bind).await?;
        }
        Commands::Scrape => {
            let outcomes = registry.scrape_all().await;
            let snapshots: Vec<_> = outcomes.into_iter().filter_map(|o| o.snapshot).collect();
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        }
    }

    Ok(())
}
