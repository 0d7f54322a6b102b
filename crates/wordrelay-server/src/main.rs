//! # Wordrelay Server
//!
//! Realtime multiplayer word-guessing server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! wordrelay
//!
//! # Run with custom config
//! wordrelay --config /path/to/wordrelay.toml
//!
//! # Run with environment variables
//! WORDRELAY_PORT=8080 WORDRELAY_HOST=0.0.0.0 wordrelay
//! ```

mod config;
mod handlers;
mod metrics;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "wordrelay", version, about = "Realtime word-guessing relay")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wordrelay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load(args.config.as_deref())?;

    tracing::info!("Starting wordrelay on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
