//! Broker - monitoring event pipeline
//!
//! # Usage
//!
//! ```bash
//! # Run the broker (default)
//! broker
//! broker --config /etc/vigil/broker.toml
//!
//! # Validate a configuration file without starting anything
//! broker check-config --config /etc/vigil/broker.toml
//! ```

mod runtime;
mod stats_providers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vigil_config::Config;

/// Broker - monitoring event pipeline
#[derive(Parser, Debug)]
#[command(name = "broker")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, default_value = "broker.toml", global = true)]
    config: std::path::PathBuf,

    /// Log filter override (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the broker (default when no subcommand is given)
    Serve,

    /// Parse and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::CheckConfig) => {
            let config = Config::from_file(&cli.config)?;
            println!(
                "{}: ok ({} endpoints, {} db connections)",
                cli.config.display(),
                config.endpoints.len(),
                config.db.connections
            );
            Ok(())
        }
        Some(Command::Serve) | None => {
            let config = Config::from_file(&cli.config)?;
            let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
            init_logging(level)?;
            runtime::Runtime::build(config).await?.run().await
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
