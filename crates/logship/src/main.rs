//! Logship - best-effort log-shipping pipeline
//!
//! ```bash
//! logship --config /etc/logship/logship.toml
//! logship --config logship.toml --log-level debug
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logship::{Registry, Server};
use logship_config::{Config, LogConfig, LogFormat};

/// Best-effort log-shipping pipeline
#[derive(Parser, Debug)]
#[command(name = "logship")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Override the configured log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config).context("failed to load configuration")?;
    init_logging(&config.log, cli.log_level.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "logship starting"
    );

    let server = Server::new(config, Registry::builtin());
    let running = server.start().await.context("failed to start server")?;
    running.run_until_signal().await?;

    info!("logship shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber from the config, with an optional
/// CLI override for the level
fn init_logging(config: &LogConfig, override_level: Option<&str>) -> Result<()> {
    let level = override_level.unwrap_or_else(|| config.level.as_str());
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    match config.format {
        LogFormat::Console => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true))
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .init();
        }
    }
    Ok(())
}
