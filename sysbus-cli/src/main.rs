use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod commands;
mod config;

use config::Config;

/// Initialize tracing/logging with the specified log level
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = match log_level.to_lowercase().as_str() {
        "error" => "error",
        "warn" => "warn",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{}", e))
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
fn install_signal_handler(shutdown: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        info!("Received termination signal, shutting down");
        shutdown.cancel();
    })
    .context("Failed to install signal handler")
}

fn main() -> Result<()> {
    // Parse configuration from command line and environment
    let config = Config::from_env().context("Failed to parse configuration")?;

    init_tracing(&config.log_level).context("Failed to initialize logging")?;
    config.print_summary();

    let shutdown = CancellationToken::new();
    install_signal_handler(shutdown.clone())?;

    if let Err(e) = commands::run(&config, shutdown) {
        error!("{:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
