use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use sysbus_systemd::JobMode;
use tracing::info;

/// sysbus: systemd unit control and NetworkManager state over D-Bus
#[derive(Parser, Debug)]
#[command(name = "sysbus")]
#[command(about = "Control systemd units and watch NetworkManager state over the system bus")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Seconds to wait for a start/stop job to finish
    #[arg(long, default_value = "5", global = true)]
    pub job_timeout: u64,

    /// Job mode passed with start/stop requests
    #[arg(long, default_value = "replace", global = true)]
    pub job_mode: String,

    /// Capacity of each subscription's record buffer
    #[arg(long, default_value = "20", global = true)]
    pub buffer_size: usize,

    /// Use the session bus instead of the system bus
    #[arg(long, global = true)]
    pub session_bus: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the active state of a unit
    Status { unit: String },
    /// Start a unit and wait for its job to finish
    Start { unit: String },
    /// Stop a unit and wait for its job to finish
    Stop { unit: String },
    /// Print NetworkManager state, connectivity and the primary device
    Net {
        /// Also look up the device for this interface name
        #[arg(short, long)]
        interface: Option<String>,
    },
    /// Scan for Wi-Fi networks and print their SSIDs
    Ssids {
        /// Wireless interface to scan on
        #[arg(short, long, default_value = "wlan0")]
        interface: String,
    },
    /// Print state changes of one device until interrupted
    WatchDevice {
        /// Device object path
        #[arg(long, conflicts_with = "interface")]
        device: Option<String>,
        /// Interface name to resolve to a device (defaults to the primary device)
        #[arg(short, long)]
        interface: Option<String>,
    },
    /// Print overall NetworkManager state changes until interrupted
    WatchManager,
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.job_timeout == 0 {
            return Err(anyhow!("Job timeout must be positive"));
        }

        if self.buffer_size == 0 {
            return Err(anyhow!("Buffer size must be at least 1"));
        }

        self.job_mode.parse::<JobMode>()?;

        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow!(
                    "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                    self.log_level
                ));
            }
        }

        Ok(())
    }
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub command: Command,
    pub job_timeout: Duration,
    pub job_mode: JobMode,
    pub buffer_size: usize,
    pub session_bus: bool,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command line arguments and environment variables
    pub fn from_env() -> Result<Self> {
        Self::resolve(Args::parse(), |key| std::env::var(key).ok())
    }

    /// Apply `SYSBUS_*` overrides read through `env`, then validate.
    pub fn resolve(mut args: Args, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(timeout) = env("SYSBUS_JOB_TIMEOUT") {
            args.job_timeout = timeout
                .parse()
                .context("Invalid SYSBUS_JOB_TIMEOUT environment variable")?;
        }

        if let Some(log_level) = env("SYSBUS_LOG_LEVEL") {
            args.log_level = log_level;
        }

        if env("SYSBUS_SESSION_BUS").is_some() {
            args.session_bus = true;
        }

        args.validate()?;

        let job_mode: JobMode = args.job_mode.parse()?;

        Ok(Self {
            command: args.command,
            job_timeout: Duration::from_secs(args.job_timeout),
            job_mode,
            buffer_size: args.buffer_size,
            session_bus: args.session_bus,
            log_level: args.log_level,
        })
    }

    /// Log configuration summary
    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  Bus: {}", if self.session_bus { "session" } else { "system" });
        info!("  Job timeout: {}s", self.job_timeout.as_secs());
        info!("  Job mode: {}", self.job_mode);
        info!("  Buffer size: {}", self.buffer_size);
        info!("  Log level: {}", self.log_level);
    }
}
