//! Error types for the sysbus-stream crate.

use bus_client::BusError;

/// Errors that can occur while setting up a subscription.
///
/// Once a subscription is running nothing is reported through this type:
/// notifications that fail to match or decode are discarded by the pump.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The dedicated bus connection could not be opened
    #[error("Failed to open subscription connection: {0}")]
    Connect(#[source] BusError),

    /// The bus daemon refused the match rule
    #[error("Match rule {rule} rejected: {source}")]
    MatchRule {
        /// The rendered rule
        rule: String,
        #[source]
        source: BusError,
    },

    /// The pump thread or its runtime could not be started
    #[error("Failed to start signal pump: {0}")]
    Spawn(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;
