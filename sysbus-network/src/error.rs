//! Error types for the sysbus-network crate.

use bus_client::BusError;
use sysbus_stream::StreamError;

/// Errors from NetworkManager queries and subscriptions.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Connecting, calling or reading a property failed
    #[error("NetworkManager request failed: {0}")]
    Transport(#[from] BusError),

    /// A reply did not have the expected shape
    #[error("Unexpected reply to {request}: {detail}")]
    Decode { request: String, detail: String },

    /// The primary connection has no device behind it
    #[error("No device is associated with the primary connection")]
    NoPrimaryDevice,

    /// Setting up a state-change subscription failed
    #[error(transparent)]
    Subscription(#[from] StreamError),
}

impl NetworkError {
    pub(crate) fn decode(request: &str, detail: impl Into<String>) -> Self {
        Self::Decode {
            request: request.to_string(),
            detail: detail.into(),
        }
    }
}

/// Convenience type alias for Results using NetworkError.
pub type Result<T> = std::result::Result<T, NetworkError>;
