//! Error types for the bus transport

use thiserror::Error;

/// Errors that can occur while talking to the message bus
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// Could not open a connection to the bus
    #[error("Failed to connect to the {bus} bus: {reason}")]
    Connect {
        /// Which bus was dialed ("system", "session", ...)
        bus: String,
        /// Underlying failure
        reason: String,
    },

    /// The remote side answered a method call with an error reply
    #[error("{name}: {message}")]
    MethodError {
        /// D-Bus error name, e.g. `org.freedesktop.systemd1.NoSuchUnit`
        name: String,
        /// Human readable detail supplied with the error reply
        message: String,
    },

    /// The match rule was rejected by the bus daemon
    #[error("Match rule rejected: {0}")]
    MatchRule(String),

    /// A call argument could not be encoded for the wire
    #[error("Failed to encode arguments: {0}")]
    Encode(String),

    /// Any other transport level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The connection was already closed
    #[error("Connection closed")]
    Closed,

    /// The blocking runtime used by the sync facades could not be created
    #[error("Failed to build runtime: {0}")]
    Runtime(String),
}

impl BusError {
    /// Build a method error reply.
    pub fn method_error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MethodError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Returns the D-Bus error name if this is a method error reply.
    pub fn error_name(&self) -> Option<&str> {
        match self {
            Self::MethodError { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Check whether this is a method error reply with the given name.
    pub fn is_method_error(&self, name: &str) -> bool {
        self.error_name() == Some(name)
    }
}

impl From<zbus::Error> for BusError {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, detail, _) => Self::MethodError {
                name: name.to_string(),
                message: detail.unwrap_or_default(),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Convenience type alias for transport results.
pub type Result<T> = std::result::Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_error_display() {
        let error = BusError::Connect {
            bus: "system".to_string(),
            reason: "no such file".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to connect to the system bus: no such file"
        );

        let error = BusError::method_error(
            "org.freedesktop.systemd1.NoSuchUnit",
            "Unit demo.service not loaded.",
        );
        assert_eq!(
            error.to_string(),
            "org.freedesktop.systemd1.NoSuchUnit: Unit demo.service not loaded."
        );

        assert_eq!(BusError::Closed.to_string(), "Connection closed");
    }

    #[test]
    fn test_error_name() {
        let error = BusError::method_error("org.freedesktop.DBus.Error.AccessDenied", "nope");
        assert_eq!(
            error.error_name(),
            Some("org.freedesktop.DBus.Error.AccessDenied")
        );
        assert!(error.is_method_error("org.freedesktop.DBus.Error.AccessDenied"));
        assert!(!error.is_method_error("org.freedesktop.systemd1.NoSuchUnit"));

        assert_eq!(BusError::Closed.error_name(), None);
    }
}
