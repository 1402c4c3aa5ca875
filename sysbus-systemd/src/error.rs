//! Error types for the sysbus-systemd crate.

use std::time::Duration;

use bus_client::BusError;

use crate::job::{JobResult, JobToken};
use crate::unit::ActiveState;

/// Errors from unit status queries and start/stop transitions.
///
/// Three families matter to callers: the service manager could not be
/// reached ([`is_transport`](Self::is_transport)), the outcome is unknown
/// ([`is_unknown_outcome`](Self::is_unknown_outcome)), or the job ran and
/// the unit did not end up where it was asked to be (`NotConverged`).
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The unit name was rejected before talking to the bus
    #[error("Invalid unit name {name:?}: {reason}")]
    InvalidUnitName { name: String, reason: String },

    /// A job mode string was not one the manager accepts
    #[error("Invalid job mode '{0}'. Valid modes: replace, fail, isolate, ignore-dependencies, ignore-requirements")]
    InvalidJobMode(String),

    /// Connection, method call or property read failed
    #[error("Service manager request failed: {0}")]
    Transport(#[from] BusError),

    /// A reply or job signal did not have the expected shape
    #[error("Unexpected reply from service manager: {0}")]
    Decode(String),

    /// No completion signal for the job before the deadline
    #[error("Job {job} for {unit} did not complete within {timeout:?}")]
    Timeout {
        unit: String,
        job: JobToken,
        timeout: Duration,
    },

    /// The process is shutting down and stopped waiting for the job
    #[error("Interrupted while waiting for job {job} for {unit}")]
    Interrupted { unit: String, job: JobToken },

    /// The job finished but the unit is not in the requested state
    #[error("Job for {unit} finished with result '{result}' and the unit is {state}")]
    NotConverged {
        unit: String,
        result: JobResult,
        state: ActiveState,
    },
}

impl ControlError {
    /// The service manager could not be talked to.
    pub fn is_transport(&self) -> bool {
        matches!(self, ControlError::Transport(_))
    }

    /// The request may or may not have taken effect; re-check the unit.
    pub fn is_unknown_outcome(&self) -> bool {
        matches!(
            self,
            ControlError::Timeout { .. } | ControlError::Interrupted { .. }
        )
    }
}

/// Convenience type alias for Results using ControlError.
pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_error_display() {
        let error = ControlError::Timeout {
            unit: "demo.service".to_string(),
            job: JobToken::new("/org/freedesktop/systemd1/job/7"),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(
            error.to_string(),
            "Job /org/freedesktop/systemd1/job/7 for demo.service did not complete within 5s"
        );

        let error = ControlError::NotConverged {
            unit: "demo.service".to_string(),
            result: JobResult::Failed,
            state: ActiveState::Failed,
        };
        assert_eq!(
            error.to_string(),
            "Job for demo.service finished with result 'failed' and the unit is failed"
        );

        let error = ControlError::Transport(BusError::method_error(
            "org.freedesktop.systemd1.NoSuchUnit",
            "Unit demo.service not found.",
        ));
        assert_eq!(
            error.to_string(),
            "Service manager request failed: org.freedesktop.systemd1.NoSuchUnit: Unit demo.service not found."
        );
    }

    #[test]
    fn test_error_families() {
        let transport = ControlError::from(BusError::Closed);
        assert!(transport.is_transport());
        assert!(!transport.is_unknown_outcome());

        let interrupted = ControlError::Interrupted {
            unit: "demo.service".to_string(),
            job: JobToken::new("/job/1"),
        };
        assert!(interrupted.is_unknown_outcome());
        assert!(!interrupted.is_transport());

        assert_eq!(
            ControlError::InvalidJobMode("later".to_string()).to_string(),
            "Invalid job mode 'later'. Valid modes: replace, fail, isolate, ignore-dependencies, ignore-requirements"
        );

        let decode = ControlError::Decode("empty reply".to_string());
        assert!(!decode.is_transport());
        assert!(!decode.is_unknown_outcome());
    }
}
