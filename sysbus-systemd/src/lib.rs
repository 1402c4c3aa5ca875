//! # sysbus-systemd
//!
//! Start and stop systemd units over the system bus and wait for the
//! resulting job to finish.
//!
//! ## Overview
//!
//! Starting or stopping a unit through the manager only queues a job. The
//! call returns a job object path right away and the real outcome arrives
//! later as a `JobRemoved` signal. [`ServiceController`] hides that: it
//! checks the unit first, issues the request, waits for the matching
//! `JobRemoved` with a deadline, and reconciles against the unit's actual
//! state when the job reports anything other than `done`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use sysbus_systemd::{ControlConfig, ServiceController, TransitionOutcome};
//!
//! let controller = ServiceController::system();
//! match controller.start_service("nginx")? {
//!     TransitionOutcome::AlreadyInState => println!("already running"),
//!     TransitionOutcome::Completed => println!("started"),
//!     TransitionOutcome::Reconciled(result) => println!("running despite '{}'", result),
//! }
//!
//! // Timeouts and interruptions leave the outcome unknown
//! if let Err(e) = controller.stop_service("nginx") {
//!     if e.is_unknown_outcome() {
//!         println!("still {}", controller.service_status("nginx")?);
//!     }
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod job;
pub mod unit;

// Re-export main types for convenience
pub use config::{ControlConfig, JobMode};
pub use controller::{start_service, stop_service, Operation, ServiceController, TransitionOutcome};
pub use error::{ControlError, Result};
pub use job::{job_removed_filter, JobRemoved, JobResult, JobToken};
pub use unit::{canonical_unit_name, ActiveState};

/// Well-known name of the systemd manager.
pub const SYSTEMD_SERVICE: &str = "org.freedesktop.systemd1";

/// Object path of the systemd manager.
pub const SYSTEMD_PATH: &str = "/org/freedesktop/systemd1";

pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";

pub const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";

/// Error name returned by `GetUnit` for units that are not loaded.
pub const NO_SUCH_UNIT: &str = "org.freedesktop.systemd1.NoSuchUnit";

/// Error name returned by `Subscribe` when the connection already is subscribed.
pub const ALREADY_SUBSCRIBED: &str = "org.freedesktop.systemd1.AlreadySubscribed";
