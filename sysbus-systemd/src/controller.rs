//! Start/stop state machine for systemd units.
//!
//! Each transition runs on its own connection:
//!
//! 1. read the unit's `ActiveState`; return early if it already matches
//! 2. register the `JobRemoved` match rule and call `Subscribe`
//! 3. call `StartUnit` / `StopUnit` and keep the returned job path
//! 4. wait (bounded) for the `JobRemoved` carrying that job path
//! 5. `done` means success; any other result re-reads the unit state and
//!    trusts what it observes
//!
//! The manager only emits job signals while at least one client is
//! subscribed, and both the rule and the subscription are in place before
//! the request is issued, so a job that finishes immediately cannot
//! complete unseen.

use std::fmt;
use std::sync::Arc;

use bus_client::{
    blocking_runtime, BusConnection, BusTransport, BusValue, ObjectRef, ZbusTransport,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ControlConfig;
use crate::error::{ControlError, Result};
use crate::job::{job_removed_filter, wait_for_job, JobResult, JobToken, WaitAbort};
use crate::unit::{canonical_unit_name, ActiveState};
use crate::{
    ALREADY_SUBSCRIBED, MANAGER_INTERFACE, NO_SUCH_UNIT, SYSTEMD_PATH, SYSTEMD_SERVICE,
    UNIT_INTERFACE,
};

/// A mutating unit request.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Operation {
    Start,
    Stop,
}

impl Operation {
    /// Manager method issuing this request.
    pub fn method(&self) -> &'static str {
        match self {
            Operation::Start => "StartUnit",
            Operation::Stop => "StopUnit",
        }
    }

    /// Whether `state` already is where this operation wants the unit.
    pub fn is_satisfied_by(&self, state: &ActiveState) -> bool {
        match self {
            Operation::Start => state.is_running(),
            Operation::Stop => !state.is_running(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Start => write!(f, "start"),
            Operation::Stop => write!(f, "stop"),
        }
    }
}

/// How a successful transition got there.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TransitionOutcome {
    /// The unit was already in the requested state; nothing was issued
    AlreadyInState,
    /// The job completed with `done`
    Completed,
    /// The job reported something else but the unit reached the requested
    /// state anyway
    Reconciled(JobResult),
}

/// Controls systemd units through a bus transport.
///
/// All public methods are synchronous; each call builds a short-lived
/// runtime and opens a dedicated connection that is closed before the call
/// returns, on success and on error. Overlapping transitions on the same
/// unit are not serialised here.
///
/// # Example
///
/// ```rust,ignore
/// use sysbus_systemd::ServiceController;
///
/// let controller = ServiceController::system();
/// controller.start_service("nginx")?;
/// assert!(controller.is_service_running("nginx")?);
/// ```
#[derive(Clone)]
pub struct ServiceController {
    transport: Arc<dyn BusTransport>,
    config: ControlConfig,
    shutdown: CancellationToken,
}

impl ServiceController {
    pub fn new(transport: Arc<dyn BusTransport>) -> Self {
        Self::with_config(transport, ControlConfig::default())
    }

    pub fn with_config(transport: Arc<dyn BusTransport>, config: ControlConfig) -> Self {
        Self {
            transport,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Controller on the system bus with default configuration.
    pub fn system() -> Self {
        Self::new(Arc::new(ZbusTransport::system()))
    }

    /// Abort job waits when `shutdown` is cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Start `name` and wait for the unit to be running.
    pub fn start_service(&self, name: &str) -> Result<TransitionOutcome> {
        self.block_on_transition(name, Operation::Start)
    }

    /// Stop `name` and wait for the unit to be inactive or failed.
    pub fn stop_service(&self, name: &str) -> Result<TransitionOutcome> {
        self.block_on_transition(name, Operation::Stop)
    }

    /// Current `ActiveState` of `name`. Units that are not loaded report
    /// `inactive`.
    pub fn service_status(&self, name: &str) -> Result<ActiveState> {
        let unit = canonical_unit_name(name)?;
        let rt = blocking_runtime()?;
        rt.block_on(self.status(&unit))
    }

    pub fn is_service_running(&self, name: &str) -> Result<bool> {
        Ok(self.service_status(name)?.is_running())
    }

    fn block_on_transition(&self, name: &str, op: Operation) -> Result<TransitionOutcome> {
        let unit = canonical_unit_name(name)?;
        let rt = blocking_runtime()?;
        rt.block_on(self.transition(&unit, op))
    }

    /// Read the state of an already canonical unit name.
    pub async fn status(&self, unit: &str) -> Result<ActiveState> {
        let conn = self.transport.connect().await?;
        let state = unit_state(conn.as_ref(), unit).await;
        conn.close().await;
        state
    }

    /// Run one transition for an already canonical unit name.
    pub async fn transition(&self, unit: &str, op: Operation) -> Result<TransitionOutcome> {
        let mut conn = self.transport.connect().await?;
        let result = self.run_transition(conn.as_mut(), unit, op).await;
        conn.close().await;

        match &result {
            Ok(outcome) => info!("{} {}: {:?}", op, unit, outcome),
            Err(e) => warn!("{} {} failed: {}", op, unit, e),
        }
        result
    }

    async fn run_transition(
        &self,
        conn: &mut dyn BusConnection,
        unit: &str,
        op: Operation,
    ) -> Result<TransitionOutcome> {
        let state = unit_state(conn, unit).await?;
        debug!("Unit {} has active state {}", unit, state);
        if op.is_satisfied_by(&state) {
            info!("Unit {} is already {}", unit, state);
            return Ok(TransitionOutcome::AlreadyInState);
        }

        conn.add_match_rule(&job_removed_filter().match_rule()).await?;
        subscribe_manager(conn).await?;

        let reply = conn
            .call(
                &manager(),
                MANAGER_INTERFACE,
                op.method(),
                &[BusValue::str(unit), BusValue::str(self.config.job_mode.as_str())],
            )
            .await?;
        let job = reply
            .first()
            .and_then(BusValue::as_object_path)
            .map(JobToken::new)
            .ok_or_else(|| {
                ControlError::Decode(format!(
                    "{} returned {:?}, expected a job path",
                    op.method(),
                    reply
                ))
            })?;
        debug!("{} {} queued as {}", op, unit, job);

        let waited = wait_for_job(conn, &job, self.config.job_timeout, &self.shutdown).await?;
        let removed = match waited {
            Ok(removed) => removed,
            Err(WaitAbort::TimedOut) => {
                return Err(ControlError::Timeout {
                    unit: unit.to_string(),
                    job,
                    timeout: self.config.job_timeout,
                })
            }
            Err(WaitAbort::Interrupted) => {
                return Err(ControlError::Interrupted {
                    unit: unit.to_string(),
                    job,
                })
            }
        };
        info!("Job {} for {} finished with result {}", job, unit, removed.result);

        if removed.result.is_done() {
            return Ok(TransitionOutcome::Completed);
        }

        let state = unit_state(conn, unit).await?;
        if op.is_satisfied_by(&state) {
            Ok(TransitionOutcome::Reconciled(removed.result))
        } else {
            Err(ControlError::NotConverged {
                unit: unit.to_string(),
                result: removed.result,
                state,
            })
        }
    }
}

impl fmt::Debug for ServiceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceController")
            .field("transport", &self.transport.describe())
            .field("config", &self.config)
            .finish()
    }
}

fn manager() -> ObjectRef {
    ObjectRef::new(SYSTEMD_SERVICE, SYSTEMD_PATH)
}

/// Ask the manager to emit job and unit signals to this connection's peer.
async fn subscribe_manager(conn: &dyn BusConnection) -> Result<()> {
    match conn.call(&manager(), MANAGER_INTERFACE, "Subscribe", &[]).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_method_error(ALREADY_SUBSCRIBED) => {
            debug!("Connection already subscribed to manager signals");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// `GetUnit` then read `ActiveState` from the unit object.
async fn unit_state(conn: &dyn BusConnection, unit: &str) -> Result<ActiveState> {
    let reply = match conn
        .call(&manager(), MANAGER_INTERFACE, "GetUnit", &[BusValue::str(unit)])
        .await
    {
        Ok(reply) => reply,
        Err(e) if e.is_method_error(NO_SUCH_UNIT) => {
            debug!("Unit {} is not loaded", unit);
            return Ok(ActiveState::Inactive);
        }
        Err(e) => return Err(e.into()),
    };

    let unit_path = reply
        .first()
        .and_then(BusValue::as_object_path)
        .ok_or_else(|| ControlError::Decode(format!("GetUnit returned {:?}", reply)))?;

    let value = conn
        .get_property(
            &ObjectRef::new(SYSTEMD_SERVICE, unit_path),
            UNIT_INTERFACE,
            "ActiveState",
        )
        .await?;
    value
        .as_str()
        .map(ActiveState::from)
        .ok_or_else(|| ControlError::Decode(format!("ActiveState was {}", value)))
}

/// Start `name` on the system bus with default settings.
pub fn start_service(name: &str) -> Result<TransitionOutcome> {
    ServiceController::system().start_service(name)
}

/// Stop `name` on the system bus with default settings.
pub fn stop_service(name: &str) -> Result<TransitionOutcome> {
    ServiceController::system().stop_service(name)
}
