//! Jobs and the wait for their completion signal.
//!
//! Every mutating manager call returns a job object path. When the job
//! finishes, the manager broadcasts `JobRemoved(id, job, unit, result)` to
//! every listener; a waiter picks out the one carrying its own job path.

use std::fmt;
use std::time::Duration;

use bus_client::{BusConnection, BusValue};
use sysbus_stream::{SignalFilter, SignalRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{ControlError, Result};
use crate::MANAGER_INTERFACE;

/// Member name of the job completion signal.
pub const JOB_REMOVED: &str = "JobRemoved";

/// Correlation handle for a pending job: the job's object path.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct JobToken(String);

impl JobToken {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome code carried by `JobRemoved`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum JobResult {
    Done,
    Canceled,
    Timeout,
    Failed,
    Dependency,
    Skipped,
    Other(String),
}

impl JobResult {
    pub fn as_str(&self) -> &str {
        match self {
            JobResult::Done => "done",
            JobResult::Canceled => "canceled",
            JobResult::Timeout => "timeout",
            JobResult::Failed => "failed",
            JobResult::Dependency => "dependency",
            JobResult::Skipped => "skipped",
            JobResult::Other(s) => s,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobResult::Done)
    }
}

impl From<&str> for JobResult {
    fn from(value: &str) -> Self {
        match value {
            "done" => JobResult::Done,
            "canceled" => JobResult::Canceled,
            "timeout" => JobResult::Timeout,
            "failed" => JobResult::Failed,
            "dependency" => JobResult::Dependency,
            "skipped" => JobResult::Skipped,
            other => JobResult::Other(other.to_string()),
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded `JobRemoved` signal.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct JobRemoved {
    pub id: u32,
    pub job: JobToken,
    pub unit: String,
    pub result: JobResult,
}

impl SignalRecord for JobRemoved {
    fn decode(args: &[BusValue]) -> Option<Self> {
        let [id, job, unit, result, ..] = args else {
            return None;
        };
        Some(Self {
            id: id.as_u32()?,
            job: JobToken::new(job.as_object_path()?),
            unit: unit.as_str()?.to_string(),
            result: JobResult::from(result.as_str()?),
        })
    }
}

/// Filter selecting `JobRemoved` from the systemd manager, from any path.
pub fn job_removed_filter() -> SignalFilter {
    SignalFilter::new(JOB_REMOVED).with_interface(MANAGER_INTERFACE)
}

/// How a job wait ended without a completion signal.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum WaitAbort {
    TimedOut,
    Interrupted,
}

/// Wait on `conn` for the `JobRemoved` carrying `token`.
///
/// The caller must already have registered the `JobRemoved` match rule on
/// `conn`. Signals for other jobs are skipped; a malformed signal for
/// another job is logged and skipped, while a malformed signal for this job
/// is a decode error.
pub(crate) async fn wait_for_job(
    conn: &mut dyn BusConnection,
    token: &JobToken,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> Result<std::result::Result<JobRemoved, WaitAbort>> {
    let filter = job_removed_filter();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(Err(WaitAbort::Interrupted)),
            _ = &mut deadline => return Ok(Err(WaitAbort::TimedOut)),
            n = conn.next_notification() => n,
        };

        let Some(notification) = next else {
            return Err(ControlError::Transport(bus_client::BusError::Closed));
        };

        if !filter.matches(&notification) {
            trace!("Ignoring {} while waiting for {}", notification.name(), token);
            continue;
        }

        if notification.args.len() < 4 {
            warn!(
                "Expected at least 4 arguments in {}, got {:?}",
                notification.name(),
                notification.args
            );
            continue;
        }

        let job_path = notification.args[1].as_object_path();
        if job_path != Some(token.as_str()) {
            debug!("Skipping completion of unrelated job {:?}", job_path);
            continue;
        }

        return match JobRemoved::decode(&notification.args) {
            Some(removed) => Ok(Ok(removed)),
            None => Err(ControlError::Decode(format!(
                "malformed {} for {}: {:?}",
                JOB_REMOVED, token, notification.args
            ))),
        };
    }
}
