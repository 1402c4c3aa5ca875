//! Configuration types for service control

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ControlError;

/// How the manager treats conflicting queued jobs (the `mode` argument to
/// `StartUnit` / `StopUnit`).
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum JobMode {
    /// Replace conflicting queued jobs
    #[default]
    Replace,
    /// Fail if a conflicting job is queued
    Fail,
    /// Stop every unit not required by this one
    Isolate,
    IgnoreDependencies,
    IgnoreRequirements,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Replace => "replace",
            JobMode::Fail => "fail",
            JobMode::Isolate => "isolate",
            JobMode::IgnoreDependencies => "ignore-dependencies",
            JobMode::IgnoreRequirements => "ignore-requirements",
        }
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobMode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(JobMode::Replace),
            "fail" => Ok(JobMode::Fail),
            "isolate" => Ok(JobMode::Isolate),
            "ignore-dependencies" => Ok(JobMode::IgnoreDependencies),
            "ignore-requirements" => Ok(JobMode::IgnoreRequirements),
            other => Err(ControlError::InvalidJobMode(other.to_string())),
        }
    }
}

/// Configuration for a [`ServiceController`](crate::ServiceController)
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// How long to wait for the job completion signal
    /// Default: 5 seconds
    pub job_timeout: Duration,

    /// Mode passed with every start/stop request
    /// Default: Replace
    pub job_mode: JobMode,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            job_timeout: Duration::from_secs(5),
            job_mode: JobMode::Replace,
        }
    }
}

impl ControlConfig {
    /// Create a new ControlConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    pub fn with_job_mode(mut self, job_mode: JobMode) -> Self {
        self.job_mode = job_mode;
        self
    }
}
