//! Unit names and unit activation state.

use std::fmt;

use crate::error::{ControlError, Result};

/// Unit type suffixes systemd recognises. Anything else gets `.service`.
const UNIT_SUFFIXES: &[&str] = &[
    "service",
    "socket",
    "device",
    "mount",
    "automount",
    "swap",
    "target",
    "path",
    "timer",
    "slice",
    "scope",
];

const MAX_UNIT_NAME_LEN: usize = 255;

/// Turn a user supplied unit name into the name systemd expects.
///
/// `nginx` becomes `nginx.service`; names that already carry a unit type
/// suffix are kept. Names that can never be valid are rejected before any
/// bus traffic.
pub fn canonical_unit_name(name: &str) -> Result<String> {
    let invalid = |reason: &str| ControlError::InvalidUnitName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('/') {
        return Err(invalid("unit names cannot contain '/'"));
    }
    if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(invalid("unit names cannot contain whitespace or control characters"));
    }

    let has_suffix = name
        .rsplit_once('.')
        .map(|(stem, suffix)| !stem.is_empty() && UNIT_SUFFIXES.contains(&suffix))
        .unwrap_or(false);

    let canonical = if has_suffix {
        name.to_string()
    } else {
        format!("{}.service", name)
    };

    if canonical.len() > MAX_UNIT_NAME_LEN {
        return Err(invalid("name is longer than 255 bytes"));
    }
    Ok(canonical)
}

/// Value of a unit's `ActiveState` property.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ActiveState {
    Active,
    Reloading,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Maintenance,
    Refreshing,
    /// A state this version does not know about
    Unknown(String),
}

impl ActiveState {
    pub fn as_str(&self) -> &str {
        match self {
            ActiveState::Active => "active",
            ActiveState::Reloading => "reloading",
            ActiveState::Inactive => "inactive",
            ActiveState::Failed => "failed",
            ActiveState::Activating => "activating",
            ActiveState::Deactivating => "deactivating",
            ActiveState::Maintenance => "maintenance",
            ActiveState::Refreshing => "refreshing",
            ActiveState::Unknown(s) => s,
        }
    }

    /// Whether the unit counts as running.
    ///
    /// Only `inactive` and `failed` count as stopped; transitional states
    /// such as `activating` or `deactivating` count as running.
    pub fn is_running(&self) -> bool {
        !matches!(self, ActiveState::Inactive | ActiveState::Failed)
    }
}

impl From<&str> for ActiveState {
    fn from(value: &str) -> Self {
        match value {
            "active" => ActiveState::Active,
            "reloading" => ActiveState::Reloading,
            "inactive" => ActiveState::Inactive,
            "failed" => ActiveState::Failed,
            "activating" => ActiveState::Activating,
            "deactivating" => ActiveState::Deactivating,
            "maintenance" => ActiveState::Maintenance,
            "refreshing" => ActiveState::Refreshing,
            other => ActiveState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ActiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
