//! # sysbus-network
//!
//! NetworkManager state on the system bus: typed state codes, one-shot
//! queries and state-change subscriptions.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sysbus_network::{NetworkManager, NmState};
//!
//! let nm = NetworkManager::system();
//! if nm.state()? != NmState::ConnectedGlobal {
//!     let mut sub = nm.subscribe_manager_state_changes()?;
//!     while let Some(change) = sub.recv() {
//!         if change.state == NmState::ConnectedGlobal {
//!             break;
//!         }
//!     }
//! }
//! ```
//!
//! Queries that need to share one connection are available as async
//! functions in [`query`].

pub mod error;
pub mod manager;
pub mod query;
pub mod record;
pub mod state;

// Re-export main types for convenience
pub use error::{NetworkError, Result};
pub use manager::{
    device_state_filter, manager_state_filter, subscribe_device_state_changes,
    subscribe_manager_state_changes, NetworkManager,
};
pub use record::{DeviceStateChange, ManagerStateChange};
pub use state::{Connectivity, DeviceState, NmState};

// Re-export commonly used types from dependencies
pub use sysbus_stream::{StreamConfig, Subscription};

pub const NM_SERVICE: &str = "org.freedesktop.NetworkManager";
pub const NM_PATH: &str = "/org/freedesktop/NetworkManager";
pub const NM_INTERFACE: &str = "org.freedesktop.NetworkManager";
pub const DEVICE_INTERFACE: &str = "org.freedesktop.NetworkManager.Device";
pub const ACTIVE_CONNECTION_INTERFACE: &str = "org.freedesktop.NetworkManager.Connection.Active";
pub const WIRELESS_INTERFACE: &str = "org.freedesktop.NetworkManager.Device.Wireless";
pub const ACCESS_POINT_INTERFACE: &str = "org.freedesktop.NetworkManager.AccessPoint";

/// Member name of both the manager and the device state signals.
pub const STATE_CHANGED: &str = "StateChanged";
