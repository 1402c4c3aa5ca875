//! Decoded NetworkManager state-change signals.

use bus_client::BusValue;
use sysbus_stream::SignalRecord;

use crate::state::{DeviceState, NmState};

/// `org.freedesktop.NetworkManager.Device.StateChanged(u new, u old, u reason)`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DeviceStateChange {
    pub new_state: DeviceState,
    pub old_state: DeviceState,
    /// `NMDeviceStateReason` code, kept raw
    pub reason: u32,
}

impl DeviceStateChange {
    /// Raw `(new, old, reason)` codes.
    pub fn codes(&self) -> [u32; 3] {
        [self.new_state.code(), self.old_state.code(), self.reason]
    }
}

impl From<[u32; 3]> for DeviceStateChange {
    fn from([new, old, reason]: [u32; 3]) -> Self {
        Self {
            new_state: DeviceState::from_code(new),
            old_state: DeviceState::from_code(old),
            reason,
        }
    }
}

impl SignalRecord for DeviceStateChange {
    fn decode(args: &[BusValue]) -> Option<Self> {
        <[u32; 3]>::decode(args).map(Self::from)
    }
}

/// `org.freedesktop.NetworkManager.StateChanged(u state)`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ManagerStateChange {
    pub state: NmState,
}

impl SignalRecord for ManagerStateChange {
    fn decode(args: &[BusValue]) -> Option<Self> {
        u32::decode(args).map(|code| Self {
            state: NmState::from_code(code),
        })
    }
}
