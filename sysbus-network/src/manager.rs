//! Synchronous NetworkManager facade.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bus_client::{blocking_runtime, BusTransport, ZbusTransport};
use sysbus_stream::{SignalFilter, StreamConfig, Subscription};
use tracing::debug;

use crate::error::Result;
use crate::query;
use crate::record::{DeviceStateChange, ManagerStateChange};
use crate::state::{Connectivity, DeviceState, NmState};
use crate::{DEVICE_INTERFACE, NM_INTERFACE, NM_PATH, STATE_CHANGED};

/// Open a connection, run `$body` with `$conn: &dyn BusConnection`, and
/// close the connection whatever the outcome.
macro_rules! with_connection {
    ($self:ident, |$conn:ident| $body:expr) => {
        $self.block_on(async {
            let owned = $self.transport.connect().await?;
            let result = {
                let $conn = owned.as_ref();
                $body.await
            };
            owned.close().await;
            result
        })
    };
}

/// Filter for `StateChanged` on one device.
pub fn device_state_filter(device_path: &str) -> SignalFilter {
    SignalFilter::new(STATE_CHANGED)
        .with_interface(DEVICE_INTERFACE)
        .with_path(device_path)
}

/// Filter for the manager-wide `StateChanged`.
pub fn manager_state_filter() -> SignalFilter {
    SignalFilter::new(STATE_CHANGED)
        .with_interface(NM_INTERFACE)
        .with_path(NM_PATH)
}

/// NetworkManager client.
///
/// Queries open a connection per call. Subscriptions each own a dedicated
/// connection until they are cancelled and joined (or dropped).
///
/// # Example
///
/// ```rust,ignore
/// use sysbus_network::NetworkManager;
///
/// let nm = NetworkManager::system();
/// println!("{} / {}", nm.state()?, nm.connectivity()?);
///
/// let device = nm.primary_device()?;
/// let mut sub = nm.subscribe_device_state_changes(&device)?;
/// while let Some(change) = sub.recv() {
///     println!("{} -> {}", change.old_state, change.new_state);
/// }
/// ```
#[derive(Clone)]
pub struct NetworkManager {
    transport: Arc<dyn BusTransport>,
    stream_config: StreamConfig,
    scan_settle: Duration,
}

impl NetworkManager {
    pub fn new(transport: Arc<dyn BusTransport>) -> Self {
        Self {
            transport,
            stream_config: StreamConfig::default(),
            scan_settle: Duration::from_secs(1),
        }
    }

    /// Client on the system bus.
    pub fn system() -> Self {
        Self::new(Arc::new(ZbusTransport::system()))
    }

    /// Use `config` for subscriptions created by this client.
    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    /// How long [`available_ssids`](Self::available_ssids) waits between
    /// requesting a scan and reading the results.
    /// Default: 1 second
    pub fn with_scan_settle(mut self, settle: Duration) -> Self {
        self.scan_settle = settle;
        self
    }

    fn block_on<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        let rt = blocking_runtime()?;
        rt.block_on(fut)
    }

    pub fn state(&self) -> Result<NmState> {
        with_connection!(self, |conn| query::nm_state(conn))
    }

    pub fn connectivity(&self) -> Result<Connectivity> {
        with_connection!(self, |conn| query::check_connectivity(conn))
    }

    /// Object path of the device behind the primary connection.
    pub fn primary_device(&self) -> Result<String> {
        with_connection!(self, |conn| query::primary_device_path(conn))
    }

    /// Object path of the device for an interface name such as `eth0`.
    pub fn device_by_interface(&self, interface: &str) -> Result<String> {
        with_connection!(self, |conn| query::device_path_by_interface(conn, interface))
    }

    pub fn device_state(&self, device_path: &str) -> Result<DeviceState> {
        with_connection!(self, |conn| query::device_state(conn, device_path))
    }

    pub fn device_interface(&self, device_path: &str) -> Result<String> {
        with_connection!(self, |conn| query::device_interface_name(conn, device_path))
    }

    /// Scan on a Wi-Fi device and return `(ssid, access point path)` pairs.
    pub fn available_ssids(&self, device_path: &str) -> Result<Vec<(Vec<u8>, String)>> {
        let settle = self.scan_settle;
        with_connection!(self, |conn| query::available_ssids(conn, device_path, settle))
    }

    /// Stream `(new, old, reason)` changes for one device.
    pub fn subscribe_device_state_changes(
        &self,
        device_path: &str,
    ) -> Result<Subscription<DeviceStateChange>> {
        debug!("Subscribing to state changes of {}", device_path);
        let sub = Subscription::subscribe_with_config(
            Arc::clone(&self.transport),
            device_state_filter(device_path),
            self.stream_config.clone(),
        )?;
        Ok(sub)
    }

    /// Stream overall networking state changes.
    pub fn subscribe_manager_state_changes(&self) -> Result<Subscription<ManagerStateChange>> {
        let sub = Subscription::subscribe_with_config(
            Arc::clone(&self.transport),
            manager_state_filter(),
            self.stream_config.clone(),
        )?;
        Ok(sub)
    }
}

impl fmt::Debug for NetworkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkManager")
            .field("transport", &self.transport.describe())
            .field("stream_config", &self.stream_config)
            .field("scan_settle", &self.scan_settle)
            .finish()
    }
}

/// Device state changes on the system bus.
pub fn subscribe_device_state_changes(
    device_path: &str,
) -> Result<Subscription<DeviceStateChange>> {
    NetworkManager::system().subscribe_device_state_changes(device_path)
}

/// Manager state changes on the system bus.
pub fn subscribe_manager_state_changes() -> Result<Subscription<ManagerStateChange>> {
    NetworkManager::system().subscribe_manager_state_changes()
}
