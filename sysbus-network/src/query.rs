//! Single round-trip NetworkManager queries over an open connection.

use std::time::Duration;

use bus_client::{BusConnection, BusValue, ObjectRef};
use tracing::{debug, warn};

use crate::error::{NetworkError, Result};
use crate::state::{Connectivity, DeviceState, NmState};
use crate::{
    ACCESS_POINT_INTERFACE, ACTIVE_CONNECTION_INTERFACE, DEVICE_INTERFACE, NM_INTERFACE, NM_PATH,
    NM_SERVICE, WIRELESS_INTERFACE,
};

fn manager() -> ObjectRef {
    ObjectRef::new(NM_SERVICE, NM_PATH)
}

fn device(path: &str) -> ObjectRef {
    ObjectRef::new(NM_SERVICE, path)
}

fn first_u32(request: &str, reply: &[BusValue]) -> Result<u32> {
    reply
        .first()
        .and_then(BusValue::as_u32)
        .ok_or_else(|| NetworkError::decode(request, format!("expected a u32, got {:?}", reply)))
}

fn first_object_path(request: &str, reply: &[BusValue]) -> Result<String> {
    reply
        .first()
        .and_then(BusValue::as_object_path)
        .map(str::to_string)
        .ok_or_else(|| {
            NetworkError::decode(request, format!("expected an object path, got {:?}", reply))
        })
}

/// Overall networking state (`state()` method).
pub async fn nm_state(conn: &dyn BusConnection) -> Result<NmState> {
    let reply = conn.call(&manager(), NM_INTERFACE, "state", &[]).await?;
    first_u32("state", &reply).map(NmState::from_code)
}

/// Ask NetworkManager to re-check connectivity and return the result.
pub async fn check_connectivity(conn: &dyn BusConnection) -> Result<Connectivity> {
    let reply = conn
        .call(&manager(), NM_INTERFACE, "CheckConnectivity", &[])
        .await?;
    first_u32("CheckConnectivity", &reply).map(Connectivity::from_code)
}

/// Object path of the device carrying the primary connection.
///
/// When the primary connection spans several devices the first is used.
pub async fn primary_device_path(conn: &dyn BusConnection) -> Result<String> {
    let value = conn
        .get_property(&manager(), NM_INTERFACE, "PrimaryConnection")
        .await?;
    let active = value
        .as_object_path()
        .ok_or_else(|| NetworkError::decode("PrimaryConnection", format!("got {}", value)))?;
    if active == "/" {
        return Err(NetworkError::NoPrimaryDevice);
    }
    debug!("Primary connection is {}", active);

    let value = conn
        .get_property(&device(active), ACTIVE_CONNECTION_INTERFACE, "Devices")
        .await?;
    let devices = value
        .as_object_paths()
        .ok_or_else(|| NetworkError::decode("Devices", format!("got {}", value)))?;

    match devices.as_slice() {
        [] => Err(NetworkError::NoPrimaryDevice),
        [only] => Ok(only.to_string()),
        [first, ..] => {
            warn!(
                "Primary connection {} has {} devices, using {}",
                active,
                devices.len(),
                first
            );
            Ok(first.to_string())
        }
    }
}

/// Device object path for a network interface name such as `wlan0`.
pub async fn device_path_by_interface(conn: &dyn BusConnection, interface: &str) -> Result<String> {
    let reply = conn
        .call(
            &manager(),
            NM_INTERFACE,
            "GetDeviceByIpIface",
            &[BusValue::str(interface)],
        )
        .await?;
    first_object_path("GetDeviceByIpIface", &reply)
}

pub async fn device_state(conn: &dyn BusConnection, device_path: &str) -> Result<DeviceState> {
    let value = conn
        .get_property(&device(device_path), DEVICE_INTERFACE, "State")
        .await?;
    value
        .as_u32()
        .map(DeviceState::from_code)
        .ok_or_else(|| NetworkError::decode("State", format!("got {}", value)))
}

/// Kernel interface name of a device.
pub async fn device_interface_name(conn: &dyn BusConnection, device_path: &str) -> Result<String> {
    let value = conn
        .get_property(&device(device_path), DEVICE_INTERFACE, "Interface")
        .await?;
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| NetworkError::decode("Interface", format!("got {}", value)))
}

/// Scan on a Wi-Fi device and list `(ssid, access point path)` pairs.
///
/// `RequestScan` returns before the scan finishes, so the access point list
/// is read after `settle`. Access points whose SSID cannot be read are
/// skipped with a warning. SSIDs are raw bytes and need not be UTF-8.
pub async fn available_ssids(
    conn: &dyn BusConnection,
    device_path: &str,
    settle: Duration,
) -> Result<Vec<(Vec<u8>, String)>> {
    let wireless = device(device_path);
    conn.call(
        &wireless,
        WIRELESS_INTERFACE,
        "RequestScan",
        &[BusValue::Dict(Vec::new())],
    )
    .await?;

    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }

    let reply = conn
        .call(&wireless, WIRELESS_INTERFACE, "GetAccessPoints", &[])
        .await?;
    let access_points = reply
        .first()
        .and_then(BusValue::as_object_paths)
        .ok_or_else(|| NetworkError::decode("GetAccessPoints", format!("got {:?}", reply)))?;
    debug!("{} reports {} access points", device_path, access_points.len());

    let mut ssids = Vec::with_capacity(access_points.len());
    for ap in access_points {
        match conn
            .get_property(&device(ap), ACCESS_POINT_INTERFACE, "Ssid")
            .await
        {
            Ok(value) => match value.as_bytes() {
                Some(ssid) => ssids.push((ssid, ap.to_string())),
                None => warn!("Access point {} has a malformed SSID: {}", ap, value),
            },
            Err(e) => warn!("Could not read the SSID of {}: {}", ap, e),
        }
    }
    Ok(ssids)
}
