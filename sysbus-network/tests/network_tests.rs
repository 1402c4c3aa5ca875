//! Integration tests for the NetworkManager facade against the in-memory bus.

use std::sync::Arc;
use std::time::Duration;

use bus_client::testing::{CallScript, FakeTransport};
use bus_client::{BusError, BusValue, RawNotification};
use proptest::prelude::*;
use sysbus_network::{
    Connectivity, DeviceState, NetworkError, NetworkManager, NmState, ACCESS_POINT_INTERFACE,
    ACTIVE_CONNECTION_INTERFACE, DEVICE_INTERFACE, NM_INTERFACE, NM_PATH, WIRELESS_INTERFACE,
};

const DEVICE: &str = "/org/freedesktop/NetworkManager/Devices/3";
const OTHER_DEVICE: &str = "/org/freedesktop/NetworkManager/Devices/4";
const ACTIVE: &str = "/org/freedesktop/NetworkManager/ActiveConnection/1";
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn nm(fake: &FakeTransport) -> NetworkManager {
    NetworkManager::new(Arc::new(fake.clone()))
}

fn with_primary_devices(devices: &[&str]) -> FakeTransport {
    let fake = FakeTransport::new();
    fake.set_property(
        NM_PATH,
        NM_INTERFACE,
        "PrimaryConnection",
        BusValue::object_path(ACTIVE),
    );
    fake.set_property(
        ACTIVE,
        ACTIVE_CONNECTION_INTERFACE,
        "Devices",
        BusValue::Array(devices.iter().map(|d| BusValue::object_path(*d)).collect()),
    );
    fake
}

#[test]
fn test_state_and_connectivity() {
    let fake = FakeTransport::new();
    fake.script(NM_INTERFACE, "state", CallScript::reply(vec![BusValue::U32(70)]));
    fake.script(
        NM_INTERFACE,
        "CheckConnectivity",
        CallScript::reply(vec![BusValue::U32(2)]),
    );

    assert_eq!(nm(&fake).state().unwrap(), NmState::ConnectedGlobal);
    assert_eq!(nm(&fake).connectivity().unwrap(), Connectivity::Portal);
    assert_eq!(fake.total_connections(), 2);
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_malformed_state_reply() {
    let fake = FakeTransport::new();
    fake.script(NM_INTERFACE, "state", CallScript::reply(vec![BusValue::str("70")]));

    let err = nm(&fake).state().unwrap_err();
    assert!(matches!(err, NetworkError::Decode { .. }));
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_unscripted_call_is_transport_error() {
    let fake = FakeTransport::new();
    let err = nm(&fake).connectivity().unwrap_err();
    assert!(matches!(err, NetworkError::Transport(_)));
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_primary_device() {
    let fake = with_primary_devices(&[DEVICE]);
    assert_eq!(nm(&fake).primary_device().unwrap(), DEVICE);
}

#[test]
fn test_primary_device_uses_first_of_many() {
    let fake = with_primary_devices(&[DEVICE, OTHER_DEVICE]);
    assert_eq!(nm(&fake).primary_device().unwrap(), DEVICE);
}

#[test]
fn test_no_primary_device() {
    let fake = with_primary_devices(&[]);
    assert!(matches!(
        nm(&fake).primary_device(),
        Err(NetworkError::NoPrimaryDevice)
    ));

    let fake = FakeTransport::new();
    fake.set_property(NM_PATH, NM_INTERFACE, "PrimaryConnection", BusValue::object_path("/"));
    assert!(matches!(
        nm(&fake).primary_device(),
        Err(NetworkError::NoPrimaryDevice)
    ));
}

#[test]
fn test_device_lookup_and_properties() {
    let fake = FakeTransport::new();
    fake.script(
        NM_INTERFACE,
        "GetDeviceByIpIface",
        CallScript::reply(vec![BusValue::object_path(DEVICE)]),
    );
    fake.set_property(DEVICE, DEVICE_INTERFACE, "State", BusValue::U32(100));
    fake.set_property(DEVICE, DEVICE_INTERFACE, "Interface", BusValue::str("wlan0"));
    let nm = nm(&fake);

    let path = nm.device_by_interface("wlan0").unwrap();
    assert_eq!(path, DEVICE);
    let call = fake
        .calls()
        .into_iter()
        .find(|c| c.method == "GetDeviceByIpIface")
        .unwrap();
    assert_eq!(call.args, vec![BusValue::str("wlan0")]);

    assert_eq!(nm.device_state(&path).unwrap(), DeviceState::Activated);
    assert_eq!(nm.device_interface(&path).unwrap(), "wlan0");
    assert!(matches!(
        nm.device_state(OTHER_DEVICE),
        Err(NetworkError::Transport(_))
    ));
    assert_eq!(fake.open_connections(), 0);
}

fn ssid(bytes: &[u8]) -> BusValue {
    BusValue::Array(bytes.iter().copied().map(BusValue::Byte).collect())
}

fn access_point(n: u32) -> String {
    format!("/org/freedesktop/NetworkManager/AccessPoint/{}", n)
}

#[test]
fn test_available_ssids() {
    let fake = FakeTransport::new();
    fake.script(WIRELESS_INTERFACE, "RequestScan", CallScript::reply(vec![]));
    fake.script(
        WIRELESS_INTERFACE,
        "GetAccessPoints",
        CallScript::reply(vec![BusValue::Array(
            (1..=4).map(|n| BusValue::object_path(access_point(n))).collect(),
        )]),
    );
    fake.set_property(&access_point(1), ACCESS_POINT_INTERFACE, "Ssid", ssid(b"home"));
    // 2 has no readable SSID, 3 has the wrong type; both are skipped.
    fake.set_property(&access_point(3), ACCESS_POINT_INTERFACE, "Ssid", BusValue::str("cafe"));
    fake.set_property(&access_point(4), ACCESS_POINT_INTERFACE, "Ssid", ssid(&[0xff, 0x00, b'x']));

    let ssids = nm(&fake)
        .with_scan_settle(Duration::ZERO)
        .available_ssids(DEVICE)
        .unwrap();
    assert_eq!(
        ssids,
        vec![
            (b"home".to_vec(), access_point(1)),
            (vec![0xff, 0x00, b'x'], access_point(4)),
        ]
    );

    let scan = fake
        .calls()
        .into_iter()
        .find(|c| c.method == "RequestScan")
        .unwrap();
    assert_eq!(scan.target.path, DEVICE);
    assert_eq!(scan.args, vec![BusValue::Dict(vec![])]);
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_available_ssids_scan_rejected() {
    let fake = FakeTransport::new();
    fake.script(
        WIRELESS_INTERFACE,
        "RequestScan",
        CallScript::fail(BusError::method_error(
            "org.freedesktop.NetworkManager.Device.NotAllowed",
            "Scanning not allowed immediately following previous scan",
        )),
    );

    let err = nm(&fake)
        .with_scan_settle(Duration::ZERO)
        .available_ssids(DEVICE)
        .unwrap_err();
    assert!(matches!(err, NetworkError::Transport(_)));
    assert_eq!(fake.call_count("GetAccessPoints"), 0);
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_available_ssids_malformed_listing() {
    let fake = FakeTransport::new();
    fake.script(WIRELESS_INTERFACE, "RequestScan", CallScript::reply(vec![]));
    fake.script(
        WIRELESS_INTERFACE,
        "GetAccessPoints",
        CallScript::reply(vec![BusValue::str("none")]),
    );

    let err = nm(&fake)
        .with_scan_settle(Duration::ZERO)
        .available_ssids(DEVICE)
        .unwrap_err();
    assert!(matches!(err, NetworkError::Decode { .. }));
}

#[test]
fn test_device_state_subscription() {
    let fake = FakeTransport::new();
    let mut sub = nm(&fake).subscribe_device_state_changes(DEVICE).unwrap();

    let change = |path: &str, new: u32, old: u32| {
        RawNotification::new(
            path,
            DEVICE_INTERFACE,
            "StateChanged",
            vec![BusValue::U32(new), BusValue::U32(old), BusValue::U32(0)],
        )
    };
    fake.emit(change(OTHER_DEVICE, 30, 100));
    fake.emit(change(DEVICE, 70, 50));
    fake.emit(change(DEVICE, 100, 70));

    let first = sub.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(first.new_state, DeviceState::IpConfig);
    assert_eq!(first.old_state, DeviceState::Config);
    let second = sub.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(second.codes(), [100, 70, 0]);
    assert_eq!(sub.try_recv(), None);

    sub.cancel();
    sub.join();
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_manager_state_subscription() {
    let fake = FakeTransport::new();
    let mut sub = nm(&fake).subscribe_manager_state_changes().unwrap();

    // Same member name on a device must not leak through.
    fake.emit(RawNotification::new(
        DEVICE,
        DEVICE_INTERFACE,
        "StateChanged",
        vec![BusValue::U32(20), BusValue::U32(100), BusValue::U32(0)],
    ));
    fake.emit(RawNotification::new(
        NM_PATH,
        NM_INTERFACE,
        "StateChanged",
        vec![BusValue::U32(40)],
    ));

    let change = sub.recv_timeout(RECV_TIMEOUT).unwrap();
    assert_eq!(change.state, NmState::Connecting);
    assert_eq!(sub.try_recv(), None);

    drop(sub);
    assert_eq!(fake.open_connections(), 0);
}

proptest! {
    #[test]
    fn prop_codes_survive_conversion(code in any::<u32>()) {
        prop_assert_eq!(NmState::from_code(code).code(), code);
        prop_assert_eq!(Connectivity::from_code(code).code(), code);
        prop_assert_eq!(DeviceState::from_code(code).code(), code);
    }
}
