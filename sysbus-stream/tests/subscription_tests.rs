//! Integration tests for Subscription against the in-memory bus.
//!
//! Every test checks that the dedicated connection is released once the
//! subscription is torn down, since leaked connections are the failure mode
//! that matters most for long running daemons.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bus_client::testing::FakeTransport;
use bus_client::{BusError, BusValue, RawNotification};
use proptest::prelude::*;
use sysbus_stream::{
    OverflowPolicy, PumpState, SignalFilter, StreamConfig, StreamError, Subscription,
};

const DEVICE: &str = "/org/freedesktop/NetworkManager/Devices/3";
const DEVICE_IFACE: &str = "org.freedesktop.NetworkManager.Device";
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn device_filter() -> SignalFilter {
    SignalFilter::new("StateChanged")
        .with_interface(DEVICE_IFACE)
        .with_path(DEVICE)
}

fn state_changed(new: u32, old: u32, reason: u32) -> RawNotification {
    RawNotification::new(
        DEVICE,
        DEVICE_IFACE,
        "StateChanged",
        vec![BusValue::U32(new), BusValue::U32(old), BusValue::U32(reason)],
    )
}

fn counter(value: u32) -> RawNotification {
    RawNotification::new(DEVICE, DEVICE_IFACE, "StateChanged", vec![BusValue::U32(value)])
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn subscribe<R: sysbus_stream::SignalRecord>(
    fake: &FakeTransport,
    config: StreamConfig,
) -> Subscription<R> {
    Subscription::subscribe_with_config(Arc::new(fake.clone()), device_filter(), config)
        .expect("subscription should start")
}

#[test]
fn test_records_delivered_in_order() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<[u32; 3]> = subscribe(&fake, StreamConfig::default());

    assert_eq!(fake.open_connections(), 1);
    assert_eq!(
        fake.match_rules(),
        vec![format!(
            "type='signal',interface='{}',member='StateChanged',path='{}'",
            DEVICE_IFACE, DEVICE
        )]
    );

    fake.emit(state_changed(100, 70, 0));
    fake.emit(state_changed(30, 100, 36));

    assert_eq!(sub.recv_timeout(RECV_TIMEOUT), Some([100, 70, 0]));
    assert_eq!(sub.recv_timeout(RECV_TIMEOUT), Some([30, 100, 36]));

    sub.cancel();
    sub.join();
    assert_eq!(sub.state(), PumpState::Stopped);
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_unrelated_and_malformed_notifications_discarded() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<[u32; 3]> = subscribe(&fake, StreamConfig::default());

    // Other device, other interface, other member.
    fake.emit(RawNotification::new(
        "/org/freedesktop/NetworkManager/Devices/4",
        DEVICE_IFACE,
        "StateChanged",
        vec![BusValue::U32(1), BusValue::U32(2), BusValue::U32(3)],
    ));
    fake.emit(RawNotification::new(
        DEVICE,
        "org.freedesktop.NetworkManager",
        "StateChanged",
        vec![BusValue::U32(1), BusValue::U32(2), BusValue::U32(3)],
    ));
    fake.emit(RawNotification::new(
        DEVICE,
        DEVICE_IFACE,
        "StateReasonChanged",
        vec![BusValue::U32(1), BusValue::U32(2), BusValue::U32(3)],
    ));
    // Right signal, wrong shape.
    fake.emit(RawNotification::new(
        DEVICE,
        DEVICE_IFACE,
        "StateChanged",
        vec![BusValue::U32(1), BusValue::U32(2)],
    ));
    fake.emit(RawNotification::new(
        DEVICE,
        DEVICE_IFACE,
        "StateChanged",
        vec![BusValue::U32(1), BusValue::str("2"), BusValue::U32(3)],
    ));
    fake.emit(state_changed(100, 70, 0));

    assert_eq!(sub.recv_timeout(RECV_TIMEOUT), Some([100, 70, 0]));
    assert_eq!(sub.try_recv(), None);
    assert_eq!(sub.stats().discarded, 5);
    assert_eq!(sub.stats().delivered, 1);

    sub.cancel();
    sub.join();
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_cancel_without_traffic_joins_promptly() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(&fake, StreamConfig::default());
    assert_eq!(sub.state(), PumpState::Running);

    let started = Instant::now();
    sub.cancel();
    sub.join();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(sub.state(), PumpState::Stopped);
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_cancel_and_join_are_idempotent() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(&fake, StreamConfig::default());

    sub.cancel();
    sub.cancel();
    sub.join();
    sub.join();
    sub.cancel();

    assert_eq!(sub.state(), PumpState::Stopped);
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_recv_ends_after_join() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(&fake, StreamConfig::default());

    fake.emit(counter(7));
    assert!(wait_until(RECV_TIMEOUT, || sub.stats().delivered == 1));

    sub.cancel();
    sub.join();

    // Queued records stay readable, then the channel reports closed.
    assert_eq!(sub.recv(), Some(7));
    assert_eq!(sub.recv(), None);
}

#[test]
fn test_drop_releases_connection() {
    let fake = FakeTransport::new();
    {
        let _sub: Subscription<u32> = subscribe(&fake, StreamConfig::default());
        assert_eq!(fake.open_connections(), 1);
    }
    assert_eq!(fake.open_connections(), 0);
    assert_eq!(fake.total_connections(), 1);
}

#[test]
fn test_ended_stream_idles_until_cancelled() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(&fake, StreamConfig::default());

    fake.emit(counter(1));
    fake.end_streams();

    assert_eq!(sub.recv_timeout(RECV_TIMEOUT), Some(1));
    // The pump keeps its connection and stays running after the stream ends.
    assert_eq!(sub.recv_timeout(Duration::from_millis(100)), None);
    assert_eq!(sub.state(), PumpState::Running);
    assert_eq!(fake.open_connections(), 1);

    sub.cancel();
    assert!(fake.wait_for_open_connections(0, RECV_TIMEOUT));
    sub.join();
    assert_eq!(sub.state(), PumpState::Stopped);
    assert_eq!(sub.stats().delivered, 1);
}

#[test]
fn test_external_token_cancels() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(&fake, StreamConfig::default());

    sub.cancellation_token().cancel();
    sub.join();
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_connect_failure_reported() {
    let fake = FakeTransport::new();
    fake.fail_connect(BusError::Connect {
        bus: "system".to_string(),
        reason: "no such socket".to_string(),
    });

    let result = Subscription::<u32>::subscribe(Arc::new(fake.clone()), device_filter());
    assert!(matches!(result, Err(StreamError::Connect(_))));
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_match_rule_rejection_releases_connection() {
    let fake = FakeTransport::new();
    fake.reject_match_rules(true);

    let result = Subscription::<u32>::subscribe(Arc::new(fake.clone()), device_filter());
    assert!(matches!(result, Err(StreamError::MatchRule { .. })));
    assert_eq!(fake.total_connections(), 1);
    assert_eq!(fake.open_connections(), 0);
}

#[test]
fn test_invalid_config_rejected_before_connecting() {
    let fake = FakeTransport::new();
    let result = Subscription::<u32>::subscribe_with_config(
        Arc::new(fake.clone()),
        device_filter(),
        StreamConfig::new().with_buffer_size(0),
    );
    assert!(matches!(result, Err(StreamError::Configuration(_))));
    assert_eq!(fake.total_connections(), 0);
}

#[test]
fn test_drop_oldest_keeps_latest_records() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(
        &fake,
        StreamConfig::new()
            .with_buffer_size(2)
            .with_overflow(OverflowPolicy::DropOldest),
    );

    for value in 1..=5 {
        fake.emit(counter(value));
    }
    assert!(wait_until(RECV_TIMEOUT, || sub.stats().delivered == 5));

    assert_eq!(sub.try_iter().collect::<Vec<_>>(), vec![4, 5]);
    assert_eq!(sub.stats().dropped, 3);

    sub.cancel();
    sub.join();
}

#[test]
fn test_drop_newest_keeps_earliest_records() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(
        &fake,
        StreamConfig::new()
            .with_buffer_size(2)
            .with_overflow(OverflowPolicy::DropNewest),
    );

    for value in 1..=5 {
        fake.emit(counter(value));
    }
    assert!(wait_until(RECV_TIMEOUT, || sub.stats().dropped == 3));

    assert_eq!(sub.try_iter().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(sub.stats().delivered, 2);

    sub.cancel();
    sub.join();
}

#[test]
fn test_blocked_pump_still_cancels() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(
        &fake,
        StreamConfig::lossless().with_buffer_size(1),
    );

    for value in 1..=3 {
        fake.emit(counter(value));
    }
    assert!(wait_until(RECV_TIMEOUT, || sub.stats().delivered == 1));

    let started = Instant::now();
    sub.cancel();
    sub.join();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(sub.stats().dropped, 0);
    assert_eq!(fake.open_connections(), 0);
    assert_eq!(sub.recv(), Some(1));
    assert_eq!(sub.recv(), None);
}

#[test]
fn test_lossless_delivers_everything_to_a_reader() {
    let fake = FakeTransport::new();
    let mut sub: Subscription<u32> = subscribe(
        &fake,
        StreamConfig::lossless().with_buffer_size(1),
    );

    for value in 1..=10 {
        fake.emit(counter(value));
    }
    let received: Vec<u32> = (0..10)
        .filter_map(|_| sub.recv_timeout(RECV_TIMEOUT))
        .collect();
    assert_eq!(received, (1..=10).collect::<Vec<_>>());

    sub.cancel();
    sub.join();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_non_matching_members_never_delivered(
        member in "[A-Z][a-zA-Z]{0,15}".prop_filter("must differ", |m| m != "StateChanged"),
        value in any::<u32>(),
    ) {
        let fake = FakeTransport::new();
        let mut sub: Subscription<u32> = subscribe(&fake, StreamConfig::default());

        fake.emit(RawNotification::new(
            DEVICE,
            DEVICE_IFACE,
            member,
            vec![BusValue::U32(value)],
        ));
        fake.emit(counter(u32::MAX));

        prop_assert_eq!(sub.recv_timeout(RECV_TIMEOUT), Some(u32::MAX));
        prop_assert_eq!(sub.try_recv(), None);

        sub.cancel();
        sub.join();
        prop_assert_eq!(fake.open_connections(), 0);
    }
}
