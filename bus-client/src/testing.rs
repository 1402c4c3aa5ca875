//! In-memory transport for tests.
//!
//! `FakeTransport` behaves like a tiny bus: method calls are answered from
//! scripts, properties come from a table, and emitted notifications are
//! broadcast to every live connection regardless of match rules (real
//! daemons may deliver unrelated traffic too). Counters make connection
//! leaks and mutating calls observable.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{BusError, Result};
use crate::message::{MatchRule, ObjectRef, RawNotification};
use crate::transport::{BusConnection, BusTransport, PROPERTIES_INTERFACE};
use crate::value::BusValue;

/// A method call observed by the fake bus.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub target: ObjectRef,
    pub interface: String,
    pub method: String,
    pub args: Vec<BusValue>,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct PropertyKey {
    path: String,
    interface: String,
    property: String,
}

impl PropertyKey {
    fn new(path: &str, interface: &str, property: &str) -> Self {
        Self {
            path: path.to_string(),
            interface: interface.to_string(),
            property: property.to_string(),
        }
    }
}

/// Scripted answer to one method call.
///
/// Side effects run before the reply is returned: properties are updated
/// first, then notifications are broadcast, then streams are ended.
#[derive(Debug, Clone)]
pub struct CallScript {
    reply: std::result::Result<Vec<BusValue>, BusError>,
    emit: Vec<RawNotification>,
    set_properties: Vec<(PropertyKey, BusValue)>,
    end_streams: bool,
}

impl CallScript {
    /// Answer with the given reply body.
    pub fn reply(values: Vec<BusValue>) -> Self {
        Self {
            reply: Ok(values),
            emit: Vec::new(),
            set_properties: Vec::new(),
            end_streams: false,
        }
    }

    /// Answer with an error.
    pub fn fail(error: BusError) -> Self {
        Self {
            reply: Err(error),
            emit: Vec::new(),
            set_properties: Vec::new(),
            end_streams: false,
        }
    }

    /// Broadcast a notification when the call is handled.
    pub fn then_emit(mut self, notification: RawNotification) -> Self {
        self.emit.push(notification);
        self
    }

    /// End every connection's notification stream after the emits.
    pub fn then_end_streams(mut self) -> Self {
        self.end_streams = true;
        self
    }

    /// Change a property when the call is handled.
    pub fn then_set_property(
        mut self,
        path: &str,
        interface: &str,
        property: &str,
        value: BusValue,
    ) -> Self {
        self.set_properties
            .push((PropertyKey::new(path, interface, property), value));
        self
    }
}

#[derive(Default)]
struct FakeState {
    open: AtomicUsize,
    opened_total: AtomicUsize,
    next_id: AtomicU64,
    reject_match_rules: AtomicBool,
    fail_connect: Mutex<Option<BusError>>,
    scripts: Mutex<HashMap<(String, String), VecDeque<CallScript>>>,
    properties: Mutex<HashMap<PropertyKey, BusValue>>,
    calls: Mutex<Vec<RecordedCall>>,
    match_rules: Mutex<Vec<String>>,
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<RawNotification>>>,
}

impl FakeState {
    fn broadcast(&self, notification: &RawNotification) -> usize {
        let listeners = lock(&self.listeners);
        listeners
            .values()
            .filter(|tx| tx.send(notification.clone()).is_ok())
            .count()
    }

    fn next_script(&self, interface: &str, method: &str) -> Option<CallScript> {
        let mut scripts = lock(&self.scripts);
        let queue = scripts.get_mut(&(interface.to_string(), method.to_string()))?;
        // The last script stays in place and answers every later call.
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scriptable in-memory bus.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<FakeState>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for `interface.method`. Scripts are consumed in order
    /// and the last one keeps answering.
    pub fn script(&self, interface: &str, method: &str, script: CallScript) -> &Self {
        lock(&self.state.scripts)
            .entry((interface.to_string(), method.to_string()))
            .or_default()
            .push_back(script);
        self
    }

    pub fn set_property(&self, path: &str, interface: &str, property: &str, value: BusValue) -> &Self {
        lock(&self.state.properties).insert(PropertyKey::new(path, interface, property), value);
        self
    }

    /// Broadcast a notification to every open connection. Returns how many
    /// connections received it.
    pub fn emit(&self, notification: RawNotification) -> usize {
        self.state.broadcast(&notification)
    }

    /// End the notification stream of every open connection.
    ///
    /// The connections stay open and keep answering calls, but
    /// `next_notification` returns `None` once anything already queued has
    /// been read. Connections opened afterwards get a fresh stream.
    pub fn end_streams(&self) {
        lock(&self.state.listeners).clear();
    }

    /// Make every following `connect` fail with `error`.
    pub fn fail_connect(&self, error: BusError) {
        *lock(&self.state.fail_connect) = Some(error);
    }

    pub fn reject_match_rules(&self, reject: bool) {
        self.state.reject_match_rules.store(reject, Ordering::SeqCst);
    }

    /// Connections currently open.
    pub fn open_connections(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Connections opened over the transport's lifetime.
    pub fn total_connections(&self) -> usize {
        self.state.opened_total.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.state.calls).clone()
    }

    /// Number of recorded calls to `method` on any interface.
    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.state.calls)
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn match_rules(&self) -> Vec<String> {
        lock(&self.state.match_rules).clone()
    }

    /// Poll until `open_connections()` equals `expected` or `timeout` passes.
    pub fn wait_for_open_connections(&self, expected: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.open_connections() == expected {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.open_connections() == expected
    }
}

#[async_trait]
impl BusTransport for FakeTransport {
    async fn connect(&self) -> Result<Box<dyn BusConnection>> {
        if let Some(error) = lock(&self.state.fail_connect).clone() {
            return Err(error);
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.state.listeners).insert(id, tx);
        self.state.open.fetch_add(1, Ordering::SeqCst);
        self.state.opened_total.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakeConnection {
            id,
            state: Arc::clone(&self.state),
            rx,
        }))
    }

    fn describe(&self) -> String {
        "fake bus".to_string()
    }
}

struct FakeConnection {
    id: u64,
    state: Arc<FakeState>,
    rx: mpsc::UnboundedReceiver<RawNotification>,
}

#[async_trait]
impl BusConnection for FakeConnection {
    async fn call(
        &self,
        target: &ObjectRef,
        interface: &str,
        method: &str,
        args: &[BusValue],
    ) -> Result<Vec<BusValue>> {
        lock(&self.state.calls).push(RecordedCall {
            target: target.clone(),
            interface: interface.to_string(),
            method: method.to_string(),
            args: args.to_vec(),
        });

        let Some(script) = self.state.next_script(interface, method) else {
            return Err(BusError::method_error(
                "org.freedesktop.DBus.Error.UnknownMethod",
                format!("no script for {}.{}", interface, method),
            ));
        };

        {
            let mut properties = lock(&self.state.properties);
            for (key, value) in &script.set_properties {
                properties.insert(key.clone(), value.clone());
            }
        }
        for notification in &script.emit {
            self.state.broadcast(notification);
        }
        if script.end_streams {
            lock(&self.state.listeners).clear();
        }

        script.reply
    }

    async fn get_property(
        &self,
        target: &ObjectRef,
        interface: &str,
        property: &str,
    ) -> Result<BusValue> {
        lock(&self.state.calls).push(RecordedCall {
            target: target.clone(),
            interface: PROPERTIES_INTERFACE.to_string(),
            method: "Get".to_string(),
            args: vec![BusValue::str(interface), BusValue::str(property)],
        });

        lock(&self.state.properties)
            .get(&PropertyKey::new(&target.path, interface, property))
            .cloned()
            .ok_or_else(|| {
                BusError::method_error(
                    "org.freedesktop.DBus.Error.UnknownProperty",
                    format!("{}.{} not set on {}", interface, property, target.path),
                )
            })
    }

    async fn add_match_rule(&self, rule: &MatchRule) -> Result<()> {
        if self.state.reject_match_rules.load(Ordering::SeqCst) {
            return Err(BusError::MatchRule(format!("{}: rejected", rule)));
        }
        lock(&self.state.match_rules).push(rule.to_string());
        Ok(())
    }

    async fn next_notification(&mut self) -> Option<RawNotification> {
        self.rx.recv().await
    }

    async fn close(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        lock(&self.state.listeners).remove(&self.id);
        self.state.open.fetch_sub(1, Ordering::SeqCst);
    }
}
