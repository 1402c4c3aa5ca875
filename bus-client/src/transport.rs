//! The narrow transport surface the rest of the workspace is written against.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{MatchRule, ObjectRef, RawNotification};
use crate::value::BusValue;

/// Well-known name of the bus daemon.
pub const DBUS_SERVICE: &str = "org.freedesktop.DBus";
/// Object path of the bus daemon.
pub const DBUS_PATH: &str = "/org/freedesktop/DBus";
/// Interface of the bus daemon (AddMatch, ...).
pub const DBUS_INTERFACE: &str = "org.freedesktop.DBus";
/// Standard properties interface.
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Factory for bus connections.
///
/// Every subscription and every service transition opens its own
/// connection; nothing is pooled behind this trait.
#[async_trait]
pub trait BusTransport: Send + Sync + 'static {
    /// Open a new, exclusively owned connection.
    async fn connect(&self) -> Result<Box<dyn BusConnection>>;

    /// Human readable name of the bus, used in logs.
    fn describe(&self) -> String {
        "bus".to_string()
    }
}

/// One open connection to the bus.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Synchronous remote method call; returns the reply body.
    async fn call(
        &self,
        target: &ObjectRef,
        interface: &str,
        method: &str,
        args: &[BusValue],
    ) -> Result<Vec<BusValue>>;

    /// Read a property. Variant wrapping is removed before returning.
    async fn get_property(
        &self,
        target: &ObjectRef,
        interface: &str,
        property: &str,
    ) -> Result<BusValue>;

    /// Ask the bus daemon to route signals matching `rule` to this connection.
    async fn add_match_rule(&self, rule: &MatchRule) -> Result<()>;

    /// Wait for the next signal delivered to this connection.
    ///
    /// Must be cancel safe: dropping the future before it resolves loses no
    /// notification. Returns `None` once the connection's stream has ended.
    async fn next_notification(&mut self) -> Option<RawNotification>;

    /// Release the connection.
    async fn close(self: Box<Self>);
}
