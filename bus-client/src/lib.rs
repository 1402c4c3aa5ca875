//! Private system bus transport for sysbus
//!
//! This crate is the only place that talks to the message bus directly. It
//! exposes a small surface (connect, call a method, read a property, add a
//! match rule, receive raw signals, close) so the
//! subscription and service-control crates above it can be driven by a real
//! zbus connection or by the in-memory [`testing::FakeTransport`].

mod error;
mod message;
mod runtime;
mod transport;
mod value;
mod zbus_transport;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::{BusError, Result};
pub use message::{MatchRule, ObjectRef, RawNotification};
pub use runtime::blocking_runtime;
pub use transport::{
    BusConnection, BusTransport, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE, PROPERTIES_INTERFACE,
};
pub use value::BusValue;
pub use zbus_transport::{BusKind, ZbusTransport};
