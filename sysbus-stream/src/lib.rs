//! # sysbus-stream
//!
//! Filtered signal subscriptions with typed, bounded output channels.
//!
//! ## Overview
//!
//! A [`Subscription`] opens its own bus connection, registers a match rule
//! derived from a [`SignalFilter`], and runs a background pump that decodes
//! each matching notification into a [`SignalRecord`]. Records are delivered
//! in arrival order on a bounded channel that the caller reads synchronously.
//!
//! Notifications that do not match the filter, or whose payload does not
//! decode, are discarded and never reach the channel.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bus_client::ZbusTransport;
//! use sysbus_stream::{SignalFilter, StreamConfig, Subscription};
//!
//! let filter = SignalFilter::new("StateChanged")
//!     .with_interface("org.freedesktop.NetworkManager.Device")
//!     .with_path("/org/freedesktop/NetworkManager/Devices/3");
//!
//! let mut sub = Subscription::<[u32; 3]>::subscribe_with_config(
//!     Arc::new(ZbusTransport::system()),
//!     filter,
//!     StreamConfig::default(),
//! )?;
//!
//! while let Some([new, old, reason]) = sub.recv_timeout(Duration::from_secs(30)) {
//!     println!("{} -> {} ({})", old, new, reason);
//! }
//!
//! sub.cancel();
//! sub.join();
//! ```
//!
//! ## Architecture
//!
//! Each subscription owns a dedicated thread running a single threaded tokio
//! runtime. The pump selects between its cancellation token and the next
//! notification, so cancellation is observed even when the bus is silent.
//! When the channel is full the [`OverflowPolicy`] decides what is lost.

pub mod config;
pub mod error;
pub mod filter;
pub mod pump;
pub mod record;
pub mod subscription;

// Re-export main types for convenience
pub use config::{OverflowPolicy, StreamConfig};
pub use error::{Result, StreamError};
pub use filter::SignalFilter;
pub use pump::{PumpState, PumpStats};
pub use record::SignalRecord;
pub use subscription::Subscription;

// Re-export commonly used types from dependencies
pub use bus_client::{BusValue, RawNotification};
