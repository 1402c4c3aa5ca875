//! Configuration types for subscriptions
//!
//! Controls the size of the output channel and what the pump does when the
//! consumer falls behind.

use std::time::Duration;

use crate::error::{Result, StreamError};

/// What the pump does with a decoded record when the output channel is full.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued record to make room. The consumer always sees
    /// the most recent state.
    DropOldest,
    /// Discard the record that did not fit.
    DropNewest,
    /// Wait for the consumer. Stalls reading from the bus while full, but
    /// still stops promptly on cancellation.
    Block,
}

/// Configuration for a subscription
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Capacity of the output channel
    /// Default: 20
    pub buffer_size: usize,

    /// Behaviour when the output channel is full
    /// Default: DropOldest
    pub overflow: OverflowPolicy,

    /// How often a blocked pump re-checks for cancellation
    /// Default: 50 milliseconds
    pub block_poll_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: 20,
            overflow: OverflowPolicy::DropOldest,
            block_poll_interval: Duration::from_millis(50),
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Never drop records; the pump waits for the consumer instead.
    pub fn lossless() -> Self {
        Self {
            overflow: OverflowPolicy::Block,
            ..Default::default()
        }
    }

    /// Keep only the most recent record.
    pub fn latest_only() -> Self {
        Self {
            buffer_size: 1,
            overflow: OverflowPolicy::DropOldest,
            ..Default::default()
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(StreamError::Configuration(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.block_poll_interval.is_zero() {
            return Err(StreamError::Configuration(
                "block_poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
