//! The filtered signal pump: one background task per subscription.
//!
//! The pump reads raw notifications from its own connection, keeps the ones
//! that match the filter and decode into the record type, and forwards them
//! to the subscription's output channel. It only stops at its select point,
//! when the cancellation token fires.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use bus_client::{BusConnection, RawNotification};
use crossbeam::channel::{Receiver, SendTimeoutError, Sender, TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::{OverflowPolicy, StreamConfig};
use crate::filter::SignalFilter;
use crate::record::SignalRecord;

/// Lifecycle of a pump.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PumpState {
    Running,
    /// Cancellation requested, pump has not released its connection yet
    Cancelling,
    /// Terminal: connection released, no more records will be produced
    Stopped,
}

impl PumpState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PumpState::Running,
            1 => PumpState::Cancelling,
            _ => PumpState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PumpState::Running => 0,
            PumpState::Cancelling => 1,
            PumpState::Stopped => 2,
        }
    }
}

impl fmt::Display for PumpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpState::Running => write!(f, "running"),
            PumpState::Cancelling => write!(f, "cancelling"),
            PumpState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Counters describing what a pump did with the traffic it saw.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct PumpStats {
    /// Records placed on the output channel
    pub delivered: u64,
    /// Notifications that did not match the filter or failed to decode
    pub discarded: u64,
    /// Records lost to the overflow policy
    pub dropped: u64,
}

/// State shared between a subscription handle and its pump.
#[derive(Debug, Default)]
pub(crate) struct PumpShared {
    state: AtomicU8,
    delivered: AtomicU64,
    discarded: AtomicU64,
    dropped: AtomicU64,
}

impl PumpShared {
    pub(crate) fn state(&self) -> PumpState {
        PumpState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Running -> Cancelling; any other state is left alone.
    pub(crate) fn begin_cancel(&self) {
        let _ = self.state.compare_exchange(
            PumpState::Running.as_u8(),
            PumpState::Cancelling.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub(crate) fn mark_stopped(&self) {
        self.state
            .store(PumpState::Stopped.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn stats(&self) -> PumpStats {
        PumpStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

pub(crate) struct Pump<R> {
    pub(crate) filter: SignalFilter,
    pub(crate) config: StreamConfig,
    pub(crate) records: Sender<R>,
    /// Receiver clone used only to evict the oldest record under DropOldest
    pub(crate) evict: Receiver<R>,
    pub(crate) token: CancellationToken,
    pub(crate) shared: std::sync::Arc<PumpShared>,
}

impl<R: SignalRecord> Pump<R> {
    /// Run until cancelled, then release the connection.
    pub(crate) async fn run(self, mut conn: Box<dyn BusConnection>) {
        debug!("Signal pump started for {:?}", self.filter);
        let mut stream_open = true;

        loop {
            let next = if stream_open {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => break,
                    n = conn.next_notification() => n,
                }
            } else {
                self.token.cancelled().await;
                break;
            };

            match next {
                Some(notification) => self.handle(notification),
                None => {
                    warn!(
                        "Notification stream for {} ended; waiting for cancellation",
                        self.filter.member()
                    );
                    stream_open = false;
                }
            }
        }

        self.shared.begin_cancel();
        conn.close().await;
        self.shared.mark_stopped();
        debug!("Signal pump stopped for {:?}", self.filter);
    }

    fn handle(&self, notification: RawNotification) {
        if !self.filter.matches(&notification) {
            trace!("Discarding unrelated signal {}", notification.name());
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let Some(record) = R::decode(&notification.args) else {
            debug!(
                "Discarding {} from {}: unexpected payload {:?}",
                notification.name(),
                notification.path,
                notification.args
            );
            self.shared.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        };

        self.deliver(record);
    }

    fn deliver(&self, record: R) {
        match self.config.overflow {
            OverflowPolicy::DropNewest => match self.records.try_send(record) {
                Ok(()) => self.count_delivered(),
                Err(TrySendError::Full(_)) => self.count_dropped("newest"),
                Err(TrySendError::Disconnected(_)) => {}
            },
            OverflowPolicy::DropOldest => {
                let mut record = record;
                loop {
                    match self.records.try_send(record) {
                        Ok(()) => {
                            self.count_delivered();
                            return;
                        }
                        Err(TrySendError::Full(back)) => {
                            if self.evict.try_recv().is_ok() {
                                self.count_dropped("oldest");
                            }
                            record = back;
                        }
                        Err(TrySendError::Disconnected(_)) => return,
                    }
                }
            }
            OverflowPolicy::Block => {
                let mut record = record;
                loop {
                    match self
                        .records
                        .send_timeout(record, self.config.block_poll_interval)
                    {
                        Ok(()) => {
                            self.count_delivered();
                            return;
                        }
                        Err(SendTimeoutError::Timeout(back)) => {
                            if self.token.is_cancelled() {
                                debug!("Cancelled while blocked on a full channel; record dropped");
                                return;
                            }
                            record = back;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => return,
                    }
                }
            }
        }
    }

    fn count_delivered(&self) {
        self.shared.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn count_dropped(&self, which: &str) {
        let dropped = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            "Output channel for {} full, dropped {} record ({} dropped so far)",
            self.filter.member(),
            which,
            dropped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let shared = PumpShared::default();
        assert_eq!(shared.state(), PumpState::Running);

        shared.begin_cancel();
        assert_eq!(shared.state(), PumpState::Cancelling);

        shared.mark_stopped();
        assert_eq!(shared.state(), PumpState::Stopped);

        // Stopped is terminal.
        shared.begin_cancel();
        assert_eq!(shared.state(), PumpState::Stopped);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PumpState::Cancelling.to_string(), "cancelling");
    }
}
