//! Notification subscriptions
//!
//! A [`Subscription`] owns one bus connection, a background pump thread and
//! the receiving end of a bounded channel of decoded records. The API is
//! fully synchronous: the async pump runs on a dedicated thread with its own
//! single threaded tokio runtime.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bus_client::{blocking_runtime, BusTransport};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::filter::SignalFilter;
use crate::pump::{Pump, PumpShared, PumpState, PumpStats};
use crate::record::SignalRecord;

/// One filtered listening session.
///
/// # Teardown
///
/// Call [`cancel`](Self::cancel) then [`join`](Self::join). `join` without a
/// prior `cancel` blocks forever, because the pump never stops on its own.
/// Both are idempotent. Dropping the subscription performs cancel-then-join,
/// so the connection is released even if the owner forgets.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use bus_client::ZbusTransport;
/// use sysbus_stream::{SignalFilter, Subscription};
///
/// let filter = SignalFilter::new("StateChanged")
///     .with_interface("org.freedesktop.NetworkManager")
///     .with_path("/org/freedesktop/NetworkManager");
/// let mut sub = Subscription::<u32>::subscribe(Arc::new(ZbusTransport::system()), filter)?;
///
/// while let Some(state) = sub.recv() {
///     println!("state: {}", state);
/// }
///
/// sub.cancel();
/// sub.join();
/// ```
pub struct Subscription<R: SignalRecord> {
    records: Receiver<R>,
    token: CancellationToken,
    shared: Arc<PumpShared>,
    worker: Option<JoinHandle<()>>,
    filter: SignalFilter,
}

impl<R: SignalRecord> Subscription<R> {
    /// Subscribe with the default configuration.
    pub fn subscribe(transport: Arc<dyn BusTransport>, filter: SignalFilter) -> Result<Self> {
        Self::subscribe_with_config(transport, filter, StreamConfig::default())
    }

    /// Open a dedicated connection, register the filter's match rule and
    /// start the pump.
    ///
    /// Returns once the connection is established and the rule accepted;
    /// records then arrive in the background.
    pub fn subscribe_with_config(
        transport: Arc<dyn BusTransport>,
        filter: SignalFilter,
        config: StreamConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (record_tx, record_rx) = channel::bounded(config.buffer_size);
        let token = CancellationToken::new();
        let shared = Arc::new(PumpShared::default());
        let (setup_tx, setup_rx) = channel::bounded::<Result<()>>(1);

        let pump = Pump {
            filter: filter.clone(),
            config,
            records: record_tx,
            evict: record_rx.clone(),
            token: token.clone(),
            shared: Arc::clone(&shared),
        };
        let pump_shared = Arc::clone(&shared);
        let rule = filter.match_rule();
        let rule_text = rule.to_string();

        let worker = thread::Builder::new()
            .name(format!("sysbus-pump-{}", filter.member()))
            .spawn(move || {
                let rt = match blocking_runtime() {
                    Ok(rt) => rt,
                    Err(e) => {
                        pump_shared.mark_stopped();
                        let _ = setup_tx.send(Err(StreamError::Spawn(e.to_string())));
                        return;
                    }
                };

                rt.block_on(async move {
                    let conn = match transport.connect().await {
                        Ok(conn) => conn,
                        Err(e) => {
                            pump_shared.mark_stopped();
                            let _ = setup_tx.send(Err(StreamError::Connect(e)));
                            return;
                        }
                    };

                    if let Err(e) = conn.add_match_rule(&rule).await {
                        conn.close().await;
                        pump_shared.mark_stopped();
                        let _ = setup_tx.send(Err(StreamError::MatchRule {
                            rule: rule.to_string(),
                            source: e,
                        }));
                        return;
                    }

                    let _ = setup_tx.send(Ok(()));
                    pump.run(conn).await;
                });
            })
            .map_err(|e| StreamError::Spawn(e.to_string()))?;

        match setup_rx.recv() {
            Ok(Ok(())) => {
                info!("Subscribed to {}", rule_text);
                Ok(Self {
                    records: record_rx,
                    token,
                    shared,
                    worker: Some(worker),
                    filter,
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(StreamError::Spawn(
                    "pump thread exited during setup".to_string(),
                ))
            }
        }
    }

    /// Ask the pump to stop at its next select point. Idempotent.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!("Cancelling subscription to {}", self.filter.member());
        }
        self.shared.begin_cancel();
        self.token.cancel();
    }

    /// Block until the pump has exited and released its connection.
    ///
    /// Safe to call repeatedly and after the pump has already stopped.
    /// Blocks forever if [`cancel`](Self::cancel) was never called.
    pub fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Signal pump for {} panicked", self.filter.member());
                self.shared.mark_stopped();
            }
        }
    }

    /// Block until a record is available.
    ///
    /// Returns `None` once the pump has stopped and the channel is drained.
    pub fn recv(&self) -> Option<R> {
        self.records.recv().ok()
    }

    /// Take a record if one is queued.
    pub fn try_recv(&self) -> Option<R> {
        self.records.try_recv().ok()
    }

    /// Block until a record is available or `timeout` expires.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<R> {
        match self.records.recv_timeout(timeout) {
            Ok(record) => Some(record),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Iterate over currently queued records without blocking.
    pub fn try_iter(&self) -> impl Iterator<Item = R> + '_ {
        self.records.try_iter()
    }

    /// The raw receiver, for use with `crossbeam::select!`.
    pub fn receiver(&self) -> &Receiver<R> {
        &self.records
    }

    pub fn filter(&self) -> &SignalFilter {
        &self.filter
    }

    pub fn state(&self) -> PumpState {
        self.shared.state()
    }

    pub fn stats(&self) -> PumpStats {
        self.shared.stats()
    }

    /// A token that cancels this subscription when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl<R: SignalRecord> Drop for Subscription<R> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel();
            self.join();
        }
    }
}

impl<R: SignalRecord> std::fmt::Debug for Subscription<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("filter", &self.filter)
            .field("state", &self.state())
            .field("queued", &self.records.len())
            .finish()
    }
}
