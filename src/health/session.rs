//! One live connection and its two concurrent loops.
//!
//! # Lifecycle
//! ```text
//! establish()  → transport open under connection_timeout
//! start()      → spawn probe loop + drain loop (state: Connected)
//!     probe loop: every probe_interval, probe → classify → SessionEvent::Sample
//!     drain loop: recv until closure → SessionEvent::Closed
//! teardown()   → cancel both loops → join both → close transport
//! ```
//!
//! # Design Decisions
//! - Loops observe a `CancellationToken` at every suspension point
//! - Every event carries the session id; owners drop events from stale sessions
//! - The probe loop never fails upward: non-timeout probe errors are logged and dropped
//! - Only the drain loop reports disconnection

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::SessionSettings;
use crate::error::TransportError;
use crate::health::window::Outcome;
use crate::observability::metrics;
use crate::transport::{Connection, Payload, Transport};

/// Observer invoked with every inbound payload.
pub type MessageHook = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Events a session reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A classified probe result, in probe completion order.
    Sample { session: u64, outcome: Outcome },
    /// The drain loop ended because the connection closed.
    Closed { session: u64, reason: TransportError },
}

/// A live connection with its probe and drain loops.
pub struct ConnectionSession {
    id: u64,
    role: &'static str,
    connection: Arc<dyn Connection>,
    close_timeout: Duration,
    cancel: CancellationToken,
    probe_task: Option<JoinHandle<()>>,
    drain_task: Option<JoinHandle<()>>,
    torn_down: bool,
}

impl ConnectionSession {
    /// Open a transport connection under a hard `connection_timeout`.
    pub async fn establish(
        transport: &dyn Transport,
        endpoint: &Url,
        settings: &SessionSettings,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        let deadline = settings.connection_timeout;
        match time::timeout(deadline, transport.open(endpoint, deadline)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout(deadline)),
        }
    }

    /// Start the probe and drain loops over an established connection.
    ///
    /// Nothing is awaited here, so the loops are running by the time the
    /// session is handed to its owner.
    pub fn start<E>(
        id: u64,
        role: &'static str,
        connection: Arc<dyn Connection>,
        settings: SessionSettings,
        events: mpsc::UnboundedSender<E>,
        on_message: Option<MessageHook>,
    ) -> Self
    where
        E: From<SessionEvent> + Send + 'static,
    {
        let cancel = CancellationToken::new();

        let probe_task = tokio::spawn(probe_loop(
            id,
            role,
            connection.clone(),
            settings,
            events.clone(),
            cancel.clone(),
        ));
        let drain_task = tokio::spawn(drain_loop(
            id,
            role,
            connection.clone(),
            events,
            on_message,
            cancel.clone(),
        ));

        Self {
            id,
            role,
            connection,
            close_timeout: settings.close_timeout,
            cancel,
            probe_task: Some(probe_task),
            drain_task: Some(drain_task),
            torn_down: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop both loops, wait until they have exited, then close the transport.
    ///
    /// The close is abandoned after `close_timeout`. Idempotent; after it returns
    /// no further events arrive from this session.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.cancel.cancel();

        for task in [self.probe_task.take(), self.drain_task.take()].into_iter().flatten() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(role = self.role, session = self.id, "Session loop panicked");
                }
            }
        }
        tracing::debug!(role = self.role, session = self.id, "Session loops confirmed stopped");

        let closed = match time::timeout(self.close_timeout, self.connection.close(self.close_timeout)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::CloseTimeout(self.close_timeout)),
        };
        match closed {
            Ok(()) => tracing::info!(role = self.role, session = self.id, "Connection closed"),
            Err(e) => tracing::warn!(role = self.role, session = self.id, error = %e, "Connection close did not complete"),
        }
    }
}

impl Drop for ConnectionSession {
    fn drop(&mut self) {
        // Loops must not outlive a session that was dropped without teardown.
        self.cancel.cancel();
    }
}

/// Probe on every tick and report classified samples.
///
/// Only unanswered probes count as bad. Any other probe error is logged and the
/// sample dropped, so a broken probe path leaves the window unchanged; counting
/// such errors against the window is a policy that may be revisited.
async fn probe_loop<E>(
    id: u64,
    role: &'static str,
    connection: Arc<dyn Connection>,
    settings: SessionSettings,
    events: mpsc::UnboundedSender<E>,
    cancel: CancellationToken,
) where
    E: From<SessionEvent> + Send + 'static,
{
    let mut ticker = time::interval(settings.probe_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let probed = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            probed = time::timeout(settings.probe_timeout, connection.probe(settings.probe_timeout)) => probed,
        };

        let outcome = match probed {
            Ok(Ok(elapsed)) => {
                let outcome = Outcome::classify(elapsed, settings.latency_threshold);
                tracing::debug!(
                    role,
                    session = id,
                    latency_ms = elapsed.as_secs_f64() * 1000.0,
                    outcome = outcome.as_str(),
                    "Probe successful"
                );
                metrics::record_probe_latency(role, elapsed);
                outcome
            }
            Ok(Err(e)) if e.is_timeout() => {
                tracing::debug!(role, session = id, "Probe timed out");
                Outcome::Bad
            }
            Err(_) => {
                tracing::debug!(role, session = id, "Probe timed out");
                Outcome::Bad
            }
            Ok(Err(e)) => {
                tracing::warn!(role, session = id, error = %e, "Probe failed, sample dropped");
                metrics::record_probe_outcome(role, "dropped");
                continue;
            }
        };

        metrics::record_probe_outcome(role, outcome.as_str());
        if events.send(SessionEvent::Sample { session: id, outcome }.into()).is_err() {
            break;
        }
    }
}

async fn drain_loop<E>(
    id: u64,
    role: &'static str,
    connection: Arc<dyn Connection>,
    events: mpsc::UnboundedSender<E>,
    on_message: Option<MessageHook>,
    cancel: CancellationToken,
) where
    E: From<SessionEvent> + Send + 'static,
{
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(role, session = id, "Listening task cancelled");
                return;
            }
            received = connection.recv() => received,
        };

        match received {
            Ok(payload) => {
                tracing::debug!(role, session = id, len = payload.len(), "Received message");
                if let Some(hook) = &on_message {
                    hook(&payload);
                }
            }
            Err(reason) => {
                tracing::info!(role, session = id, error = %reason, "Connection closed during listen");
                let _ = events.send(SessionEvent::Closed { session: id, reason }.into());
                return;
            }
        }
    }
}
