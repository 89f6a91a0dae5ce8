//! Connect/retry/classify machinery shared by the primary manager and the health probe.
//!
//! # Responsibilities
//! - Open connections off the driver task and install sessions when they succeed
//! - Feed samples from the live session into the latency window
//! - Apply the retry policy after connect failures and remote closures
//! - Tear sessions down before anything replaces them
//!
//! # Design Decisions
//! - Owned by exactly one driver task; no locks around window or state
//! - Connect attempts, retry timers and sessions share one id sequence so late
//!   events from anything superseded are recognised and dropped
//! - Verdict handling is left to the owner (failover for the primary, recovery for the probe)

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use url::Url;

use crate::config::SessionSettings;
use crate::error::TransportError;
use crate::health::session::{ConnectionSession, MessageHook, SessionEvent};
use crate::health::window::{LatencyWindow, Polarity, Verdict};
use crate::manager::state::{ConnectionState, ManagerSnapshot};
use crate::observability::metrics;
use crate::resilience::retries::{RetryDecision, RetryPolicy};
use crate::transport::{Connection, Transport};

/// Everything a driver task reacts to besides its commands.
pub(crate) enum Event {
    /// A connect attempt finished.
    Opened {
        attempt: u64,
        result: Result<Arc<dyn Connection>, TransportError>,
    },
    /// The retry delay for `attempt` elapsed.
    RetryDue { attempt: u64 },
    Session(SessionEvent),
    /// The health probe reported recovery for failover `epoch`.
    Recovered { epoch: u64 },
}

impl From<SessionEvent> for Event {
    fn from(event: SessionEvent) -> Self {
        Event::Session(event)
    }
}

/// Static description of a supervised connection.
pub(crate) struct SupervisorConfig {
    pub role: &'static str,
    pub endpoint: Url,
    pub settings: SessionSettings,
    pub retry: RetryPolicy,
    pub window_size: usize,
    pub polarity: Polarity,
}

pub(crate) struct Supervisor {
    role: &'static str,
    transport: Arc<dyn Transport>,
    endpoint: Url,
    settings: SessionSettings,
    retry: RetryPolicy,
    pub(crate) window: LatencyWindow,
    pub(crate) attempts: u32,
    pub(crate) retry_enabled: bool,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    next_id: u64,
    pending_connect: Option<(u64, JoinHandle<()>)>,
    pending_retry: Option<(u64, JoinHandle<()>)>,
    session: Option<ConnectionSession>,
    events: mpsc::UnboundedSender<Event>,
    on_message: Option<MessageHook>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedSender<Event>,
        on_message: Option<MessageHook>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            role: config.role,
            transport,
            endpoint: config.endpoint,
            settings: config.settings,
            retry: config.retry,
            window: LatencyWindow::new(config.window_size, config.polarity),
            attempts: 0,
            retry_enabled: true,
            state: ConnectionState::Idle,
            state_tx,
            next_id: 0,
            pending_connect: None,
            pending_retry: None,
            session: None,
            events,
            on_message,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn live_session(&self) -> Option<u64> {
        self.session.as_ref().map(ConnectionSession::id)
    }

    pub fn snapshot(&self, failover_active: bool) -> ManagerSnapshot {
        ManagerSnapshot {
            state: self.state,
            attempts: self.attempts,
            window_len: self.window.len(),
            bad_count: self.window.bad_count(),
            retry_enabled: self.retry_enabled,
            failover_active,
        }
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(role = self.role, from = %self.state, to = %state, "State transition");
        }
        self.state = state;
        self.state_tx.send_replace(state);
        metrics::record_state(self.role, state);
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Re-enable retry and clear the attempt counter.
    pub fn rearm(&mut self) {
        self.attempts = 0;
        self.retry_enabled = true;
    }

    /// Reset retry state and the window before a fresh start.
    pub fn refresh(&mut self) {
        self.rearm();
        self.window.reset();
    }

    /// Start a connect attempt with a fresh window. No-op while one is in flight or live.
    pub fn begin_connect(&mut self) {
        if self.pending_connect.is_some() || self.session.is_some() {
            tracing::debug!(role = self.role, "Connect ignored, already connecting or connected");
            return;
        }
        if let Some((_, timer)) = self.pending_retry.take() {
            timer.abort();
        }

        self.window.reset();
        self.set_state(ConnectionState::Connecting);

        let attempt = self.next_id();
        let transport = self.transport.clone();
        let endpoint = self.endpoint.clone();
        let settings = self.settings;
        let events = self.events.clone();

        tracing::info!(role = self.role, endpoint = %self.endpoint, retry = self.attempts, "Connecting");
        let task = tokio::spawn(async move {
            let result = ConnectionSession::establish(transport.as_ref(), &endpoint, &settings).await;
            let _ = events.send(Event::Opened { attempt, result });
        });
        self.pending_connect = Some((attempt, task));
    }

    /// Install the session for a finished connect attempt, or route the failure to retry.
    pub async fn handle_opened(&mut self, attempt: u64, result: Result<Arc<dyn Connection>, TransportError>) {
        let current = matches!(self.pending_connect, Some((id, _)) if id == attempt);
        if !current {
            if let Ok(connection) = result {
                tracing::debug!(role = self.role, attempt, "Closing connection from superseded attempt");
                let _ = connection.close(self.settings.close_timeout).await;
            }
            return;
        }
        self.pending_connect = None;

        match result {
            Ok(connection) => {
                tracing::info!(role = self.role, endpoint = %self.endpoint, "Connected");
                metrics::record_connect_attempt(self.role, "connected");
                self.attempts = 0;
                self.window.reset();
                self.session = Some(ConnectionSession::start(
                    attempt,
                    self.role,
                    connection,
                    self.settings,
                    self.events.clone(),
                    self.on_message.clone(),
                ));
                self.set_state(ConnectionState::Connected);
            }
            Err(e) => {
                tracing::warn!(role = self.role, endpoint = %self.endpoint, error = %e, "Connect failed");
                metrics::record_connect_attempt(self.role, "failed");
                self.set_state(ConnectionState::Disconnected);
                self.schedule_retry();
            }
        }
    }

    /// Record a sample from the live session and return the window verdict.
    ///
    /// Returns `None` for events from sessions that are no longer live. A remote
    /// closure of the live session is handled here and routed to retry.
    pub async fn handle_session_event(&mut self, event: SessionEvent) -> Option<Verdict> {
        match event {
            SessionEvent::Sample { session, outcome } => {
                if self.live_session() != Some(session) {
                    tracing::trace!(role = self.role, session, "Dropping sample from stale session");
                    return None;
                }
                self.window.record(outcome);
                let verdict = self.window.verdict();
                tracing::debug!(
                    role = self.role,
                    outcome = outcome.as_str(),
                    window_len = self.window.len(),
                    bad_count = self.window.bad_count(),
                    ?verdict,
                    "Received latency result"
                );
                Some(verdict)
            }
            SessionEvent::Closed { session, reason } => {
                if self.live_session() != Some(session) {
                    return None;
                }
                tracing::warn!(role = self.role, error = %reason, "Connection lost");
                self.teardown_session().await;
                self.set_state(ConnectionState::Disconnected);
                self.schedule_retry();
                None
            }
        }
    }

    /// Apply the retry policy after a failure.
    pub fn schedule_retry(&mut self) {
        match self
            .retry
            .decide(self.retry_enabled, self.attempts, self.settings.connection_timeout)
        {
            RetryDecision::RetryAfter { delay, attempt } => {
                tracing::info!(role = self.role, attempt, delay_secs = delay.as_secs_f64(), "Attempting retry");
                let id = self.next_id();
                let events = self.events.clone();
                let timer = tokio::spawn(async move {
                    time::sleep(delay).await;
                    let _ = events.send(Event::RetryDue { attempt: id });
                });
                if let Some((_, previous)) = self.pending_retry.replace((id, timer)) {
                    previous.abort();
                }
            }
            RetryDecision::Suspended => {
                tracing::info!(role = self.role, "Not attempting retry");
            }
            RetryDecision::GiveUp => {
                tracing::warn!(role = self.role, attempts = self.attempts, "Not retrying, giving up");
                self.set_state(ConnectionState::Failed);
            }
        }
    }

    /// Count the retry and reconnect, if `attempt` is still the scheduled one.
    pub fn handle_retry_due(&mut self, attempt: u64) {
        let current = matches!(self.pending_retry, Some((id, _)) if id == attempt);
        if !current || !self.retry_enabled {
            return;
        }
        self.pending_retry = None;
        self.attempts = self.attempts.saturating_add(1);
        self.begin_connect();
    }

    /// Tear down the live session, if any, waiting until its loops have stopped.
    pub async fn teardown_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.teardown().await;
        }
    }

    /// Disable retry and stop everything: pending connect, retry timer, live session.
    pub async fn stop(&mut self) {
        self.retry_enabled = false;
        if let Some((_, timer)) = self.pending_retry.take() {
            timer.abort();
        }
        if let Some((_, task)) = self.pending_connect.take() {
            task.abort();
        }
        self.teardown_session().await;
        if self.state != ConnectionState::Idle {
            self.set_state(ConnectionState::Disconnected);
        }
    }
}
