//! Primary connection manager with latency-triggered failover.
//!
//! # Failover Handoff
//! ```text
//! Connected, window Unhealthy (bad >= min_bad_count)
//!     → disable retry, tear down primary session          (Disconnected)
//!     → spawn HealthProbe against the same endpoint, start it
//! HealthProbe window Healthy (good >= min_good_count)
//!     → Event::Recovered { epoch }
//!     → refresh (attempts = 0, retry re-enabled, window empty)
//!     → terminate HealthProbe, then connect()              (Connecting)
//! ```
//!
//! # Design Decisions
//! - One driver task owns all mutable state; the handle only sends commands
//! - The primary is dormant while failover is active; only recovery brings it back
//! - Recovery notifications carry the failover epoch so late ones are ignored

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;
use url::Url;

use crate::config::validation::validate_config;
use crate::config::{ClientConfig, HealthProbeConfig, PrimaryConfig};
use crate::error::{ManagerError, ManagerResult};
use crate::health::probe::{HealthProbe, RecoveryHook};
use crate::health::session::MessageHook;
use crate::health::window::Verdict;
use crate::manager::state::{ConnectionState, ManagerSnapshot};
use crate::manager::supervisor::{Event, Supervisor, SupervisorConfig};
use crate::observability::metrics;
use crate::transport::Transport;

const ROLE: &str = "primary";

/// Optional observers.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Called with every inbound payload of the primary connection.
    pub on_message: Option<MessageHook>,
    /// Called when the primary takes over again after failover.
    pub on_recovered: Option<RecoveryHook>,
}

enum Command {
    Connect,
    Close(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<ManagerSnapshot>),
}

/// Handle to the primary connection manager.
///
/// Cloning is cheap; the driver task stops once every handle is dropped.
#[derive(Clone)]
pub struct PrimaryManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl PrimaryManager {
    /// Validate `config` and spawn the manager's driver task. The manager starts `Idle`.
    pub fn spawn(config: &ClientConfig, transport: Arc<dyn Transport>, hooks: Hooks) -> ManagerResult<Self> {
        validate_config(config).map_err(ManagerError::InvalidConfig)?;
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ManagerError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let span = tracing::info_span!("primary", endpoint = %endpoint);
        let core = Supervisor::new(
            SupervisorConfig {
                role: ROLE,
                endpoint: endpoint.clone(),
                settings: config.primary.session_settings(),
                retry: config.primary.retry_policy(),
                window_size: config.primary.window_size,
                polarity: config.primary.polarity(),
            },
            transport.clone(),
            events_tx.clone(),
            hooks.on_message.clone(),
        );
        let state = core.subscribe_state();

        let failover = config.primary.failover_enabled.then(|| Failover {
            endpoint,
            probe: config.health_probe.clone(),
            primary: config.primary.clone(),
            transport,
        });

        let driver = PrimaryDriver {
            core,
            failover,
            probe: None,
            epoch: 0,
            events_tx,
            on_recovered: hooks.on_recovered,
            commands: commands_rx,
            events: events_rx,
        };
        tokio::spawn(driver.run().instrument(span));

        Ok(Self {
            commands: commands_tx,
            state,
        })
    }

    /// Start connecting. Re-arms retry after `Failed` or a previous `close()`.
    ///
    /// Ignored while connecting, connected, or while failover is active.
    pub fn connect(&self) -> ManagerResult<()> {
        self.commands
            .send(Command::Connect)
            .map_err(|_| ManagerError::Stopped)
    }

    /// Close the connection and stop any health probe, waiting until both are down.
    pub async fn close(&self) -> ManagerResult<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Close(tx))
            .map_err(|_| ManagerError::Stopped)?;
        rx.await.map_err(|_| ManagerError::Stopped)
    }

    pub async fn snapshot(&self) -> ManagerResult<ManagerSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(tx))
            .map_err(|_| ManagerError::Stopped)?;
        rx.await.map_err(|_| ManagerError::Stopped)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

/// What the primary needs to build a health probe.
struct Failover {
    endpoint: Url,
    probe: HealthProbeConfig,
    primary: PrimaryConfig,
    transport: Arc<dyn Transport>,
}

struct PrimaryDriver {
    core: Supervisor,
    failover: Option<Failover>,
    probe: Option<HealthProbe>,
    /// Incremented on every failover and close.
    epoch: u64,
    events_tx: mpsc::UnboundedSender<Event>,
    on_recovered: Option<RecoveryHook>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl PrimaryDriver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
            }
        }
        self.close().await;
        tracing::debug!("Primary driver stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Close(reply) => {
                self.close().await;
                let _ = reply.send(());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.core.snapshot(self.probe.is_some()));
            }
        }
    }

    fn connect(&mut self) {
        if self.probe.is_some() {
            tracing::info!("Connect ignored, failover is active");
            return;
        }
        if !self.core.state().can_connect() {
            tracing::debug!(state = %self.core.state(), "Connect ignored");
            return;
        }
        self.core.rearm();
        self.core.begin_connect();
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Opened { attempt, result } => self.core.handle_opened(attempt, result).await,
            Event::RetryDue { attempt } => self.core.handle_retry_due(attempt),
            Event::Session(event) => {
                if let Some(Verdict::Unhealthy) = self.core.handle_session_event(event).await {
                    self.fail_over().await;
                }
            }
            Event::Recovered { epoch } => {
                if epoch == self.epoch && self.probe.is_some() {
                    self.on_recovered().await;
                } else {
                    tracing::debug!(epoch, current = self.epoch, "Ignoring stale recovery");
                }
            }
        }
    }

    /// Sustained bad latency: stop the primary and hand monitoring to a health probe.
    async fn fail_over(&mut self) {
        tracing::warn!(
            bad_count = self.core.window.bad_count(),
            window_len = self.core.window.len(),
            "Bad latency window, closing primary connection"
        );
        metrics::record_failover();

        self.core.stop().await;
        self.core.set_state(ConnectionState::Disconnected);

        let Some(failover) = &self.failover else {
            tracing::info!("Failover disabled, staying disconnected");
            return;
        };

        self.epoch += 1;
        let epoch = self.epoch;
        let events = self.events_tx.clone();
        let on_recovered: RecoveryHook = Arc::new(move || {
            let _ = events.send(Event::Recovered { epoch });
        });

        let probe = match HealthProbe::spawn(
            failover.endpoint.clone(),
            &failover.probe,
            &failover.primary,
            failover.transport.clone(),
            on_recovered,
        ) {
            Ok(probe) => probe,
            Err(e) => {
                tracing::error!(error = %e, "Health probe could not be created");
                return;
            }
        };
        if probe.start().is_err() {
            tracing::error!("Health probe stopped before it could start");
            return;
        }
        tracing::info!(epoch, "Health probe started");
        self.probe = Some(probe);
    }

    /// Clear retry state and the window before a fresh start.
    fn refresh(&mut self) {
        self.core.refresh();
    }

    /// Recovery handoff: the only path from failover back to normal operation.
    async fn on_recovered(&mut self) {
        tracing::info!("Latency recovered, restoring primary connection");
        metrics::record_recovery();

        self.refresh();
        if let Some(probe) = self.probe.take() {
            probe.terminate().await;
        }
        if let Some(hook) = &self.on_recovered {
            hook();
        }
        self.core.begin_connect();
    }

    async fn close(&mut self) {
        self.epoch += 1;
        self.core.stop().await;
        if let Some(probe) = self.probe.take() {
            probe.terminate().await;
        }
    }
}
