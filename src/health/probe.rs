//! Health probe: a secondary connection that watches for sustained recovery.
//!
//! # Responsibilities
//! - Keep an independent connection to the endpoint, retrying until terminated
//! - Classify probe samples into a window that looks for good latency
//! - Invoke the recovery callback once per session when the window turns healthy
//! - Start over with a fresh session when a full window is not healthy
//!
//! # Design Decisions
//! - Same supervisor machinery as the primary, unbounded retry, inverted polarity
//! - The probe never stops itself after recovery; its owner calls `terminate()`
//! - `terminate()` is idempotent and waits until the session is torn down

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;
use url::Url;

use crate::config::validation::validate_sections;
use crate::config::{HealthProbeConfig, PrimaryConfig};
use crate::error::{ManagerError, ManagerResult};
use crate::health::window::Verdict;
use crate::manager::state::{ConnectionState, ManagerSnapshot};
use crate::manager::supervisor::{Event, Supervisor, SupervisorConfig};
use crate::resilience::retries::RetryPolicy;
use crate::transport::Transport;

const ROLE: &str = "health_probe";

/// Callback invoked when the probe observes sustained good latency.
pub type RecoveryHook = Arc<dyn Fn() + Send + Sync>;

enum ProbeCommand {
    Start,
    Terminate(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<ManagerSnapshot>),
}

/// Handle to a running health probe.
///
/// Dropping the handle stops the probe's driver task.
pub struct HealthProbe {
    commands: mpsc::UnboundedSender<ProbeCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl HealthProbe {
    /// Validate the settings and spawn the probe's driver.
    ///
    /// The probe stays idle until [`HealthProbe::start`].
    pub fn spawn(
        endpoint: Url,
        config: &HealthProbeConfig,
        primary: &PrimaryConfig,
        transport: Arc<dyn Transport>,
        on_recovered: RecoveryHook,
    ) -> ManagerResult<Self> {
        validate_sections(primary, config).map_err(ManagerError::InvalidConfig)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let span = tracing::info_span!("health_probe", endpoint = %endpoint);
        let core = Supervisor::new(
            SupervisorConfig {
                role: ROLE,
                endpoint,
                settings: config.session_settings(primary),
                retry: RetryPolicy::Unbounded,
                window_size: config.window_size,
                polarity: config.polarity(),
            },
            transport,
            events_tx,
            None,
        );
        let state = core.subscribe_state();

        let driver = ProbeDriver {
            core,
            on_recovered,
            notified_session: None,
            commands: commands_rx,
            events: events_rx,
        };
        tokio::spawn(driver.run().instrument(span));

        Ok(Self {
            commands: commands_tx,
            state,
        })
    }

    /// Begin probing. Ignored while already connecting or connected.
    pub fn start(&self) -> ManagerResult<()> {
        self.commands
            .send(ProbeCommand::Start)
            .map_err(|_| ManagerError::Stopped)
    }

    /// Disable retry and tear down the session. Repeated calls are no-ops.
    pub async fn terminate(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(ProbeCommand::Terminate(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn snapshot(&self) -> ManagerResult<ManagerSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(ProbeCommand::Snapshot(tx))
            .map_err(|_| ManagerError::Stopped)?;
        rx.await.map_err(|_| ManagerError::Stopped)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}

struct ProbeDriver {
    core: Supervisor,
    on_recovered: RecoveryHook,
    /// Session that already reported recovery.
    notified_session: Option<u64>,
    commands: mpsc::UnboundedReceiver<ProbeCommand>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl ProbeDriver {
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
        self.core.stop().await;
        tracing::debug!("Health probe driver stopped");
    }

    async fn handle_command(&mut self, command: ProbeCommand) {
        match command {
            ProbeCommand::Start => {
                if !self.core.state().can_connect() {
                    return;
                }
                tracing::info!("Starting health probe");
                self.core.rearm();
                self.core.begin_connect();
            }
            ProbeCommand::Terminate(reply) => {
                if self.core.retry_enabled || self.core.live_session().is_some() {
                    tracing::info!("Terminating health probe");
                }
                self.core.stop().await;
                let _ = reply.send(());
            }
            ProbeCommand::Snapshot(reply) => {
                let _ = reply.send(self.core.snapshot(false));
            }
        }
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Opened { attempt, result } => self.core.handle_opened(attempt, result).await,
            Event::RetryDue { attempt } => self.core.handle_retry_due(attempt),
            Event::Session(event) => match self.core.handle_session_event(event).await {
                Some(Verdict::Healthy) => self.handle_good_window(),
                Some(Verdict::Unhealthy) => self.handle_bad_window().await,
                Some(Verdict::NoVerdict) | None => {}
            },
            Event::Recovered { .. } => {}
        }
    }

    fn handle_good_window(&mut self) {
        let live = self.core.live_session();
        if live.is_none() || self.notified_session == live {
            return;
        }
        self.notified_session = live;
        tracing::info!(bad_count = self.core.window.bad_count(), "Good latency window, reporting recovery");
        (self.on_recovered)();
    }

    async fn handle_bad_window(&mut self) {
        tracing::info!(
            bad_count = self.core.window.bad_count(),
            "Bad window detected, closing connection and starting from scratch"
        );
        self.core.teardown_session().await;
        self.core.set_state(ConnectionState::Disconnected);
        self.core.begin_connect();
    }
}
