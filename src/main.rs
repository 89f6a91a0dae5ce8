//! latency-failover
//!
//! Keeps a WebSocket connection to one endpoint up, watches its round-trip latency
//! and fails over to a health probe while latency stays degraded.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ ClientConfig ──▶ PrimaryManager (driver task)
//!                                        │
//!                      ┌─────────────────┴──────────────────┐
//!                      ▼                                     ▼
//!              ConnectionSession                       HealthProbe
//!           probe loop + drain loop            (own session, during failover)
//!                      │                                     │
//!                      ▼                                     ▼
//!           LatencyWindow (bad ≥ 7/10)            LatencyWindow (good ≥ 7/10)
//!                      │ Unhealthy                           │ Healthy
//!                      └──────────── failover ◀──────────────┘ recovery
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use latency_failover::config::{load_config, ClientConfig};
use latency_failover::config::validation::validate_config;
use latency_failover::health::{MessageHook, RecoveryHook};
use latency_failover::lifecycle::shutdown_signal;
use latency_failover::observability::{logging, metrics};
use latency_failover::transport::Payload;
use latency_failover::{Hooks, PrimaryManager, WebSocketTransport};

#[derive(Parser)]
#[command(name = "latency-failover")]
#[command(about = "Latency-aware WebSocket client with health-probe failover", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint override (e.g. wss://example.test/feed).
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Log level override.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("Invalid configuration: {}", error);
        }
        return Err("configuration rejected".into());
    }

    logging::init_logging(&config.observability)?;

    tracing::info!("latency-failover v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        endpoint = %config.endpoint,
        window_size = config.primary.window_size,
        min_bad_count = config.primary.min_bad_count,
        latency_threshold_ms = config.primary.latency_threshold_ms,
        failover_enabled = config.primary.failover_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let on_message: MessageHook = Arc::new(|payload: &Payload| match payload {
        Payload::Text(text) => tracing::info!(message = %text, "Received message"),
        Payload::Binary(bytes) => tracing::info!(len = bytes.len(), "Received binary message"),
    });
    let on_recovered: RecoveryHook = Arc::new(|| tracing::info!("Primary connection restored after failover"));
    let hooks = Hooks {
        on_message: Some(on_message),
        on_recovered: Some(on_recovered),
    };

    let manager = PrimaryManager::spawn(&config, Arc::new(WebSocketTransport::new()), hooks)?;
    manager.connect()?;

    let signal = shutdown_signal().await;
    tracing::info!(?signal, "Shutdown signal received, closing connection");
    manager.close().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
