//! Metrics collection and exposition.
//!
//! # Metrics
//! - `latency_failover_probe_latency_ms` (histogram): round trip by role
//! - `latency_failover_probe_outcomes_total` (counter): good/bad/dropped by role
//! - `latency_failover_connect_attempts_total` (counter): by role and result
//! - `latency_failover_connection_state` (gauge): state code by role
//! - `latency_failover_failovers_total` / `latency_failover_recoveries_total` (counters)
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; exporter installed by the binary
//! - Labels are static strings, no per-endpoint cardinality

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::manager::state::ConnectionState;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe_latency(role: &'static str, elapsed: Duration) {
    metrics::histogram!("latency_failover_probe_latency_ms", "role" => role)
        .record(elapsed.as_secs_f64() * 1000.0);
}

pub fn record_probe_outcome(role: &'static str, outcome: &'static str) {
    metrics::counter!("latency_failover_probe_outcomes_total", "role" => role, "outcome" => outcome)
        .increment(1);
}

pub fn record_connect_attempt(role: &'static str, result: &'static str) {
    metrics::counter!("latency_failover_connect_attempts_total", "role" => role, "result" => result)
        .increment(1);
}

pub fn record_state(role: &'static str, state: ConnectionState) {
    metrics::gauge!("latency_failover_connection_state", "role" => role).set(state.code() as f64);
}

pub fn record_failover() {
    metrics::counter!("latency_failover_failovers_total").increment(1);
}

pub fn record_recovery() {
    metrics::counter!("latency_failover_recoveries_total").increment(1);
}
