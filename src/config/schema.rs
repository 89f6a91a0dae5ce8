//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::health::window::Polarity;
use crate::resilience::retries::RetryPolicy;

/// Root configuration for the connection manager.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint URL (e.g., "ws://127.0.0.1:9001/").
    pub endpoint: String,

    /// Primary connection settings.
    pub primary: PrimaryConfig,

    /// Health probe settings, used while failover is active.
    pub health_probe: HealthProbeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:9001/".to_string(),
            primary: PrimaryConfig::default(),
            health_probe: HealthProbeConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Primary connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrimaryConfig {
    /// Retry after a failed connect or a lost connection.
    pub retry_enabled: bool,

    /// Maximum number of retries before settling into `Failed`.
    pub max_retry_attempts: u32,

    /// Probe latency at or above this many milliseconds counts as bad.
    pub latency_threshold_ms: u64,

    /// Number of samples in the sliding window.
    pub window_size: usize,

    /// Bad samples in a full window that trigger failover.
    pub min_bad_count: usize,

    /// Seconds between probes.
    pub probe_interval_secs: u64,

    /// Milliseconds to wait for a probe acknowledgement.
    pub probe_timeout_ms: u64,

    /// Connection establishment timeout, also used as the retry delay.
    pub connection_timeout_secs: u64,

    /// Bound on waiting for a graceful close.
    pub close_timeout_ms: u64,

    /// Hand monitoring to a health probe on sustained bad latency.
    pub failover_enabled: bool,
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            retry_enabled: true,
            max_retry_attempts: 3,
            latency_threshold_ms: 200,
            window_size: 10,
            min_bad_count: 7,
            probe_interval_secs: 1,
            probe_timeout_ms: 200,
            connection_timeout_secs: 5,
            close_timeout_ms: 2000,
            failover_enabled: true,
        }
    }
}

impl PrimaryConfig {
    /// Session timings for the primary connection.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            probe_interval: Duration::from_secs(self.probe_interval_secs),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            latency_threshold: Duration::from_millis(self.latency_threshold_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        }
    }

    /// Retry policy for the primary: bounded, or none when retry is disabled.
    pub fn retry_policy(&self) -> RetryPolicy {
        if self.retry_enabled {
            RetryPolicy::Bounded {
                max_attempts: self.max_retry_attempts,
            }
        } else {
            RetryPolicy::Never
        }
    }

    /// The primary watches for sustained bad latency.
    pub fn polarity(&self) -> Polarity {
        Polarity::Bad {
            min_count: self.min_bad_count,
        }
    }
}

/// Health probe configuration.
///
/// Probe interval, probe timeout and close timeout are inherited from the primary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthProbeConfig {
    /// Probe latency at or above this many milliseconds counts as bad.
    pub latency_threshold_ms: u64,

    /// Number of samples in the sliding window.
    pub window_size: usize,

    /// Good samples in a full window that signal recovery.
    pub min_good_count: usize,

    /// Connection establishment timeout, also used as the retry delay.
    pub connection_timeout_secs: u64,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            latency_threshold_ms: 200,
            window_size: 10,
            min_good_count: 7,
            connection_timeout_secs: 5,
        }
    }
}

impl HealthProbeConfig {
    /// Session timings for the probe, inheriting probe cadence from the primary.
    pub fn session_settings(&self, primary: &PrimaryConfig) -> SessionSettings {
        SessionSettings {
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
            probe_interval: Duration::from_secs(primary.probe_interval_secs),
            probe_timeout: Duration::from_millis(primary.probe_timeout_ms),
            latency_threshold: Duration::from_millis(self.latency_threshold_ms),
            close_timeout: Duration::from_millis(primary.close_timeout_ms),
        }
    }

    /// The probe looks for sustained good latency.
    pub fn polarity(&self) -> Polarity {
        Polarity::Good {
            min_count: self.min_good_count,
        }
    }
}

/// Immutable timings of one connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub connection_timeout: Duration,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub latency_threshold: Duration,
    pub close_timeout: Duration,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
