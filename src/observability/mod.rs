//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Managers, sessions and the health probe produce:
//!     → logging.rs (structured log events, one span per manager role)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log output (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The library only emits; the binary installs subscriber and exporter
//! - Metrics are cheap (no-ops until a recorder is installed)

pub mod logging;
pub mod metrics;
