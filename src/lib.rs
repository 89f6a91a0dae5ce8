//! Latency-aware connection manager with health-probe failover.
//!
//! Keeps a long-lived duplex connection up despite transient failures, measures
//! round-trip latency continuously, and hands monitoring to an independent health
//! probe when latency stays degraded, returning to the primary once it recovers.

pub mod config;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod manager;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use config::schema::ClientConfig;
pub use error::{ManagerError, TransportError};
pub use health::HealthProbe;
pub use manager::{ConnectionState, Hooks, ManagerSnapshot, PrimaryManager};
pub use transport::{Connection, Payload, Transport, WebSocketTransport};
