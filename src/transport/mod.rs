//! Transport capability consumed by the connection managers.
//!
//! # Data Flow
//! ```text
//! Transport::open(endpoint, deadline)
//!     → Connection (shared by the probe loop and the drain loop)
//!         probe(deadline)  → round-trip time | ProbeTimeout | Probe error
//!         recv()           → payload ... RemoteClosed { code, reason }
//!         close(deadline)  → closed | CloseTimeout (idempotent)
//! ```
//!
//! # Design Decisions
//! - Object safe (`async-trait`) so managers hold `Arc<dyn Transport>`
//! - Connection methods take `&self`; the two session loops use it concurrently
//! - `recv` must be cancel safe: the drain loop races it against cancellation

pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::TransportError;

pub use websocket::WebSocketTransport;

/// Inbound message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens connections to an endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection, failing with `ConnectTimeout` once `deadline` elapses.
    async fn open(&self, endpoint: &Url, deadline: Duration) -> Result<Arc<dyn Connection>, TransportError>;
}

/// One live duplex connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Send a liveness probe and wait for its acknowledgement.
    ///
    /// Returns the round-trip time, or `ProbeTimeout` when no acknowledgement
    /// arrived within `deadline`.
    async fn probe(&self, deadline: Duration) -> Result<Duration, TransportError>;

    /// Next inbound payload. Remote closure ends the sequence with `RemoteClosed`.
    async fn recv(&self) -> Result<Payload, TransportError>;

    /// Close the connection. Calling it again after success is a no-op.
    async fn close(&self, deadline: Duration) -> Result<(), TransportError>;
}
