//! Error taxonomy for transport and manager operations.

use std::time::Duration;
use thiserror::Error;

use crate::config::validation::ValidationError;

/// Errors reported by a [`Transport`](crate::transport::Transport) or one of its connections.
///
/// None of these reach the caller of a manager: connect and listen failures are routed
/// into the retry decision, probe timeouts become bad samples and other probe errors are
/// logged and dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection was not established before the deadline.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Transport-level failure while connecting.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Remote side closed the connection.
    #[error("connection closed with code {code}: {reason}")]
    RemoteClosed { code: u16, reason: String },

    /// Probe acknowledgement did not arrive before the deadline.
    #[error("probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    /// Any other probe failure.
    #[error("probe failed: {0}")]
    Probe(String),

    /// Close handshake did not complete before the deadline.
    #[error("close timed out after {0:?}")]
    CloseTimeout(Duration),
}

impl TransportError {
    /// Returns true for a probe that went unanswered.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::ProbeTimeout(_))
    }

    /// Shorthand for an abnormal closure without a close frame.
    pub fn abnormal_closure(reason: impl Into<String>) -> Self {
        TransportError::RemoteClosed {
            code: 1006,
            reason: reason.into(),
        }
    }
}

/// Errors returned by manager and probe handles.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagerError {
    /// The driver task is gone; no further commands can be processed.
    #[error("manager driver has stopped")]
    Stopped,

    /// The configured endpoint is not a valid URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The configuration violates one or more rules.
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Result type for handle operations.
pub type ManagerResult<T> = Result<T, ManagerError>;
