//! Connection state machine.
//!
//! # States
//! - Idle: created, never connected
//! - Connecting: transport open in flight
//! - Connected: one live session, probe and drain loops running
//! - Disconnected: no session; a retry may be scheduled, or failover is active
//! - Failed: bounded retries exhausted; rests until `connect()` is called
//!
//! # State Transitions
//! ```text
//! Idle/Disconnected/Failed → Connecting: connect() or retry due
//! Connecting → Connected: transport open succeeded
//! Connecting → Disconnected: open failed, retry scheduled or suspended
//! Connected → Disconnected: remote closure, failover, or close()
//! Disconnected → Failed: retry policy exhausted
//! ```

use std::fmt;

/// State of a manager's logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl ConnectionState {
    /// Numeric code exported as a gauge.
    pub fn code(self) -> u8 {
        match self {
            ConnectionState::Idle => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Disconnected => 3,
            ConnectionState::Failed => 4,
        }
    }

    /// States from which `connect()` starts a new attempt.
    pub fn can_connect(self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::Disconnected | ConnectionState::Failed
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a manager, for callers and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSnapshot {
    pub state: ConnectionState,
    /// Retries made since the last successful connect or refresh.
    pub attempts: u32,
    pub window_len: usize,
    pub bad_count: usize,
    pub retry_enabled: bool,
    /// True while a health probe watches the endpoint in place of the primary.
    pub failover_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectable_states() {
        assert!(ConnectionState::Idle.can_connect());
        assert!(ConnectionState::Failed.can_connect());
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
        assert!(!ConnectionState::Connected.can_connect());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Failed.to_string(), "failed");
        assert_eq!(ConnectionState::Connected.code(), 2);
    }
}
