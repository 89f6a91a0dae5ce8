//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed connect or lost connection is retried
//! - Provide the delay before the next attempt
//!
//! # Design Decisions
//! - The primary retries a bounded number of times, then settles into `Failed`
//! - The health probe retries until it is terminated
//! - The delay is the connection timeout, not an exponential backoff
//! - A disabled retry flag (failover, close) overrides the policy

use std::time::Duration;

/// How many times a manager reconnects after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Never reconnect automatically.
    Never,
    /// Reconnect while fewer than `max_attempts` retries have been made.
    Bounded { max_attempts: u32 },
    /// Reconnect until terminated.
    Unbounded,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then make attempt number `attempt`.
    RetryAfter { delay: Duration, attempt: u32 },
    /// Retries are disabled for now (failover or close in progress).
    Suspended,
    /// The policy is exhausted.
    GiveUp,
}

impl RetryPolicy {
    /// Whether another retry is allowed after `attempts` retries so far.
    pub fn allows(&self, attempts: u32) -> bool {
        match self {
            RetryPolicy::Never => false,
            RetryPolicy::Bounded { max_attempts } => attempts < *max_attempts,
            RetryPolicy::Unbounded => true,
        }
    }

    /// Decide what follows a failure.
    pub fn decide(&self, retry_enabled: bool, attempts: u32, delay: Duration) -> RetryDecision {
        if !retry_enabled {
            return RetryDecision::Suspended;
        }
        if self.allows(attempts) {
            RetryDecision::RetryAfter {
                delay,
                attempt: attempts.saturating_add(1),
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(5);

    #[test]
    fn test_bounded_policy() {
        let policy = RetryPolicy::Bounded { max_attempts: 3 };
        assert_eq!(
            policy.decide(true, 0, DELAY),
            RetryDecision::RetryAfter { delay: DELAY, attempt: 1 }
        );
        assert_eq!(
            policy.decide(true, 2, DELAY),
            RetryDecision::RetryAfter { delay: DELAY, attempt: 3 }
        );
        assert_eq!(policy.decide(true, 3, DELAY), RetryDecision::GiveUp);
    }

    #[test]
    fn test_unbounded_policy_never_gives_up() {
        let policy = RetryPolicy::Unbounded;
        assert!(policy.allows(0));
        assert!(policy.allows(u32::MAX));
        assert_eq!(
            policy.decide(true, u32::MAX, DELAY),
            RetryDecision::RetryAfter { delay: DELAY, attempt: u32::MAX }
        );
    }

    #[test]
    fn test_disabled_retry_suspends() {
        let policy = RetryPolicy::Unbounded;
        assert_eq!(policy.decide(false, 0, DELAY), RetryDecision::Suspended);
    }

    #[test]
    fn test_never_policy() {
        assert_eq!(RetryPolicy::Never.decide(true, 0, DELAY), RetryDecision::GiveUp);
    }
}
