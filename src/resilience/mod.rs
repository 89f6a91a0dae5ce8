//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Connect failure / remote closure:
//!     → retries.rs (policy + retry flag → retry after delay, suspend, or give up)
//!     → manager schedules the next attempt or settles into Failed
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every transport call has a deadline
//! - Retry state (attempt counter, enable flag) is owned by each manager

pub mod retries;
