//! Connection management subsystem.
//!
//! # Data Flow
//! ```text
//! PrimaryManager (handle) ──commands──▶ driver task
//!     driver task owns Supervisor:
//!         connect attempt ─▶ ConnectionSession ─samples─▶ LatencyWindow ─▶ verdict
//!         connect failure / remote closure ─▶ RetryPolicy ─▶ retry or Failed
//!     Unhealthy verdict ─▶ failover ─▶ HealthProbe (own session + window)
//!     HealthProbe recovery ─▶ refresh ─▶ terminate probe ─▶ connect
//! ```
//!
//! # Design Decisions
//! - A single driver task per manager serialises all state changes
//! - Sessions are torn down (loops joined) before any replacement starts
//! - Transport failures never reach the caller; only state transitions do

pub mod primary;
pub mod state;
pub(crate) mod supervisor;

pub use primary::{Hooks, PrimaryManager};
pub use state::{ConnectionState, ManagerSnapshot};
