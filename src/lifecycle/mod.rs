//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary closes the manager gracefully → exit
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: close primary session, stop health probe, exit
//! - Close waits are bounded by the configured close timeout

pub mod signals;

pub use signals::shutdown_signal;
