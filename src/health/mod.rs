//! Latency health subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionSession (session.rs):
//!     probe loop → Outcome (Good/Bad) → owner's LatencyWindow
//!     drain loop → on_message hook, Closed on remote closure
//!
//! LatencyWindow (window.rs):
//!     last window_size outcomes → NoVerdict | Healthy | Unhealthy
//!
//! HealthProbe (probe.rs):
//!     own session + Good-polarity window → recovery callback
//! ```
//!
//! # Design Decisions
//! - A probe timeout is a bad sample; other probe errors are dropped
//! - Primary and probe share one window type with opposite polarity

pub mod probe;
pub mod session;
pub mod window;

pub use probe::{HealthProbe, RecoveryHook};
pub use session::{ConnectionSession, MessageHook, SessionEvent};
pub use window::{LatencyWindow, Outcome, Polarity, Verdict};
