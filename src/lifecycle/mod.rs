//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! State machine (state.rs):
//!     Created → Running → ShuttingDown → Stopped
//!                  ↘           ↘
//!                   Failed      Failed
//!
//! Shutdown (shutdown.rs):
//!     Signal received → token cancelled → monitors exit
//!     → HTTP listener drains within the grace period
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     Second SIGTERM/SIGINT → Exit immediately
//! ```
//!
//! # Design Decisions
//! - Ordered startup: hardware first, then managers, then listener
//! - Shutdown has a single bounded attempt, no retries
//! - The started flag has its own lock, never shared with a monitor

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::Shutdown;
pub use state::{Lifecycle, LifecycleState};
