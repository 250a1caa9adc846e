//! Supervisory runtime for an embedded device agent.
//!
//! Starts the power, thermal, security, state and diagnostics monitors,
//! serves health and status over HTTP, and shuts everything down on a
//! shared cancellation token.

// Foundation
pub mod config;
pub mod hw;

// Subsystems
pub mod monitor;
pub mod supervisor;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::AgentConfig;
pub use lifecycle::Shutdown;
pub use monitor::Monitor;
pub use supervisor::{Supervisor, SupervisorError, SystemStatus};
