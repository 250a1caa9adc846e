//! HTTP surface of the agent.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (request ID, tracing span)
//!     → server.rs (router, timeout)
//!     → handlers.rs
//!         /health            → static liveness answer
//!         /api/v1/status     → StatusAggregator::status()
//!         /api/v1/subsystems → TaskRegistry::snapshot()
//! ```

pub mod handlers;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
