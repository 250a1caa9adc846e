//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for log shippers)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields instead of formatted strings
//! - Request ID flows from the HTTP layer into every request span
//! - Metric updates are cheap no-ops until a recorder is installed

use thiserror::Error;

pub mod logging;
pub mod metrics;

/// Error type for observability setup.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("failed to install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}
