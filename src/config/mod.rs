//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → WRALE_* environment overrides (loader.rs)
//!     → command line flags (main.rs)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → handed to Supervisor::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once accepted; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::ConfigError;
pub use schema::{
    AgentConfig, GpioConfig, HardwareConfig, HttpConfig, ObservabilityConfig, PowerConfig,
    SecurityConfig, SubsystemsConfig, ThermalConfig,
};
pub use validation::ValidationError;
