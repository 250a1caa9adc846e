//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds ordered, intervals > 0)
//! - Detect conflicting GPIO assignments
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::AgentConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("device_id is required")]
    MissingDeviceId,

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("power levels must satisfy 0 <= critical ({critical}) < warn ({warn}) <= 100")]
    PowerLevels { warn: f64, critical: f64 },

    #[error("thermal thresholds must satisfy fan ({fan}) <= warn ({warn}) <= critical ({critical})")]
    ThermalThresholds { fan: f64, warn: f64, critical: f64 },

    #[error("GPIO pin '{0}' is assigned more than once")]
    DuplicatePin(String),

    #[error("unknown log format '{0}' (expected \"pretty\" or \"json\")")]
    LogFormat(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.device_id.trim().is_empty() {
        errors.push(ValidationError::MissingDeviceId);
    }

    if config.http.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.http.bind_address.clone(),
        ));
    }

    let durations = [
        ("http.request_timeout_secs", config.http.request_timeout_secs),
        ("http.shutdown_grace_secs", config.http.shutdown_grace_secs),
        ("power.poll_interval_ms", config.power.poll_interval_ms),
        ("thermal.poll_interval_ms", config.thermal.poll_interval_ms),
        ("security.poll_interval_ms", config.security.poll_interval_ms),
        ("subsystems.state_interval_secs", config.subsystems.state_interval_secs),
        (
            "subsystems.diagnostics_interval_secs",
            config.subsystems.diagnostics_interval_secs,
        ),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    let power = &config.power;
    if !(0.0..=100.0).contains(&power.critical_level)
        || !(0.0..=100.0).contains(&power.warn_level)
        || power.critical_level >= power.warn_level
    {
        errors.push(ValidationError::PowerLevels {
            warn: power.warn_level,
            critical: power.critical_level,
        });
    }

    let thermal = &config.thermal;
    if thermal.fan_threshold > thermal.warn_threshold
        || thermal.warn_threshold > thermal.critical_threshold
    {
        errors.push(ValidationError::ThermalThresholds {
            fan: thermal.fan_threshold,
            warn: thermal.warn_threshold,
            critical: thermal.critical_threshold,
        });
    }

    let gpio = &config.hardware.gpio;
    let mut seen = HashSet::new();
    for pin in [
        &gpio.fan_pin,
        &gpio.case_sensor,
        &gpio.motion_sensor,
        &gpio.voltage_sensor,
    ] {
        if !seen.insert(pin.as_str()) {
            errors.push(ValidationError::DuplicatePin(pin.clone()));
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::LogFormat(other.to_string())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
