//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the device agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Unique device identifier. Required.
    pub device_id: String,

    /// Free-form physical location label.
    pub location: String,

    /// HTTP listener settings.
    pub http: HttpConfig,

    /// Hardware access settings (GPIO, simulation).
    pub hardware: HardwareConfig,

    /// Power monitor settings.
    pub power: PowerConfig,

    /// Thermal monitor settings.
    pub thermal: ThermalConfig,

    /// Security (tamper) monitor settings.
    pub security: SecurityConfig,

    /// Optional subsystems.
    pub subsystems: SubsystemsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl AgentConfig {
    /// Defaults with the given device identifier.
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Self::default()
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Time allowed for in-flight requests to finish on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 10,
            shutdown_grace_secs: 30,
        }
    }
}

/// Hardware access configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HardwareConfig {
    /// Replace sysfs-backed inputs with simulated ones.
    pub simulate: bool,

    /// GPIO pin assignment.
    pub gpio: GpioConfig,
}

/// GPIO pin assignment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GpioConfig {
    pub fan_pin: String,
    pub case_sensor: String,
    pub motion_sensor: String,
    pub voltage_sensor: String,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            fan_pin: "GPIO18".to_string(),
            case_sensor: "GPIO17".to_string(),
            motion_sensor: "GPIO27".to_string(),
            voltage_sensor: "GPIO22".to_string(),
        }
    }
}

/// Power management configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PowerConfig {
    /// ADC reporting battery charge in percent.
    pub battery_adc_path: String,

    /// ADC reporting supply voltage in volts.
    pub voltage_adc_path: String,

    /// ADC reporting battery current in amps (positive while charging).
    pub current_adc_path: String,

    /// Battery percentage at which a warning is raised.
    pub warn_level: f64,

    /// Battery percentage at which a critical alert is raised.
    pub critical_level: f64,

    /// Sampling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            battery_adc_path: "/sys/bus/iio/devices/iio:device0".to_string(),
            voltage_adc_path: "/sys/bus/iio/devices/iio:device1".to_string(),
            current_adc_path: "/sys/bus/iio/devices/iio:device2".to_string(),
            warn_level: 20.0,
            critical_level: 10.0,
            poll_interval_ms: 1000,
        }
    }
}

/// Thermal management configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThermalConfig {
    pub cpu_temp_path: String,
    pub gpu_temp_path: String,
    pub ambient_temp_path: String,

    /// CPU temperature (°C) at which the fan starts.
    pub fan_threshold: f64,

    /// Temperature (°C) at which a warning is raised.
    pub warn_threshold: f64,

    /// Temperature (°C) at which the device throttles.
    pub critical_threshold: f64,

    /// Sampling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            cpu_temp_path: "/sys/class/thermal/thermal_zone0/temp".to_string(),
            gpu_temp_path: "/sys/class/thermal/thermal_zone1/temp".to_string(),
            ambient_temp_path: "/sys/class/thermal/thermal_zone2/temp".to_string(),
            fan_threshold: 60.0,
            warn_threshold: 70.0,
            critical_threshold: 80.0,
            poll_interval_ms: 1000,
        }
    }
}

/// Tamper detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Sensor polling interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
        }
    }
}

/// Optional subsystem toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubsystemsConfig {
    /// Run the state synchronization monitor.
    pub state: bool,

    /// Run the diagnostics monitor.
    pub diagnostics: bool,

    pub state_interval_secs: u64,
    pub diagnostics_interval_secs: u64,
}

impl Default for SubsystemsConfig {
    fn default() -> Self {
        Self {
            state: true,
            diagnostics: true,
            state_interval_secs: 30,
            diagnostics_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Metrics exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_hardware() {
        let config = AgentConfig::default();
        assert_eq!(config.http.bind_address, "0.0.0.0:8080");
        assert_eq!(config.http.shutdown_grace_secs, 30);
        assert_eq!(config.hardware.gpio.fan_pin, "GPIO18");
        assert_eq!(config.power.warn_level, 20.0);
        assert_eq!(config.thermal.critical_threshold, 80.0);
        assert!(!config.hardware.simulate);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
            device_id = "edge-7"

            [thermal]
            fan_threshold = 55.0
            "#,
        )
        .unwrap();

        assert_eq!(config.device_id, "edge-7");
        assert_eq!(config.thermal.fan_threshold, 55.0);
        assert_eq!(config.thermal.warn_threshold, 70.0);
        assert_eq!(config.power.poll_interval_ms, 1000);
    }
}
