//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::AgentConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a TOML file into a config. Missing sections take their defaults.
pub fn load_file(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load configuration: defaults, then the optional file, then `WRALE_*`
/// environment variables. The result is not yet validated so callers can
/// layer command line flags on top before calling [`finalize`].
pub fn load_config(path: Option<&Path>) -> Result<AgentConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => AgentConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Validate a merged config, turning it into the accepted value.
pub fn finalize(config: AgentConfig) -> Result<AgentConfig, ConfigError> {
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply `WRALE_*` overrides using `lookup` to read variables.
///
/// Empty values are ignored. Numeric values that fail to parse leave the
/// current value in place.
pub fn apply_env_overrides<F>(config: &mut AgentConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    let strings: [(&str, &mut String); 16] = [
        ("WRALE_DEVICE_ID", &mut config.device_id),
        ("WRALE_LOCATION", &mut config.location),
        ("WRALE_LOG_LEVEL", &mut config.observability.log_level),
        ("WRALE_LOG_FORMAT", &mut config.observability.log_format),
        ("WRALE_HTTP_ADDR", &mut config.http.bind_address),
        ("WRALE_GPIO_FAN_PIN", &mut config.hardware.gpio.fan_pin),
        ("WRALE_GPIO_CASE_SENSOR", &mut config.hardware.gpio.case_sensor),
        ("WRALE_GPIO_MOTION_SENSOR", &mut config.hardware.gpio.motion_sensor),
        ("WRALE_GPIO_VOLTAGE_SENSOR", &mut config.hardware.gpio.voltage_sensor),
        ("WRALE_POWER_BATTERY_ADC", &mut config.power.battery_adc_path),
        ("WRALE_POWER_VOLTAGE_ADC", &mut config.power.voltage_adc_path),
        ("WRALE_POWER_CURRENT_ADC", &mut config.power.current_adc_path),
        ("WRALE_THERMAL_CPU_PATH", &mut config.thermal.cpu_temp_path),
        ("WRALE_THERMAL_GPU_PATH", &mut config.thermal.gpu_temp_path),
        ("WRALE_THERMAL_AMBIENT_PATH", &mut config.thermal.ambient_temp_path),
        ("WRALE_METRICS_ADDR", &mut config.observability.metrics_address),
    ];
    for (key, slot) in strings {
        if let Some(value) = get(key) {
            *slot = value;
        }
    }

    let floats: [(&str, &mut f64); 5] = [
        ("WRALE_POWER_WARN_LEVEL", &mut config.power.warn_level),
        ("WRALE_POWER_CRITICAL_LEVEL", &mut config.power.critical_level),
        ("WRALE_THERMAL_FAN_THRESHOLD", &mut config.thermal.fan_threshold),
        ("WRALE_THERMAL_WARN_THRESHOLD", &mut config.thermal.warn_threshold),
        ("WRALE_THERMAL_CRITICAL_THRESHOLD", &mut config.thermal.critical_threshold),
    ];
    for (key, slot) in floats {
        parse_into(get(key), slot);
    }

    parse_into(get("WRALE_SHUTDOWN_GRACE_SECS"), &mut config.http.shutdown_grace_secs);
    parse_into(get("WRALE_SIMULATE"), &mut config.hardware.simulate);
    parse_into(get("WRALE_METRICS_ENABLED"), &mut config.observability.metrics_enabled);
}

fn parse_into<T: FromStr>(value: Option<String>, slot: &mut T) {
    if let Some(parsed) = value.and_then(|v| v.trim().parse().ok()) {
        *slot = parsed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_overrides_strings_and_numbers() {
        let vars = env(&[
            ("WRALE_DEVICE_ID", "rack-12"),
            ("WRALE_HTTP_ADDR", "127.0.0.1:9000"),
            ("WRALE_POWER_WARN_LEVEL", "25.5"),
            ("WRALE_SIMULATE", "true"),
        ]);
        let mut config = AgentConfig::default();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned());

        assert_eq!(config.device_id, "rack-12");
        assert_eq!(config.http.bind_address, "127.0.0.1:9000");
        assert_eq!(config.power.warn_level, 25.5);
        assert!(config.hardware.simulate);
    }

    #[test]
    fn unparsable_numbers_keep_current_value() {
        let vars = env(&[
            ("WRALE_THERMAL_CRITICAL_THRESHOLD", "hot"),
            ("WRALE_LOCATION", ""),
        ]);
        let mut config = AgentConfig::default();
        config.location = "lab".into();
        apply_env_overrides(&mut config, |k| vars.get(k).cloned());

        assert_eq!(config.thermal.critical_threshold, 80.0);
        assert_eq!(config.location, "lab");
    }

    #[test]
    fn file_then_finalize() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "device_id = \"from-file\"\n[http]\nbind_address = \"127.0.0.1:0\""
        )
        .unwrap();

        let config = load_file(file.path()).unwrap();
        let config = finalize(config).unwrap();
        assert_eq!(config.device_id, "from-file");
        assert_eq!(config.http.bind_address, "127.0.0.1:0");
    }

    #[test]
    fn finalize_reports_validation_errors() {
        let err = finalize(AgentConfig::default()).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert!(errors.contains(&ValidationError::MissingDeviceId))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
