//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fleet_monitor_samples_total` (counter): successful samples by subsystem
//! - `fleet_monitor_sample_errors_total` (counter): failed samples by subsystem
//! - `fleet_alerts_total` (counter): alerts by subsystem, severity
//! - `fleet_task_exits_total` (counter): supervised task exits by task, outcome
//! - `fleet_battery_level_percent`, `fleet_cpu_temperature_celsius`,
//!   `fleet_fan_speed` (gauges): latest readings

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::observability::ObservabilityError;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(address: &str) -> Result<(), ObservabilityError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| ObservabilityError::MetricsAddress(address.to_string()))?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_sample(subsystem: &str) {
    counter!("fleet_monitor_samples_total", "subsystem" => subsystem.to_string()).increment(1);
}

pub fn record_sample_error(subsystem: &str) {
    counter!("fleet_monitor_sample_errors_total", "subsystem" => subsystem.to_string()).increment(1);
}

pub fn record_alert(subsystem: &'static str, severity: &'static str) {
    counter!("fleet_alerts_total", "subsystem" => subsystem, "severity" => severity).increment(1);
}

pub fn record_task_exit(task: &str, outcome: &'static str) {
    counter!("fleet_task_exits_total", "task" => task.to_string(), "outcome" => outcome).increment(1);
}

pub fn set_battery_level(percent: f64) {
    gauge!("fleet_battery_level_percent").set(percent);
}

pub fn set_cpu_temperature(celsius: f64) {
    gauge!("fleet_cpu_temperature_celsius").set(celsius);
}

pub fn set_fan_speed(speed: i32) {
    gauge!("fleet_fan_speed").set(f64::from(speed));
}
