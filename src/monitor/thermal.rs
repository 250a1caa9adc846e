//! Temperature monitoring and fan control.
//!
//! The fan is off below `fan_threshold` and ramps linearly to full speed at
//! `critical_threshold`. At or above critical the device reports itself as
//! throttled. Both are derived from the hotter of the CPU and GPU.

use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::ThermalConfig;
use crate::hw::{open_input, AnalogInput, GpioController, SimulatedInput};
use crate::monitor::diagnostics::{check_input, Check, SelfTest};
use crate::monitor::{
    check_poll_interval, poll_until_cancelled, Alert, AlertBus, Monitor, MonitorError, Severity, StateCell,
};
use crate::observability::metrics;

pub const NAME: &str = "thermal";

/// Thermal zones report millidegrees Celsius.
const MILLI: f64 = 0.001;

/// Readings outside this band (°C) mean a broken zone, not a hot device.
const PLAUSIBLE_TEMP: RangeInclusive<f64> = -40.0..=150.0;

/// Full fan speed.
pub const FAN_MAX: i32 = 100;

/// Latest thermal sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThermalState {
    pub cpu_temp: f64,
    pub gpu_temp: f64,
    pub ambient_temp: f64,
    /// Fan duty, 0–100.
    pub fan_speed: i32,
    pub throttled: bool,
    pub sampled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Normal,
    Warning,
    Critical,
}

/// Samples CPU, GPU and ambient temperatures and drives the fan.
pub struct ThermalMonitor {
    config: ThermalConfig,
    gpio: Arc<GpioController>,
    cpu: Box<dyn AnalogInput>,
    gpu: Box<dyn AnalogInput>,
    ambient: Box<dyn AnalogInput>,
    state: StateCell<ThermalState>,
    band: Mutex<Band>,
    alerts: AlertBus,
}

impl ThermalMonitor {
    pub fn new(
        config: &ThermalConfig,
        gpio: Arc<GpioController>,
        simulate: bool,
        alerts: AlertBus,
    ) -> Result<Self, MonitorError> {
        check_poll_interval(config.poll_interval_ms)?;
        let cpu = open_input(&config.cpu_temp_path, MILLI, simulate, || {
            SimulatedInput::new(48.0, 30.0..=95.0, 1.5)
        })
        .map_err(|source| MonitorError::Sensor { input: "CPU thermal zone", source })?;
        let gpu = open_input(&config.gpu_temp_path, MILLI, simulate, || {
            SimulatedInput::new(44.0, 30.0..=95.0, 1.5)
        })
        .map_err(|source| MonitorError::Sensor { input: "GPU thermal zone", source })?;
        let ambient = open_input(&config.ambient_temp_path, MILLI, simulate, || {
            SimulatedInput::new(24.0, 10.0..=40.0, 0.2)
        })
        .map_err(|source| MonitorError::Sensor { input: "ambient thermal zone", source })?;

        Ok(Self::with_inputs(config.clone(), gpio, cpu, gpu, ambient, alerts))
    }

    pub fn with_inputs(
        config: ThermalConfig,
        gpio: Arc<GpioController>,
        cpu: Box<dyn AnalogInput>,
        gpu: Box<dyn AnalogInput>,
        ambient: Box<dyn AnalogInput>,
        alerts: AlertBus,
    ) -> Self {
        Self {
            config,
            gpio,
            cpu,
            gpu,
            ambient,
            state: StateCell::default(),
            band: Mutex::new(Band::Normal),
            alerts,
        }
    }

    /// Most recent sample.
    pub fn state(&self) -> ThermalState {
        *self.state.load()
    }

    /// Fan duty for a given peak temperature.
    pub fn fan_speed_for(&self, peak: f64) -> i32 {
        let ThermalConfig {
            fan_threshold,
            critical_threshold,
            ..
        } = self.config;
        if peak < fan_threshold {
            return 0;
        }
        if critical_threshold <= fan_threshold || peak >= critical_threshold {
            return FAN_MAX;
        }
        let ratio = (peak - fan_threshold) / (critical_threshold - fan_threshold);
        ((ratio * FAN_MAX as f64).round() as i32).clamp(1, FAN_MAX)
    }

    /// Take one sample, drive the fan and publish the state.
    pub fn sample(&self) -> Result<ThermalState, MonitorError> {
        let read = |input: &dyn AnalogInput, name: &'static str| {
            input
                .read()
                .map_err(|source| MonitorError::Sensor { input: name, source })
        };
        let cpu_temp = read(self.cpu.as_ref(), "CPU thermal zone")?;
        let gpu_temp = read(self.gpu.as_ref(), "GPU thermal zone")?;
        let ambient_temp = read(self.ambient.as_ref(), "ambient thermal zone")?;

        let peak = cpu_temp.max(gpu_temp);
        let fan_speed = self.fan_speed_for(peak);
        self.gpio.write(self.fan_pin(), fan_speed > 0)?;

        let sample = ThermalState {
            cpu_temp,
            gpu_temp,
            ambient_temp,
            fan_speed,
            throttled: peak >= self.config.critical_threshold,
            sampled_at: Some(Utc::now()),
        };
        self.state.store(sample);
        metrics::set_cpu_temperature(cpu_temp);
        metrics::set_fan_speed(fan_speed);

        self.check_band(peak);
        Ok(sample)
    }

    fn fan_pin(&self) -> &str {
        &self.gpio.config().fan_pin
    }

    fn check_band(&self, peak: f64) {
        let band = if peak >= self.config.critical_threshold {
            Band::Critical
        } else if peak >= self.config.warn_threshold {
            Band::Warning
        } else {
            Band::Normal
        };
        let previous = {
            let mut current = self.band.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, band)
        };
        if band == previous {
            return;
        }

        let (severity, message) = match band {
            Band::Critical => (Severity::Critical, format!("temperature critical at {peak:.1}°C, throttling")),
            Band::Warning => (Severity::Warning, format!("temperature high at {peak:.1}°C")),
            Band::Normal => (Severity::Info, format!("temperature back to normal at {peak:.1}°C")),
        };
        self.alerts.publish(Alert::new(NAME, severity, message));
    }
}

impl SelfTest for ThermalMonitor {
    fn component(&self) -> &str {
        NAME
    }

    fn self_test(&self) -> Vec<Check> {
        vec![
            check_input("CPU thermal zone", self.cpu.as_ref(), PLAUSIBLE_TEMP),
            check_input("GPU thermal zone", self.gpu.as_ref(), PLAUSIBLE_TEMP),
            check_input("ambient thermal zone", self.ambient.as_ref(), PLAUSIBLE_TEMP),
        ]
    }
}

#[async_trait]
impl Monitor for ThermalMonitor {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        let period = Duration::from_millis(self.config.poll_interval_ms);
        let result = poll_until_cancelled(NAME, period, &shutdown, || self.sample().map(|_| ())).await;

        // Leave the fan in a safe state once monitoring stops.
        if let Err(e) = self.gpio.write(self.fan_pin(), true) {
            tracing::warn!(subsystem = NAME, error = %e, "Failed to park fan");
        }
        result
    }
}
