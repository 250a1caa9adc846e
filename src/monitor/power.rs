//! Battery and supply monitoring.

use std::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::PowerConfig;
use crate::hw::{open_input, AnalogInput, SimulatedInput};
use crate::monitor::diagnostics::{check_input, Check, SelfTest};
use crate::monitor::{
    check_poll_interval, poll_until_cancelled, Alert, AlertBus, Monitor, MonitorError, Severity, StateCell,
};
use crate::observability::metrics;

pub const NAME: &str = "power";

/// Supply voltage (V) a healthy ADC can report.
const PLAUSIBLE_VOLTAGE: RangeInclusive<f64> = 0.0..=30.0;
/// Charge or discharge current (A) a healthy ADC can report.
const PLAUSIBLE_CURRENT: RangeInclusive<f64> = -20.0..=20.0;

/// Latest power sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PowerState {
    /// Battery charge, 0–100 %.
    pub battery_level: f64,
    pub charging: bool,
    /// Supply voltage in volts.
    pub voltage: f64,
    pub sampled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Normal,
    Warning,
    Critical,
}

/// Samples battery level, supply voltage and charge current.
pub struct PowerMonitor {
    config: PowerConfig,
    battery: Box<dyn AnalogInput>,
    voltage: Box<dyn AnalogInput>,
    current: Box<dyn AnalogInput>,
    state: StateCell<PowerState>,
    band: Mutex<Band>,
    alerts: AlertBus,
}

impl PowerMonitor {
    /// Open the configured ADC channels (or simulated ones).
    pub fn new(config: &PowerConfig, simulate: bool, alerts: AlertBus) -> Result<Self, MonitorError> {
        check_poll_interval(config.poll_interval_ms)?;
        let battery = open_input(&config.battery_adc_path, 1.0, simulate, || {
            SimulatedInput::new(85.0, 0.0..=100.0, 0.5)
        })
        .map_err(|source| MonitorError::Sensor { input: "battery ADC", source })?;
        let voltage = open_input(&config.voltage_adc_path, 1.0, simulate, || {
            SimulatedInput::new(12.0, 11.0..=13.0, 0.05)
        })
        .map_err(|source| MonitorError::Sensor { input: "voltage ADC", source })?;
        let current = open_input(&config.current_adc_path, 1.0, simulate, || {
            SimulatedInput::new(0.2, -1.0..=1.0, 0.1)
        })
        .map_err(|source| MonitorError::Sensor { input: "current ADC", source })?;

        Ok(Self::with_inputs(config.clone(), battery, voltage, current, alerts))
    }

    /// Build from explicit inputs.
    pub fn with_inputs(
        config: PowerConfig,
        battery: Box<dyn AnalogInput>,
        voltage: Box<dyn AnalogInput>,
        current: Box<dyn AnalogInput>,
        alerts: AlertBus,
    ) -> Self {
        Self {
            config,
            battery,
            voltage,
            current,
            state: StateCell::default(),
            band: Mutex::new(Band::Normal),
            alerts,
        }
    }

    /// Most recent sample.
    pub fn state(&self) -> PowerState {
        *self.state.load()
    }

    /// Take one sample and publish it.
    pub fn sample(&self) -> Result<PowerState, MonitorError> {
        let read = |input: &dyn AnalogInput, name: &'static str| {
            input
                .read()
                .map_err(|source| MonitorError::Sensor { input: name, source })
        };
        let battery_level = read(self.battery.as_ref(), "battery ADC")?.clamp(0.0, 100.0);
        let voltage = read(self.voltage.as_ref(), "voltage ADC")?;
        let current = read(self.current.as_ref(), "current ADC")?;

        let sample = PowerState {
            battery_level,
            charging: current > 0.0,
            voltage,
            sampled_at: Some(Utc::now()),
        };
        self.state.store(sample);
        metrics::set_battery_level(battery_level);

        self.check_band(&sample);
        Ok(sample)
    }

    fn band_for(&self, level: f64) -> Band {
        if level <= self.config.critical_level {
            Band::Critical
        } else if level <= self.config.warn_level {
            Band::Warning
        } else {
            Band::Normal
        }
    }

    fn check_band(&self, sample: &PowerState) {
        let band = self.band_for(sample.battery_level);
        let previous = {
            let mut current = self.band.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, band)
        };
        if band == previous {
            return;
        }

        let alert = match band {
            Band::Critical => Alert::new(
                NAME,
                Severity::Critical,
                format!("battery critical at {:.1}%", sample.battery_level),
            ),
            Band::Warning => Alert::new(
                NAME,
                Severity::Warning,
                format!("battery low at {:.1}%", sample.battery_level),
            ),
            Band::Normal => Alert::new(
                NAME,
                Severity::Info,
                format!("battery recovered to {:.1}%", sample.battery_level),
            ),
        };
        self.alerts.publish(alert);
    }
}

impl SelfTest for PowerMonitor {
    fn component(&self) -> &str {
        NAME
    }

    fn self_test(&self) -> Vec<Check> {
        vec![
            check_input("battery ADC", self.battery.as_ref(), 0.0..=100.0),
            check_input("voltage ADC", self.voltage.as_ref(), PLAUSIBLE_VOLTAGE),
            check_input("current ADC", self.current.as_ref(), PLAUSIBLE_CURRENT),
        ]
    }
}

#[async_trait]
impl Monitor for PowerMonitor {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        let period = Duration::from_millis(self.config.poll_interval_ms);
        poll_until_cancelled(NAME, period, &shutdown, || self.sample().map(|_| ())).await
    }
}
