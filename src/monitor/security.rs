//! Tamper detection: case switch, motion sensor, supply voltage sense line.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::SecurityConfig;
use crate::hw::GpioController;
use crate::monitor::{
    check_poll_interval, poll_until_cancelled, Alert, AlertBus, Monitor, MonitorError, Severity, StateCell,
};

pub const NAME: &str = "security";

/// Latest tamper sensor sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SecurityState {
    pub case_open: bool,
    pub motion_detected: bool,
    pub voltage_normal: bool,
    pub sampled_at: Option<DateTime<Utc>>,
}

impl Default for SecurityState {
    fn default() -> Self {
        Self {
            case_open: false,
            motion_detected: false,
            voltage_normal: true,
            sampled_at: None,
        }
    }
}

/// Polls the tamper inputs on the GPIO bank.
pub struct SecurityMonitor {
    config: SecurityConfig,
    gpio: Arc<GpioController>,
    state: StateCell<SecurityState>,
    alerts: AlertBus,
}

impl SecurityMonitor {
    pub fn new(
        config: &SecurityConfig,
        gpio: Arc<GpioController>,
        alerts: AlertBus,
    ) -> Result<Self, MonitorError> {
        check_poll_interval(config.poll_interval_ms)?;
        // Every input must be readable before we start relying on it.
        let pins = gpio.config();
        for pin in [&pins.case_sensor, &pins.motion_sensor, &pins.voltage_sensor] {
            gpio.read(pin)?;
        }

        Ok(Self {
            config: config.clone(),
            gpio,
            state: StateCell::default(),
            alerts,
        })
    }

    /// Most recent sample.
    pub fn state(&self) -> SecurityState {
        *self.state.load()
    }

    /// Read the tamper inputs and publish the result.
    pub fn sample(&self) -> Result<SecurityState, MonitorError> {
        let pins = self.gpio.config();
        let sample = SecurityState {
            case_open: self.gpio.read(&pins.case_sensor)?,
            motion_detected: self.gpio.read(&pins.motion_sensor)?,
            voltage_normal: self.gpio.read(&pins.voltage_sensor)?,
            sampled_at: Some(Utc::now()),
        };
        let previous = self.state.load();
        self.state.store(sample);

        self.report_changes(&previous, &sample);
        Ok(sample)
    }

    fn report_changes(&self, previous: &SecurityState, current: &SecurityState) {
        if current.case_open != previous.case_open {
            let alert = if current.case_open {
                Alert::new(NAME, Severity::Critical, "enclosure opened")
            } else {
                Alert::new(NAME, Severity::Info, "enclosure closed")
            };
            self.alerts.publish(alert);
        }
        if current.motion_detected != previous.motion_detected && current.motion_detected {
            self.alerts
                .publish(Alert::new(NAME, Severity::Warning, "motion detected"));
        }
        if current.voltage_normal != previous.voltage_normal {
            let alert = if current.voltage_normal {
                Alert::new(NAME, Severity::Info, "supply voltage restored")
            } else {
                Alert::new(NAME, Severity::Critical, "supply voltage out of range")
            };
            self.alerts.publish(alert);
        }
    }
}

#[async_trait]
impl Monitor for SecurityMonitor {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        let period = Duration::from_millis(self.config.poll_interval_ms);
        poll_until_cancelled(NAME, period, &shutdown, || self.sample().map(|_| ())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpioConfig;

    fn setup() -> (Arc<GpioController>, SecurityMonitor, AlertBus) {
        let gpio = Arc::new(GpioController::new(&GpioConfig::default()).unwrap());
        let bus = AlertBus::default();
        let monitor = SecurityMonitor::new(&SecurityConfig::default(), gpio.clone(), bus.clone()).unwrap();
        (gpio, monitor, bus)
    }

    #[test]
    fn resting_state() {
        let (_, monitor, _) = setup();
        let state = monitor.sample().unwrap();
        assert!(!state.case_open);
        assert!(!state.motion_detected);
        assert!(state.voltage_normal);
    }

    #[test]
    fn tamper_raises_alerts() {
        let (gpio, monitor, bus) = setup();
        let mut rx = bus.subscribe();
        monitor.sample().unwrap();
        assert!(rx.try_recv().is_err());

        gpio.drive("GPIO17", true).unwrap();
        gpio.drive("GPIO27", true).unwrap();
        gpio.drive("GPIO22", false).unwrap();
        let state = monitor.sample().unwrap();
        assert!(state.case_open && state.motion_detected && !state.voltage_normal);

        let messages: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap()).collect();
        assert_eq!(messages[0].message, "enclosure opened");
        assert_eq!(messages[1].severity, Severity::Warning);
        assert_eq!(messages[2].severity, Severity::Critical);

        // Unchanged inputs stay quiet.
        monitor.sample().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
