//! Periodic hardware self-test.
//!
//! Each [`SelfTest`] target reports a list of [`Check`]s. Analog checks take
//! a live reading and require a finite value in a plausible range, so a dead
//! or disconnected sensor shows up here before a monitor loop gives up on it.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::hw::{AnalogInput, GpioController};
use crate::monitor::{
    poll_until_cancelled, Alert, AlertBus, Monitor, MonitorError, Severity, StateCell,
};

pub const NAME: &str = "diagnostics";

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    pub name: String,
    pub error: Option<String>,
}

impl Check {
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: None,
        }
    }

    pub fn fail(name: impl Into<String>, error: impl ToString) -> Self {
        Self {
            name: name.into(),
            error: Some(error.to_string()),
        }
    }
}

/// Hardware that can verify itself on demand.
pub trait SelfTest: Send + Sync {
    /// Component name used to prefix failures.
    fn component(&self) -> &str;

    fn self_test(&self) -> Vec<Check>;
}

/// Read `input` once and require a finite value inside `range`.
pub fn check_input(name: &str, input: &dyn AnalogInput, range: RangeInclusive<f64>) -> Check {
    match input.read() {
        Ok(value) if value.is_finite() && range.contains(&value) => Check::pass(name),
        Ok(value) => Check::fail(
            name,
            format!(
                "reading {value} out of range {}..={}",
                range.start(),
                range.end()
            ),
        ),
        Err(e) => Check::fail(name, e),
    }
}

impl SelfTest for GpioController {
    fn component(&self) -> &str {
        "gpio"
    }

    fn self_test(&self) -> Vec<Check> {
        let pins = self.config();
        [
            ("fan", &pins.fan_pin),
            ("case sensor", &pins.case_sensor),
            ("motion sensor", &pins.motion_sensor),
            ("voltage sensor", &pins.voltage_sensor),
        ]
        .into_iter()
        .map(|(role, pin)| {
            let name = format!("{role} ({pin})");
            match self.read(pin) {
                Ok(_) => Check::pass(name),
                Err(e) => Check::fail(name, e),
            }
        })
        .collect()
    }
}

/// Result of the most recent self-test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub last_run: Option<DateTime<Utc>>,
    pub passed: u32,
    pub failed: u32,
    pub failures: Vec<String>,
}

impl DiagnosticsReport {
    pub fn healthy(&self) -> bool {
        self.failed == 0
    }
}

pub struct DiagnosticsMonitor {
    targets: Vec<Arc<dyn SelfTest>>,
    period: Duration,
    report: StateCell<DiagnosticsReport>,
    alerts: AlertBus,
}

impl DiagnosticsMonitor {
    pub fn new(
        targets: Vec<Arc<dyn SelfTest>>,
        period: Duration,
        alerts: AlertBus,
    ) -> Result<Self, MonitorError> {
        if period.is_zero() {
            return Err(MonitorError::Config("diagnostics interval must be non-zero".into()));
        }
        Ok(Self {
            targets,
            period,
            report: StateCell::default(),
            alerts,
        })
    }

    /// Most recent report.
    pub fn state(&self) -> DiagnosticsReport {
        (*self.report.load()).clone()
    }

    /// Run every target's checks and publish the report.
    ///
    /// A warning alert is raised when the device goes from healthy to failing.
    pub fn run_self_test(&self) -> DiagnosticsReport {
        let mut report = DiagnosticsReport {
            last_run: Some(Utc::now()),
            ..DiagnosticsReport::default()
        };
        for target in &self.targets {
            for check in target.self_test() {
                match check.error {
                    None => report.passed += 1,
                    Some(error) => {
                        report.failed += 1;
                        report
                            .failures
                            .push(format!("{}/{}: {error}", target.component(), check.name));
                    }
                }
            }
        }

        let previous_healthy = self.report.load().healthy();
        self.report.store(report.clone());

        if !report.healthy() && previous_healthy {
            self.alerts.publish(Alert::new(
                NAME,
                Severity::Warning,
                format!("self-test failed: {}", report.failures.join("; ")),
            ));
        }
        tracing::debug!(
            subsystem = NAME,
            passed = report.passed,
            failed = report.failed,
            "Self-test complete"
        );
        report
    }
}

#[async_trait]
impl Monitor for DiagnosticsMonitor {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        poll_until_cancelled(NAME, self.period, &shutdown, || {
            self.run_self_test();
            Ok(())
        })
        .await
    }
}
