//! Subsystem monitors.
//!
//! # Data Flow
//! ```text
//! Supervisor spawns one task per monitor:
//!     Monitor::run(shutdown token)
//!     → interval tick → sample hardware
//!     → publish snapshot into cell.rs (StateCell, lock-free)
//!     → band change → alerts.rs (AlertBus, broadcast)
//!
//! StatusAggregator / HTTP:
//!     monitor.state() → Arc<snapshot> (never blocks, never torn)
//! ```
//!
//! # Design Decisions
//! - Cancellation is cooperative: every loop selects on the shared token
//! - Transient sensor errors keep the previous snapshot; the loop continues
//! - Persistent faults (GPIO misconfiguration) end the task with an error
//! - Alerts are edge-triggered and never sent while holding a lock

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::hw::GpioError;
use crate::observability::metrics;

pub mod alerts;
pub mod cell;
pub mod diagnostics;
pub mod power;
pub mod security;
pub mod state;
pub mod thermal;

pub use alerts::{Alert, AlertBus, Severity};
pub use cell::StateCell;
pub use diagnostics::{Check, DiagnosticsMonitor, DiagnosticsReport, SelfTest};
pub use power::{PowerMonitor, PowerState};
pub use security::{SecurityMonitor, SecurityState};
pub use state::{DeviceState, StateMonitor};
pub use thermal::{ThermalMonitor, ThermalState};

/// Error type for monitor construction and monitoring loops.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to read {input}: {source}")]
    Sensor {
        input: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),

    #[error("invalid monitor configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Fault(String),
}

impl MonitorError {
    /// Whether the loop should keep going after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, MonitorError::Sensor { .. })
    }
}

/// A long-running subsystem monitor.
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Subsystem name used in logs, metrics and the task registry.
    fn name(&self) -> &str;

    /// Run until `shutdown` is cancelled.
    ///
    /// Returns `Ok(())` on a clean stop and an error on an internal failure.
    async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError>;
}

/// Reject a zero polling interval.
pub(crate) fn check_poll_interval(interval_ms: u64) -> Result<Duration, MonitorError> {
    if interval_ms == 0 {
        return Err(MonitorError::Config("poll interval must be non-zero".into()));
    }
    Ok(Duration::from_millis(interval_ms))
}

/// Drive `sample` every `period` until the token is cancelled.
///
/// Transient errors are logged and counted; anything else ends the loop.
pub(crate) async fn poll_until_cancelled<F>(
    name: &str,
    period: Duration,
    shutdown: &CancellationToken,
    mut sample: F,
) -> Result<(), MonitorError>
where
    F: FnMut() -> Result<(), MonitorError>,
{
    if period.is_zero() {
        return Err(MonitorError::Config(format!("{name}: poll interval must be non-zero")));
    }
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(subsystem = name, period_ms = period.as_millis() as u64, "Monitor starting");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!(subsystem = name, "Monitor received shutdown signal, exiting loop");
                return Ok(());
            }
            _ = ticker.tick() => {
                match sample() {
                    Ok(()) => metrics::record_sample(name),
                    Err(e) if e.is_transient() => {
                        metrics::record_sample_error(name);
                        tracing::warn!(subsystem = name, error = %e, "Sample failed, keeping previous state");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn poll_loop_stops_on_cancel() {
        let token = CancellationToken::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let t = token.clone();

        let handle = tokio::spawn(async move {
            poll_until_cancelled("test", Duration::from_millis(5), &t, || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn poll_loop_survives_transient_errors() {
        let token = CancellationToken::new();
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let t = token.clone();

        let handle = tokio::spawn(async move {
            poll_until_cancelled("test", Duration::from_millis(5), &t, || {
                c.fetch_add(1, Ordering::SeqCst);
                Err(MonitorError::Sensor {
                    input: "probe",
                    source: std::io::Error::other("unplugged"),
                })
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!handle.is_finished());
        token.cancel();
        assert!(handle.await.unwrap().is_ok());
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn poll_loop_rejects_zero_period() {
        let token = CancellationToken::new();
        let result = poll_until_cancelled("test", Duration::ZERO, &token, || Ok(())).await;
        assert!(matches!(result, Err(MonitorError::Config(_))));
        assert!(check_poll_interval(0).is_err());
        assert_eq!(check_poll_interval(250).unwrap(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn poll_loop_returns_persistent_errors() {
        let token = CancellationToken::new();
        let result = poll_until_cancelled("test", Duration::from_millis(5), &token, || {
            Err(MonitorError::Gpio(GpioError::UnknownPin("GPIO4".into())))
        })
        .await;
        assert!(matches!(result, Err(MonitorError::Gpio(_))));
    }
}
