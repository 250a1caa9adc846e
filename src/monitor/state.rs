//! Device state synchronization.
//!
//! Keeps a versioned record of the device's identity and liveness that is
//! refreshed on every sync interval.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::monitor::{Monitor, MonitorError, StateCell};
use crate::observability::metrics;

pub const NAME: &str = "state";

/// Versioned device record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: String,
    pub location: String,
    /// Incremented on every sync.
    pub sync_version: u64,
    pub last_sync: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

pub struct StateMonitor {
    started: Instant,
    period: Duration,
    state: StateCell<DeviceState>,
}

impl StateMonitor {
    pub fn new(device_id: &str, location: &str, period: Duration) -> Result<Self, MonitorError> {
        if device_id.is_empty() {
            return Err(MonitorError::Config("state sync requires a device id".into()));
        }
        if period.is_zero() {
            return Err(MonitorError::Config("sync interval must be non-zero".into()));
        }
        Ok(Self {
            started: Instant::now(),
            period,
            state: StateCell::new(DeviceState {
                device_id: device_id.to_string(),
                location: location.to_string(),
                ..DeviceState::default()
            }),
        })
    }

    /// Most recent record.
    pub fn state(&self) -> DeviceState {
        (*self.state.load()).clone()
    }

    /// Refresh the record and bump its version.
    pub fn sync(&self) -> DeviceState {
        let uptime_secs = self.started.elapsed().as_secs();
        self.state.update(|current| DeviceState {
            sync_version: current.sync_version + 1,
            last_sync: Some(Utc::now()),
            uptime_secs,
            ..current.clone()
        });
        let synced = self.state();
        tracing::debug!(
            subsystem = NAME,
            version = synced.sync_version,
            uptime_secs = synced.uptime_secs,
            "Device state synchronized"
        );
        synced
    }
}

#[async_trait]
impl Monitor for StateMonitor {
    fn name(&self) -> &str {
        NAME
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    // Record the final state before exiting.
                    let last = self.sync();
                    tracing::info!(subsystem = NAME, version = last.sync_version, "State manager stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.sync();
                    metrics::record_sample(NAME);
                }
            }
        }
    }
}
