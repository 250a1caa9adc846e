//! Composes monitor snapshots into a [`SystemStatus`].
//!
//! Each monitor's snapshot is read atomically. Fields from different
//! monitors may come from different sampling instants.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;

use crate::monitor::{
    diagnostics, state, DiagnosticsMonitor, PowerMonitor, SecurityMonitor, StateMonitor,
    ThermalMonitor,
};
use crate::supervisor::status::{Health, SystemStatus};

/// Monitor handles the aggregator reads from.
pub struct StatusSources {
    pub power: Arc<PowerMonitor>,
    pub thermal: Arc<ThermalMonitor>,
    pub security: Arc<SecurityMonitor>,
    pub state: Option<Arc<StateMonitor>>,
    pub diagnostics: Option<Arc<DiagnosticsMonitor>>,
}

pub struct StatusAggregator {
    device_id: String,
    sources: RwLock<StatusSources>,
}

impl StatusAggregator {
    pub fn new(device_id: impl Into<String>, sources: StatusSources) -> Self {
        Self {
            device_id: device_id.into(),
            sources: RwLock::new(sources),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Current status, stamped with the time of the read.
    pub fn status(&self) -> SystemStatus {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        SystemStatus {
            device_id: self.device_id.clone(),
            time: Utc::now(),
            health: Health {
                power: sources.power.state().into(),
                thermal: sources.thermal.state().into(),
                security: sources.security.state().into(),
                state: sources.state.as_ref().map(|m| m.state()),
                diagnostics: sources.diagnostics.as_ref().map(|m| m.state()),
            },
        }
    }

    /// Stop reporting an optional subsystem.
    ///
    /// Returns `false` for unknown names and for the core subsystems, which
    /// keep reporting their last snapshot.
    pub fn detach(&self, subsystem: &str) -> bool {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        match subsystem {
            state::NAME => sources.state.take().is_some(),
            diagnostics::NAME => sources.diagnostics.take().is_some(),
            _ => false,
        }
    }
}
