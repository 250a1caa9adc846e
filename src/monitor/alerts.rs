//! Alert notifications raised by monitors.
//!
//! # Delivery Contract
//! - Publishing never blocks and never fails the publisher
//! - Alerts with no subscriber are dropped
//! - A subscriber that falls behind skips the oldest alerts

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::observability::metrics;

/// Default number of alerts buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 64;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// A single alert.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub subsystem: &'static str,
    pub severity: Severity,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl Alert {
    pub fn new(subsystem: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            subsystem,
            severity,
            message: message.into(),
            time: Utc::now(),
        }
    }
}

/// Broadcast channel carrying alerts from monitors to listeners.
#[derive(Debug, Clone)]
pub struct AlertBus {
    tx: broadcast::Sender<Alert>,
}

impl AlertBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an alert. Returns how many subscribers will see it.
    pub fn publish(&self, alert: Alert) -> usize {
        metrics::record_alert(alert.subsystem, alert.severity.as_str());
        self.tx.send(alert).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
