//! Monitor task group and registry.
//!
//! Each monitor runs in its own tokio task so a panic stays contained. A
//! reaper drains the group's `JoinSet`, records every exit in the
//! [`TaskRegistry`] and forwards it to the supervisor.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::monitor::Monitor;
use crate::observability::metrics;

/// How a monitor task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Stopped,
    Failed(String),
    Panicked(String),
    Aborted,
}

impl TaskOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskOutcome::Stopped => "stopped",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::Panicked(_) => "panicked",
            TaskOutcome::Aborted => "aborted",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskOutcome::Failed(_) | TaskOutcome::Panicked(_))
    }

    fn detail(&self) -> Option<String> {
        match self {
            TaskOutcome::Failed(msg) | TaskOutcome::Panicked(msg) => Some(msg.clone()),
            _ => None,
        }
    }
}

/// A finished monitor task.
#[derive(Debug, Clone)]
pub struct TaskExit {
    pub name: String,
    pub outcome: TaskOutcome,
}

/// Registry entry, serialized by `/api/v1/subsystems`.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub name: String,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Concurrent map of task name to its latest report.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<String, TaskReport>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_start(&self, name: &str) {
        self.tasks.insert(
            name.to_string(),
            TaskReport {
                name: name.to_string(),
                state: "running",
                error: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
    }

    pub fn record_exit(&self, exit: &TaskExit) {
        let now = Utc::now();
        let mut entry = self
            .tasks
            .entry(exit.name.clone())
            .or_insert_with(|| TaskReport {
                name: exit.name.clone(),
                state: "running",
                error: None,
                started_at: now,
                finished_at: None,
            });
        entry.state = exit.outcome.as_str();
        entry.error = exit.outcome.detail();
        entry.finished_at = Some(now);
    }

    pub fn get(&self, name: &str) -> Option<TaskReport> {
        self.tasks.get(name).map(|r| r.value().clone())
    }

    /// All reports, sorted by name.
    pub fn snapshot(&self) -> Vec<TaskReport> {
        let mut reports: Vec<_> = self.tasks.iter().map(|r| r.value().clone()).collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }

    /// Number of tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|r| r.state == "running").count()
    }
}

/// Set of monitor tasks sharing one cancellation token.
pub struct TaskGroup {
    set: JoinSet<TaskExit>,
    registry: TaskRegistry,
}

impl TaskGroup {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            set: JoinSet::new(),
            registry,
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Spawn `monitor.run(shutdown)` in its own task.
    pub fn spawn(&mut self, monitor: Arc<dyn Monitor>, shutdown: CancellationToken) {
        let name = monitor.name().to_string();
        self.registry.record_start(&name);
        tracing::debug!(task = %name, "Spawning monitor");

        let inner = tokio::spawn(async move { monitor.run(shutdown).await });
        self.set.spawn(async move {
            let outcome = match inner.await {
                Ok(Ok(())) => TaskOutcome::Stopped,
                Ok(Err(e)) => TaskOutcome::Failed(e.to_string()),
                Err(e) if e.is_panic() => TaskOutcome::Panicked(panic_message(e.into_panic())),
                Err(_) => TaskOutcome::Aborted,
            };
            TaskExit { name, outcome }
        });
    }

    /// Hand the group to a reaper task.
    ///
    /// The returned receiver yields every exit in completion order. The
    /// reaper keeps running until the last task ends.
    pub fn into_reaper(mut self) -> (JoinHandle<()>, mpsc::UnboundedReceiver<TaskExit>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let registry = self.registry.clone();

        let handle = tokio::spawn(async move {
            while let Some(joined) = self.set.join_next().await {
                let exit = match joined {
                    Ok(exit) => exit,
                    // The wrapper only awaits the inner handle.
                    Err(e) => {
                        tracing::error!(error = %e, "Monitor wrapper task failed");
                        continue;
                    }
                };

                match &exit.outcome {
                    TaskOutcome::Stopped => {
                        tracing::info!(task = %exit.name, "Monitor stopped");
                    }
                    TaskOutcome::Failed(error) => {
                        tracing::error!(task = %exit.name, error = %error, "Monitor failed");
                    }
                    TaskOutcome::Panicked(message) => {
                        tracing::error!(task = %exit.name, panic = %message, "Monitor panicked");
                    }
                    TaskOutcome::Aborted => {
                        tracing::warn!(task = %exit.name, "Monitor aborted");
                    }
                }
                registry.record_exit(&exit);
                metrics::record_task_exit(&exit.name, exit.outcome.as_str());
                let _ = tx.send(exit);
            }
        });
        (handle, rx)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
