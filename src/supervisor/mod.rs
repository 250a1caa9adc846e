//! Top-level supervisor.
//!
//! # Data Flow
//! ```text
//! Supervisor::new(config)
//!     → GPIO bank → power → thermal → security → [state] → [diagnostics]
//!     (first failure aborts construction)
//!
//! Supervisor::run(token)
//!     → lifecycle Created → Running (at most once)
//!     → bind listener
//!     → tasks.rs: one task per monitor, reaper records exits
//!     → alert logger
//!     → http::HttpServer::serve
//!     → token cancelled → ShuttingDown
//!     → drain HTTP within grace → Stopped | Failed
//! ```
//!
//! # Design Decisions
//! - The token is shared with every task; the supervisor never owns it
//! - Monitor exits never stop the supervisor; they are logged and recorded
//! - Monitor tasks are not awaited on shutdown, only the HTTP drain is bounded

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::hw::GpioController;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::monitor::{
    Alert, AlertBus, DiagnosticsMonitor, Monitor, MonitorError, PowerMonitor, SecurityMonitor,
    SelfTest, Severity, StateMonitor, ThermalMonitor,
};

pub mod aggregator;
pub mod status;
pub mod tasks;

pub use aggregator::{StatusAggregator, StatusSources};
pub use status::{Health, PowerHealth, SecurityHealth, SystemStatus, ThermalHealth};
pub use tasks::{TaskExit, TaskGroup, TaskOutcome, TaskRegistry, TaskReport};

/// Errors from constructing or running the supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("device ID is required")]
    MissingDeviceId,

    #[error("failed to initialize {subsystem}: {source}")]
    Subsystem {
        subsystem: &'static str,
        #[source]
        source: MonitorError,
    },

    #[error("supervisor already started (state: {0:?})")]
    AlreadyStarted(LifecycleState),

    #[error("failed to bind HTTP listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP server did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

fn init_err(subsystem: &'static str) -> impl FnOnce(MonitorError) -> SupervisorError {
    move |source| SupervisorError::Subsystem { subsystem, source }
}

/// Owns every subsystem and runs them under one cancellation token.
pub struct Supervisor {
    config: AgentConfig,
    gpio: Arc<GpioController>,
    alerts: AlertBus,
    monitors: Vec<Arc<dyn Monitor>>,
    aggregator: Arc<StatusAggregator>,
    registry: TaskRegistry,
    server: HttpServer,
    lifecycle: Lifecycle,
    local_addr: watch::Sender<Option<SocketAddr>>,
    bind_attempts: AtomicUsize,
}

impl Supervisor {
    /// Construct every subsystem in dependency order.
    pub fn new(config: AgentConfig) -> Result<Self, SupervisorError> {
        if config.device_id.trim().is_empty() {
            return Err(SupervisorError::MissingDeviceId);
        }

        let simulate = config.hardware.simulate;
        let alerts = AlertBus::default();

        let gpio = GpioController::new(&config.hardware.gpio)
            .map(Arc::new)
            .map_err(|e| SupervisorError::Subsystem {
                subsystem: "gpio",
                source: e.into(),
            })?;

        let power = PowerMonitor::new(&config.power, simulate, alerts.clone())
            .map(Arc::new)
            .map_err(init_err("power"))?;

        let thermal = ThermalMonitor::new(&config.thermal, gpio.clone(), simulate, alerts.clone())
            .map(Arc::new)
            .map_err(init_err("thermal"))?;

        let security = SecurityMonitor::new(&config.security, gpio.clone(), alerts.clone())
            .map(Arc::new)
            .map_err(init_err("security"))?;

        let state = if config.subsystems.state {
            let period = Duration::from_secs(config.subsystems.state_interval_secs);
            let monitor = StateMonitor::new(&config.device_id, &config.location, period)
                .map_err(init_err("state"))?;
            Some(Arc::new(monitor))
        } else {
            None
        };

        let diagnostics = if config.subsystems.diagnostics {
            let period = Duration::from_secs(config.subsystems.diagnostics_interval_secs);
            let targets: Vec<Arc<dyn SelfTest>> = vec![
                gpio.clone() as Arc<dyn SelfTest>,
                power.clone(),
                thermal.clone(),
            ];
            let monitor = DiagnosticsMonitor::new(targets, period, alerts.clone())
                .map_err(init_err("diagnostics"))?;
            Some(Arc::new(monitor))
        } else {
            None
        };

        let mut monitors: Vec<Arc<dyn Monitor>> =
            vec![power.clone(), thermal.clone(), security.clone()];
        if let Some(m) = &state {
            monitors.push(m.clone());
        }
        if let Some(m) = &diagnostics {
            monitors.push(m.clone());
        }

        let aggregator = Arc::new(StatusAggregator::new(
            config.device_id.clone(),
            StatusSources {
                power,
                thermal,
                security,
                state,
                diagnostics,
            },
        ));
        let registry = TaskRegistry::new();
        let server = HttpServer::new(
            AppState {
                aggregator: aggregator.clone(),
                registry: registry.clone(),
            },
            &config.http,
        );

        tracing::info!(
            device_id = %config.device_id,
            simulate,
            subsystems = monitors.len(),
            "Supervisor initialized"
        );

        Ok(Self {
            config,
            gpio,
            alerts,
            monitors,
            aggregator,
            registry,
            server,
            lifecycle: Lifecycle::new(),
            local_addr: watch::Sender::new(None),
            bind_attempts: AtomicUsize::new(0),
        })
    }

    /// Add a monitor to be started by [`run`](Self::run).
    pub fn register_monitor(&mut self, monitor: Arc<dyn Monitor>) {
        tracing::debug!(monitor = monitor.name(), "Monitor registered");
        self.monitors.push(monitor);
    }

    /// Start everything and block until `shutdown` is cancelled and the
    /// HTTP server has drained.
    ///
    /// Only the first call does anything; later calls return
    /// [`SupervisorError::AlreadyStarted`].
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SupervisorError> {
        self.lifecycle
            .start()
            .map_err(SupervisorError::AlreadyStarted)?;

        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                let _ = self.lifecycle.advance(LifecycleState::Failed);
                return Err(e);
            }
        };

        let mut group = TaskGroup::new(self.registry.clone());
        for monitor in &self.monitors {
            group.spawn(monitor.clone(), shutdown.clone());
        }
        tracing::info!(monitors = group.len(), "Monitors started");
        let (_reaper, exits) = group.into_reaper();
        tokio::spawn(watch_exits(exits, self.aggregator.clone()));
        tokio::spawn(log_alerts(self.alerts.subscribe(), shutdown.clone()));

        let server = tokio::spawn(self.server.clone().serve(listener, shutdown.clone()));

        shutdown.cancelled().await;
        let _ = self.lifecycle.advance(LifecycleState::ShuttingDown);
        tracing::info!("Shutdown requested, draining HTTP server");

        let grace = Duration::from_secs(self.config.http.shutdown_grace_secs);
        match drain_with_grace(server, grace).await {
            Ok(()) => {
                let _ = self.lifecycle.advance(LifecycleState::Stopped);
                tracing::info!("Supervisor stopped");
                Ok(())
            }
            Err(e) => {
                let _ = self.lifecycle.advance(LifecycleState::Failed);
                tracing::error!(error = %e, "Shutdown incomplete");
                Err(e)
            }
        }
    }

    async fn bind(&self) -> Result<TcpListener, SupervisorError> {
        self.bind_attempts.fetch_add(1, Ordering::SeqCst);
        let address = &self.config.http.bind_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| SupervisorError::Bind {
                address: address.clone(),
                source,
            })?;
        if let Ok(addr) = listener.local_addr() {
            self.local_addr.send_replace(Some(addr));
        }
        Ok(listener)
    }

    pub fn device_id(&self) -> &str {
        &self.config.device_id
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.current()
    }

    /// Address the HTTP listener is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.borrow()
    }

    /// Wait until the HTTP listener is bound.
    pub async fn ready(&self) -> SocketAddr {
        let mut rx = self.local_addr.subscribe();
        loop {
            if let Some(addr) = *rx.borrow_and_update() {
                return addr;
            }
            // The sender lives as long as `self`, so this never errors.
            let _ = rx.changed().await;
        }
    }

    /// How many times `run` attempted to bind the listener.
    pub fn bind_attempts(&self) -> usize {
        self.bind_attempts.load(Ordering::SeqCst)
    }

    pub fn aggregator(&self) -> Arc<StatusAggregator> {
        self.aggregator.clone()
    }

    pub fn registry(&self) -> TaskRegistry {
        self.registry.clone()
    }

    pub fn alerts(&self) -> AlertBus {
        self.alerts.clone()
    }

    pub fn gpio(&self) -> Arc<GpioController> {
        self.gpio.clone()
    }

    /// Router with the same state the live server uses.
    pub fn router(&self) -> axum::Router {
        self.server.router()
    }
}

/// Wait for the HTTP task to finish, aborting it after `grace`.
pub async fn drain_with_grace(
    mut server: JoinHandle<()>,
    grace: Duration,
) -> Result<(), SupervisorError> {
    match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "HTTP server task panicked");
            Ok(())
        }
        Err(_) => {
            server.abort();
            Err(SupervisorError::ShutdownTimeout(grace))
        }
    }
}

/// Drop failed optional subsystems from the status document.
async fn watch_exits(
    mut exits: mpsc::UnboundedReceiver<TaskExit>,
    aggregator: Arc<StatusAggregator>,
) {
    while let Some(exit) = exits.recv().await {
        if exit.outcome.is_failure() && aggregator.detach(&exit.name) {
            tracing::warn!(subsystem = %exit.name, "Subsystem removed from status");
        }
    }
}

/// Log alerts until shutdown, then flush whatever is still queued.
///
/// Returns the number of alerts logged.
async fn log_alerts(mut rx: broadcast::Receiver<Alert>, shutdown: CancellationToken) -> usize {
    let mut logged = 0;
    loop {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Ok(alert) => {
                    log_alert(&alert);
                    logged += 1;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Alert logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return logged,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    loop {
        match rx.try_recv() {
            Ok(alert) => {
                log_alert(&alert);
                logged += 1;
            }
            Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Alert logger lagged");
            }
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                return logged;
            }
        }
    }
}

fn log_alert(alert: &Alert) {
    match alert.severity {
        Severity::Critical => tracing::error!(subsystem = alert.subsystem, "{}", alert.message),
        Severity::Warning => tracing::warn!(subsystem = alert.subsystem, "{}", alert.message),
        Severity::Info => tracing::info!(subsystem = alert.subsystem, "{}", alert.message),
    }
}
