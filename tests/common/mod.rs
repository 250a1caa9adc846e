//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_metal::monitor::MonitorError;
use fleet_metal::{AgentConfig, Monitor, Supervisor, SupervisorError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEVICE_ID: &str = "test-device-001";

/// Simulated hardware, ephemeral port, fast polling.
pub fn test_config() -> AgentConfig {
    let mut config = AgentConfig::for_device(DEVICE_ID);
    config.location = "test bench".into();
    config.hardware.simulate = true;
    config.http.bind_address = "127.0.0.1:0".into();
    config.http.shutdown_grace_secs = 5;
    config.power.poll_interval_ms = 20;
    config.thermal.poll_interval_ms = 20;
    config.security.poll_interval_ms = 20;
    config.subsystems.state_interval_secs = 1;
    config.subsystems.diagnostics_interval_secs = 1;
    config
}

/// A supervisor running in a background task.
pub struct Running {
    pub supervisor: Arc<Supervisor>,
    pub token: CancellationToken,
    pub handle: JoinHandle<Result<(), SupervisorError>>,
    pub addr: SocketAddr,
}

impl Running {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Cancel the token and wait for `run` to return.
    pub async fn stop(self) -> Result<(), SupervisorError> {
        self.token.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("run did not return")
            .expect("run task panicked")
    }
}

pub async fn start(config: AgentConfig) -> Running {
    start_supervisor(Supervisor::new(config).unwrap()).await
}

pub async fn start_supervisor(supervisor: Supervisor) -> Running {
    let supervisor = Arc::new(supervisor);
    let token = CancellationToken::new();

    let (s, t) = (supervisor.clone(), token.clone());
    let handle = tokio::spawn(async move { s.run(t).await });

    let addr = tokio::time::timeout(Duration::from_secs(5), supervisor.ready())
        .await
        .expect("listener never bound");

    Running {
        supervisor,
        token,
        handle,
        addr,
    }
}

/// Poll `check` until it holds or `limit` passes.
pub async fn wait_until<F: FnMut() -> bool>(limit: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// What a [`ScriptedMonitor`] does when run.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Wait for cancellation, then return `Ok`.
    Cooperative,
    /// Return an error immediately.
    Fail,
    /// Panic immediately.
    Panic,
    /// Never return, ignoring cancellation.
    IgnoreCancel,
}

pub struct ScriptedMonitor {
    name: &'static str,
    script: Script,
    runs: AtomicUsize,
}

impl ScriptedMonitor {
    pub fn new(name: &'static str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            name,
            script,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Monitor for ScriptedMonitor {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), MonitorError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Cooperative => {
                shutdown.cancelled().await;
                Ok(())
            }
            Script::Fail => Err(MonitorError::Fault("injected failure".into())),
            Script::Panic => panic!("injected panic"),
            Script::IgnoreCancel => std::future::pending().await,
        }
    }
}
