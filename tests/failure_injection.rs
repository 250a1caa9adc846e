//! Failure injection tests: misbehaving monitors must not take the agent down.

use std::time::{Duration, Instant};

use fleet_metal::lifecycle::LifecycleState;
use fleet_metal::Supervisor;
use reqwest::StatusCode;

mod common;

use common::{Script, ScriptedMonitor};

#[tokio::test]
async fn failing_and_panicking_monitors_are_isolated() {
    let mut supervisor = Supervisor::new(common::test_config()).unwrap();
    supervisor.register_monitor(ScriptedMonitor::new("flaky-bus", Script::Fail));
    supervisor.register_monitor(ScriptedMonitor::new("crashy", Script::Panic));

    let running = common::start_supervisor(supervisor).await;
    let registry = running.supervisor.registry();
    assert!(
        common::wait_until(Duration::from_secs(2), || {
            registry.get("flaky-bus").map(|r| r.state) == Some("failed")
                && registry.get("crashy").map(|r| r.state) == Some("panicked")
        })
        .await,
        "{:?}",
        registry.snapshot()
    );

    assert_eq!(registry.get("power").unwrap().state, "running");
    assert_eq!(running.supervisor.state(), LifecycleState::Running);

    let res = reqwest::get(running.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let tasks: Vec<serde_json::Value> = reqwest::get(running.url("/api/v1/subsystems"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let crashy = tasks.iter().find(|t| t["name"] == "crashy").unwrap();
    assert_eq!(crashy["error"], "injected panic");
    let flaky = tasks.iter().find(|t| t["name"] == "flaky-bus").unwrap();
    assert!(flaky["error"].as_str().unwrap().contains("injected failure"));

    running.stop().await.unwrap();
}

/// A monitor that never observes cancellation is leaked: `run` still
/// returns once the HTTP server drains, and the task keeps running.
#[tokio::test]
async fn uncooperative_monitor_does_not_block_shutdown() {
    let stuck = ScriptedMonitor::new("stuck", Script::IgnoreCancel);
    let mut supervisor = Supervisor::new(common::test_config()).unwrap();
    supervisor.register_monitor(stuck.clone());

    let running = common::start_supervisor(supervisor).await;
    let supervisor = running.supervisor.clone();
    assert!(common::wait_until(Duration::from_secs(1), || stuck.runs() == 1).await);

    let started = Instant::now();
    running.stop().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(supervisor.state(), LifecycleState::Stopped);

    let registry = supervisor.registry();
    assert!(common::wait_until(Duration::from_secs(2), || registry.running() == 1).await);
    assert_eq!(registry.get("stuck").unwrap().state, "running");
}

#[tokio::test]
async fn occupied_port_fails_run() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = common::test_config();
    config.http.bind_address = taken.local_addr().unwrap().to_string();

    let supervisor = Supervisor::new(config).unwrap();
    let err = supervisor
        .run(tokio_util::sync::CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to bind"));
    assert_eq!(supervisor.state(), LifecycleState::Failed);
}
