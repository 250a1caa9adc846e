//! fleet-metal device agent.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────── fleet-metal ────────────────────────────┐
//!   │                                                                      │
//!   │  config ──▶ Supervisor::new                                          │
//!   │               │                                                      │
//!   │               ├─ hw (GPIO bank, ADC inputs)                          │
//!   │               ├─ monitor: power, thermal, security, state, diag     │
//!   │               └─ http: /health, /api/v1/status, /api/v1/subsystems  │
//!   │                                                                      │
//!   │  signals ──▶ Shutdown token ──▶ monitors stop, HTTP drains (≤ grace) │
//!   │                                                                      │
//!   │  observability: tracing logs, optional Prometheus exporter           │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fleet_metal::config::loader::{finalize, load_config};
use fleet_metal::lifecycle::signals::spawn_signal_handler;
use fleet_metal::lifecycle::Shutdown;
use fleet_metal::observability::{logging, metrics};
use fleet_metal::{AgentConfig, Supervisor};

#[derive(Debug, Parser)]
#[command(name = "fleet-metal")]
#[command(about = "Device agent for bare-metal fleet nodes", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device identifier reported in status
    #[arg(long)]
    device_id: Option<String>,

    /// HTTP bind address, e.g. 0.0.0.0:8080
    #[arg(long)]
    http_addr: Option<String>,

    /// Use simulated sensors instead of sysfs
    #[arg(long)]
    simulate: bool,
}

impl Cli {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(id) = &self.device_id {
            config.device_id = id.clone();
        }
        if let Some(addr) = &self.http_addr {
            config.http.bind_address = addr.clone();
        }
        if self.simulate {
            config.hardware.simulate = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()).and_then(|mut config| {
        cli.apply(&mut config);
        finalize(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fleet-metal: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("fleet-metal: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        device_id = %config.device_id,
        bind_address = %config.http.bind_address,
        simulate = config.hardware.simulate,
        "fleet-metal starting"
    );

    if config.observability.metrics_enabled {
        if let Err(e) = metrics::init_metrics(&config.observability.metrics_address) {
            tracing::error!(error = %e, "Metrics exporter disabled");
        }
    }

    let supervisor = match Supervisor::new(config) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    match supervisor.run(shutdown.token()).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Supervisor exited with error");
            ExitCode::FAILURE
        }
    }
}
