//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate the first signal into a graceful shutdown
//! - Exit immediately on a second signal

use std::io;

use tokio::task::JoinHandle;

use crate::lifecycle::Shutdown;

/// Exit status used when a second signal forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Wait for SIGINT or SIGTERM and return its name.
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}

/// Wait for Ctrl+C and return its name.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

/// Spawn a task that triggers `shutdown` on the first signal and exits the
/// process on the second.
pub fn spawn_signal_handler(shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                tracing::info!(signal, "Received signal, shutting down");
                shutdown.trigger();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                return;
            }
        }

        if let Ok(signal) = wait_for_signal().await {
            tracing::warn!(signal, "Received second signal, forcing exit");
            std::process::exit(FORCED_EXIT_CODE);
        }
    })
}
