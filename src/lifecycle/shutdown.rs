//! Shutdown coordination for the agent.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Wraps a cancellation token that every long-running task observes. Tasks
/// receive clones of the token; none of them own it.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled when shutdown is triggered.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is triggered.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }
}
