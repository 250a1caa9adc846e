//! Supervisor lifecycle state machine.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed, not yet run.
    Created,
    /// Monitors and listener started.
    Running,
    /// Cancellation observed, listener draining.
    ShuttingDown,
    /// Shutdown completed cleanly.
    Stopped,
    /// Startup or shutdown failed.
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }

    fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Running, ShuttingDown)
                | (Running, Failed)
                | (ShuttingDown, Stopped)
                | (ShuttingDown, Failed)
        )
    }
}

/// Mutex-guarded lifecycle state.
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub fn current(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move from `Created` to `Running`.
    ///
    /// On failure nothing changes and the current state is returned.
    pub fn start(&self) -> Result<(), LifecycleState> {
        self.advance(LifecycleState::Running)
    }

    /// Move to `next` if the transition is allowed.
    pub fn advance(&self, next: LifecycleState) -> Result<(), LifecycleState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(*state);
        }
        tracing::debug!(from = ?*state, to = ?next, "Lifecycle transition");
        *state = next;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
