//! Route handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::http::server::AppState;
use crate::supervisor::{SystemStatus, TaskReport};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /health`. Answers whenever the listener is up.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /api/v1/status`.
pub async fn status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(state.aggregator.status())
}

/// `GET /api/v1/subsystems`.
pub async fn subsystems(State(state): State<AppState>) -> Json<Vec<TaskReport>> {
    Json(state.registry.snapshot())
}

pub async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
