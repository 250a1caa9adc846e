//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router for the health and status endpoints
//! - Wire up middleware (timeout, request ID, tracing)
//! - Serve on a bound listener until the shutdown token fires

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::HttpConfig;
use crate::http::handlers;
use crate::http::request::{request_span, MakeRequestUuid};
use crate::supervisor::{StatusAggregator, TaskRegistry};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<StatusAggregator>,
    pub registry: TaskRegistry,
}

/// HTTP front end of the agent.
#[derive(Clone)]
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, config: &HttpConfig) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        Self {
            router: Self::build_router(state, timeout),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, timeout: Duration) -> Router {
        Router::new()
            .route(
                "/health",
                get(handlers::health)
                    .head(handlers::method_not_allowed)
                    .fallback(handlers::method_not_allowed),
            )
            .route(
                "/api/v1/status",
                get(handlers::status)
                    .head(handlers::method_not_allowed)
                    .fallback(handlers::method_not_allowed),
            )
            .route(
                "/api/v1/subsystems",
                get(handlers::subsystems)
                    .head(handlers::method_not_allowed)
                    .fallback(handlers::method_not_allowed),
            )
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` is cancelled.
    ///
    /// Once cancelled the listener stops accepting and in-flight requests
    /// are allowed to finish. Errors are logged, not returned.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) {
        match listener.local_addr() {
            Ok(addr) => tracing::info!(address = %addr, "HTTP server listening"),
            Err(e) => tracing::warn!(error = %e, "HTTP listener has no local address"),
        }

        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;

        match result {
            Ok(()) => tracing::info!("HTTP server stopped"),
            Err(e) => tracing::error!(error = %e, "HTTP server error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::AgentConfig;
    use crate::supervisor::Supervisor;

    fn router() -> axum::Router {
        let mut config = AgentConfig::for_device("unit-device");
        config.hardware.simulate = true;
        Supervisor::new(config).unwrap().router()
    }

    async fn call(method: Method, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, headers, body) = call(Method::GET, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.contains_key("x-request-id"));
        assert!(headers[axum::http::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn non_get_is_rejected() {
        for method in [Method::HEAD, Method::POST, Method::PUT, Method::DELETE] {
            let (status, _, _) = call(method.clone(), "/health").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
            let (status, _, _) = call(method.clone(), "/api/v1/status").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
            let (status, _, _) = call(method, "/api/v1/subsystems").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        }
    }

    #[tokio::test]
    async fn status_document() {
        let (status, _, body) = call(Method::GET, "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["device_id"], "unit-device");
        for key in ["power", "thermal", "security", "state", "diagnostics"] {
            assert!(json["health"].get(key).is_some(), "missing {key}");
        }
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (status, _, _) = call(Method::GET, "/api/v2/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }
}
