//! Health endpoints for the SFU signaling service.
//!
//! Provides Kubernetes-compatible health endpoints:
//! - `GET /health` - Liveness probe (is the process running?)
//! - `GET /ready` - Readiness probe (can we accept signaling sessions?)
//!
//! The `/metrics` endpoint is served next to these, from the Prometheus handle.
//!
//! # Health State
//!
//! - `live`: Always true after startup (process is running)
//! - `ready`: True once the media engine is up and the signaling listener is bound;
//!   cleared again when shutdown starts

use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Health state for the SFU.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (live=true, ready=false).
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Mark the service as ready to serve traffic.
    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark the service as not ready (e.g., during shutdown).
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    /// Check if the service is live.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Check if the service is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Create the health router with liveness and readiness endpoints.
pub fn health_router(health_state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(liveness_handler))
        .route("/ready", get(readiness_handler))
        .with_state(health_state)
}

async fn liveness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_live() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn readiness_handler(State(state): State<Arc<HealthState>>) -> StatusCode {
    if state.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    #[test]
    fn test_health_state_default() {
        let state = HealthState::new();
        assert!(state.is_live(), "Should be live by default");
        assert!(!state.is_ready(), "Should not be ready by default");
    }

    #[test]
    fn test_health_state_transitions() {
        let state = HealthState::default();

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready());
        assert!(state.is_live());
    }

    #[tokio::test]
    async fn test_readiness_handler_follows_state() {
        let state = Arc::new(HealthState::new());
        assert_eq!(
            readiness_handler(State(Arc::clone(&state))).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.set_ready();
        assert_eq!(readiness_handler(State(state)).await, StatusCode::OK);
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");

        app.oneshot(request)
            .await
            .expect("Failed to execute request")
            .status()
    }

    #[tokio::test]
    async fn test_health_router_endpoints() {
        let state = Arc::new(HealthState::new());

        assert_eq!(
            get_status(health_router(Arc::clone(&state)), "/health").await,
            StatusCode::OK
        );
        assert_eq!(
            get_status(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.set_ready();
        assert_eq!(
            get_status(health_router(Arc::clone(&state)), "/ready").await,
            StatusCode::OK
        );
        assert_eq!(
            get_status(health_router(state), "/unknown").await,
            StatusCode::NOT_FOUND
        );
    }
}
