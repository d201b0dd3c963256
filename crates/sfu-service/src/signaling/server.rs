//! Signaling HTTP routes.
//!
//! Defines the Axum router and application state for the WebSocket endpoint.

use crate::actors::ActorMetrics;

use super::connection;
use super::dispatcher::Dispatcher;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Application state shared by signaling handlers.
#[derive(Clone)]
pub struct SignalingState {
    /// Routes requests to room actors.
    pub dispatcher: Dispatcher,

    /// Shared actor metrics (session counts, panics).
    pub metrics: Arc<ActorMetrics>,

    /// Parent token for every connection task.
    pub cancel_token: CancellationToken,
}

/// Build the signaling routes.
///
/// - `/ws` - signaling WebSocket, one session per connection
/// - TraceLayer for request logging
pub fn build_routes(state: Arc<SignalingState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<SignalingState>>) -> Response {
    let dispatcher = state.dispatcher.clone();
    let metrics = Arc::clone(&state.metrics);
    let cancel_token = state.cancel_token.child_token();

    ws.on_upgrade(move |socket| connection::serve_socket(socket, dispatcher, metrics, cancel_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signaling_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<SignalingState>();
    }
}
