//! SFU Signaling Service
//!
//! WebSocket signaling coordinator in front of a mediasoup worker.
//!
//! # Servers
//!
//! - WebSocket signaling server (default: 0.0.0.0:3000, path `/ws`)
//! - HTTP server for health and metrics endpoints (default: 0.0.0.0:8081)
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing
//! 3. Initialize Prometheus metrics recorder
//! 4. Start the media engine worker
//! 5. Initialize actor system (`RoomRegistryActorHandle`)
//! 6. Start health HTTP server (liveness, readiness, metrics)
//! 7. Start signaling server, then mark ready
//! 8. Wait for shutdown signal

#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)] // main.rs orchestrates startup, naturally longer

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use media_engine::mediasoup::MediasoupEngine;
use media_engine::MediaEngine;
use sfu_service::actors::{ActorMetrics, RoomRegistryActorHandle};
use sfu_service::config::Config;
use sfu_service::observability::{health_router, init_metrics_recorder, HealthState};
use sfu_service::signaling::{build_routes, Dispatcher, SignalingState};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    // Initialize tracing
    config.observability.init_tracing()?;

    info!("Starting SFU signaling service");
    info!(
        sfu_id = %config.sfu_id,
        signaling_bind_address = %config.signaling_bind_address,
        health_bind_address = %config.health_bind_address,
        max_rooms = config.max_rooms,
        rtc_listen_ip = %config.transport.listen_ip,
        enable_udp = config.transport.enable_udp,
        enable_tcp = config.transport.enable_tcp,
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder
    // This must happen before any metrics are recorded
    info!("Initializing Prometheus metrics recorder...");
    let prometheus_handle = init_metrics_recorder().map_err(|e| {
        error!(error = %e, "Failed to install Prometheus metrics recorder");
        e
    })?;
    info!("Prometheus metrics recorder initialized");

    // Initialize health state
    let health_state = Arc::new(HealthState::new());

    // Start the media engine
    info!("Starting media engine worker...");
    let engine: Arc<dyn MediaEngine> = Arc::new(MediasoupEngine::new().await.map_err(|e| {
        error!(error = %e, "Failed to start media engine worker");
        e
    })?);
    info!("Media engine worker started");

    // Initialize actor system
    info!("Initializing actor system...");
    let actor_metrics = ActorMetrics::new();
    let registry = RoomRegistryActorHandle::new(
        config.sfu_id.clone(),
        engine,
        Arc::new(config.transport.clone()),
        config.max_rooms,
        Arc::clone(&actor_metrics),
    );
    info!("Actor system initialized");

    // Create shutdown token as child of the registry's token
    // This ensures all servers and sessions stop when the registry shuts down
    let shutdown_token = registry.child_token();

    // Start health HTTP server (MUST succeed - fail startup if it doesn't)
    let health_addr: SocketAddr = config.health_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.health_bind_address, "Invalid health bind address");
        format!("Invalid health bind address: {e}")
    })?;

    let health_router = health_router(Arc::clone(&health_state));

    // Add /metrics endpoint served by Prometheus exporter
    let metrics_router = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let handle = prometheus_handle.clone();
            async move { handle.render() }
        }),
    );

    let health_app = health_router.merge(metrics_router);

    // Bind listener BEFORE spawning to fail fast on bind errors
    let health_listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %health_addr, "Failed to bind health server");
            format!("Failed to bind health server to {health_addr}: {e}")
        })?;

    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(health_listener, health_app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    // Start signaling server
    let signaling_addr: SocketAddr = config.signaling_bind_address.parse().map_err(|e| {
        error!(error = %e, addr = %config.signaling_bind_address, "Invalid signaling bind address");
        format!("Invalid signaling bind address: {e}")
    })?;

    let signaling_state = Arc::new(SignalingState {
        dispatcher: Dispatcher::new(registry.clone()),
        metrics: Arc::clone(&actor_metrics),
        cancel_token: shutdown_token.child_token(),
    });
    let signaling_app = build_routes(signaling_state);

    let signaling_listener = tokio::net::TcpListener::bind(signaling_addr)
        .await
        .map_err(|e| {
            error!(error = %e, addr = %signaling_addr, "Failed to bind signaling server");
            format!("Failed to bind signaling server to {signaling_addr}: {e}")
        })?;

    let signaling_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %signaling_addr, "Signaling server starting");
        let server = axum::serve(signaling_listener, signaling_app).with_graceful_shutdown(
            async move {
                signaling_shutdown_token.cancelled().await;
                info!("Signaling server shutting down");
            },
        );
        if let Err(e) = server.await {
            error!(error = %e, "Signaling server failed");
        }
    });

    health_state.set_ready();
    info!("SFU signaling service running - press Ctrl+C to shutdown");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");

    // Mark as not ready immediately so k8s stops sending traffic
    health_state.set_not_ready();

    // Close servers and signaling sessions; sessions leave their rooms on the way out
    shutdown_token.cancel();

    // Give sessions time to leave their rooms
    tokio::time::sleep(Duration::from_secs(2)).await;

    // Shutdown actor system (cancels every remaining room)
    if let Err(e) = registry.shutdown().await {
        warn!(error = %e, "Actor system shutdown error");
    }

    // Rooms drop their routers on the way out
    tokio::time::sleep(Duration::from_secs(1)).await;

    info!("SFU signaling service shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is acceptable because
/// without signal handlers, we cannot gracefully shut down the service.
async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
