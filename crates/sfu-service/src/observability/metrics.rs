//! Metrics definitions for the SFU signaling service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `sfu_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `actor_type`: 3 values max (registry, room, connection)
//! - `request`: bounded by signaling request types (~10 values, plus `unknown`)
//! - `status`: 2 values (success, error)
//! - `event`: 5 values (engine close notifications)
//!
//! Room names and session IDs are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Request duration buckets cover
/// the range between a cached lookup and a slow engine call.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("sfu_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set request duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Room & Session Metrics (Gauges)
// ============================================================================

/// Set the number of live rooms.
///
/// Metric: `sfu_rooms_active`
/// Labels: none
pub fn set_rooms_active(count: usize) {
    // usize to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("sfu_rooms_active").set(count as f64);
}

/// Set the number of connected signaling sessions.
///
/// Metric: `sfu_sessions_active`
/// Labels: none
pub fn set_sessions_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("sfu_sessions_active").set(count as f64);
}

/// Record a message entering an actor mailbox.
///
/// Metric: `sfu_actor_mailbox_depth`
/// Labels: `actor_type` (registry, room, connection)
///
/// The gauge is the total depth over every live actor of the type, so all room
/// mailboxes add up into one series. High values indicate actors falling behind.
pub fn record_mailbox_enqueue(actor_type: &str) {
    gauge!("sfu_actor_mailbox_depth", "actor_type" => actor_type.to_string()).increment(1.0);
}

/// Record a message leaving an actor mailbox.
///
/// Metric: `sfu_actor_mailbox_depth`
/// Labels: `actor_type`
pub fn record_mailbox_dequeue(actor_type: &str) {
    gauge!("sfu_actor_mailbox_depth", "actor_type" => actor_type.to_string()).decrement(1.0);
}

// ============================================================================
// Request Metrics
// ============================================================================

/// Record a processed signaling request.
///
/// Metrics:
/// - `sfu_requests_total` counter (labels: `request`, `status`)
/// - `sfu_request_duration_seconds` histogram (labels: `request`)
pub fn record_request(request: &str, status: &str, duration: Duration) {
    counter!("sfu_requests_total",
        "request" => request.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("sfu_request_duration_seconds", "request" => request.to_string())
        .record(duration.as_secs_f64());
}

/// Record a signaling error by category.
///
/// Metric: `sfu_errors_total`
/// Labels: `request`, `error_type`
pub fn record_error(request: &str, error_type: &str) {
    counter!("sfu_errors_total",
        "request" => request.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

// ============================================================================
// Engine & Actor Metrics (Counters)
// ============================================================================

/// Record an engine close notification applied by a room.
///
/// Metric: `sfu_engine_events_total`
/// Labels: `event`
pub fn record_engine_event(event: &str) {
    counter!("sfu_engine_events_total", "event" => event.to_string()).increment(1);
}

/// Record an actor panic event.
///
/// Metric: `sfu_actor_panics_total`
/// Labels: `actor_type`
///
/// ALERT: Any non-zero value indicates a bug and should trigger investigation.
pub fn record_actor_panic(actor_type: &str) {
    counter!("sfu_actor_panics_total", "actor_type" => actor_type.to_string()).increment(1);
}
