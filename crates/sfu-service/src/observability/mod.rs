//! Observability for the SFU signaling service.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit fields. Metric labels
//! are bounded: room names, session IDs and engine IDs never appear as label values.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `sfu_rooms_active` | Gauge | none | Live rooms |
//! | `sfu_sessions_active` | Gauge | none | Connected signaling sessions |
//! | `sfu_requests_total` | Counter | `request`, `status` | Signaling requests processed |
//! | `sfu_request_duration_seconds` | Histogram | `request` | Request latency including engine calls |
//! | `sfu_errors_total` | Counter | `request`, `error_type` | Failed requests by cause |
//! | `sfu_engine_events_total` | Counter | `event` | Engine close notifications applied |
//! | `sfu_actor_mailbox_depth` | Gauge | `actor_type` | Summed mailbox depth per actor type |
//! | `sfu_actor_panics_total` | Counter | `actor_type` | Actor panics (bugs) |

pub mod health;
pub mod metrics;

// Re-exports for convenience
pub use health::{health_router, HealthState};
pub use metrics::{
    init_metrics_recorder, record_actor_panic, record_engine_event, record_error,
    record_mailbox_dequeue, record_mailbox_enqueue, record_request, set_rooms_active,
    set_sessions_active,
};
