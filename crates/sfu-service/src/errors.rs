//! SFU signaling error types.
//!
//! Each error maps to a numeric client code and a client-safe message. Engine failures
//! carry the engine's message verbatim; internal details are logged server-side only.

use media_engine::EngineError;
use common::types::ProducerId;
use thiserror::Error;

/// SFU signaling error type.
///
/// Client codes:
/// - `InvalidRequest`: `BAD_REQUEST` (1)
/// - `NotFound`: `NOT_FOUND` (4)
/// - `IncompatibleCapabilities`: `INCOMPATIBLE` (5)
/// - `Config`, `Internal`: `INTERNAL_ERROR` (6)
/// - `RoomClosed`, `Draining`, `CapacityExceeded`: `UNAVAILABLE` (7)
/// - `EngineFailure`: `ENGINE_ERROR` (8)
#[derive(Debug, Error)]
pub enum SfuError {
    /// A referenced transport, producer, consumer or room is absent.
    #[error("{0}")]
    NotFound(String),

    /// The router cannot produce a stream the consumer's capabilities accept.
    #[error("Cannot consume producer {0}: incompatible RTP capabilities")]
    IncompatibleCapabilities(ProducerId),

    /// The media engine rejected or failed the operation.
    #[error("Engine error: {0}")]
    EngineFailure(#[from] EngineError),

    /// The room actor exited between lookup and use.
    #[error("Room closed: {0}")]
    RoomClosed(String),

    /// The service is shutting down and not accepting new rooms.
    #[error("Service is draining")]
    Draining,

    /// The registry already holds the configured maximum number of rooms.
    #[error("Room capacity exceeded: {0} rooms")]
    CapacityExceeded(usize),

    /// The request could not be decoded.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SfuError {
    /// Returns the client error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            SfuError::InvalidRequest(_) => 1, // BAD_REQUEST
            SfuError::NotFound(_) => 4,       // NOT_FOUND
            SfuError::IncompatibleCapabilities(_) => 5, // INCOMPATIBLE
            SfuError::Config(_) | SfuError::Internal(_) => 6, // INTERNAL_ERROR
            SfuError::RoomClosed(_) | SfuError::Draining | SfuError::CapacityExceeded(_) => 7, // UNAVAILABLE
            SfuError::EngineFailure(_) => 8,  // ENGINE_ERROR
        }
    }

    /// Returns a bounded label string for the error variant (for metrics).
    #[must_use]
    pub fn error_type_label(&self) -> &'static str {
        match self {
            SfuError::NotFound(_) => "not_found",
            SfuError::IncompatibleCapabilities(_) => "incompatible_capabilities",
            SfuError::EngineFailure(_) => "engine_failure",
            SfuError::RoomClosed(_) => "room_closed",
            SfuError::Draining => "draining",
            SfuError::CapacityExceeded(_) => "capacity_exceeded",
            SfuError::InvalidRequest(_) => "invalid_request",
            SfuError::Config(_) => "config",
            SfuError::Internal(_) => "internal",
        }
    }

    /// Returns the message sent to clients.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            SfuError::NotFound(msg) | SfuError::InvalidRequest(msg) => msg.clone(),
            SfuError::IncompatibleCapabilities(_) => "Cannot consume".to_string(),
            SfuError::EngineFailure(e) => e.to_string(),
            SfuError::RoomClosed(_) => "Room is closing, please retry".to_string(),
            SfuError::Draining => "Server is shutting down, please reconnect".to_string(),
            SfuError::CapacityExceeded(_) => "Server is at capacity, please try again".to_string(),
            SfuError::Config(_) | SfuError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }

    /// Build a `NotFound` for a transport id in a room.
    #[must_use]
    pub fn transport_not_found(transport_id: &impl std::fmt::Display, room: &str) -> Self {
        SfuError::NotFound(format!(
            "WebRtcTransport {transport_id} not found in room {room}"
        ))
    }
}
