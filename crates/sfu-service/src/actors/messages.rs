//! Message types for actor communication.
//!
//! Every request that expects a reply carries a `respond_to` oneshot sender; the
//! actor answers exactly once after the request has been applied.

use crate::errors::SfuError;

use super::room::RoomActorHandle;

use common::types::{
    ConsumerId, DataConsumerId, DataProducerId, MediaKind, ProducerId, SessionId, TransportId,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;

// ============================================================================
// Registry Messages
// ============================================================================

/// Messages sent to the `RoomRegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    /// Return the room for `room_name`, creating it on first reference.
    GetOrCreateRoom {
        room_name: String,
        respond_to: oneshot::Sender<Result<RoomActorHandle, SfuError>>,
    },

    /// Close and forget the room if nobody is left in it.
    ReleaseRoom {
        room_name: String,
        respond_to: oneshot::Sender<bool>,
    },

    /// A room confirmed `CloseIfIdle`; forget it if the entry still points at `handle`.
    RoomReleased {
        room_name: String,
        handle: RoomActorHandle,
        respond_to: oneshot::Sender<bool>,
    },

    /// Get current registry status.
    GetStatus {
        respond_to: oneshot::Sender<RegistryStatus>,
    },

    /// Stop accepting new rooms and cancel every room actor.
    Shutdown {
        respond_to: oneshot::Sender<Result<(), SfuError>>,
    },
}

/// Registry status snapshot.
#[derive(Debug, Clone)]
pub struct RegistryStatus {
    /// Number of live rooms.
    pub room_count: usize,
    /// Whether the registry stopped accepting new rooms.
    pub is_draining: bool,
    /// Current mailbox depth.
    pub mailbox_depth: usize,
}

// ============================================================================
// Room Messages
// ============================================================================

/// Messages sent to a `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Create the router if needed and return its RTP capabilities.
    EnsureRouter {
        session_id: SessionId,
        respond_to: oneshot::Sender<Result<Value, SfuError>>,
    },

    /// Create a WebRTC transport owned by `session_id`.
    CreateWebRtcTransport {
        session_id: SessionId,
        respond_to: oneshot::Sender<Result<TransportDescriptor, SfuError>>,
    },

    /// Supply the client's DTLS parameters for a transport.
    ConnectWebRtcTransport {
        session_id: SessionId,
        transport_id: TransportId,
        dtls_parameters: Value,
        respond_to: oneshot::Sender<Result<(), SfuError>>,
    },

    /// Create a producer on a transport.
    Produce {
        session_id: SessionId,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: Value,
        respond_to: oneshot::Sender<Result<ProducerId, SfuError>>,
    },

    /// Create a paused consumer of a producer on a transport.
    Consume {
        session_id: SessionId,
        transport_id: TransportId,
        producer_id: ProducerId,
        rtp_capabilities: Value,
        respond_to: oneshot::Sender<Result<ConsumerDescriptor, SfuError>>,
    },

    /// Resume a paused consumer.
    ResumeConsumer {
        session_id: SessionId,
        consumer_id: ConsumerId,
        respond_to: oneshot::Sender<Result<(), SfuError>>,
    },

    /// Create a data producer on a transport.
    ProduceData {
        session_id: SessionId,
        transport_id: TransportId,
        sctp_stream_parameters: Value,
        label: String,
        respond_to: oneshot::Sender<Result<DataProducerId, SfuError>>,
    },

    /// Create a paused data consumer of a data producer on a transport.
    ConsumeData {
        session_id: SessionId,
        transport_id: TransportId,
        data_producer_id: DataProducerId,
        respond_to: oneshot::Sender<Result<DataConsumerDescriptor, SfuError>>,
    },

    /// Resume a paused data consumer.
    ResumeDataConsumer {
        session_id: SessionId,
        data_consumer_id: DataConsumerId,
        respond_to: oneshot::Sender<Result<(), SfuError>>,
    },

    /// A session disconnected. Replies with the number of remaining participants.
    ParticipantLeft {
        session_id: SessionId,
        respond_to: oneshot::Sender<usize>,
    },

    /// Close the room if it has no participants. Replies whether it closed.
    CloseIfIdle { respond_to: oneshot::Sender<bool> },

    /// Get a snapshot of the room state.
    GetState {
        respond_to: oneshot::Sender<RoomState>,
    },
}

impl RoomMessage {
    /// Returns the message name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            RoomMessage::EnsureRouter { .. } => "ensure_router",
            RoomMessage::CreateWebRtcTransport { .. } => "create_webrtc_transport",
            RoomMessage::ConnectWebRtcTransport { .. } => "connect_webrtc_transport",
            RoomMessage::Produce { .. } => "produce",
            RoomMessage::Consume { .. } => "consume",
            RoomMessage::ResumeConsumer { .. } => "resume_consumer",
            RoomMessage::ProduceData { .. } => "produce_data",
            RoomMessage::ConsumeData { .. } => "consume_data",
            RoomMessage::ResumeDataConsumer { .. } => "resume_data_consumer",
            RoomMessage::ParticipantLeft { .. } => "participant_left",
            RoomMessage::CloseIfIdle { .. } => "close_if_idle",
            RoomMessage::GetState { .. } => "get_state",
        }
    }

    /// Returns the session the message was sent on behalf of, if any.
    #[must_use]
    pub const fn session_id(&self) -> Option<SessionId> {
        match self {
            RoomMessage::EnsureRouter { session_id, .. }
            | RoomMessage::CreateWebRtcTransport { session_id, .. }
            | RoomMessage::ConnectWebRtcTransport { session_id, .. }
            | RoomMessage::Produce { session_id, .. }
            | RoomMessage::Consume { session_id, .. }
            | RoomMessage::ResumeConsumer { session_id, .. }
            | RoomMessage::ProduceData { session_id, .. }
            | RoomMessage::ConsumeData { session_id, .. }
            | RoomMessage::ResumeDataConsumer { session_id, .. } => Some(*session_id),
            RoomMessage::ParticipantLeft { .. }
            | RoomMessage::CloseIfIdle { .. }
            | RoomMessage::GetState { .. } => None,
        }
    }
}

/// Result of `createWebRtcTransport`.
#[derive(Debug, Clone)]
pub struct TransportDescriptor {
    pub transport_id: TransportId,
    /// Router RTP capabilities, as the engine reports them.
    pub router_rtp_capabilities: Value,
    /// Connection options (ICE, DTLS, SCTP) for the client.
    pub transport_options: Value,
}

/// Result of `consume`.
#[derive(Debug, Clone)]
pub struct ConsumerDescriptor {
    pub consumer_id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
}

/// Result of `consumeData`.
#[derive(Debug, Clone)]
pub struct DataConsumerDescriptor {
    pub data_consumer_id: DataConsumerId,
    pub data_producer_id: DataProducerId,
    pub sctp_stream_parameters: Option<Value>,
    pub label: String,
    pub protocol: String,
}

/// Transport negotiation state. One-way: `Created -> Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Created,
    Connected,
}

/// Transport entry in a room snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TransportInfo {
    pub transport_id: TransportId,
    pub owner: SessionId,
    pub state: TransportState,
}

/// Producer entry in a room snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ProducerInfo {
    pub producer_id: ProducerId,
    pub transport_id: TransportId,
    pub kind: MediaKind,
}

/// Consumer entry in a room snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerInfo {
    pub consumer_id: ConsumerId,
    pub transport_id: TransportId,
    pub producer_id: ProducerId,
    pub paused: bool,
}

/// Data producer entry in a room snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DataProducerInfo {
    pub data_producer_id: DataProducerId,
    pub transport_id: TransportId,
    pub label: String,
}

/// Data consumer entry in a room snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct DataConsumerInfo {
    pub data_consumer_id: DataConsumerId,
    pub transport_id: TransportId,
    pub data_producer_id: DataProducerId,
    pub paused: bool,
}

/// Room state snapshot. Entries are sorted by id.
#[derive(Debug, Clone, Serialize)]
pub struct RoomState {
    pub room_name: String,
    pub router_id: Option<String>,
    pub participants: Vec<SessionId>,
    pub transports: Vec<TransportInfo>,
    pub producers: Vec<ProducerInfo>,
    pub consumers: Vec<ConsumerInfo>,
    pub data_producers: Vec<DataProducerInfo>,
    pub data_consumers: Vec<DataConsumerInfo>,
    pub created_at: i64,
}

impl RoomState {
    /// Look up a transport entry.
    #[must_use]
    pub fn transport(&self, transport_id: &TransportId) -> Option<&TransportInfo> {
        self.transports
            .iter()
            .find(|t| &t.transport_id == transport_id)
    }

    /// Look up a consumer entry.
    #[must_use]
    pub fn consumer(&self, consumer_id: &ConsumerId) -> Option<&ConsumerInfo> {
        self.consumers.iter().find(|c| &c.consumer_id == consumer_id)
    }

    /// Look up a data consumer entry.
    #[must_use]
    pub fn data_consumer(&self, data_consumer_id: &DataConsumerId) -> Option<&DataConsumerInfo> {
        self.data_consumers
            .iter()
            .find(|dc| &dc.data_consumer_id == data_consumer_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_message_names_and_sessions() {
        let session_id = SessionId::new();
        let (tx, _rx) = oneshot::channel();
        let msg = RoomMessage::ResumeConsumer {
            session_id,
            consumer_id: ConsumerId::from("c1"),
            respond_to: tx,
        };
        assert_eq!(msg.name(), "resume_consumer");
        assert_eq!(msg.session_id(), Some(session_id));

        let (tx, _rx) = oneshot::channel();
        let msg = RoomMessage::CloseIfIdle { respond_to: tx };
        assert_eq!(msg.name(), "close_if_idle");
        assert_eq!(msg.session_id(), None);
    }

    #[test]
    fn test_transport_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(TransportState::Connected).unwrap(),
            "connected"
        );
    }

    #[test]
    fn test_room_state_lookup() {
        let owner = SessionId::new();
        let state = RoomState {
            room_name: "r1".to_string(),
            router_id: Some("router-1".to_string()),
            participants: vec![owner],
            transports: vec![TransportInfo {
                transport_id: TransportId::from("t1"),
                owner,
                state: TransportState::Created,
            }],
            producers: vec![],
            consumers: vec![ConsumerInfo {
                consumer_id: ConsumerId::from("c1"),
                transport_id: TransportId::from("t1"),
                producer_id: ProducerId::from("p1"),
                paused: true,
            }],
            data_producers: vec![],
            data_consumers: vec![],
            created_at: 0,
        };

        assert!(state.transport(&TransportId::from("t1")).is_some());
        assert!(state.transport(&TransportId::from("t2")).is_none());
        assert!(state.consumer(&ConsumerId::from("c1")).unwrap().paused);
        assert!(state.data_consumer(&DataConsumerId::from("dc1")).is_none());
    }
}
