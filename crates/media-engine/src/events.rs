//! Close notifications emitted by the media engine.
//!
//! Engine callbacks fire on engine-owned threads and must never block, so the channel is
//! unbounded. The room actor drains it in the same loop as its mailbox.

use common::types::{ConsumerId, DataConsumerId, DataProducerId, ProducerId, TransportId};
use tokio::sync::mpsc;

/// Sender side handed to the engine when a router is created.
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Receiver side owned by the room.
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create a new event channel.
#[must_use]
pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// A resource closed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    TransportClosed { transport_id: TransportId },
    ProducerClosed { producer_id: ProducerId },
    ConsumerClosed { consumer_id: ConsumerId },
    DataProducerClosed { data_producer_id: DataProducerId },
    DataConsumerClosed { data_consumer_id: DataConsumerId },
}

impl EngineEvent {
    /// Returns the event name for metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EngineEvent::TransportClosed { .. } => "transport_closed",
            EngineEvent::ProducerClosed { .. } => "producer_closed",
            EngineEvent::ConsumerClosed { .. } => "consumer_closed",
            EngineEvent::DataProducerClosed { .. } => "data_producer_closed",
            EngineEvent::DataConsumerClosed { .. } => "data_consumer_closed",
        }
    }
}
