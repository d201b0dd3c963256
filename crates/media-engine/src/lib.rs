//! Media engine seam for the SFU signaling coordinator.
//!
//! The signaling core never touches RTP, DTLS, ICE or SCTP itself. It drives an external
//! media engine through the traits in this crate:
//!
//! ```text
//! MediaEngine
//! └── EngineRouter (one per room)
//!     └── EngineTransport (WebRTC transport)
//!         ├── EngineProducer / EngineDataProducer
//!         └── EngineConsumer / EngineDataConsumer (created paused)
//! ```
//!
//! All structured parameter blobs (RTP parameters, RTP capabilities, DTLS parameters, SCTP
//! stream parameters, transport connection options) are carried as [`serde_json::Value`] and
//! only interpreted by the adapter.
//!
//! Resources closed by the engine itself (for example producers torn down because their
//! transport closed) are reported on the [`EngineEventSender`] handed to
//! [`MediaEngine::create_router`].
//!
//! # Modules
//!
//! - [`error`] - Engine error type
//! - [`events`] - Close notifications emitted by the engine
//! - [`settings`] - WebRTC transport listen/ICE/DTLS settings
//! - `mediasoup` - Adapter over a mediasoup worker (feature `mediasoup`)

pub mod error;
pub mod events;
pub mod settings;

#[cfg(feature = "mediasoup")]
pub mod mediasoup;

pub use error::EngineError;
pub use events::{event_channel, EngineEvent, EngineEventReceiver, EngineEventSender};
pub use settings::WebRtcTransportSettings;

use async_trait::async_trait;
use common::types::{
    ConsumerId, DataConsumerId, DataProducerId, MediaKind, ProducerId, TransportId,
};
use serde_json::Value;

/// Entry point into the media engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a router (media session context) for one room.
    ///
    /// Close notifications for every resource created under this router are delivered
    /// on `events`.
    async fn create_router(
        &self,
        events: EngineEventSender,
    ) -> Result<Box<dyn EngineRouter>, EngineError>;
}

/// Per-room media session context.
#[async_trait]
pub trait EngineRouter: Send + Sync {
    /// Engine-assigned router ID.
    fn id(&self) -> String;

    /// RTP capabilities clients need to load their device.
    fn rtp_capabilities(&self) -> Value;

    /// Whether a consumer with the given RTP capabilities can consume the producer.
    fn can_consume(&self, producer_id: &ProducerId, rtp_capabilities: &Value) -> bool;

    /// Create a new WebRTC transport.
    async fn create_webrtc_transport(
        &self,
        settings: &WebRtcTransportSettings,
    ) -> Result<Box<dyn EngineTransport>, EngineError>;
}

/// A negotiated ICE/DTLS network endpoint.
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Engine-assigned transport ID.
    fn id(&self) -> TransportId;

    /// Connection parameters the client needs (ICE parameters and candidates, DTLS
    /// parameters, SCTP parameters), opaque to the signaling core.
    fn connection_options(&self) -> Value;

    /// Supply the client's DTLS parameters.
    async fn connect(&self, dtls_parameters: Value) -> Result<(), EngineError>;

    /// Create a producer on this transport.
    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<Box<dyn EngineProducer>, EngineError>;

    /// Create a paused consumer of `producer_id` on this transport.
    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
    ) -> Result<Box<dyn EngineConsumer>, EngineError>;

    /// Create a data producer on this transport.
    async fn produce_data(
        &self,
        sctp_stream_parameters: Value,
        label: String,
    ) -> Result<Box<dyn EngineDataProducer>, EngineError>;

    /// Create a paused data consumer of `data_producer_id` on this transport.
    async fn consume_data(
        &self,
        data_producer_id: &DataProducerId,
    ) -> Result<Box<dyn EngineDataConsumer>, EngineError>;
}

/// A source of media bound to one transport.
pub trait EngineProducer: Send + Sync {
    fn id(&self) -> ProducerId;
    fn kind(&self) -> MediaKind;
}

/// A sink of media from one producer, bound to one transport.
#[async_trait]
pub trait EngineConsumer: Send + Sync {
    fn id(&self) -> ConsumerId;
    fn producer_id(&self) -> ProducerId;
    fn kind(&self) -> MediaKind;
    /// Negotiated RTP parameters for the client.
    fn rtp_parameters(&self) -> Value;
    /// Start media flow.
    async fn resume(&self) -> Result<(), EngineError>;
}

/// A source of data channel messages bound to one transport.
pub trait EngineDataProducer: Send + Sync {
    fn id(&self) -> DataProducerId;
    fn label(&self) -> String;
}

/// A sink of data channel messages from one data producer, bound to one transport.
#[async_trait]
pub trait EngineDataConsumer: Send + Sync {
    fn id(&self) -> DataConsumerId;
    fn data_producer_id(&self) -> DataProducerId;
    fn label(&self) -> String;
    fn protocol(&self) -> String;
    fn sctp_stream_parameters(&self) -> Option<Value>;
    /// Start message flow.
    async fn resume(&self) -> Result<(), EngineError>;
}
