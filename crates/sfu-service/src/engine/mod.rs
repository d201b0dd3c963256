//! Media engine integration.
//!
//! The engine itself lives behind the traits of the `media-engine` crate. This module
//! re-exports the seam for the actors and holds the one piece of engine-facing logic the
//! signaling core owns: deciding whether a consumer may be created.

pub mod negotiation;

pub use media_engine::{
    event_channel, EngineConsumer, EngineDataConsumer, EngineDataProducer, EngineError,
    EngineEvent, EngineEventReceiver, EngineEventSender, EngineProducer, EngineRouter,
    EngineTransport, MediaEngine, WebRtcTransportSettings,
};
pub use negotiation::can_consume;
