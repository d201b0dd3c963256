//! Common data types for SFU signaling components.
//!
//! Transport, producer and consumer identifiers are assigned by the media engine and are
//! treated as opaque strings. Session identifiers are assigned by the signaling server.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a client signaling session (one per WebSocket connection)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

macro_rules! engine_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Borrow the raw identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

engine_id!(
    /// Engine-assigned identifier of a WebRTC transport
    TransportId
);
engine_id!(
    /// Engine-assigned identifier of a media producer
    ProducerId
);
engine_id!(
    /// Engine-assigned identifier of a media consumer
    ConsumerId
);
engine_id!(
    /// Engine-assigned identifier of a data producer
    DataProducerId
);
engine_id!(
    /// Engine-assigned identifier of a data consumer
    DataConsumerId
);

/// Kind of media carried by a producer or consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Parse the kind string sent by clients.
    ///
    /// Only `"audio"` selects audio; every other value is treated as video.
    #[must_use]
    pub fn from_wire(kind: &str) -> Self {
        if kind == "audio" {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }

    /// Returns the kind as its wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
