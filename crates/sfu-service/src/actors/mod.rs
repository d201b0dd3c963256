//! Actor model implementation for the SFU signaling coordinator.
//!
//! ```text
//! RoomRegistryActor (singleton per SFU instance)
//! └── supervises N RoomActors
//!     └── RoomActor (one per live room)
//!         ├── owns the engine router
//!         └── owns transports, producers, consumers, data producers, data consumers
//! ```
//!
//! # Key Design Decisions
//!
//! - **Serial rooms**: a room applies one request or engine notification at a time, so
//!   its maps never see interleaved mutations
//! - **Single entry point for rooms**: only the registry creates rooms, so concurrent
//!   first lookups of a name observe one instance
//! - **CancellationToken propagation**: the registry hands each room a child token
//! - **Mailbox monitoring**: depth thresholds with metrics (Room: 100/500)
//!
//! # Modules
//!
//! - [`registry`] - `RoomRegistryActor` singleton that supervises rooms
//! - [`room`] - `RoomActor` per live room, owns the media topology
//! - [`messages`] - Message types for actor communication
//! - [`metrics`] - Mailbox monitoring and actor metrics

pub mod messages;
pub mod metrics;
pub mod registry;
pub mod room;

// Re-export primary types
pub use messages::*;
pub use metrics::{ActorMetrics, ActorType, MailboxMonitor};
pub use registry::{RoomRegistryActor, RoomRegistryActorHandle};
pub use room::{RoomActor, RoomActorHandle};
