//! SFU Signaling Service Library
//!
//! Room signaling coordinator for an external WebRTC media engine:
//!
//! - Groups peers into named rooms, one media router per live room
//! - Drives the transport, producer and consumer lifecycle on behalf of clients
//! - Checks receive capabilities before creating consumers
//! - Cascades engine close notifications through the room topology
//! - Releases rooms and their engine resources when the last participant leaves
//!
//! # Architecture
//!
//! ```text
//! WebSocket sessions ──> Dispatcher
//!                           └──> RoomRegistryActor (singleton)
//!                                  └── RoomActor (one per live room)
//!                                        └── engine router, transports, producers, consumers
//! ```
//!
//! # Modules
//!
//! - [`actors`] - Room registry and per-room actors
//! - [`config`] - Service configuration from environment
//! - [`engine`] - Media engine seam and capability negotiation
//! - [`errors`] - Error types with client messages and metric labels
//! - [`observability`] - Prometheus metrics and health endpoints
//! - [`signaling`] - WebSocket wire protocol and request dispatch

#![warn(clippy::pedantic)]

pub mod actors;
pub mod config;
pub mod engine;
pub mod errors;
pub mod observability;
pub mod signaling;
