//! WebSocket signaling front end.
//!
//! ```text
//! WebSocket ──> connection (decode, one task per request)
//!                   └──> Dispatcher ──> RoomRegistryActor ──> RoomActor
//! ```
//!
//! # Modules
//!
//! - [`protocol`] - Wire frames, request decoding and response payloads
//! - [`dispatcher`] - Resolves rooms and produces exactly one response per request
//! - [`connection`] - Per-WebSocket task and disconnect cleanup
//! - [`server`] - Axum routes for the `/ws` endpoint

pub mod connection;
pub mod dispatcher;
pub mod protocol;
pub mod server;

pub use dispatcher::{Dispatcher, Responder, Session};
pub use protocol::{decode_frame, ClientRequest, Request, ServerFrame};
pub use server::{build_routes, SignalingState};
