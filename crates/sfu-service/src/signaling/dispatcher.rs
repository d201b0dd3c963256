//! Request dispatch: signaling requests to room actors.
//!
//! The dispatcher resolves the addressed room through the registry, forwards the request
//! to the room actor and turns the outcome into exactly one response. It keeps no room
//! state of its own.
//!
//! A room that closes between lookup and delivery answers `RoomClosed`; the dispatcher
//! resolves the name again once, which yields a fresh room.

use crate::actors::{RoomActorHandle, RoomRegistryActorHandle};
use crate::errors::SfuError;
use crate::observability::metrics as prom;

use super::protocol::{
    encode_payload, ConnectWebRtcTransportResponse, ConsumeDataResponse, ConsumeResponse,
    CreateWebRtcTransportResponse, ErrorResponse, ProduceDataResponse, ProduceResponse,
    Request, ServerFrame,
};

use common::types::{MediaKind, SessionId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// One signaling connection's identity and the rooms it has addressed.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    rooms: Arc<Mutex<HashMap<String, RoomActorHandle>>>,
}

impl Session {
    /// Create a session with a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            rooms: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Names of the rooms this session has addressed, sorted.
    #[must_use]
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_rooms().keys().cloned().collect();
        names.sort();
        names
    }

    fn joined(&self, room: &RoomActorHandle) {
        self.lock_rooms()
            .insert(room.room_name().to_string(), room.clone());
    }

    fn take_rooms(&self) -> Vec<(String, RoomActorHandle)> {
        let mut rooms: Vec<_> = self.lock_rooms().drain().collect();
        rooms.sort_by(|a, b| a.0.cmp(&b.0));
        rooms
    }

    fn lock_rooms(&self) -> std::sync::MutexGuard<'_, HashMap<String, RoomActorHandle>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Sends the single response to one request. Consumed on use.
#[derive(Debug)]
pub struct Responder {
    ack: u64,
    outbound: mpsc::Sender<ServerFrame>,
}

impl Responder {
    #[must_use]
    pub fn new(ack: u64, outbound: mpsc::Sender<ServerFrame>) -> Self {
        Self { ack, outbound }
    }

    /// Deliver `data` as the response. A client that already went away is not an error.
    pub async fn send(self, data: Value) {
        let ack = self.ack;
        if self.outbound.send(ServerFrame { ack, data }).await.is_err() {
            debug!(target: "sfu.signaling", ack, "Response dropped, connection closed");
        }
    }
}

/// Routes decoded requests to room actors.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: RoomRegistryActorHandle,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: RoomRegistryActorHandle) -> Self {
        Self { registry }
    }

    /// The registry rooms are resolved through.
    #[must_use]
    pub fn registry(&self) -> &RoomRegistryActorHandle {
        &self.registry
    }

    /// Handle one request and answer it through `responder`.
    ///
    /// Resume requests never answer, even when a responder is supplied; their failures
    /// are only logged.
    #[instrument(
        skip_all,
        name = "sfu.signaling.request",
        fields(session_id = %session.id(), request = request.name())
    )]
    pub async fn dispatch(&self, session: &Session, request: Request, responder: Option<Responder>) {
        let start = Instant::now();
        let name = request.name();
        let responder = if request.expects_response() {
            responder
        } else {
            None
        };

        let result = self.execute(session, request).await;

        let status = if result.is_ok() { "success" } else { "error" };
        prom::record_request(name, status, start.elapsed());

        match result {
            Ok(payload) => {
                debug!(target: "sfu.signaling", request = name, "Request completed");
                if let Some(responder) = responder {
                    responder.send(payload).await;
                }
            }
            Err(err) => {
                prom::record_error(name, err.error_type_label());
                warn!(
                    target: "sfu.signaling",
                    request = name,
                    error_type = err.error_type_label(),
                    error = %err,
                    "Request failed"
                );
                if let Some(responder) = responder {
                    responder.send(ErrorResponse::from_error(&err).to_value()).await;
                }
            }
        }
    }

    async fn execute(&self, session: &Session, request: Request) -> Result<Value, SfuError> {
        let room_name = request.room_name().to_string();

        let room = self.registry.get_or_create_room(room_name.clone()).await?;
        session.joined(&room);

        match self.apply(&room, session.id(), request.clone()).await {
            Err(SfuError::RoomClosed(_)) => {
                debug!(
                    target: "sfu.signaling",
                    room_name = %room_name,
                    "Room closed before delivery, resolving again"
                );
                let room = self.registry.get_or_create_room(room_name).await?;
                session.joined(&room);
                self.apply(&room, session.id(), request).await
            }
            other => other,
        }
    }

    async fn apply(
        &self,
        room: &RoomActorHandle,
        session_id: SessionId,
        request: Request,
    ) -> Result<Value, SfuError> {
        match request {
            Request::CreateWebRtcTransport(_) => {
                let transport = room.create_webrtc_transport(session_id).await?;
                encode_payload(&CreateWebRtcTransportResponse {
                    router_rtp_capabilities: transport.router_rtp_capabilities,
                    transport_options: transport.transport_options,
                })
            }
            Request::ConnectWebRtcTransport(r) => {
                room.connect_webrtc_transport(session_id, r.transport_id, r.dtls_parameters)
                    .await?;
                encode_payload(&ConnectWebRtcTransportResponse {})
            }
            Request::Produce(r) => {
                let kind = MediaKind::from_wire(&r.kind);
                let producer_id = room
                    .produce(session_id, r.transport_id, kind, r.rtp_parameters)
                    .await?;
                encode_payload(&ProduceResponse { producer_id })
            }
            Request::Consume(r) => {
                let consumer = room
                    .consume(session_id, r.transport_id, r.producer_id, r.rtp_capabilities)
                    .await?;
                encode_payload(&ConsumeResponse {
                    id: consumer.consumer_id,
                    producer_id: consumer.producer_id,
                    kind: consumer.kind,
                    rtp_parameters: consumer.rtp_parameters,
                })
            }
            Request::ResumeConsumer(r) => {
                room.resume_consumer(session_id, r.consumer_id).await?;
                Ok(Value::Null)
            }
            Request::ProduceData(r) => {
                let data_producer_id = room
                    .produce_data(session_id, r.transport_id, r.sctp_stream_parameters, r.label)
                    .await?;
                encode_payload(&ProduceDataResponse { data_producer_id })
            }
            Request::ConsumeData(r) => {
                let data_consumer = room
                    .consume_data(session_id, r.transport_id, r.data_producer_id)
                    .await?;
                encode_payload(&ConsumeDataResponse {
                    data_consumer_id: data_consumer.data_consumer_id,
                    data_producer_id: data_consumer.data_producer_id,
                    sctp_stream_parameters: data_consumer.sctp_stream_parameters,
                    label: data_consumer.label,
                    protocol: data_consumer.protocol,
                })
            }
            Request::ResumeDataConsumer(r) => {
                room.resume_data_consumer(session_id, r.data_consumer_id)
                    .await?;
                Ok(Value::Null)
            }
        }
    }

    /// Remove a closed session from every room it addressed, releasing rooms it leaves
    /// empty.
    #[instrument(skip_all, name = "sfu.signaling.session_closed", fields(session_id = %session.id()))]
    pub async fn session_closed(&self, session: &Session) {
        for (room_name, room) in session.take_rooms() {
            let remaining = match room.participant_left(session.id()).await {
                Ok(remaining) => remaining,
                Err(SfuError::RoomClosed(_)) => continue,
                Err(e) => {
                    warn!(target: "sfu.signaling", room_name = %room_name, error = %e, "Failed to leave room");
                    continue;
                }
            };

            if remaining > 0 {
                continue;
            }

            match self.registry.release_room(room_name.clone()).await {
                Ok(true) => {
                    info!(target: "sfu.signaling", room_name = %room_name, "Released empty room");
                }
                Ok(false) => {
                    debug!(target: "sfu.signaling", room_name = %room_name, "Room gained a participant, kept");
                }
                Err(e) => {
                    warn!(target: "sfu.signaling", room_name = %room_name, error = %e, "Failed to release room");
                }
            }
        }
    }
}
