//! `RoomActor` - per-room owner of the media topology.
//!
//! Each `RoomActor`:
//! - Owns at most one engine router, created lazily on the first request that needs it
//! - Owns the room's transports, producers, consumers, data producers and data consumers
//! - Tracks which sessions participate in the room
//! - Applies engine close notifications in the same loop as client requests
//!
//! Requests are processed one at a time, so every map mutation is atomic with respect to
//! every other mutation of the same room. A slow engine call delays later requests for
//! the same room only; other rooms run on their own tasks.
//!
//! # Lifecycle
//!
//! ```text
//! transport:          created -> connected
//! consumer:           paused  -> resumed
//! data consumer:      paused  -> resumed
//! producer:           exists until its transport closes or the engine closes it
//! ```
//!
//! The room ends when the registry asks it to close while it has no participants, or
//! when its cancellation token fires. Dropping the router releases every engine resource
//! the room still holds.

use crate::engine::negotiation;
use crate::errors::SfuError;
use crate::observability::metrics as prom;

use super::messages::{
    ConsumerDescriptor, ConsumerInfo, DataConsumerDescriptor, DataConsumerInfo, DataProducerInfo,
    ProducerInfo, RoomMessage, RoomState, TransportDescriptor, TransportInfo, TransportState,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};

use common::types::{
    ConsumerId, DataConsumerId, DataProducerId, MediaKind, ProducerId, SessionId, TransportId,
};
use media_engine::{
    event_channel, EngineConsumer, EngineDataConsumer, EngineDataProducer, EngineEvent,
    EngineEventReceiver, EngineEventSender, EngineProducer, EngineRouter, EngineTransport,
    MediaEngine, WebRtcTransportSettings,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// Handle to a `RoomActor`.
#[derive(Debug, Clone)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_name: String,
}

impl RoomActorHandle {
    /// Get the room name.
    #[must_use]
    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// Whether both handles address the same room actor.
    #[must_use]
    pub fn same_room(&self, other: &RoomActorHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Whether the room actor has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a request and wait for the reply.
    ///
    /// A room that exits before replying surfaces as `RoomClosed` so callers can
    /// re-resolve the room.
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, SfuError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| SfuError::RoomClosed(self.room_name.clone()))?;

        rx.await
            .map_err(|_| SfuError::RoomClosed(self.room_name.clone()))
    }

    /// Create the router if needed and return its RTP capabilities.
    pub async fn ensure_router(&self, session_id: SessionId) -> Result<Value, SfuError> {
        self.request(|respond_to| RoomMessage::EnsureRouter {
            session_id,
            respond_to,
        })
        .await?
    }

    /// Create a WebRTC transport owned by `session_id`.
    pub async fn create_webrtc_transport(
        &self,
        session_id: SessionId,
    ) -> Result<TransportDescriptor, SfuError> {
        self.request(|respond_to| RoomMessage::CreateWebRtcTransport {
            session_id,
            respond_to,
        })
        .await?
    }

    /// Supply DTLS parameters for a transport.
    pub async fn connect_webrtc_transport(
        &self,
        session_id: SessionId,
        transport_id: TransportId,
        dtls_parameters: Value,
    ) -> Result<(), SfuError> {
        self.request(|respond_to| RoomMessage::ConnectWebRtcTransport {
            session_id,
            transport_id,
            dtls_parameters,
            respond_to,
        })
        .await?
    }

    /// Create a producer on a transport.
    pub async fn produce(
        &self,
        session_id: SessionId,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<ProducerId, SfuError> {
        self.request(|respond_to| RoomMessage::Produce {
            session_id,
            transport_id,
            kind,
            rtp_parameters,
            respond_to,
        })
        .await?
    }

    /// Create a paused consumer of `producer_id` on a transport.
    pub async fn consume(
        &self,
        session_id: SessionId,
        transport_id: TransportId,
        producer_id: ProducerId,
        rtp_capabilities: Value,
    ) -> Result<ConsumerDescriptor, SfuError> {
        self.request(|respond_to| RoomMessage::Consume {
            session_id,
            transport_id,
            producer_id,
            rtp_capabilities,
            respond_to,
        })
        .await?
    }

    /// Resume a paused consumer.
    pub async fn resume_consumer(
        &self,
        session_id: SessionId,
        consumer_id: ConsumerId,
    ) -> Result<(), SfuError> {
        self.request(|respond_to| RoomMessage::ResumeConsumer {
            session_id,
            consumer_id,
            respond_to,
        })
        .await?
    }

    /// Create a data producer on a transport.
    pub async fn produce_data(
        &self,
        session_id: SessionId,
        transport_id: TransportId,
        sctp_stream_parameters: Value,
        label: String,
    ) -> Result<DataProducerId, SfuError> {
        self.request(|respond_to| RoomMessage::ProduceData {
            session_id,
            transport_id,
            sctp_stream_parameters,
            label,
            respond_to,
        })
        .await?
    }

    /// Create a paused data consumer of `data_producer_id` on a transport.
    pub async fn consume_data(
        &self,
        session_id: SessionId,
        transport_id: TransportId,
        data_producer_id: DataProducerId,
    ) -> Result<DataConsumerDescriptor, SfuError> {
        self.request(|respond_to| RoomMessage::ConsumeData {
            session_id,
            transport_id,
            data_producer_id,
            respond_to,
        })
        .await?
    }

    /// Resume a paused data consumer.
    pub async fn resume_data_consumer(
        &self,
        session_id: SessionId,
        data_consumer_id: DataConsumerId,
    ) -> Result<(), SfuError> {
        self.request(|respond_to| RoomMessage::ResumeDataConsumer {
            session_id,
            data_consumer_id,
            respond_to,
        })
        .await?
    }

    /// Remove a session and everything it created. Returns remaining participants.
    pub async fn participant_left(&self, session_id: SessionId) -> Result<usize, SfuError> {
        self.request(|respond_to| RoomMessage::ParticipantLeft {
            session_id,
            respond_to,
        })
        .await
    }

    /// Close the room if nobody participates. Returns whether it closed.
    pub async fn close_if_idle(&self) -> Result<bool, SfuError> {
        self.request(|respond_to| RoomMessage::CloseIfIdle { respond_to })
            .await
    }

    /// Get a snapshot of the room state.
    pub async fn get_state(&self) -> Result<RoomState, SfuError> {
        self.request(|respond_to| RoomMessage::GetState { respond_to })
            .await
    }

    /// Cancel the actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

struct TransportEntry {
    transport: Box<dyn EngineTransport>,
    owner: SessionId,
    state: TransportState,
}

struct ProducerEntry {
    producer: Box<dyn EngineProducer>,
    transport_id: TransportId,
}

struct ConsumerEntry {
    consumer: Box<dyn EngineConsumer>,
    transport_id: TransportId,
    producer_id: ProducerId,
    paused: bool,
}

struct DataProducerEntry {
    data_producer: Box<dyn EngineDataProducer>,
    transport_id: TransportId,
}

struct DataConsumerEntry {
    data_consumer: Box<dyn EngineDataConsumer>,
    transport_id: TransportId,
    data_producer_id: DataProducerId,
    paused: bool,
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    /// Room name.
    room_name: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RoomMessage>,
    /// Cancellation token (child of the registry's token).
    cancel_token: CancellationToken,
    /// Close notifications from the engine, handed to the router on creation.
    events_tx: EngineEventSender,
    events_rx: EngineEventReceiver,
    engine: Arc<dyn MediaEngine>,
    settings: Arc<WebRtcTransportSettings>,
    router: Option<Box<dyn EngineRouter>>,
    participants: HashSet<SessionId>,
    transports: HashMap<TransportId, TransportEntry>,
    producers: HashMap<ProducerId, ProducerEntry>,
    consumers: HashMap<ConsumerId, ConsumerEntry>,
    data_producers: HashMap<DataProducerId, DataProducerEntry>,
    data_consumers: HashMap<DataConsumerId, DataConsumerEntry>,
    /// Room creation timestamp.
    created_at: i64,
    /// Set once `CloseIfIdle` succeeded.
    closing: bool,
    /// Shared actor metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    ///
    /// # Arguments
    ///
    /// * `room_name` - Room name (client-chosen key)
    /// * `engine` - Media engine used to create the router
    /// * `settings` - Listen and ICE/DTLS settings for every transport
    /// * `cancel_token` - Cancellation token (child of the registry's token)
    /// * `metrics` - Shared actor metrics
    pub fn spawn(
        room_name: String,
        engine: Arc<dyn MediaEngine>,
        settings: Arc<WebRtcTransportSettings>,
        cancel_token: CancellationToken,
        metrics: Arc<ActorMetrics>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);
        let (events_tx, events_rx) = event_channel();

        let actor = Self {
            room_name: room_name.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            events_tx,
            events_rx,
            engine,
            settings,
            router: None,
            participants: HashSet::new(),
            transports: HashMap::new(),
            producers: HashMap::new(),
            consumers: HashMap::new(),
            data_producers: HashMap::new(),
            data_consumers: HashMap::new(),
            created_at: chrono::Utc::now().timestamp(),
            closing: false,
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, &room_name),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            room_name,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "sfu.actor.room", fields(room_name = %self.room_name))]
    async fn run(mut self) {
        info!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            "RoomActor started"
        );

        loop {
            tokio::select! {
                // Engine notifications first, so requests never see a closed resource
                // the room has already been told about.
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sfu.actor.room",
                        room_name = %self.room_name,
                        "RoomActor received cancellation signal"
                    );
                    break;
                }

                Some(event) = self.events_rx.recv() => {
                    self.handle_engine_event(event);
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();

                            if self.closing {
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "sfu.actor.room",
                                room_name = %self.room_name,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.release_engine_resources();

        info!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            participants = self.participants.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RoomMessage) {
        if let Some(session_id) = message.session_id() {
            if self.participants.insert(session_id) {
                debug!(
                    target: "sfu.actor.room",
                    room_name = %self.room_name,
                    session_id = %session_id,
                    participants = self.participants.len(),
                    "Participant joined room"
                );
            }
        }

        match message {
            RoomMessage::EnsureRouter { respond_to, .. } => {
                let result = self.handle_ensure_router().await;
                let _ = respond_to.send(result);
            }

            RoomMessage::CreateWebRtcTransport {
                session_id,
                respond_to,
            } => {
                let result = self.handle_create_transport(session_id).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ConnectWebRtcTransport {
                transport_id,
                dtls_parameters,
                respond_to,
                ..
            } => {
                let result = self.handle_connect(&transport_id, dtls_parameters).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::Produce {
                transport_id,
                kind,
                rtp_parameters,
                respond_to,
                ..
            } => {
                let result = self.handle_produce(&transport_id, kind, rtp_parameters).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::Consume {
                transport_id,
                producer_id,
                rtp_capabilities,
                respond_to,
                ..
            } => {
                let result = self
                    .handle_consume(&transport_id, producer_id, rtp_capabilities)
                    .await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ResumeConsumer {
                consumer_id,
                respond_to,
                ..
            } => {
                let result = self.handle_resume_consumer(&consumer_id).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ProduceData {
                transport_id,
                sctp_stream_parameters,
                label,
                respond_to,
                ..
            } => {
                let result = self
                    .handle_produce_data(&transport_id, sctp_stream_parameters, label)
                    .await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ConsumeData {
                transport_id,
                data_producer_id,
                respond_to,
                ..
            } => {
                let result = self
                    .handle_consume_data(&transport_id, data_producer_id)
                    .await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ResumeDataConsumer {
                data_consumer_id,
                respond_to,
                ..
            } => {
                let result = self.handle_resume_data_consumer(&data_consumer_id).await;
                let _ = respond_to.send(result);
            }

            RoomMessage::ParticipantLeft {
                session_id,
                respond_to,
            } => {
                let remaining = self.handle_participant_left(session_id);
                let _ = respond_to.send(remaining);
            }

            RoomMessage::CloseIfIdle { respond_to } => {
                self.closing = self.participants.is_empty();
                if self.closing {
                    debug!(
                        target: "sfu.actor.room",
                        room_name = %self.room_name,
                        "Room idle, closing"
                    );
                    // Marks the handle stale for the registry before the entry is removed.
                    self.cancel_token.cancel();
                }
                let _ = respond_to.send(self.closing);
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
            }
        }
    }

    async fn handle_ensure_router(&mut self) -> Result<Value, SfuError> {
        self.ensure_router().await?;
        Ok(self.router()?.rtp_capabilities())
    }

    /// Create the router on first use. Later calls keep the cached router.
    async fn ensure_router(&mut self) -> Result<(), SfuError> {
        if self.router.is_some() {
            return Ok(());
        }

        let router = self.engine.create_router(self.events_tx.clone()).await?;

        info!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            router_id = %router.id(),
            "Router created"
        );

        self.router = Some(router);
        Ok(())
    }

    fn router(&self) -> Result<&dyn EngineRouter, SfuError> {
        self.router
            .as_deref()
            .ok_or_else(|| SfuError::Internal(format!("router missing in room {}", self.room_name)))
    }

    fn transport_entry(&self, transport_id: &TransportId) -> Result<&TransportEntry, SfuError> {
        self.transports
            .get(transport_id)
            .ok_or_else(|| SfuError::transport_not_found(transport_id, &self.room_name))
    }

    async fn handle_create_transport(
        &mut self,
        owner: SessionId,
    ) -> Result<TransportDescriptor, SfuError> {
        self.ensure_router().await?;

        let router = self.router()?;
        let transport = router.create_webrtc_transport(&self.settings).await?;
        let router_rtp_capabilities = router.rtp_capabilities();

        let transport_id = transport.id();
        let transport_options = transport.connection_options();

        self.transports.insert(
            transport_id.clone(),
            TransportEntry {
                transport,
                owner,
                state: TransportState::Created,
            },
        );

        debug!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            transport_id = %transport_id,
            owner = %owner,
            transports = self.transports.len(),
            "WebRTC transport created"
        );

        Ok(TransportDescriptor {
            transport_id,
            router_rtp_capabilities,
            transport_options,
        })
    }

    /// Forward DTLS parameters. A repeat call goes to the engine as well; whatever the
    /// engine answers is returned, and the transport never leaves `Connected`.
    async fn handle_connect(
        &mut self,
        transport_id: &TransportId,
        dtls_parameters: Value,
    ) -> Result<(), SfuError> {
        let entry = self
            .transports
            .get_mut(transport_id)
            .ok_or_else(|| SfuError::transport_not_found(transport_id, &self.room_name))?;

        entry.transport.connect(dtls_parameters).await?;
        entry.state = TransportState::Connected;

        debug!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            transport_id = %transport_id,
            "WebRTC transport connected"
        );

        Ok(())
    }

    async fn handle_produce(
        &mut self,
        transport_id: &TransportId,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<ProducerId, SfuError> {
        let entry = self.transport_entry(transport_id)?;
        let producer = entry.transport.produce(kind, rtp_parameters).await?;

        let producer_id = producer.id();
        self.producers.insert(
            producer_id.clone(),
            ProducerEntry {
                producer,
                transport_id: transport_id.clone(),
            },
        );

        debug!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            transport_id = %transport_id,
            producer_id = %producer_id,
            kind = %kind,
            "Producer created"
        );

        Ok(producer_id)
    }

    /// Capabilities are checked before the engine is asked for a consumer, so a
    /// rejected request leaves nothing behind in the engine or the room.
    async fn handle_consume(
        &mut self,
        transport_id: &TransportId,
        producer_id: ProducerId,
        rtp_capabilities: Value,
    ) -> Result<ConsumerDescriptor, SfuError> {
        let entry = self.transport_entry(transport_id)?;

        // An unknown producer fails the same way as a codec mismatch.
        if !self.producers.contains_key(&producer_id)
            || !negotiation::can_consume(self.router.as_deref(), &producer_id, &rtp_capabilities)
        {
            debug!(
                target: "sfu.actor.room",
                room_name = %self.room_name,
                producer_id = %producer_id,
                "Consume rejected by capability check"
            );
            return Err(SfuError::IncompatibleCapabilities(producer_id));
        }

        let consumer = entry
            .transport
            .consume(&producer_id, rtp_capabilities)
            .await?;

        let descriptor = ConsumerDescriptor {
            consumer_id: consumer.id(),
            producer_id: consumer.producer_id(),
            kind: consumer.kind(),
            rtp_parameters: consumer.rtp_parameters(),
        };

        self.consumers.insert(
            descriptor.consumer_id.clone(),
            ConsumerEntry {
                consumer,
                transport_id: transport_id.clone(),
                producer_id,
                paused: true,
            },
        );

        debug!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            transport_id = %transport_id,
            consumer_id = %descriptor.consumer_id,
            producer_id = %descriptor.producer_id,
            "Consumer created (paused)"
        );

        Ok(descriptor)
    }

    async fn handle_resume_consumer(&mut self, consumer_id: &ConsumerId) -> Result<(), SfuError> {
        let Some(entry) = self.consumers.get_mut(consumer_id) else {
            warn!(
                target: "sfu.actor.room",
                room_name = %self.room_name,
                consumer_id = %consumer_id,
                "Resume for unknown consumer"
            );
            return Err(SfuError::NotFound(format!(
                "Consumer {consumer_id} not found in room {}",
                self.room_name
            )));
        };

        entry.consumer.resume().await?;
        entry.paused = false;
        Ok(())
    }

    async fn handle_produce_data(
        &mut self,
        transport_id: &TransportId,
        sctp_stream_parameters: Value,
        label: String,
    ) -> Result<DataProducerId, SfuError> {
        let entry = self.transport_entry(transport_id)?;
        let data_producer = entry
            .transport
            .produce_data(sctp_stream_parameters, label)
            .await?;

        let data_producer_id = data_producer.id();
        debug!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            transport_id = %transport_id,
            data_producer_id = %data_producer_id,
            label = %data_producer.label(),
            "Data producer created"
        );

        self.data_producers.insert(
            data_producer_id.clone(),
            DataProducerEntry {
                data_producer,
                transport_id: transport_id.clone(),
            },
        );

        Ok(data_producer_id)
    }

    async fn handle_consume_data(
        &mut self,
        transport_id: &TransportId,
        data_producer_id: DataProducerId,
    ) -> Result<DataConsumerDescriptor, SfuError> {
        let entry = self.transport_entry(transport_id)?;

        if !self.data_producers.contains_key(&data_producer_id) {
            return Err(SfuError::NotFound(format!(
                "DataProducer {data_producer_id} not found in room {}",
                self.room_name
            )));
        }

        let data_consumer = entry.transport.consume_data(&data_producer_id).await?;

        let descriptor = DataConsumerDescriptor {
            data_consumer_id: data_consumer.id(),
            data_producer_id: data_consumer.data_producer_id(),
            sctp_stream_parameters: data_consumer.sctp_stream_parameters(),
            label: data_consumer.label(),
            protocol: data_consumer.protocol(),
        };

        self.data_consumers.insert(
            descriptor.data_consumer_id.clone(),
            DataConsumerEntry {
                data_consumer,
                transport_id: transport_id.clone(),
                data_producer_id,
                paused: true,
            },
        );

        debug!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            transport_id = %transport_id,
            data_consumer_id = %descriptor.data_consumer_id,
            "Data consumer created (paused)"
        );

        Ok(descriptor)
    }

    async fn handle_resume_data_consumer(
        &mut self,
        data_consumer_id: &DataConsumerId,
    ) -> Result<(), SfuError> {
        let Some(entry) = self.data_consumers.get_mut(data_consumer_id) else {
            warn!(
                target: "sfu.actor.room",
                room_name = %self.room_name,
                data_consumer_id = %data_consumer_id,
                "Resume for unknown data consumer"
            );
            return Err(SfuError::NotFound(format!(
                "DataConsumer {data_consumer_id} not found in room {}",
                self.room_name
            )));
        };

        entry.data_consumer.resume().await?;
        entry.paused = false;
        Ok(())
    }

    /// Drop the session and close every transport it created.
    fn handle_participant_left(&mut self, session_id: SessionId) -> usize {
        self.participants.remove(&session_id);

        let owned: Vec<TransportId> = self
            .transports
            .iter()
            .filter(|(_, entry)| entry.owner == session_id)
            .map(|(id, _)| id.clone())
            .collect();
        for transport_id in &owned {
            self.remove_transport(transport_id);
        }

        info!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            session_id = %session_id,
            transports_closed = owned.len(),
            remaining = self.participants.len(),
            "Participant left room"
        );

        self.participants.len()
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        prom::record_engine_event(event.as_str());

        let removed = match &event {
            EngineEvent::TransportClosed { transport_id } => self.remove_transport(transport_id),
            EngineEvent::ProducerClosed { producer_id } => self.remove_producer(producer_id),
            EngineEvent::ConsumerClosed { consumer_id } => {
                self.consumers.remove(consumer_id).is_some()
            }
            EngineEvent::DataProducerClosed { data_producer_id } => {
                self.remove_data_producer(data_producer_id)
            }
            EngineEvent::DataConsumerClosed { data_consumer_id } => {
                self.data_consumers.remove(data_consumer_id).is_some()
            }
        };

        debug!(
            target: "sfu.actor.room",
            room_name = %self.room_name,
            event = event.as_str(),
            removed,
            "Engine close notification"
        );
    }

    /// Remove a transport and everything bound to it. Idempotent.
    fn remove_transport(&mut self, transport_id: &TransportId) -> bool {
        let Some(_transport) = self.transports.remove(transport_id) else {
            return false;
        };

        let producers: Vec<ProducerId> = self
            .producers
            .iter()
            .filter(|(_, p)| &p.transport_id == transport_id)
            .map(|(id, _)| id.clone())
            .collect();
        for producer_id in &producers {
            self.remove_producer(producer_id);
        }

        let data_producers: Vec<DataProducerId> = self
            .data_producers
            .iter()
            .filter(|(_, dp)| &dp.transport_id == transport_id)
            .map(|(id, _)| id.clone())
            .collect();
        for data_producer_id in &data_producers {
            self.remove_data_producer(data_producer_id);
        }

        self.consumers.retain(|_, c| &c.transport_id != transport_id);
        self.data_consumers
            .retain(|_, dc| &dc.transport_id != transport_id);
        true
    }

    /// Remove a producer and every consumer of it. Idempotent.
    fn remove_producer(&mut self, producer_id: &ProducerId) -> bool {
        if self.producers.remove(producer_id).is_none() {
            return false;
        }
        self.consumers.retain(|_, c| &c.producer_id != producer_id);
        true
    }

    /// Remove a data producer and every data consumer of it. Idempotent.
    fn remove_data_producer(&mut self, data_producer_id: &DataProducerId) -> bool {
        if self.data_producers.remove(data_producer_id).is_none() {
            return false;
        }
        self.data_consumers
            .retain(|_, dc| &dc.data_producer_id != data_producer_id);
        true
    }

    /// Release engine handles, leaves first, router last.
    fn release_engine_resources(&mut self) {
        self.data_consumers.clear();
        self.consumers.clear();
        self.data_producers.clear();
        self.producers.clear();
        self.transports.clear();
        if let Some(router) = self.router.take() {
            debug!(
                target: "sfu.actor.room",
                room_name = %self.room_name,
                router_id = %router.id(),
                "Router closed"
            );
        }
    }

    fn get_state(&self) -> RoomState {
        let mut participants: Vec<SessionId> = self.participants.iter().copied().collect();
        participants.sort();

        let mut transports: Vec<TransportInfo> = self
            .transports
            .iter()
            .map(|(id, t)| TransportInfo {
                transport_id: id.clone(),
                owner: t.owner,
                state: t.state,
            })
            .collect();
        transports.sort_by(|a, b| a.transport_id.cmp(&b.transport_id));

        let mut producers: Vec<ProducerInfo> = self
            .producers
            .iter()
            .map(|(id, p)| ProducerInfo {
                producer_id: id.clone(),
                transport_id: p.transport_id.clone(),
                kind: p.producer.kind(),
            })
            .collect();
        producers.sort_by(|a, b| a.producer_id.cmp(&b.producer_id));

        let mut consumers: Vec<ConsumerInfo> = self
            .consumers
            .iter()
            .map(|(id, c)| ConsumerInfo {
                consumer_id: id.clone(),
                transport_id: c.transport_id.clone(),
                producer_id: c.producer_id.clone(),
                paused: c.paused,
            })
            .collect();
        consumers.sort_by(|a, b| a.consumer_id.cmp(&b.consumer_id));

        let mut data_producers: Vec<DataProducerInfo> = self
            .data_producers
            .iter()
            .map(|(id, dp)| DataProducerInfo {
                data_producer_id: id.clone(),
                transport_id: dp.transport_id.clone(),
                label: dp.data_producer.label(),
            })
            .collect();
        data_producers.sort_by(|a, b| a.data_producer_id.cmp(&b.data_producer_id));

        let mut data_consumers: Vec<DataConsumerInfo> = self
            .data_consumers
            .iter()
            .map(|(id, dc)| DataConsumerInfo {
                data_consumer_id: id.clone(),
                transport_id: dc.transport_id.clone(),
                data_producer_id: dc.data_producer_id.clone(),
                paused: dc.paused,
            })
            .collect();
        data_consumers.sort_by(|a, b| a.data_consumer_id.cmp(&b.data_consumer_id));

        RoomState {
            room_name: self.room_name.clone(),
            router_id: self.router.as_ref().map(|r| r.id()),
            participants,
            transports,
            producers,
            consumers,
            data_producers,
            data_consumers,
            created_at: self.created_at,
        }
    }
}
