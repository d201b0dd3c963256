//! `RoomRegistryActor` - singleton supervisor for room actors.
//!
//! The `RoomRegistryActor` is the top-level actor in the SFU hierarchy:
//!
//! - Singleton per SFU instance
//! - Maps room names to `RoomActor` instances, creating rooms on first reference
//! - Releases rooms once their last participant has left
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors child actor health (panic detection via `JoinHandle`)
//!
//! All lookups go through the registry's mailbox, so two concurrent first lookups of the
//! same name are serialized and observe the same room.
//!
//! # Graceful Shutdown
//!
//! On SIGTERM, the registry:
//! 1. Stops accepting new rooms
//! 2. Cancels the root `CancellationToken` (propagates to all rooms)
//! 3. Waits for room actors to release their engine resources

use crate::errors::SfuError;

use super::messages::{RegistryMessage, RegistryStatus};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomActorHandle};

use media_engine::{MediaEngine, WebRtcTransportSettings};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// How long the registry waits for a room to answer `CloseIfIdle`.
const CLOSE_IF_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the `RoomRegistryActor`.
///
/// This is the public interface for interacting with the registry.
/// All methods are async and return results via oneshot channels.
#[derive(Debug, Clone)]
pub struct RoomRegistryActorHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RoomRegistryActorHandle {
    /// Create a new `RoomRegistryActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    ///
    /// # Arguments
    ///
    /// * `sfu_id` - SFU instance ID
    /// * `engine` - Media engine shared by every room
    /// * `settings` - Transport settings shared by every room
    /// * `max_rooms` - Upper bound on concurrently live rooms
    /// * `metrics` - Shared actor metrics
    #[must_use]
    pub fn new(
        sfu_id: String,
        engine: Arc<dyn MediaEngine>,
        settings: Arc<WebRtcTransportSettings>,
        max_rooms: usize,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RoomRegistryActor::new(
            sfu_id,
            receiver,
            sender.downgrade(),
            cancel_token.clone(),
            engine,
            settings,
            max_rooms,
            metrics,
        );

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Return the room named `room_name`, creating it if it does not exist.
    pub async fn get_or_create_room(&self, room_name: String) -> Result<RoomActorHandle, SfuError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetOrCreateRoom {
                room_name,
                respond_to: tx,
            })
            .await
            .map_err(|e| SfuError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))?
    }

    /// Close and forget the room if it has no participants.
    ///
    /// Returns whether the room was released.
    pub async fn release_room(&self, room_name: String) -> Result<bool, SfuError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::ReleaseRoom {
                room_name,
                respond_to: tx,
            })
            .await
            .map_err(|e| SfuError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))
    }

    /// Get the current registry status.
    pub async fn get_status(&self) -> Result<RegistryStatus, SfuError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| SfuError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))
    }

    /// Initiate graceful shutdown.
    pub async fn shutdown(&self) -> Result<(), SfuError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(RegistryMessage::Shutdown { respond_to: tx })
            .await
            .map_err(|e| SfuError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SfuError::Internal(format!("response receive failed: {e}")))?
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for spawning child tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    /// Handle to the room actor.
    handle: RoomActorHandle,
    /// Join handle for monitoring the actor task.
    task_handle: JoinHandle<()>,
    /// Room creation timestamp.
    created_at: i64,
}

/// The `RoomRegistryActor` implementation.
///
/// This struct owns the actor state and runs the message loop.
pub struct RoomRegistryActor {
    /// SFU instance ID.
    sfu_id: String,
    /// Message receiver.
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Own mailbox, for release tasks reporting back. Weak so handles alone keep it open.
    mailbox_tx: mpsc::WeakSender<RegistryMessage>,
    /// Cancellation token (root).
    cancel_token: CancellationToken,
    engine: Arc<dyn MediaEngine>,
    settings: Arc<WebRtcTransportSettings>,
    /// Live rooms by name.
    rooms: HashMap<String, ManagedRoom>,
    max_rooms: usize,
    /// Whether the registry is accepting new rooms.
    accepting_new: bool,
    /// Shared metrics.
    metrics: Arc<ActorMetrics>,
    /// Mailbox monitor.
    mailbox: MailboxMonitor,
}

impl RoomRegistryActor {
    fn new(
        sfu_id: String,
        receiver: mpsc::Receiver<RegistryMessage>,
        mailbox_tx: mpsc::WeakSender<RegistryMessage>,
        cancel_token: CancellationToken,
        engine: Arc<dyn MediaEngine>,
        settings: Arc<WebRtcTransportSettings>,
        max_rooms: usize,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let mailbox = MailboxMonitor::new(ActorType::Registry, &sfu_id);

        Self {
            sfu_id,
            receiver,
            mailbox_tx,
            cancel_token,
            engine,
            settings,
            rooms: HashMap::new(),
            max_rooms,
            accepting_new: true,
            metrics,
            mailbox,
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "sfu.actor.registry", fields(sfu_id = %self.sfu_id))]
    async fn run(mut self) {
        info!(
            target: "sfu.actor.registry",
            sfu_id = %self.sfu_id,
            max_rooms = self.max_rooms,
            "RoomRegistryActor started"
        );

        loop {
            // Check for terminated room actors
            self.check_room_health();

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sfu.actor.registry",
                        sfu_id = %self.sfu_id,
                        "RoomRegistryActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_enqueue();
                            self.handle_message(message);
                            self.mailbox.record_dequeue();
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "sfu.actor.registry",
                                sfu_id = %self.sfu_id,
                                "RoomRegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "sfu.actor.registry",
            sfu_id = %self.sfu_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomRegistryActor stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::GetOrCreateRoom {
                room_name,
                respond_to,
            } => {
                let result = self.get_or_create_room(room_name);
                let _ = respond_to.send(result);
            }

            RegistryMessage::ReleaseRoom {
                room_name,
                respond_to,
            } => {
                self.release_room(room_name, respond_to);
            }

            RegistryMessage::RoomReleased {
                room_name,
                handle,
                respond_to,
            } => {
                self.forget_room(&room_name, &handle);
                let _ = respond_to.send(true);
            }

            RegistryMessage::GetStatus { respond_to } => {
                let _ = respond_to.send(self.get_status());
            }

            RegistryMessage::Shutdown { respond_to } => {
                let result = self.initiate_shutdown();
                let _ = respond_to.send(result);
            }
        }
    }

    /// Look up a room, spawning its actor on first reference.
    fn get_or_create_room(&mut self, room_name: String) -> Result<RoomActorHandle, SfuError> {
        if let Some(managed) = self.rooms.get(&room_name) {
            if !managed.task_handle.is_finished() && !managed.handle.is_cancelled() {
                return Ok(managed.handle.clone());
            }
            // Exited or closing; replaced below.
            self.reap_room(&room_name);
        }

        if !self.accepting_new {
            return Err(SfuError::Draining);
        }

        if self.rooms.len() >= self.max_rooms {
            warn!(
                target: "sfu.actor.registry",
                sfu_id = %self.sfu_id,
                room_name = %room_name,
                max_rooms = self.max_rooms,
                "Room capacity reached"
            );
            return Err(SfuError::CapacityExceeded(self.max_rooms));
        }

        let room_token = self.cancel_token.child_token();
        let (handle, task_handle) = RoomActor::spawn(
            room_name.clone(),
            Arc::clone(&self.engine),
            Arc::clone(&self.settings),
            room_token,
            Arc::clone(&self.metrics),
        );

        self.rooms.insert(
            room_name.clone(),
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
                created_at: chrono::Utc::now().timestamp(),
            },
        );

        self.metrics.room_created();

        info!(
            target: "sfu.actor.registry",
            sfu_id = %self.sfu_id,
            room_name = %room_name,
            total_rooms = self.rooms.len(),
            "Room actor created"
        );

        Ok(handle)
    }

    /// Ask the room to close if idle and forget it on success.
    ///
    /// The room is asked from a separate task: a room busy with an engine call must not
    /// hold up lookups of other rooms. A confirmed close comes back as `RoomReleased`.
    fn release_room(&mut self, room_name: String, respond_to: oneshot::Sender<bool>) {
        let Some(managed) = self.rooms.get(&room_name) else {
            let _ = respond_to.send(false);
            return;
        };

        let handle = managed.handle.clone();
        let mailbox_tx = self.mailbox_tx.clone();
        let sfu_id = self.sfu_id.clone();
        tokio::spawn(async move {
            let closed = match tokio::time::timeout(CLOSE_IF_IDLE_TIMEOUT, handle.close_if_idle())
                .await
            {
                Ok(Ok(closed)) => closed,
                // Already gone: forget it.
                Ok(Err(_)) => true,
                Err(_) => {
                    warn!(
                        target: "sfu.actor.registry",
                        sfu_id = %sfu_id,
                        room_name = %room_name,
                        "Room did not answer close request in time"
                    );
                    false
                }
            };

            if !closed {
                debug!(
                    target: "sfu.actor.registry",
                    sfu_id = %sfu_id,
                    room_name = %room_name,
                    "Room still has participants, keeping it"
                );
                let _ = respond_to.send(false);
                return;
            }

            let Some(sender) = mailbox_tx.upgrade() else {
                let _ = respond_to.send(false);
                return;
            };
            // On failure the registry is gone and `respond_to` drops with the message.
            let _ = sender
                .send(RegistryMessage::RoomReleased {
                    room_name,
                    handle,
                    respond_to,
                })
                .await;
        });
    }

    /// Remove a closed room, unless the name already maps to a newer room.
    fn forget_room(&mut self, room_name: &str, handle: &RoomActorHandle) {
        let is_current = self
            .rooms
            .get(room_name)
            .is_some_and(|managed| managed.handle.same_room(handle));
        if !is_current {
            debug!(
                target: "sfu.actor.registry",
                sfu_id = %self.sfu_id,
                room_name = %room_name,
                "Released room already replaced or reaped"
            );
            return;
        }

        let Some(managed) = self.rooms.remove(room_name) else {
            return;
        };

        let room_name_owned = room_name.to_string();
        let sfu_id = self.sfu_id.clone();
        let lifetime_secs = chrono::Utc::now().timestamp() - managed.created_at;
        tokio::spawn(async move {
            match tokio::time::timeout(Duration::from_secs(5), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "sfu.actor.registry",
                        sfu_id = %sfu_id,
                        room_name = %room_name_owned,
                        "Room actor task completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "sfu.actor.registry",
                        sfu_id = %sfu_id,
                        room_name = %room_name_owned,
                        error = ?e,
                        "Room actor task panicked during release"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "sfu.actor.registry",
                        sfu_id = %sfu_id,
                        room_name = %room_name_owned,
                        "Room actor task cleanup timed out"
                    );
                }
            }
        });

        self.metrics.room_removed();

        info!(
            target: "sfu.actor.registry",
            sfu_id = %self.sfu_id,
            room_name = %room_name,
            lifetime_secs,
            total_rooms = self.rooms.len(),
            "Room released"
        );
    }

    /// Get current registry status.
    fn get_status(&self) -> RegistryStatus {
        RegistryStatus {
            room_count: self.rooms.len(),
            is_draining: !self.accepting_new,
            mailbox_depth: self.mailbox.current_depth(),
        }
    }

    /// Initiate graceful shutdown.
    fn initiate_shutdown(&mut self) -> Result<(), SfuError> {
        info!(
            target: "sfu.actor.registry",
            sfu_id = %self.sfu_id,
            room_count = self.rooms.len(),
            "Initiating graceful shutdown"
        );

        self.accepting_new = false;

        // Cancel the root token (propagates to all rooms)
        self.cancel_token.cancel();

        Ok(())
    }

    /// Perform graceful shutdown.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "sfu.actor.registry",
            sfu_id = %self.sfu_id,
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        self.accepting_new = false;

        for managed in self.rooms.values() {
            managed.handle.cancel();
        }

        for (room_name, managed) in self.rooms.drain() {
            match tokio::time::timeout(Duration::from_secs(30), managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "sfu.actor.registry",
                        sfu_id = %self.sfu_id,
                        room_name = %room_name,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "sfu.actor.registry",
                        sfu_id = %self.sfu_id,
                        room_name = %room_name,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "sfu.actor.registry",
                        sfu_id = %self.sfu_id,
                        room_name = %room_name,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
        }

        info!(
            target: "sfu.actor.registry",
            sfu_id = %self.sfu_id,
            "Graceful shutdown complete"
        );
    }

    /// Check health of managed room actors.
    fn check_room_health(&mut self) {
        let finished: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, managed)| managed.task_handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();

        for room_name in finished {
            let closing = self
                .rooms
                .get(&room_name)
                .is_some_and(|managed| managed.handle.is_cancelled());
            if !closing {
                warn!(
                    target: "sfu.actor.registry",
                    sfu_id = %self.sfu_id,
                    room_name = %room_name,
                    "Room actor task finished unexpectedly"
                );
            }
            self.reap_room(&room_name);
        }
    }

    /// Drop a finished room, recording a panic if it crashed.
    fn reap_room(&mut self, room_name: &str) {
        let Some(managed) = self.rooms.remove(room_name) else {
            return;
        };

        let sfu_id = self.sfu_id.clone();
        let room_name_owned = room_name.to_string();
        let metrics = Arc::clone(&self.metrics);
        // The task is already finished; awaiting it only collects the outcome.
        tokio::spawn(async move {
            match managed.task_handle.await {
                Ok(()) => {
                    info!(
                        target: "sfu.actor.registry",
                        sfu_id = %sfu_id,
                        room_name = %room_name_owned,
                        "Room actor exited cleanly"
                    );
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "sfu.actor.registry",
                            sfu_id = %sfu_id,
                            room_name = %room_name_owned,
                            error = ?join_error,
                            "Room actor panicked - triggering investigation"
                        );
                        metrics.record_panic(ActorType::Room);
                    }
                }
            }
        });

        self.metrics.room_removed();
    }
}
