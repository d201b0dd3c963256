//! Per-connection signaling task.
//!
//! One task per WebSocket. It decodes client frames, runs each request on its own task
//! so a slow room never blocks requests to other rooms, and writes responses back in the
//! order they complete.
//!
//! On disconnect the task waits for its in-flight requests, then removes the session from
//! every room it addressed.

use crate::actors::{ActorMetrics, ActorType, MailboxMonitor};

use super::dispatcher::{Dispatcher, Responder, Session};
use super::protocol::{self, ErrorResponse, ServerFrame};

use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Outbound response buffer per connection.
const OUTBOUND_BUFFER: usize = 64;

/// Serve one signaling WebSocket until the client leaves or `cancel_token` fires.
#[instrument(skip_all, name = "sfu.signaling.connection", fields(session_id = tracing::field::Empty))]
pub async fn serve_socket(
    mut socket: WebSocket,
    dispatcher: Dispatcher,
    metrics: Arc<ActorMetrics>,
    cancel_token: CancellationToken,
) {
    let session = Session::new();
    tracing::Span::current().record("session_id", tracing::field::display(session.id()));
    let mailbox = MailboxMonitor::new(ActorType::Connection, session.id().to_string());

    metrics.session_opened();
    info!(target: "sfu.signaling", "Signaling session opened");

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(target: "sfu.signaling", "Connection cancelled");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }

            Some(frame) = outbound_rx.recv() => {
                if let Err(e) = socket.send(Message::Text(frame.to_text())).await {
                    debug!(target: "sfu.signaling", error = %e, "Write failed, closing");
                    break;
                }
            }

            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                mailbox.record_dequeue();
                metrics.record_message_processed();
                if let Err(e) = joined {
                    if e.is_panic() {
                        metrics.record_panic(ActorType::Connection);
                    }
                }
            }

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match protocol::decode_frame(&text) {
                        Ok(decoded) => {
                            mailbox.record_enqueue();
                            let responder = decoded
                                .ack
                                .map(|ack| Responder::new(ack, outbound_tx.clone()));
                            let dispatcher = dispatcher.clone();
                            let session = session.clone();
                            in_flight.spawn(async move {
                                dispatcher.dispatch(&session, decoded.request, responder).await;
                            });
                        }
                        Err(rejected) => {
                            warn!(
                                target: "sfu.signaling",
                                error = %rejected.error,
                                "Rejected client frame"
                            );
                            if let Some(ack) = rejected.ack {
                                let frame = ServerFrame {
                                    ack,
                                    data: ErrorResponse::from_error(&rejected.error).to_value(),
                                };
                                if outbound_tx.try_send(frame).is_err() {
                                    warn!(target: "sfu.signaling", ack, "Outbound buffer full, error response dropped");
                                }
                            }
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!(target: "sfu.signaling", "Ignoring binary frame");
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!(target: "sfu.signaling", "Client closed connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(target: "sfu.signaling", error = %e, "Read failed, closing");
                    break;
                }
            }
        }
    }

    // Nobody reads responses any more; pending sends must fail instead of waiting.
    drop(outbound_rx);

    while let Some(joined) = in_flight.join_next().await {
        mailbox.record_dequeue();
        if let Err(e) = joined {
            if e.is_panic() {
                metrics.record_panic(ActorType::Connection);
            }
        }
    }

    dispatcher.session_closed(&session).await;
    metrics.session_closed();

    info!(
        target: "sfu.signaling",
        requests = mailbox.messages_processed(),
        "Signaling session closed"
    );
}
