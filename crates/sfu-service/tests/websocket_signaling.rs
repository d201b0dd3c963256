//! Signaling over a real WebSocket.
//!
//! Starts the signaling routes on an ephemeral port and talks to them with a
//! tokio-tungstenite client.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::types::MediaKind;
use futures_util::{SinkExt, StreamExt};
use media_engine::WebRtcTransportSettings;
use serde_json::{json, Value};
use sfu_service::actors::{ActorMetrics, RoomRegistryActorHandle};
use sfu_service::signaling::{build_routes, Dispatcher, SignalingState};
use sfu_test_utils::{fixtures, MockEngine};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    registry: RoomRegistryActorHandle,
    metrics: Arc<ActorMetrics>,
}

impl TestServer {
    async fn start(engine: &MockEngine) -> Self {
        let metrics = ActorMetrics::new();
        let registry = RoomRegistryActorHandle::new(
            "sfu-test".to_string(),
            Arc::new(engine.clone()),
            Arc::new(WebRtcTransportSettings::default()),
            10,
            Arc::clone(&metrics),
        );
        let state = Arc::new(SignalingState {
            dispatcher: Dispatcher::new(registry.clone()),
            metrics: Arc::clone(&metrics),
            cancel_token: registry.child_token(),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = registry.child_token();
        tokio::spawn(async move {
            axum::serve(listener, build_routes(state))
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .unwrap();
        });

        Self {
            addr,
            registry,
            metrics,
        }
    }

    async fn connect(&self) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", self.addr)).await.unwrap();
        client
    }
}

async fn send(client: &mut Client, request_type: &str, ack: Option<u64>, data: Value) {
    client
        .send(Message::Text(fixtures::request_frame(request_type, ack, data)))
        .await
        .unwrap();
}

/// Next response frame, as `(ack, data)`.
async fn recv(client: &mut Client) -> (u64, Value) {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for response")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = message {
            let frame: Value = serde_json::from_str(&text).unwrap();
            return (frame["ack"].as_u64().unwrap(), frame["data"].clone());
        }
    }
}

async fn request(client: &mut Client, request_type: &str, ack: u64, data: Value) -> Value {
    send(client, request_type, Some(ack), data).await;
    let (got_ack, data) = recv(client).await;
    assert_eq!(got_ack, ack);
    data
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_round_trip_publish_and_subscribe() {
    let engine = MockEngine::new();
    let server = TestServer::start(&engine).await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;

    let created = request(&mut alice, "createWebRtcTransport", 1, json!({ "roomName": "r1" })).await;
    assert_eq!(created["routerRtpCapabilities"], fixtures::router_rtp_capabilities());
    assert_eq!(created["transportOptions"]["id"], "t1");

    let connected = request(
        &mut alice,
        "connectWebRtcTransport",
        2,
        json!({
            "roomName": "r1",
            "transportId": "t1",
            // Stringified blobs are accepted as well
            "dtlsParameters": fixtures::dtls_parameters().to_string()
        }),
    )
    .await;
    assert_eq!(connected, json!({}));

    let produced = request(
        &mut alice,
        "produce",
        3,
        json!({
            "roomName": "r1",
            "transportId": "t1",
            "kind": "audio",
            "rtpParameters": fixtures::rtp_parameters(MediaKind::Audio)
        }),
    )
    .await;
    assert_eq!(produced, json!({ "producerId": "p1" }));

    let created = request(&mut bob, "createWebRtcTransport", 1, json!({ "roomName": "r1" })).await;
    assert_eq!(created["transportOptions"]["id"], "t2");

    let consumed = request(
        &mut bob,
        "consume",
        2,
        json!({
            "roomName": "r1",
            "transportId": "t2",
            "producerId": "p1",
            "rtpCapabilities": fixtures::client_rtp_capabilities()
        }),
    )
    .await;
    assert_eq!(consumed["id"], "c1");
    assert_eq!(consumed["kind"], "audio");

    // Resume is fire-and-forget; the next response belongs to the next request
    send(
        &mut bob,
        "resumeConsumer",
        Some(3),
        json!({ "roomName": "r1", "consumerId": "c1" }),
    )
    .await;
    let error = request(
        &mut bob,
        "connectWebRtcTransport",
        4,
        json!({ "roomName": "r1", "transportId": "t9", "dtlsParameters": {} }),
    )
    .await;
    assert_eq!(
        error,
        json!({ "error": { "message": "WebRtcTransport t9 not found in room r1" } })
    );
    wait_for(|| engine.is_consumer_resumed(&"c1".into())).await;

    server.registry.cancel();
}

#[tokio::test]
async fn test_malformed_frames_get_error_when_ack_known() {
    let engine = MockEngine::new();
    let server = TestServer::start(&engine).await;
    let mut client = server.connect().await;

    // Not JSON at all: ignored, connection stays up
    client.send(Message::Text("hello".to_string())).await.unwrap();

    let unknown = request(&mut client, "joinRoom", 7, json!({ "roomName": "r1" })).await;
    assert_eq!(unknown["error"]["message"], "Unknown request type: joinRoom");

    let missing = request(&mut client, "produce", 8, json!({ "roomName": "r1" })).await;
    assert!(missing["error"]["message"].as_str().unwrap().starts_with("Invalid produce request"));

    // A broken resume stays silent too; the next frame answers ack 9
    send(&mut client, "resumeConsumer", Some(10), json!({ "roomName": "r1" })).await;

    let created = request(&mut client, "createWebRtcTransport", 9, json!({ "roomName": "r1" })).await;
    assert_eq!(created["transportOptions"]["id"], "t1");

    server.registry.cancel();
}

#[tokio::test]
async fn test_disconnect_releases_room() {
    let engine = MockEngine::new();
    let server = TestServer::start(&engine).await;
    let mut client = server.connect().await;

    request(&mut client, "createWebRtcTransport", 1, json!({ "roomName": "r1" })).await;
    assert_eq!(engine.live_routers(), 1);
    assert_eq!(server.metrics.session_count(), 1);

    client.close(None).await.unwrap();
    drop(client);

    wait_for(|| engine.live_routers() == 0).await;
    assert_eq!(engine.live_transports(), 0);
    wait_for(|| server.metrics.session_count() == 0).await;
    assert_eq!(server.registry.get_status().await.unwrap().room_count, 0);

    server.registry.cancel();
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let engine = MockEngine::new();
    let server = TestServer::start(&engine).await;
    let mut client = server.connect().await;

    request(&mut client, "createWebRtcTransport", 1, json!({ "roomName": "r1" })).await;

    server.registry.cancel();

    // The server closes the socket; the stream ends with a close frame or EOF
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    wait_for(|| engine.live_routers() == 0).await;
}
