//! End-to-end room flows through the dispatcher.
//!
//! Drives two or more signaling sessions against a mock engine and checks both the
//! responses and the resulting room topology:
//! - Publish / subscribe with paused consumers and resume
//! - Capability rejection without engine calls
//! - Data channels
//! - Disconnect cleanup and room release
//! - Concurrent first requests to the same room

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use common::types::{ConsumerId, DataConsumerId, MediaKind, TransportId};
use media_engine::WebRtcTransportSettings;
use serde_json::{json, Value};
use sfu_service::actors::{ActorMetrics, RoomRegistryActorHandle, TransportState};
use sfu_service::signaling::{Dispatcher, Request, Responder, Session};
use sfu_test_utils::{fixtures, MockEngine};
use tokio::sync::mpsc;

// ============================================================================
// Helpers
// ============================================================================

fn dispatcher(engine: &MockEngine) -> Dispatcher {
    Dispatcher::new(RoomRegistryActorHandle::new(
        "sfu-test".to_string(),
        Arc::new(engine.clone()),
        Arc::new(WebRtcTransportSettings::default()),
        100,
        ActorMetrics::new(),
    ))
}

/// Send one request and return its response payload, if any.
async fn call(
    dispatcher: &Dispatcher,
    session: &Session,
    request_type: &str,
    data: Value,
) -> Option<Value> {
    let request = Request::decode(request_type, data).unwrap();
    let (tx, mut rx) = mpsc::channel(1);
    dispatcher
        .dispatch(session, request, Some(Responder::new(1, tx)))
        .await;
    rx.try_recv().ok().map(|frame| frame.data)
}

async fn create_transport(dispatcher: &Dispatcher, session: &Session, room: &str) -> String {
    let response = call(dispatcher, session, "createWebRtcTransport", json!({ "roomName": room }))
        .await
        .unwrap();
    response["transportOptions"]["id"].as_str().unwrap().to_string()
}

async fn produce(
    dispatcher: &Dispatcher,
    session: &Session,
    room: &str,
    transport_id: &str,
    kind: MediaKind,
) -> String {
    let response = call(
        dispatcher,
        session,
        "produce",
        json!({
            "roomName": room,
            "transportId": transport_id,
            "kind": kind.as_str(),
            "rtpParameters": fixtures::rtp_parameters(kind)
        }),
    )
    .await
    .unwrap();
    response["producerId"].as_str().unwrap().to_string()
}

async fn consume(
    dispatcher: &Dispatcher,
    session: &Session,
    room: &str,
    transport_id: &str,
    producer_id: &str,
    rtp_capabilities: Value,
) -> Value {
    call(
        dispatcher,
        session,
        "consume",
        json!({
            "roomName": room,
            "transportId": transport_id,
            "producerId": producer_id,
            "rtpCapabilities": rtp_capabilities
        }),
    )
    .await
    .unwrap()
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

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_publish_subscribe_flow() {
    let engine = MockEngine::new();
    let dispatcher = dispatcher(&engine);
    let alice = Session::new();
    let bob = Session::new();

    // Alice publishes audio and video
    let alice_send = create_transport(&dispatcher, &alice, "r1").await;
    assert_eq!(alice_send, "t1");
    let connected = call(
        &dispatcher,
        &alice,
        "connectWebRtcTransport",
        json!({
            "roomName": "r1",
            "transportId": alice_send,
            "dtlsParameters": fixtures::dtls_parameters()
        }),
    )
    .await
    .unwrap();
    assert_eq!(connected, json!({}));
    assert!(engine.is_connected(&TransportId::from("t1")));

    let audio = produce(&dispatcher, &alice, "r1", &alice_send, MediaKind::Audio).await;
    let video = produce(&dispatcher, &alice, "r1", &alice_send, MediaKind::Video).await;
    assert_eq!(audio, "p1");
    assert_eq!(video, "p2");

    // Bob subscribes to both
    let bob_recv = create_transport(&dispatcher, &bob, "r1").await;
    let audio_consumer = consume(
        &dispatcher,
        &bob,
        "r1",
        &bob_recv,
        &audio,
        fixtures::client_rtp_capabilities(),
    )
    .await;
    let video_consumer = consume(
        &dispatcher,
        &bob,
        "r1",
        &bob_recv,
        &video,
        fixtures::client_rtp_capabilities(),
    )
    .await;
    assert_eq!(audio_consumer["kind"], "audio");
    assert_eq!(video_consumer["kind"], "video");
    assert_eq!(video_consumer["producerId"], json!(video));

    let room = dispatcher
        .registry()
        .get_or_create_room("r1".to_string())
        .await
        .unwrap();
    let state = room.get_state().await.unwrap();
    assert_eq!(engine.routers_created(), 1);
    assert_eq!(state.participants.len(), 2);
    assert_eq!(state.transports.len(), 2);
    assert_eq!(
        state.transport(&TransportId::from("t1")).unwrap().state,
        TransportState::Connected
    );
    assert_eq!(state.producers.len(), 2);
    assert!(state.consumers.iter().all(|c| c.paused));

    // Resume has no response but flips the consumer
    let audio_consumer_id = audio_consumer["id"].as_str().unwrap().to_string();
    let response = call(
        &dispatcher,
        &bob,
        "resumeConsumer",
        json!({ "roomName": "r1", "consumerId": audio_consumer_id }),
    )
    .await;
    assert!(response.is_none());

    let state = room.get_state().await.unwrap();
    let consumer_id = ConsumerId::from(audio_consumer_id.as_str());
    assert!(!state.consumer(&consumer_id).unwrap().paused);
    assert!(engine.is_consumer_resumed(&consumer_id));

    dispatcher.registry().cancel();
}

#[tokio::test]
async fn test_audio_only_subscriber_cannot_consume_video() {
    let engine = MockEngine::new();
    let dispatcher = dispatcher(&engine);
    let alice = Session::new();
    let bob = Session::new();

    let alice_send = create_transport(&dispatcher, &alice, "r1").await;
    let video = produce(&dispatcher, &alice, "r1", &alice_send, MediaKind::Video).await;

    let bob_recv = create_transport(&dispatcher, &bob, "r1").await;
    let response = consume(
        &dispatcher,
        &bob,
        "r1",
        &bob_recv,
        &video,
        fixtures::audio_only_rtp_capabilities(),
    )
    .await;

    assert_eq!(response, json!({ "error": { "message": "Cannot consume" } }));
    assert_eq!(engine.consumers_created(), 0);

    dispatcher.registry().cancel();
}

#[tokio::test]
async fn test_producer_in_other_room_is_not_consumable() {
    let engine = MockEngine::new();
    let dispatcher = dispatcher(&engine);
    let alice = Session::new();
    let bob = Session::new();

    let alice_send = create_transport(&dispatcher, &alice, "r1").await;
    let audio = produce(&dispatcher, &alice, "r1", &alice_send, MediaKind::Audio).await;

    let bob_recv = create_transport(&dispatcher, &bob, "r2").await;
    let response = consume(
        &dispatcher,
        &bob,
        "r2",
        &bob_recv,
        &audio,
        fixtures::client_rtp_capabilities(),
    )
    .await;

    assert!(response.get("error").is_some());
    assert_eq!(engine.routers_created(), 2);
    assert_eq!(engine.consumers_created(), 0);

    dispatcher.registry().cancel();
}

#[tokio::test]
async fn test_data_channel_flow() {
    let engine = MockEngine::new();
    let dispatcher = dispatcher(&engine);
    let alice = Session::new();
    let bob = Session::new();

    let alice_send = create_transport(&dispatcher, &alice, "r1").await;
    let produced = call(
        &dispatcher,
        &alice,
        "produceData",
        json!({
            "roomName": "r1",
            "transportId": alice_send,
            "sctpStreamParameters": fixtures::sctp_stream_parameters(0),
            "label": "chat"
        }),
    )
    .await
    .unwrap();
    let data_producer_id = produced["dataProducerId"].as_str().unwrap().to_string();

    let bob_recv = create_transport(&dispatcher, &bob, "r1").await;
    let consumed = call(
        &dispatcher,
        &bob,
        "consumeData",
        json!({
            "roomName": "r1",
            "transportId": bob_recv,
            "dataProducerId": data_producer_id
        }),
    )
    .await
    .unwrap();
    assert_eq!(consumed["dataProducerId"], json!(data_producer_id));
    assert_eq!(consumed["label"], "chat");
    assert!(consumed["sctpStreamParameters"].is_object());

    let data_consumer_id = consumed["dataConsumerId"].as_str().unwrap().to_string();
    let response = call(
        &dispatcher,
        &bob,
        "resumeDataConsumer",
        json!({ "roomName": "r1", "dataConsumerId": data_consumer_id }),
    )
    .await;
    assert!(response.is_none());
    assert!(engine.is_data_consumer_resumed(&DataConsumerId::from(data_consumer_id.as_str())));

    dispatcher.registry().cancel();
}

#[tokio::test]
async fn test_publisher_leaving_removes_subscriber_consumers() {
    let engine = MockEngine::new();
    let dispatcher = dispatcher(&engine);
    let alice = Session::new();
    let bob = Session::new();

    let alice_send = create_transport(&dispatcher, &alice, "r1").await;
    let audio = produce(&dispatcher, &alice, "r1", &alice_send, MediaKind::Audio).await;
    let bob_recv = create_transport(&dispatcher, &bob, "r1").await;
    consume(
        &dispatcher,
        &bob,
        "r1",
        &bob_recv,
        &audio,
        fixtures::client_rtp_capabilities(),
    )
    .await;

    dispatcher.session_closed(&alice).await;

    let room = dispatcher
        .registry()
        .get_or_create_room("r1".to_string())
        .await
        .unwrap();
    let state = room.get_state().await.unwrap();
    assert_eq!(state.participants, vec![bob.id()]);
    assert_eq!(state.transports.len(), 1);
    assert!(state.producers.is_empty());
    assert!(state.consumers.is_empty());
    assert_eq!(engine.live_transports(), 1);

    dispatcher.registry().cancel();
}

#[tokio::test]
async fn test_last_participant_leaving_releases_room() {
    let engine = MockEngine::new();
    let dispatcher = dispatcher(&engine);
    let alice = Session::new();
    let bob = Session::new();

    create_transport(&dispatcher, &alice, "r1").await;
    create_transport(&dispatcher, &bob, "r1").await;
    assert_eq!(engine.live_transports(), 2);

    dispatcher.session_closed(&alice).await;
    assert_eq!(dispatcher.registry().get_status().await.unwrap().room_count, 1);

    dispatcher.session_closed(&bob).await;
    assert_eq!(dispatcher.registry().get_status().await.unwrap().room_count, 0);

    wait_for(|| engine.live_routers() == 0).await;
    assert_eq!(engine.live_transports(), 0);

    dispatcher.registry().cancel();
}

#[tokio::test]
async fn test_concurrent_first_requests_share_one_router() {
    let engine = MockEngine::builder()
        .with_latency(Duration::from_millis(5))
        .build();
    let dispatcher = dispatcher(&engine);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            let session = Session::new();
            create_transport(&dispatcher, &session, "r1").await
        }));
    }

    let mut transport_ids = Vec::new();
    for task in tasks {
        transport_ids.push(task.await.unwrap());
    }
    transport_ids.sort();
    transport_ids.dedup();

    assert_eq!(transport_ids.len(), 8);
    assert_eq!(engine.routers_created(), 1);

    dispatcher.registry().cancel();
}

#[tokio::test]
async fn test_rooms_do_not_block_each_other() {
    let engine = MockEngine::builder()
        .with_latency(Duration::from_millis(20))
        .build();
    let dispatcher = dispatcher(&engine);

    let started = std::time::Instant::now();
    let mut tasks = Vec::new();
    for room in ["r1", "r2", "r3", "r4", "r5"] {
        let dispatcher = dispatcher.clone();
        tasks.push(tokio::spawn(async move {
            let session = Session::new();
            create_transport(&dispatcher, &session, room).await
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Router + transport per room: ~40ms each when rooms run in parallel
    assert!(started.elapsed() < Duration::from_millis(150));
    assert_eq!(engine.routers_created(), 5);

    dispatcher.registry().cancel();
}
