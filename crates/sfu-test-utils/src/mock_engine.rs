//! In-memory media engine for signaling tests.
//!
//! Provides a mock engine that:
//! - Hands out deterministic IDs (`t1`, `p1`, `c1`, `dp1`, `dc1`, ...)
//! - Rejects a second `connect` on the same transport
//! - Checks consume compatibility against the codecs in the client's capabilities
//! - Can fail the next request, reject all capabilities, or add latency to every call
//! - Lets tests close transports and producers "from the engine side"
//!
//! # Example
//!
//! ```rust,ignore
//! use sfu_test_utils::MockEngine;
//!
//! let engine = MockEngine::builder()
//!     .reject_capabilities()
//!     .build();
//!
//! engine.fail_next_request("worker died");
//! ```

use async_trait::async_trait;
use common::types::{
    ConsumerId, DataConsumerId, DataProducerId, MediaKind, ProducerId, TransportId,
};
use media_engine::{
    EngineConsumer, EngineDataConsumer, EngineDataProducer, EngineError, EngineEvent,
    EngineEventSender, EngineProducer, EngineRouter, EngineTransport, MediaEngine,
    WebRtcTransportSettings,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::fixtures;

#[derive(Debug)]
struct RouterRecord {
    events: EngineEventSender,
}

#[derive(Debug)]
struct TransportRecord {
    router_id: String,
    connected: bool,
}

#[derive(Debug)]
struct ProducerRecord {
    router_id: String,
    transport_id: TransportId,
    kind: MediaKind,
    rtp_parameters: Value,
}

#[derive(Debug)]
struct ConsumerRecord {
    transport_id: TransportId,
    producer_id: ProducerId,
    resumed: bool,
}

#[derive(Debug)]
struct DataProducerRecord {
    router_id: String,
    transport_id: TransportId,
    label: String,
}

#[derive(Debug)]
struct DataConsumerRecord {
    transport_id: TransportId,
    data_producer_id: DataProducerId,
    resumed: bool,
}

#[derive(Debug, Default)]
struct MockState {
    next_ids: HashMap<&'static str, u64>,
    routers: HashMap<String, RouterRecord>,
    transports: HashMap<TransportId, TransportRecord>,
    producers: HashMap<ProducerId, ProducerRecord>,
    consumers: HashMap<ConsumerId, ConsumerRecord>,
    data_producers: HashMap<DataProducerId, DataProducerRecord>,
    data_consumers: HashMap<DataConsumerId, DataConsumerRecord>,
    fail_next: Option<String>,
    reject_capabilities: bool,
    routers_created: usize,
    transports_created: usize,
    consumers_created: usize,
    data_consumers_created: usize,
}

impl MockState {
    fn next_id(&mut self, prefix: &'static str) -> String {
        let counter = self.next_ids.entry(prefix).or_insert(0);
        *counter += 1;
        format!("{prefix}{counter}")
    }

    fn take_failure(&mut self) -> Result<(), EngineError> {
        match self.fail_next.take() {
            Some(message) => Err(EngineError::Request(message)),
            None => Ok(()),
        }
    }

    fn events_for(&self, router_id: &str) -> Option<EngineEventSender> {
        self.routers.get(router_id).map(|r| r.events.clone())
    }

    /// Remove a transport and everything on it. Returns the events the engine would emit.
    fn remove_transport(&mut self, transport_id: &TransportId) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.transports.remove(transport_id).is_none() {
            return events;
        }

        let producers: Vec<ProducerId> = self
            .producers
            .iter()
            .filter(|(_, p)| &p.transport_id == transport_id)
            .map(|(id, _)| id.clone())
            .collect();
        for producer_id in producers {
            events.extend(self.remove_producer(&producer_id));
        }

        let data_producers: Vec<DataProducerId> = self
            .data_producers
            .iter()
            .filter(|(_, dp)| &dp.transport_id == transport_id)
            .map(|(id, _)| id.clone())
            .collect();
        for data_producer_id in data_producers {
            events.extend(self.remove_data_producer(&data_producer_id));
        }

        self.consumers.retain(|id, c| {
            let keep = &c.transport_id != transport_id;
            if !keep {
                events.push(EngineEvent::ConsumerClosed {
                    consumer_id: id.clone(),
                });
            }
            keep
        });
        self.data_consumers.retain(|id, dc| {
            let keep = &dc.transport_id != transport_id;
            if !keep {
                events.push(EngineEvent::DataConsumerClosed {
                    data_consumer_id: id.clone(),
                });
            }
            keep
        });

        events.push(EngineEvent::TransportClosed {
            transport_id: transport_id.clone(),
        });
        events
    }

    fn remove_producer(&mut self, producer_id: &ProducerId) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.producers.remove(producer_id).is_none() {
            return events;
        }
        self.consumers.retain(|id, c| {
            let keep = &c.producer_id != producer_id;
            if !keep {
                events.push(EngineEvent::ConsumerClosed {
                    consumer_id: id.clone(),
                });
            }
            keep
        });
        events.push(EngineEvent::ProducerClosed {
            producer_id: producer_id.clone(),
        });
        events
    }

    fn remove_data_producer(&mut self, data_producer_id: &DataProducerId) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        if self.data_producers.remove(data_producer_id).is_none() {
            return events;
        }
        self.data_consumers.retain(|id, dc| {
            let keep = &dc.data_producer_id != data_producer_id;
            if !keep {
                events.push(EngineEvent::DataConsumerClosed {
                    data_consumer_id: id.clone(),
                });
            }
            keep
        });
        events.push(EngineEvent::DataProducerClosed {
            data_producer_id: data_producer_id.clone(),
        });
        events
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl Shared {
    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

/// Mock media engine. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    shared: Arc<Shared>,
}

impl MockEngine {
    /// Create a new MockEngine builder.
    #[must_use]
    pub fn builder() -> MockEngineBuilder {
        MockEngineBuilder::default()
    }

    /// Create a mock engine with default behavior.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next engine request (of any kind) with `message`.
    pub fn fail_next_request(&self, message: impl Into<String>) {
        self.shared.state().fail_next = Some(message.into());
    }

    /// Make `can_consume` report every capability set as incompatible.
    pub fn set_reject_capabilities(&self, reject: bool) {
        self.shared.state().reject_capabilities = reject;
    }

    /// Number of routers ever created.
    #[must_use]
    pub fn routers_created(&self) -> usize {
        self.shared.state().routers_created
    }

    /// Number of routers still alive (not dropped by their room).
    #[must_use]
    pub fn live_routers(&self) -> usize {
        self.shared.state().routers.len()
    }

    /// Number of transports ever created.
    #[must_use]
    pub fn transports_created(&self) -> usize {
        self.shared.state().transports_created
    }

    /// Number of transports still alive.
    #[must_use]
    pub fn live_transports(&self) -> usize {
        self.shared.state().transports.len()
    }

    /// Number of consumers ever created.
    #[must_use]
    pub fn consumers_created(&self) -> usize {
        self.shared.state().consumers_created
    }

    /// Number of data consumers ever created.
    #[must_use]
    pub fn data_consumers_created(&self) -> usize {
        self.shared.state().data_consumers_created
    }

    /// Whether `connect` succeeded on the transport.
    #[must_use]
    pub fn is_connected(&self, transport_id: &TransportId) -> bool {
        self.shared
            .state()
            .transports
            .get(transport_id)
            .is_some_and(|t| t.connected)
    }

    /// Whether the consumer has been resumed.
    #[must_use]
    pub fn is_consumer_resumed(&self, consumer_id: &ConsumerId) -> bool {
        self.shared
            .state()
            .consumers
            .get(consumer_id)
            .is_some_and(|c| c.resumed)
    }

    /// Whether the data consumer has been resumed.
    #[must_use]
    pub fn is_data_consumer_resumed(&self, data_consumer_id: &DataConsumerId) -> bool {
        self.shared
            .state()
            .data_consumers
            .get(data_consumer_id)
            .is_some_and(|dc| dc.resumed)
    }

    /// Close a transport from the engine side, emitting close events for it and
    /// everything on it. Returns false if the transport is unknown.
    pub fn close_transport(&self, transport_id: &TransportId) -> bool {
        let mut state = self.shared.state();
        let Some(router_id) = state
            .transports
            .get(transport_id)
            .map(|t| t.router_id.clone())
        else {
            return false;
        };
        let events = state.remove_transport(transport_id);
        if let Some(sender) = state.events_for(&router_id) {
            for event in events {
                let _ = sender.send(event);
            }
        }
        true
    }

    /// Close a producer from the engine side, emitting close events for it and its
    /// consumers. Returns false if the producer is unknown.
    pub fn close_producer(&self, producer_id: &ProducerId) -> bool {
        let mut state = self.shared.state();
        let Some(router_id) = state
            .producers
            .get(producer_id)
            .map(|p| p.router_id.clone())
        else {
            return false;
        };
        let events = state.remove_producer(producer_id);
        if let Some(sender) = state.events_for(&router_id) {
            for event in events {
                let _ = sender.send(event);
            }
        }
        true
    }

    /// Close a data producer from the engine side. Returns false if unknown.
    pub fn close_data_producer(&self, data_producer_id: &DataProducerId) -> bool {
        let mut state = self.shared.state();
        let Some(router_id) = state
            .data_producers
            .get(data_producer_id)
            .map(|dp| dp.router_id.clone())
        else {
            return false;
        };
        let events = state.remove_data_producer(data_producer_id);
        if let Some(sender) = state.events_for(&router_id) {
            for event in events {
                let _ = sender.send(event);
            }
        }
        true
    }
}

/// Builder for MockEngine configuration.
#[derive(Debug, Default)]
pub struct MockEngineBuilder {
    latency: Option<Duration>,
    reject_capabilities: bool,
    fail_next: Option<String>,
}

impl MockEngineBuilder {
    /// Sleep for `latency` inside every async engine call.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report every capability set as incompatible.
    #[must_use]
    pub fn reject_capabilities(mut self) -> Self {
        self.reject_capabilities = true;
        self
    }

    /// Fail the first engine request with `message`.
    #[must_use]
    pub fn fail_first_request(mut self, message: impl Into<String>) -> Self {
        self.fail_next = Some(message.into());
        self
    }

    /// Build the MockEngine.
    #[must_use]
    pub fn build(self) -> MockEngine {
        let state = MockState {
            reject_capabilities: self.reject_capabilities,
            fail_next: self.fail_next,
            ..MockState::default()
        };
        MockEngine {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                latency: self.latency,
            }),
        }
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    async fn create_router(
        &self,
        events: EngineEventSender,
    ) -> Result<Box<dyn EngineRouter>, EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;

        let id = state.next_id("router-");
        state.routers.insert(id.clone(), RouterRecord { events });
        state.routers_created += 1;

        Ok(Box::new(MockRouter {
            id,
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockRouter {
    id: String,
    shared: Arc<Shared>,
}

impl Drop for MockRouter {
    fn drop(&mut self) {
        let mut state = self.shared.state();
        state.routers.remove(&self.id);
        let transports: Vec<TransportId> = state
            .transports
            .iter()
            .filter(|(_, t)| t.router_id == self.id)
            .map(|(id, _)| id.clone())
            .collect();
        for transport_id in transports {
            state.remove_transport(&transport_id);
        }
    }
}

#[async_trait]
impl EngineRouter for MockRouter {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn rtp_capabilities(&self) -> Value {
        fixtures::router_rtp_capabilities()
    }

    fn can_consume(&self, producer_id: &ProducerId, rtp_capabilities: &Value) -> bool {
        let state = self.shared.state();
        if state.reject_capabilities {
            return false;
        }
        let Some(producer) = state
            .producers
            .get(producer_id)
            .filter(|p| p.router_id == self.id)
        else {
            return false;
        };
        rtp_capabilities["codecs"]
            .as_array()
            .is_some_and(|codecs| codecs.iter().any(|c| c["kind"] == producer.kind.as_str()))
    }

    async fn create_webrtc_transport(
        &self,
        settings: &WebRtcTransportSettings,
    ) -> Result<Box<dyn EngineTransport>, EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        if !settings.enable_udp && !settings.enable_tcp {
            return Err(EngineError::invalid(
                "transport settings",
                "no protocol enabled",
            ));
        }

        let id = TransportId(state.next_id("t"));
        state.transports.insert(
            id.clone(),
            TransportRecord {
                router_id: self.id.clone(),
                connected: false,
            },
        );
        state.transports_created += 1;

        Ok(Box::new(MockTransport {
            id,
            router_id: self.id.clone(),
            enable_sctp: settings.enable_sctp,
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockTransport {
    id: TransportId,
    router_id: String,
    enable_sctp: bool,
    shared: Arc<Shared>,
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.shared.state().remove_transport(&self.id);
    }
}

impl MockTransport {
    fn ensure_open(state: &MockState, id: &TransportId) -> Result<(), EngineError> {
        if state.transports.contains_key(id) {
            Ok(())
        } else {
            Err(EngineError::Closed("transport"))
        }
    }
}

#[async_trait]
impl EngineTransport for MockTransport {
    fn id(&self) -> TransportId {
        self.id.clone()
    }

    fn connection_options(&self) -> Value {
        json!({
            "id": self.id,
            "iceParameters": {
                "usernameFragment": format!("ufrag-{}", self.id),
                "password": "mock-password",
                "iceLite": true
            },
            "iceCandidates": [{
                "foundation": "udpcandidate",
                "priority": 1_076_302_079,
                "ip": "127.0.0.1",
                "protocol": "udp",
                "port": 40000,
                "type": "host"
            }],
            "dtlsParameters": {
                "role": "auto",
                "fingerprints": [{ "algorithm": "sha-256", "value": "00:11:22:33" }]
            },
            "sctpParameters": if self.enable_sctp {
                json!({ "port": 5000, "OS": 1024, "MIS": 1024, "maxMessageSize": 262_144 })
            } else {
                Value::Null
            }
        })
    }

    async fn connect(&self, dtls_parameters: Value) -> Result<(), EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        Self::ensure_open(&state, &self.id)?;
        if !dtls_parameters.is_object() {
            return Err(EngineError::invalid("dtlsParameters", "expected an object"));
        }

        let transport = state
            .transports
            .get_mut(&self.id)
            .ok_or(EngineError::Closed("transport"))?;
        if transport.connected {
            return Err(EngineError::Request("connect() already called".to_string()));
        }
        transport.connected = true;
        Ok(())
    }

    async fn produce(
        &self,
        kind: MediaKind,
        rtp_parameters: Value,
    ) -> Result<Box<dyn EngineProducer>, EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        Self::ensure_open(&state, &self.id)?;
        if !rtp_parameters.is_object() {
            return Err(EngineError::invalid("rtpParameters", "expected an object"));
        }

        let id = ProducerId(state.next_id("p"));
        state.producers.insert(
            id.clone(),
            ProducerRecord {
                router_id: self.router_id.clone(),
                transport_id: self.id.clone(),
                kind,
                rtp_parameters,
            },
        );

        Ok(Box::new(MockProducer { id, kind }))
    }

    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
    ) -> Result<Box<dyn EngineConsumer>, EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        Self::ensure_open(&state, &self.id)?;
        if !rtp_capabilities.is_object() {
            return Err(EngineError::invalid("rtpCapabilities", "expected an object"));
        }

        let Some((kind, rtp_parameters)) = state
            .producers
            .get(producer_id)
            .filter(|p| p.router_id == self.router_id)
            .map(|p| (p.kind, p.rtp_parameters.clone()))
        else {
            return Err(EngineError::Request(format!(
                "Producer with id \"{producer_id}\" not found"
            )));
        };

        let id = ConsumerId(state.next_id("c"));
        state.consumers.insert(
            id.clone(),
            ConsumerRecord {
                transport_id: self.id.clone(),
                producer_id: producer_id.clone(),
                resumed: false,
            },
        );
        state.consumers_created += 1;

        Ok(Box::new(MockConsumer {
            id,
            producer_id: producer_id.clone(),
            kind,
            rtp_parameters,
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn produce_data(
        &self,
        sctp_stream_parameters: Value,
        label: String,
    ) -> Result<Box<dyn EngineDataProducer>, EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        Self::ensure_open(&state, &self.id)?;
        if !self.enable_sctp {
            return Err(EngineError::Request("SCTP not enabled by remote Transport".to_string()));
        }
        if !sctp_stream_parameters.is_object() {
            return Err(EngineError::invalid(
                "sctpStreamParameters",
                "expected an object",
            ));
        }

        let id = DataProducerId(state.next_id("dp"));
        state.data_producers.insert(
            id.clone(),
            DataProducerRecord {
                router_id: self.router_id.clone(),
                transport_id: self.id.clone(),
                label: label.clone(),
            },
        );

        Ok(Box::new(MockDataProducer { id, label }))
    }

    async fn consume_data(
        &self,
        data_producer_id: &DataProducerId,
    ) -> Result<Box<dyn EngineDataConsumer>, EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        Self::ensure_open(&state, &self.id)?;

        let Some(label) = state
            .data_producers
            .get(data_producer_id)
            .filter(|dp| dp.router_id == self.router_id)
            .map(|dp| dp.label.clone())
        else {
            return Err(EngineError::Request(format!(
                "DataProducer with id \"{data_producer_id}\" not found"
            )));
        };

        let id = DataConsumerId(state.next_id("dc"));
        let stream_id = u16::try_from(state.data_consumers_created).unwrap_or(u16::MAX);
        state.data_consumers.insert(
            id.clone(),
            DataConsumerRecord {
                transport_id: self.id.clone(),
                data_producer_id: data_producer_id.clone(),
                resumed: false,
            },
        );
        state.data_consumers_created += 1;

        Ok(Box::new(MockDataConsumer {
            id,
            data_producer_id: data_producer_id.clone(),
            label,
            stream_id,
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockProducer {
    id: ProducerId,
    kind: MediaKind,
}

impl EngineProducer for MockProducer {
    fn id(&self) -> ProducerId {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }
}

struct MockConsumer {
    id: ConsumerId,
    producer_id: ProducerId,
    kind: MediaKind,
    rtp_parameters: Value,
    shared: Arc<Shared>,
}

#[async_trait]
impl EngineConsumer for MockConsumer {
    fn id(&self) -> ConsumerId {
        self.id.clone()
    }

    fn producer_id(&self) -> ProducerId {
        self.producer_id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn rtp_parameters(&self) -> Value {
        self.rtp_parameters.clone()
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        let consumer = state
            .consumers
            .get_mut(&self.id)
            .ok_or(EngineError::Closed("consumer"))?;
        consumer.resumed = true;
        Ok(())
    }
}

struct MockDataProducer {
    id: DataProducerId,
    label: String,
}

impl EngineDataProducer for MockDataProducer {
    fn id(&self) -> DataProducerId {
        self.id.clone()
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

struct MockDataConsumer {
    id: DataConsumerId,
    data_producer_id: DataProducerId,
    label: String,
    stream_id: u16,
    shared: Arc<Shared>,
}

#[async_trait]
impl EngineDataConsumer for MockDataConsumer {
    fn id(&self) -> DataConsumerId {
        self.id.clone()
    }

    fn data_producer_id(&self) -> DataProducerId {
        self.data_producer_id.clone()
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn protocol(&self) -> String {
        String::new()
    }

    fn sctp_stream_parameters(&self) -> Option<Value> {
        Some(fixtures::sctp_stream_parameters(self.stream_id))
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.shared.delay().await;
        let mut state = self.shared.state();
        state.take_failure()?;
        let data_consumer = state
            .data_consumers
            .get_mut(&self.id)
            .ok_or(EngineError::Closed("dataConsumer"))?;
        data_consumer.resumed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_engine::event_channel;

    async fn transport(engine: &MockEngine) -> (Box<dyn EngineRouter>, Box<dyn EngineTransport>) {
        let (tx, _rx) = event_channel();
        let router = engine.create_router(tx).await.unwrap();
        let transport = router
            .create_webrtc_transport(&WebRtcTransportSettings::default())
            .await
            .unwrap();
        (router, transport)
    }

    #[tokio::test]
    async fn test_ids_are_deterministic() {
        let engine = MockEngine::new();
        let (_router, t) = transport(&engine).await;
        assert_eq!(t.id().as_str(), "t1");

        let p = t
            .produce(MediaKind::Audio, fixtures::rtp_parameters(MediaKind::Audio))
            .await
            .unwrap();
        assert_eq!(p.id().as_str(), "p1");

        let c = t
            .consume(&p.id(), fixtures::client_rtp_capabilities())
            .await
            .unwrap();
        assert_eq!(c.id().as_str(), "c1");
        assert_eq!(c.kind(), MediaKind::Audio);
    }

    #[tokio::test]
    async fn test_second_connect_is_rejected() {
        let engine = MockEngine::new();
        let (_router, t) = transport(&engine).await;

        t.connect(fixtures::dtls_parameters()).await.unwrap();
        assert!(engine.is_connected(&t.id()));
        assert!(t.connect(fixtures::dtls_parameters()).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_next_request_applies_once() {
        let engine = MockEngine::new();
        let (_router, t) = transport(&engine).await;

        engine.fail_next_request("boom");
        let err = t.connect(fixtures::dtls_parameters()).await.unwrap_err();
        assert_eq!(err, EngineError::Request("boom".to_string()));
        t.connect(fixtures::dtls_parameters()).await.unwrap();
    }

    #[tokio::test]
    async fn test_can_consume_checks_codec_kinds() {
        let engine = MockEngine::new();
        let (router, t) = transport(&engine).await;
        let p = t
            .produce(MediaKind::Video, fixtures::rtp_parameters(MediaKind::Video))
            .await
            .unwrap();

        assert!(router.can_consume(&p.id(), &fixtures::client_rtp_capabilities()));
        assert!(!router.can_consume(&p.id(), &fixtures::audio_only_rtp_capabilities()));
        assert!(!router.can_consume(&ProducerId::from("missing"), &fixtures::client_rtp_capabilities()));

        engine.set_reject_capabilities(true);
        assert!(!router.can_consume(&p.id(), &fixtures::client_rtp_capabilities()));
    }

    #[tokio::test]
    async fn test_close_transport_emits_cascade() {
        let engine = MockEngine::new();
        let (tx, mut rx) = event_channel();
        let router = engine.create_router(tx).await.unwrap();
        let t = router
            .create_webrtc_transport(&WebRtcTransportSettings::default())
            .await
            .unwrap();
        let p = t
            .produce(MediaKind::Audio, fixtures::rtp_parameters(MediaKind::Audio))
            .await
            .unwrap();

        assert!(engine.close_transport(&t.id()));
        assert_eq!(
            rx.recv().await.unwrap(),
            EngineEvent::ProducerClosed { producer_id: p.id() }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            EngineEvent::TransportClosed { transport_id: t.id() }
        );
        assert!(!engine.close_transport(&t.id()));
    }

    #[tokio::test]
    async fn test_dropping_router_releases_everything() {
        let engine = MockEngine::new();
        let (router, t) = transport(&engine).await;
        assert_eq!(engine.live_routers(), 1);

        drop(t);
        assert_eq!(engine.live_transports(), 0);
        drop(router);
        assert_eq!(engine.live_routers(), 0);
        assert_eq!(engine.routers_created(), 1);
    }
}
