//! Media engine adapter over a mediasoup worker.
//!
//! One worker is shared by every room; each room gets its own router. Engine objects are
//! closed by mediasoup when their last handle is dropped, and every close is reported on
//! the room's event channel through detached `on_close` handlers.

use crate::{
    EngineConsumer, EngineDataConsumer, EngineDataProducer, EngineError, EngineEvent,
    EngineEventSender, EngineProducer, EngineRouter, EngineTransport, MediaEngine,
    WebRtcTransportSettings,
};
use async_trait::async_trait;
use common::types::{
    ConsumerId, DataConsumerId, DataProducerId, MediaKind as WireKind, ProducerId,
    TransportId,
};
use mediasoup::prelude::*;
use serde_json::{json, Value};
use std::num::{NonZeroU32, NonZeroU8};
use tracing::{debug, info};

/// Codecs the router accepts from clients.
fn media_codecs() -> Vec<RtpCodecCapability> {
    vec![
        RtpCodecCapability::Audio {
            mime_type: MimeTypeAudio::Opus,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(48000).unwrap_or(NonZeroU32::MIN),
            channels: NonZeroU8::new(2).unwrap_or(NonZeroU8::MIN),
            parameters: RtpCodecParametersParameters::from([("useinbandfec", 1_u32.into())]),
            rtcp_feedback: vec![RtcpFeedback::TransportCc],
        },
        RtpCodecCapability::Video {
            mime_type: MimeTypeVideo::Vp8,
            preferred_payload_type: None,
            clock_rate: NonZeroU32::new(90000).unwrap_or(NonZeroU32::MIN),
            parameters: RtpCodecParametersParameters::default(),
            rtcp_feedback: vec![
                RtcpFeedback::Nack,
                RtcpFeedback::NackPli,
                RtcpFeedback::CcmFir,
                RtcpFeedback::GoogRemb,
                RtcpFeedback::TransportCc,
            ],
        },
    ]
}

fn to_engine_kind(kind: WireKind) -> MediaKind {
    match kind {
        WireKind::Audio => MediaKind::Audio,
        WireKind::Video => MediaKind::Video,
    }
}

fn from_engine_kind(kind: MediaKind) -> WireKind {
    match kind {
        MediaKind::Audio => WireKind::Audio,
        MediaKind::Video => WireKind::Video,
    }
}

fn request_error(e: impl ToString) -> EngineError {
    EngineError::Request(e.to_string())
}

fn listen_info(settings: &WebRtcTransportSettings, protocol: Protocol) -> ListenInfo {
    ListenInfo {
        protocol,
        ip: settings.listen_ip,
        announced_address: settings.announced_address.clone(),
        expose_internal_ip: false,
        port: None,
        port_range: settings.port_range.map(|(min, max)| min..=max),
        flags: None,
        send_buffer_size: None,
        recv_buffer_size: None,
    }
}

fn transport_options(
    settings: &WebRtcTransportSettings,
) -> Result<WebRtcTransportOptions, EngineError> {
    let mut protocols = Vec::new();
    if settings.enable_udp {
        protocols.push(Protocol::Udp);
    }
    if settings.enable_tcp {
        protocols.push(Protocol::Tcp);
    }

    let mut infos = protocols
        .into_iter()
        .map(|protocol| listen_info(settings, protocol));
    let first = infos
        .next()
        .ok_or_else(|| EngineError::invalid("transport settings", "no protocol enabled"))?;
    let listen_infos = infos.fold(WebRtcTransportListenInfos::new(first), |acc, info| {
        acc.insert(info)
    });

    let mut options = WebRtcTransportOptions::new(listen_infos);
    options.enable_sctp = settings.enable_sctp;
    options.prefer_udp = settings.prefer_udp;
    options.initial_available_outgoing_bitrate = settings.initial_available_outgoing_bitrate;
    Ok(options)
}

/// Media engine backed by a single mediasoup worker.
pub struct MediasoupEngine {
    worker: Worker,
    // The manager owns the worker thread pool and must outlive the worker.
    _manager: WorkerManager,
}

impl MediasoupEngine {
    /// Spawn a mediasoup worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker cannot be started.
    pub async fn new() -> Result<Self, EngineError> {
        let manager = WorkerManager::new();
        let worker = manager
            .create_worker(WorkerSettings::default())
            .await
            .map_err(request_error)?;

        info!(
            target: "sfu.engine",
            worker_id = %worker.id(),
            "mediasoup worker started"
        );

        Ok(Self {
            worker,
            _manager: manager,
        })
    }
}

#[async_trait]
impl MediaEngine for MediasoupEngine {
    async fn create_router(
        &self,
        events: EngineEventSender,
    ) -> Result<Box<dyn EngineRouter>, EngineError> {
        let router = self
            .worker
            .create_router(RouterOptions::new(media_codecs()))
            .await
            .map_err(request_error)?;

        debug!(target: "sfu.engine", router_id = %router.id(), "Router created");

        Ok(Box::new(MediasoupRouter { router, events }))
    }
}

struct MediasoupRouter {
    router: Router,
    events: EngineEventSender,
}

#[async_trait]
impl EngineRouter for MediasoupRouter {
    fn id(&self) -> String {
        self.router.id().to_string()
    }

    fn rtp_capabilities(&self) -> Value {
        serde_json::to_value(self.router.rtp_capabilities()).unwrap_or(Value::Null)
    }

    fn can_consume(&self, producer_id: &ProducerId, rtp_capabilities: &Value) -> bool {
        let Ok(producer_id) = producer_id.as_str().parse() else {
            return false;
        };
        let Ok(capabilities) = serde_json::from_value::<RtpCapabilities>(rtp_capabilities.clone())
        else {
            return false;
        };
        self.router.can_consume(&producer_id, &capabilities)
    }

    async fn create_webrtc_transport(
        &self,
        settings: &WebRtcTransportSettings,
    ) -> Result<Box<dyn EngineTransport>, EngineError> {
        let transport = self
            .router
            .create_webrtc_transport(transport_options(settings)?)
            .await
            .map_err(request_error)?;

        let transport_id = TransportId(transport.id().to_string());
        transport
            .on_close({
                let events = self.events.clone();
                Box::new(move || {
                    let _ = events.send(EngineEvent::TransportClosed { transport_id });
                })
            })
            .detach();

        Ok(Box::new(MediasoupTransport {
            transport,
            events: self.events.clone(),
        }))
    }
}

struct MediasoupTransport {
    transport: WebRtcTransport,
    events: EngineEventSender,
}

#[async_trait]
impl EngineTransport for MediasoupTransport {
    fn id(&self) -> TransportId {
        TransportId(self.transport.id().to_string())
    }

    fn connection_options(&self) -> Value {
        json!({
            "id": self.transport.id().to_string(),
            "iceParameters": self.transport.ice_parameters(),
            "iceCandidates": self.transport.ice_candidates(),
            "dtlsParameters": self.transport.dtls_parameters(),
            "sctpParameters": self.transport.sctp_parameters(),
        })
    }

    async fn connect(&self, dtls_parameters: Value) -> Result<(), EngineError> {
        let dtls_parameters: DtlsParameters = serde_json::from_value(dtls_parameters)
            .map_err(|e| EngineError::invalid("dtlsParameters", e))?;

        self.transport
            .connect(WebRtcTransportRemoteParameters { dtls_parameters })
            .await
            .map_err(request_error)
    }

    async fn produce(
        &self,
        kind: WireKind,
        rtp_parameters: Value,
    ) -> Result<Box<dyn EngineProducer>, EngineError> {
        let rtp_parameters: RtpParameters = serde_json::from_value(rtp_parameters)
            .map_err(|e| EngineError::invalid("rtpParameters", e))?;

        let producer = self
            .transport
            .produce(ProducerOptions::new(to_engine_kind(kind), rtp_parameters))
            .await
            .map_err(request_error)?;

        let producer_id = ProducerId(producer.id().to_string());
        producer
            .on_close({
                let events = self.events.clone();
                move || {
                    let _ = events.send(EngineEvent::ProducerClosed { producer_id });
                }
            })
            .detach();

        Ok(Box::new(MediasoupProducer { producer }))
    }

    async fn consume(
        &self,
        producer_id: &ProducerId,
        rtp_capabilities: Value,
    ) -> Result<Box<dyn EngineConsumer>, EngineError> {
        let producer_id = producer_id
            .as_str()
            .parse()
            .map_err(|e| EngineError::invalid("producerId", e))?;
        let rtp_capabilities: RtpCapabilities = serde_json::from_value(rtp_capabilities)
            .map_err(|e| EngineError::invalid("rtpCapabilities", e))?;

        let mut options = ConsumerOptions::new(producer_id, rtp_capabilities);
        options.paused = true;

        let consumer = self
            .transport
            .consume(options)
            .await
            .map_err(request_error)?;

        let consumer_id = ConsumerId(consumer.id().to_string());
        consumer
            .on_close({
                let events = self.events.clone();
                move || {
                    let _ = events.send(EngineEvent::ConsumerClosed { consumer_id });
                }
            })
            .detach();

        Ok(Box::new(MediasoupConsumer { consumer }))
    }

    async fn produce_data(
        &self,
        sctp_stream_parameters: Value,
        label: String,
    ) -> Result<Box<dyn EngineDataProducer>, EngineError> {
        let sctp_stream_parameters: SctpStreamParameters =
            serde_json::from_value(sctp_stream_parameters)
                .map_err(|e| EngineError::invalid("sctpStreamParameters", e))?;

        let mut options = DataProducerOptions::new_sctp(sctp_stream_parameters);
        options.label = label;

        let data_producer = self
            .transport
            .produce_data(options)
            .await
            .map_err(request_error)?;

        let data_producer_id = DataProducerId(data_producer.id().to_string());
        data_producer
            .on_close({
                let events = self.events.clone();
                move || {
                    let _ = events.send(EngineEvent::DataProducerClosed { data_producer_id });
                }
            })
            .detach();

        Ok(Box::new(MediasoupDataProducer { data_producer }))
    }

    async fn consume_data(
        &self,
        data_producer_id: &DataProducerId,
    ) -> Result<Box<dyn EngineDataConsumer>, EngineError> {
        let data_producer_id = data_producer_id
            .as_str()
            .parse()
            .map_err(|e| EngineError::invalid("dataProducerId", e))?;

        let mut options = DataConsumerOptions::new_sctp(data_producer_id);
        options.paused = true;

        let data_consumer = self
            .transport
            .consume_data(options)
            .await
            .map_err(request_error)?;

        let data_consumer_id = DataConsumerId(data_consumer.id().to_string());
        data_consumer
            .on_close({
                let events = self.events.clone();
                move || {
                    let _ = events.send(EngineEvent::DataConsumerClosed { data_consumer_id });
                }
            })
            .detach();

        Ok(Box::new(MediasoupDataConsumer { data_consumer }))
    }
}

struct MediasoupProducer {
    producer: Producer,
}

impl EngineProducer for MediasoupProducer {
    fn id(&self) -> ProducerId {
        ProducerId(self.producer.id().to_string())
    }

    fn kind(&self) -> WireKind {
        from_engine_kind(self.producer.kind())
    }
}

struct MediasoupConsumer {
    consumer: Consumer,
}

#[async_trait]
impl EngineConsumer for MediasoupConsumer {
    fn id(&self) -> ConsumerId {
        ConsumerId(self.consumer.id().to_string())
    }

    fn producer_id(&self) -> ProducerId {
        ProducerId(self.consumer.producer_id().to_string())
    }

    fn kind(&self) -> WireKind {
        from_engine_kind(self.consumer.kind())
    }

    fn rtp_parameters(&self) -> Value {
        serde_json::to_value(self.consumer.rtp_parameters()).unwrap_or(Value::Null)
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.consumer.resume().await.map_err(request_error)
    }
}

struct MediasoupDataProducer {
    data_producer: DataProducer,
}

impl EngineDataProducer for MediasoupDataProducer {
    fn id(&self) -> DataProducerId {
        DataProducerId(self.data_producer.id().to_string())
    }

    fn label(&self) -> String {
        self.data_producer.label().to_string()
    }
}

struct MediasoupDataConsumer {
    data_consumer: DataConsumer,
}

#[async_trait]
impl EngineDataConsumer for MediasoupDataConsumer {
    fn id(&self) -> DataConsumerId {
        DataConsumerId(self.data_consumer.id().to_string())
    }

    fn data_producer_id(&self) -> DataProducerId {
        DataProducerId(self.data_consumer.data_producer_id().to_string())
    }

    fn label(&self) -> String {
        self.data_consumer.label().to_string()
    }

    fn protocol(&self) -> String {
        self.data_consumer.protocol().to_string()
    }

    fn sctp_stream_parameters(&self) -> Option<Value> {
        self.data_consumer
            .sctp_stream_parameters()
            .and_then(|params| serde_json::to_value(params).ok())
    }

    async fn resume(&self) -> Result<(), EngineError> {
        self.data_consumer.resume().await.map_err(request_error)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_options_require_a_protocol() {
        let settings = WebRtcTransportSettings {
            enable_udp: false,
            enable_tcp: false,
            ..WebRtcTransportSettings::default()
        };
        assert!(matches!(
            transport_options(&settings),
            Err(EngineError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_transport_options_copy_settings() {
        let settings = WebRtcTransportSettings {
            enable_sctp: false,
            initial_available_outgoing_bitrate: 600_000,
            ..WebRtcTransportSettings::default()
        };
        let options = transport_options(&settings).expect("udp and tcp enabled");
        assert!(!options.enable_sctp);
        assert_eq!(options.initial_available_outgoing_bitrate, 600_000);
    }

    #[test]
    fn test_kind_mapping_round_trips() {
        assert_eq!(from_engine_kind(to_engine_kind(WireKind::Audio)), WireKind::Audio);
        assert_eq!(from_engine_kind(to_engine_kind(WireKind::Video)), WireKind::Video);
    }
}
