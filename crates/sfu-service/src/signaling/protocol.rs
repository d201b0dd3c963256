//! Signaling wire protocol.
//!
//! Frames are JSON text messages on the WebSocket:
//!
//! ```text
//! client -> server   {"ack": 7, "type": "produce", "data": {"roomName": "r1", ...}}
//! server -> client   {"ack": 7, "data": {"producerId": "p1"}}
//! server -> client   {"ack": 7, "data": {"error": {"message": "..."}}}
//! ```
//!
//! `ack` is chosen by the client and echoed on the single response to that request.
//! Requests without an `ack`, and the resume requests, get no response.
//!
//! Parameter blobs (`dtlsParameters`, `rtpParameters`, `rtpCapabilities`,
//! `sctpStreamParameters`) may be sent either as JSON objects or as JSON-encoded strings;
//! both decode to the same value and are otherwise passed through untouched.

use crate::errors::SfuError;

use common::types::{ConsumerId, DataConsumerId, DataProducerId, MediaKind, ProducerId, TransportId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept a blob as a JSON value or as a string holding JSON.
fn blob<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(encoded) => {
            serde_json::from_str(&encoded).map_err(serde::de::Error::custom)
        }
        value => Ok(value),
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebRtcTransportRequest {
    pub room_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectWebRtcTransportRequest {
    pub room_name: String,
    pub transport_id: TransportId,
    #[serde(deserialize_with = "blob")]
    pub dtls_parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceRequest {
    pub room_name: String,
    pub transport_id: TransportId,
    /// `"audio"` selects audio; anything else is video.
    pub kind: String,
    #[serde(deserialize_with = "blob")]
    pub rtp_parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeRequest {
    pub room_name: String,
    pub transport_id: TransportId,
    pub producer_id: ProducerId,
    #[serde(deserialize_with = "blob")]
    pub rtp_capabilities: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeConsumerRequest {
    pub room_name: String,
    pub consumer_id: ConsumerId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceDataRequest {
    pub room_name: String,
    pub transport_id: TransportId,
    #[serde(deserialize_with = "blob")]
    pub sctp_stream_parameters: Value,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeDataRequest {
    pub room_name: String,
    pub transport_id: TransportId,
    pub data_producer_id: DataProducerId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeDataConsumerRequest {
    pub room_name: String,
    pub data_consumer_id: DataConsumerId,
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateWebRtcTransport(CreateWebRtcTransportRequest),
    ConnectWebRtcTransport(ConnectWebRtcTransportRequest),
    Produce(ProduceRequest),
    Consume(ConsumeRequest),
    ResumeConsumer(ResumeConsumerRequest),
    ProduceData(ProduceDataRequest),
    ConsumeData(ConsumeDataRequest),
    ResumeDataConsumer(ResumeDataConsumerRequest),
}

impl Request {
    /// Decode the `data` payload of a request of type `request_type`.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` for an unknown type or a payload that does not match it.
    pub fn decode(request_type: &str, data: Value) -> Result<Self, SfuError> {
        fn parse<T: DeserializeOwned>(request_type: &str, data: Value) -> Result<T, SfuError> {
            serde_json::from_value(data)
                .map_err(|e| SfuError::InvalidRequest(format!("Invalid {request_type} request: {e}")))
        }

        match request_type {
            "createWebRtcTransport" => {
                parse(request_type, data).map(Request::CreateWebRtcTransport)
            }
            "connectWebRtcTransport" => {
                parse(request_type, data).map(Request::ConnectWebRtcTransport)
            }
            "produce" => parse(request_type, data).map(Request::Produce),
            "consume" => parse(request_type, data).map(Request::Consume),
            "resumeConsumer" => parse(request_type, data).map(Request::ResumeConsumer),
            "produceData" => parse(request_type, data).map(Request::ProduceData),
            "consumeData" => parse(request_type, data).map(Request::ConsumeData),
            "resumeDataConsumer" => parse(request_type, data).map(Request::ResumeDataConsumer),
            other => Err(SfuError::InvalidRequest(format!(
                "Unknown request type: {other}"
            ))),
        }
    }

    /// Wire name of the request type (bounded, used as a metric label).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Request::CreateWebRtcTransport(_) => "createWebRtcTransport",
            Request::ConnectWebRtcTransport(_) => "connectWebRtcTransport",
            Request::Produce(_) => "produce",
            Request::Consume(_) => "consume",
            Request::ResumeConsumer(_) => "resumeConsumer",
            Request::ProduceData(_) => "produceData",
            Request::ConsumeData(_) => "consumeData",
            Request::ResumeDataConsumer(_) => "resumeDataConsumer",
        }
    }

    /// Room the request addresses.
    #[must_use]
    pub fn room_name(&self) -> &str {
        match self {
            Request::CreateWebRtcTransport(r) => &r.room_name,
            Request::ConnectWebRtcTransport(r) => &r.room_name,
            Request::Produce(r) => &r.room_name,
            Request::Consume(r) => &r.room_name,
            Request::ResumeConsumer(r) => &r.room_name,
            Request::ProduceData(r) => &r.room_name,
            Request::ConsumeData(r) => &r.room_name,
            Request::ResumeDataConsumer(r) => &r.room_name,
        }
    }

    /// Whether the request has a response. Resume requests are fire-and-forget.
    #[must_use]
    pub const fn expects_response(&self) -> bool {
        !matches!(
            self,
            Request::ResumeConsumer(_) | Request::ResumeDataConsumer(_)
        )
    }
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebRtcTransportResponse {
    pub router_rtp_capabilities: Value,
    pub transport_options: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectWebRtcTransportResponse {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceResponse {
    pub producer_id: ProducerId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResponse {
    pub id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_parameters: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProduceDataResponse {
    pub data_producer_id: DataProducerId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeDataResponse {
    pub data_consumer_id: DataConsumerId,
    pub data_producer_id: DataProducerId,
    pub sctp_stream_parameters: Option<Value>,
    pub label: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Error payload: `{"error": {"message": "..."}}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    /// Build the client-facing error payload for `err`.
    #[must_use]
    pub fn from_error(err: &SfuError) -> Self {
        Self {
            error: ErrorBody {
                message: err.client_message(),
            },
        }
    }

    /// Encode as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({ "error": { "message": self.error.message } })
    }
}

/// Encode a response payload.
///
/// # Errors
///
/// `Internal` if the payload cannot be serialized.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<Value, SfuError> {
    serde_json::to_value(payload)
        .map_err(|e| SfuError::Internal(format!("response encode failed: {e}")))
}

// ============================================================================
// Frames
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(default)]
    ack: Option<u64>,
    #[serde(rename = "type")]
    request_type: String,
    #[serde(default)]
    data: Value,
}

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRequest {
    pub ack: Option<u64>,
    pub request: Request,
}

/// A frame that could not be decoded, with the `ack` to answer on if one was recoverable.
///
/// `ack` is `None` for resume requests, which are never answered.
#[derive(Debug)]
pub struct FrameError {
    pub ack: Option<u64>,
    pub error: SfuError,
}

/// Decode a client text frame.
///
/// # Errors
///
/// `FrameError` for frames that are not JSON, lack a `type`, or carry a payload that does
/// not match their type.
pub fn decode_frame(text: &str) -> Result<ClientRequest, FrameError> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            let ack = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|value| value.get("ack").and_then(Value::as_u64));
            return Err(FrameError {
                ack,
                error: SfuError::InvalidRequest(format!("Malformed frame: {e}")),
            });
        }
    };

    match Request::decode(&frame.request_type, frame.data) {
        Ok(request) => Ok(ClientRequest {
            ack: frame.ack,
            request,
        }),
        Err(error) => Err(FrameError {
            ack: frame.ack.filter(|_| type_expects_response(&frame.request_type)),
            error,
        }),
    }
}

fn type_expects_response(request_type: &str) -> bool {
    !matches!(request_type, "resumeConsumer" | "resumeDataConsumer")
}

/// Server-to-client response frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerFrame {
    pub ack: u64,
    pub data: Value,
}

impl ServerFrame {
    /// Encode as the text of a WebSocket message.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::json!({ "ack": self.ack, "data": self.data }).to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use sfu_test_utils::fixtures;

    #[test]
    fn test_decode_create_webrtc_transport() {
        let frame = fixtures::request_frame("createWebRtcTransport", Some(1), json!({ "roomName": "r1" }));
        let decoded = decode_frame(&frame).unwrap();

        assert_eq!(decoded.ack, Some(1));
        assert_eq!(decoded.request.name(), "createWebRtcTransport");
        assert_eq!(decoded.request.room_name(), "r1");
        assert!(decoded.request.expects_response());
    }

    #[test]
    fn test_decode_blob_from_object_and_string() {
        let as_object = Request::decode(
            "connectWebRtcTransport",
            json!({
                "roomName": "r1",
                "transportId": "t1",
                "dtlsParameters": fixtures::dtls_parameters()
            }),
        )
        .unwrap();
        let as_string = Request::decode(
            "connectWebRtcTransport",
            json!({
                "roomName": "r1",
                "transportId": "t1",
                "dtlsParameters": fixtures::dtls_parameters().to_string()
            }),
        )
        .unwrap();

        assert_eq!(as_object, as_string);
        let Request::ConnectWebRtcTransport(request) = as_object else {
            panic!("wrong variant");
        };
        assert_eq!(request.transport_id, TransportId::from("t1"));
        assert_eq!(request.dtls_parameters, fixtures::dtls_parameters());
    }

    #[test]
    fn test_decode_blob_string_must_hold_json() {
        let err = Request::decode(
            "produce",
            json!({
                "roomName": "r1",
                "transportId": "t1",
                "kind": "audio",
                "rtpParameters": "{not json"
            }),
        )
        .unwrap_err();
        assert!(matches!(err, SfuError::InvalidRequest(_)));
    }

    #[test]
    fn test_decode_produce_data_label_defaults_empty() {
        let request = Request::decode(
            "produceData",
            json!({
                "roomName": "r1",
                "transportId": "t1",
                "sctpStreamParameters": fixtures::sctp_stream_parameters(0)
            }),
        )
        .unwrap();
        let Request::ProduceData(request) = request else {
            panic!("wrong variant");
        };
        assert_eq!(request.label, "");
    }

    #[test]
    fn test_resume_requests_have_no_response() {
        let resume = Request::decode(
            "resumeConsumer",
            json!({ "roomName": "r1", "consumerId": "c1" }),
        )
        .unwrap();
        assert!(!resume.expects_response());

        let resume_data = Request::decode(
            "resumeDataConsumer",
            json!({ "roomName": "r1", "dataConsumerId": "dc1" }),
        )
        .unwrap();
        assert!(!resume_data.expects_response());
    }

    #[test]
    fn test_rejected_resume_frames_drop_ack() {
        let frame = fixtures::request_frame("resumeConsumer", Some(5), json!({ "roomName": "r1" }));
        let err = decode_frame(&frame).unwrap_err();
        assert_eq!(err.ack, None);
        assert!(matches!(err.error, SfuError::InvalidRequest(_)));

        let frame = fixtures::request_frame(
            "resumeDataConsumer",
            Some(6),
            json!({ "dataConsumerId": 7 }),
        );
        assert_eq!(decode_frame(&frame).unwrap_err().ack, None);
    }

    #[test]
    fn test_unknown_type_keeps_ack() {
        let frame = fixtures::request_frame("joinRoom", Some(9), json!({ "roomName": "r1" }));
        let err = decode_frame(&frame).unwrap_err();

        assert_eq!(err.ack, Some(9));
        assert_eq!(err.error.client_message(), "Unknown request type: joinRoom");
    }

    #[test]
    fn test_missing_field_keeps_ack() {
        let frame = fixtures::request_frame("consume", Some(4), json!({ "roomName": "r1" }));
        let err = decode_frame(&frame).unwrap_err();

        assert_eq!(err.ack, Some(4));
        assert!(matches!(err.error, SfuError::InvalidRequest(_)));
    }

    #[test]
    fn test_malformed_frames() {
        let err = decode_frame("not json").unwrap_err();
        assert_eq!(err.ack, None);

        // Valid JSON without a type still yields the ack
        let err = decode_frame(r#"{"ack": 3, "data": {}}"#).unwrap_err();
        assert_eq!(err.ack, Some(3));
    }

    #[test]
    fn test_response_shapes() {
        let consume = encode_payload(&ConsumeResponse {
            id: ConsumerId::from("c1"),
            producer_id: ProducerId::from("p1"),
            kind: MediaKind::Audio,
            rtp_parameters: json!({}),
        })
        .unwrap();
        assert_eq!(
            consume,
            json!({ "id": "c1", "producerId": "p1", "kind": "audio", "rtpParameters": {} })
        );

        let connect = encode_payload(&ConnectWebRtcTransportResponse {}).unwrap();
        assert_eq!(connect, json!({}));

        let error = ErrorResponse::from_error(&SfuError::IncompatibleCapabilities(
            ProducerId::from("p1"),
        ));
        assert_eq!(error.to_value(), json!({ "error": { "message": "Cannot consume" } }));
    }

    #[test]
    fn test_server_frame_text() {
        let frame = ServerFrame {
            ack: 5,
            data: json!({ "producerId": "p1" }),
        };
        let parsed: Value = serde_json::from_str(&frame.to_text()).unwrap();
        assert_eq!(parsed, json!({ "ack": 5, "data": { "producerId": "p1" } }));
    }
}
