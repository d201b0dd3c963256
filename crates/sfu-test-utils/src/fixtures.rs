//! Sample parameter blobs for signaling tests.
//!
//! The shapes follow what a browser WebRTC client library sends, trimmed to what the
//! mock engine looks at.

use common::types::MediaKind;
use serde_json::{json, Value};

/// Router RTP capabilities advertised by the mock engine (Opus + VP8).
#[must_use]
pub fn router_rtp_capabilities() -> Value {
    json!({
        "codecs": [
            {
                "kind": "audio",
                "mimeType": "audio/opus",
                "preferredPayloadType": 100,
                "clockRate": 48000,
                "channels": 2,
                "parameters": { "useinbandfec": 1 },
                "rtcpFeedback": [{ "type": "transport-cc", "parameter": "" }]
            },
            {
                "kind": "video",
                "mimeType": "video/VP8",
                "preferredPayloadType": 101,
                "clockRate": 90000,
                "parameters": {},
                "rtcpFeedback": [
                    { "type": "nack", "parameter": "" },
                    { "type": "nack", "parameter": "pli" },
                    { "type": "ccm", "parameter": "fir" },
                    { "type": "goog-remb", "parameter": "" }
                ]
            }
        ],
        "headerExtensions": []
    })
}

/// Client RTP capabilities able to receive both audio and video.
#[must_use]
pub fn client_rtp_capabilities() -> Value {
    router_rtp_capabilities()
}

/// Client RTP capabilities that can receive audio only.
#[must_use]
pub fn audio_only_rtp_capabilities() -> Value {
    let mut caps = router_rtp_capabilities();
    if let Some(codecs) = caps["codecs"].as_array_mut() {
        codecs.retain(|codec| codec["kind"] == "audio");
    }
    caps
}

/// Client RTP capabilities with no codecs at all.
#[must_use]
pub fn incompatible_rtp_capabilities() -> Value {
    json!({ "codecs": [], "headerExtensions": [] })
}

/// Client DTLS parameters for `connectWebRtcTransport`.
#[must_use]
pub fn dtls_parameters() -> Value {
    json!({
        "role": "client",
        "fingerprints": [{
            "algorithm": "sha-256",
            "value": "82:5A:68:3D:36:C3:0A:DE:AF:E7:32:43:D2:88:83:57:\
                      AC:2D:65:E5:80:C4:B6:FB:AF:1A:A0:21:9F:6D:0C:AD"
        }]
    })
}

/// Producer RTP parameters for the given kind.
#[must_use]
pub fn rtp_parameters(kind: MediaKind) -> Value {
    match kind {
        MediaKind::Audio => json!({
            "mid": "0",
            "codecs": [{
                "mimeType": "audio/opus",
                "payloadType": 111,
                "clockRate": 48000,
                "channels": 2,
                "parameters": { "useinbandfec": 1 }
            }],
            "encodings": [{ "ssrc": 11_111_111 }],
            "rtcp": { "cname": "test-cname" }
        }),
        MediaKind::Video => json!({
            "mid": "1",
            "codecs": [{
                "mimeType": "video/VP8",
                "payloadType": 96,
                "clockRate": 90000
            }],
            "encodings": [{ "ssrc": 22_222_222 }],
            "rtcp": { "cname": "test-cname" }
        }),
    }
}

/// SCTP stream parameters for `produceData`.
#[must_use]
pub fn sctp_stream_parameters(stream_id: u16) -> Value {
    json!({ "streamId": stream_id, "ordered": true })
}

/// Build a client-to-server signaling frame.
#[must_use]
pub fn request_frame(request_type: &str, ack: Option<u64>, data: Value) -> String {
    let mut frame = json!({ "type": request_type, "data": data });
    if let Some(ack) = ack {
        frame["ack"] = json!(ack);
    }
    frame.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_only_capabilities_drop_video() {
        let caps = audio_only_rtp_capabilities();
        let codecs = caps["codecs"].as_array().unwrap();
        assert_eq!(codecs.len(), 1);
        assert_eq!(codecs[0]["kind"], "audio");
    }

    #[test]
    fn test_request_frame_omits_missing_ack() {
        let frame: Value =
            serde_json::from_str(&request_frame("resumeConsumer", None, json!({}))).unwrap();
        assert!(frame.get("ack").is_none());
        assert_eq!(frame["type"], "resumeConsumer");

        let frame: Value =
            serde_json::from_str(&request_frame("produce", Some(7), json!({}))).unwrap();
        assert_eq!(frame["ack"], 7);
    }
}
