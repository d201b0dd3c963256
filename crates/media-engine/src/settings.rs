//! WebRTC transport settings applied to every transport a room creates.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// Default initial available outgoing bitrate (bps).
pub const DEFAULT_INITIAL_OUTGOING_BITRATE: u32 = 1_000_000;

/// Listen, ICE and DTLS options for new WebRTC transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebRtcTransportSettings {
    /// Local IP the engine binds transports to.
    pub listen_ip: IpAddr,
    /// Public address advertised in ICE candidates (for NAT / containers).
    pub announced_address: Option<String>,
    /// Inclusive RTC port range; engine default when `None`.
    pub port_range: Option<(u16, u16)>,
    pub enable_udp: bool,
    pub enable_tcp: bool,
    pub prefer_udp: bool,
    /// Negotiate SCTP so data producers/consumers can be created.
    pub enable_sctp: bool,
    pub initial_available_outgoing_bitrate: u32,
}

impl Default for WebRtcTransportSettings {
    fn default() -> Self {
        Self {
            listen_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            announced_address: None,
            port_range: None,
            enable_udp: true,
            enable_tcp: true,
            prefer_udp: true,
            enable_sctp: true,
            initial_available_outgoing_bitrate: DEFAULT_INITIAL_OUTGOING_BITRATE,
        }
    }
}
