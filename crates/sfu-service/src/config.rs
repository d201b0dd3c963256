//! SFU signaling service configuration.
//!
//! Configuration is loaded from environment variables. The RTC options are collected
//! into [`WebRtcTransportSettings`], which every room hands to the media engine when it
//! creates a transport.

use common::config::{LogFormat, ObservabilityConfig};
use media_engine::settings::DEFAULT_INITIAL_OUTGOING_BITRATE;
use media_engine::WebRtcTransportSettings;
use std::collections::HashMap;
use std::env;
use std::net::IpAddr;
use thiserror::Error;

/// Default WebSocket signaling bind address.
pub const DEFAULT_SIGNALING_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Default RTC listen IP.
pub const DEFAULT_RTC_LISTEN_IP: &str = "0.0.0.0";

/// Default maximum concurrent rooms.
pub const DEFAULT_MAX_ROOMS: usize = 1000;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "sfu_service=info,media_engine=info,tower_http=info";

/// Default SFU instance ID prefix.
pub const DEFAULT_SFU_ID_PREFIX: &str = "sfu";

/// SFU signaling service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this SFU instance.
    pub sfu_id: String,

    /// WebSocket signaling bind address (default: "0.0.0.0:3000").
    pub signaling_bind_address: String,

    /// Health endpoint bind address (default: "0.0.0.0:8081").
    pub health_bind_address: String,

    /// Maximum concurrent rooms. New rooms beyond this are rejected.
    pub max_rooms: usize,

    /// ICE/DTLS options for every WebRTC transport.
    pub transport: WebRtcTransportSettings,

    /// Logging setup.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn parse_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> Result<bool, ConfigError> {
    match vars.get(key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!("{key}={v}"))),
        },
    }
}

fn parse_port(vars: &HashMap<String, String>, key: &str) -> Result<Option<u16>, ConfigError> {
    vars.get(key)
        .map(|v| {
            v.parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue(format!("{key}={v}: {e}")))
        })
        .transpose()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let signaling_bind_address = vars
            .get("SFU_SIGNALING_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SIGNALING_BIND_ADDRESS.to_string());

        let health_bind_address = vars
            .get("SFU_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let max_rooms = vars
            .get("SFU_MAX_ROOMS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ROOMS);

        // RTC listen options
        let listen_ip_raw = vars
            .get("SFU_RTC_LISTEN_IP")
            .map_or(DEFAULT_RTC_LISTEN_IP, String::as_str);
        let listen_ip: IpAddr = listen_ip_raw.parse().map_err(|e| {
            ConfigError::InvalidValue(format!("SFU_RTC_LISTEN_IP={listen_ip_raw}: {e}"))
        })?;

        let announced_address = vars
            .get("SFU_RTC_ANNOUNCED_ADDRESS")
            .filter(|v| !v.is_empty())
            .cloned();

        let port_range = match (
            parse_port(vars, "SFU_RTC_MIN_PORT")?,
            parse_port(vars, "SFU_RTC_MAX_PORT")?,
        ) {
            (None, None) => None,
            (Some(min), Some(max)) if min <= max => Some((min, max)),
            (Some(min), Some(max)) => {
                return Err(ConfigError::InvalidValue(format!(
                    "SFU_RTC_MIN_PORT ({min}) must not exceed SFU_RTC_MAX_PORT ({max})"
                )));
            }
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("SFU_RTC_MAX_PORT".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("SFU_RTC_MIN_PORT".to_string()));
            }
        };

        let enable_udp = parse_bool(vars, "SFU_ENABLE_UDP", true)?;
        let enable_tcp = parse_bool(vars, "SFU_ENABLE_TCP", true)?;
        if !enable_udp && !enable_tcp {
            return Err(ConfigError::InvalidValue(
                "at least one of SFU_ENABLE_UDP and SFU_ENABLE_TCP must be true".to_string(),
            ));
        }
        let prefer_udp = parse_bool(vars, "SFU_PREFER_UDP", true)?;
        let enable_sctp = parse_bool(vars, "SFU_ENABLE_SCTP", true)?;

        let initial_available_outgoing_bitrate = vars
            .get("SFU_INITIAL_OUTGOING_BITRATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_INITIAL_OUTGOING_BITRATE);

        let log_format = match vars.get("SFU_LOG_FORMAT") {
            None => LogFormat::Text,
            Some(v) => LogFormat::parse(v)
                .ok_or_else(|| ConfigError::InvalidValue(format!("SFU_LOG_FORMAT={v}")))?,
        };

        // Generate SFU instance ID
        let sfu_id = vars.get("SFU_ID").cloned().unwrap_or_else(|| {
            let hostname = env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_SFU_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            sfu_id,
            signaling_bind_address,
            health_bind_address,
            max_rooms,
            transport: WebRtcTransportSettings {
                listen_ip,
                announced_address,
                port_range,
                enable_udp,
                enable_tcp,
                prefer_udp,
                enable_sctp,
                initial_available_outgoing_bitrate,
            },
            observability: ObservabilityConfig {
                default_filter: DEFAULT_LOG_FILTER.to_string(),
                log_format,
            },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.signaling_bind_address, DEFAULT_SIGNALING_BIND_ADDRESS);
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.max_rooms, DEFAULT_MAX_ROOMS);
        assert_eq!(config.transport, WebRtcTransportSettings::default());
        assert_eq!(config.observability.log_format, LogFormat::Text);
        assert_eq!(config.observability.default_filter, DEFAULT_LOG_FILTER);
        // SFU ID should be auto-generated
        assert!(config.sfu_id.starts_with("sfu-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("SFU_ID".to_string(), "sfu-custom-001".to_string());
        vars.insert(
            "SFU_SIGNALING_BIND_ADDRESS".to_string(),
            "127.0.0.1:3001".to_string(),
        );
        vars.insert(
            "SFU_HEALTH_BIND_ADDRESS".to_string(),
            "127.0.0.1:8082".to_string(),
        );
        vars.insert("SFU_MAX_ROOMS".to_string(), "50".to_string());
        vars.insert("SFU_RTC_LISTEN_IP".to_string(), "10.0.0.5".to_string());
        vars.insert(
            "SFU_RTC_ANNOUNCED_ADDRESS".to_string(),
            "203.0.113.7".to_string(),
        );
        vars.insert("SFU_RTC_MIN_PORT".to_string(), "40000".to_string());
        vars.insert("SFU_RTC_MAX_PORT".to_string(), "40100".to_string());
        vars.insert("SFU_ENABLE_TCP".to_string(), "false".to_string());
        vars.insert("SFU_ENABLE_SCTP".to_string(), "0".to_string());
        vars.insert(
            "SFU_INITIAL_OUTGOING_BITRATE".to_string(),
            "600000".to_string(),
        );
        vars.insert("SFU_LOG_FORMAT".to_string(), "json".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.sfu_id, "sfu-custom-001");
        assert_eq!(config.signaling_bind_address, "127.0.0.1:3001");
        assert_eq!(config.health_bind_address, "127.0.0.1:8082");
        assert_eq!(config.max_rooms, 50);
        assert_eq!(config.transport.listen_ip.to_string(), "10.0.0.5");
        assert_eq!(
            config.transport.announced_address.as_deref(),
            Some("203.0.113.7")
        );
        assert_eq!(config.transport.port_range, Some((40000, 40100)));
        assert!(config.transport.enable_udp);
        assert!(!config.transport.enable_tcp);
        assert!(!config.transport.enable_sctp);
        assert_eq!(config.transport.initial_available_outgoing_bitrate, 600_000);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_listen_ip() {
        let mut vars = base_vars();
        vars.insert("SFU_RTC_LISTEN_IP".to_string(), "not-an-ip".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(v)) if v.starts_with("SFU_RTC_LISTEN_IP")));
    }

    #[test]
    fn test_port_range_requires_both_bounds() {
        let mut vars = base_vars();
        vars.insert("SFU_RTC_MIN_PORT".to_string(), "40000".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "SFU_RTC_MAX_PORT"));
    }

    #[test]
    fn test_port_range_must_be_ordered() {
        let mut vars = base_vars();
        vars.insert("SFU_RTC_MIN_PORT".to_string(), "50000".to_string());
        vars.insert("SFU_RTC_MAX_PORT".to_string(), "40000".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_invalid_port_value() {
        let mut vars = base_vars();
        vars.insert("SFU_RTC_MIN_PORT".to_string(), "70000".to_string());
        vars.insert("SFU_RTC_MAX_PORT".to_string(), "70001".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_at_least_one_protocol_required() {
        let mut vars = base_vars();
        vars.insert("SFU_ENABLE_UDP".to_string(), "false".to_string());
        vars.insert("SFU_ENABLE_TCP".to_string(), "no".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_invalid_bool_rejected() {
        let mut vars = base_vars();
        vars.insert("SFU_PREFER_UDP".to_string(), "maybe".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(v)) if v == "SFU_PREFER_UDP=maybe"
        ));
    }

    #[test]
    fn test_invalid_log_format_rejected() {
        let mut vars = base_vars();
        vars.insert("SFU_LOG_FORMAT".to_string(), "xml".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_empty_announced_address_is_none() {
        let mut vars = base_vars();
        vars.insert("SFU_RTC_ANNOUNCED_ADDRESS".to_string(), String::new());

        let config = Config::from_vars(&vars).unwrap();
        assert!(config.transport.announced_address.is_none());
    }
}
