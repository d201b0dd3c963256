//! Common configuration types for SFU signaling components.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text lines
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse a format name, returning `None` for unknown values.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default filter directive used when `RUST_LOG` is unset
    pub default_filter: String,
    /// Log output format
    pub log_format: LogFormat,
}

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to install tracing subscriber: {0}")]
    Install(String),
}

impl ObservabilityConfig {
    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` takes precedence over `default_filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber was already installed.
    pub fn init_tracing(&self) -> Result<(), ObservabilityError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_filter.clone()));

        let registry = tracing_subscriber::registry().with(filter);

        let result = match self.log_format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init(),
            LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        };

        result.map_err(|e| ObservabilityError::Install(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
