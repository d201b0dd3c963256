//! Media engine error type.

use thiserror::Error;

/// Error raised by a media engine adapter.
///
/// The message is forwarded to clients verbatim, so adapters must not embed anything
/// beyond what the engine itself reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// The engine rejected or failed a request.
    #[error("{0}")]
    Request(String),

    /// A parameter blob could not be parsed into the engine's types.
    #[error("invalid {what}: {reason}")]
    InvalidParameters { what: &'static str, reason: String },

    /// The engine worker or the parent resource is gone.
    #[error("{0} closed")]
    Closed(&'static str),
}

impl EngineError {
    /// Build an `InvalidParameters` error from any displayable parse error.
    pub fn invalid(what: &'static str, reason: impl ToString) -> Self {
        EngineError::InvalidParameters {
            what,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_engine_message_verbatim() {
        let err = EngineError::Request("connect() already called".to_string());
        assert_eq!(err.to_string(), "connect() already called");
    }

    #[test]
    fn test_invalid_parameters_display() {
        let err = EngineError::invalid("dtlsParameters", "missing field `fingerprints`");
        assert_eq!(
            err.to_string(),
            "invalid dtlsParameters: missing field `fingerprints`"
        );
    }

    #[test]
    fn test_closed_display() {
        assert_eq!(EngineError::Closed("router").to_string(), "router closed");
    }
}
