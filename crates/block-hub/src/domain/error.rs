//! Hub error types.
//!
//! Only configuration problems and filter-gate failures ever reach the
//! pipeline. Send failures on broadcast channels are handled where they happen
//! and never surface here.

use crate::domain::config::ConfigError;
use crate::ports::outbound::TransportError;
use shared_types::{BlockRecord, CodecError};
use std::time::Duration;

/// Failures of a filter exchange.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The filter answered with a non-binary frame
    #[error("protocol violation: filter replied with a {0} frame, expected binary")]
    UnexpectedFrame(&'static str),

    /// The filter's binary reply is not a record
    #[error("protocol violation: {0}")]
    Decode(#[source] CodecError),

    /// The filter connection closed while a record was pending
    #[error("filter disconnected while a record was pending")]
    Disconnected,

    /// No reply within the configured deadline
    #[error("no filter reply within {0:?}")]
    Timeout(Duration),

    /// The caller abandoned the call
    #[error("filter exchange cancelled")]
    Cancelled,

    /// Sending the record to the filter failed
    #[error("failed to send record to filter: {0}")]
    Transport(#[from] TransportError),

    /// A second filter tried to attach
    #[error("a filter connection is already attached")]
    AlreadyAttached,

    /// No filter attached while `init` waited for one
    #[error("no filter attached within {0:?}")]
    AttachTimeout(Duration),
}

impl GateError {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::UnexpectedFrame(_) => "unexpected_frame",
            GateError::Decode(_) => "decode",
            GateError::Disconnected => "disconnected",
            GateError::Timeout(_) => "timeout",
            GateError::Cancelled => "cancelled",
            GateError::Transport(_) => "transport",
            GateError::AlreadyAttached => "already_attached",
            GateError::AttachTimeout(_) => "attach_timeout",
        }
    }

    /// Whether the filter broke the wire protocol (as opposed to going away).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, GateError::UnexpectedFrame(_) | GateError::Decode(_))
    }
}

/// Hub-level errors.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(#[source] std::io::Error),

    /// `init` called on a running hub
    #[error("hub already initialized")]
    AlreadyInitialized,

    /// `init` called after `close`
    #[error("hub is closed")]
    Closed,

    /// Filter gate failure
    #[error(transparent)]
    Gate(#[from] GateError),

    /// The outgoing record could not be encoded
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for hub lifecycle operations
pub type HubResult<T> = Result<T, HubError>;

/// Failure of one `process` call.
///
/// Carries the best-effort record for callers that tolerate losing the filter:
/// the input record, restored, as it was before the gate.
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct ProcessError {
    source: HubError,
    fallback: Box<BlockRecord>,
}

impl ProcessError {
    pub fn new(source: impl Into<HubError>, fallback: BlockRecord) -> Self {
        Self {
            source: source.into(),
            fallback: Box::new(fallback),
        }
    }

    /// The underlying error.
    pub fn error(&self) -> &HubError {
        &self.source
    }

    /// The pre-gate record.
    pub fn fallback(&self) -> &BlockRecord {
        &self.fallback
    }

    /// Split into the error and the pre-gate record.
    pub fn into_parts(self) -> (HubError, BlockRecord) {
        (self.source, *self.fallback)
    }

    /// The gate failure behind this error, if any.
    pub fn gate_error(&self) -> Option<&GateError> {
        match &self.source {
            HubError::Gate(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_error_reasons() {
        assert_eq!(GateError::Disconnected.reason(), "disconnected");
        assert!(GateError::UnexpectedFrame("text").is_protocol_violation());
        assert!(!GateError::Timeout(Duration::from_secs(1)).is_protocol_violation());
    }

    #[test]
    fn test_process_error_keeps_fallback() {
        let mut record = BlockRecord::default();
        record.header.round = 9;
        let err = ProcessError::new(GateError::Disconnected, record.clone());

        assert!(matches!(err.gate_error(), Some(GateError::Disconnected)));
        assert_eq!(err.to_string(), "filter disconnected while a record was pending");
        let (source, fallback) = err.into_parts();
        assert!(matches!(source, HubError::Gate(_)));
        assert_eq!(fallback, record);
    }
}
