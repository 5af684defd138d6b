//! # Error Types
//!
//! Errors raised while moving records across the wire.

use thiserror::Error;

/// Errors from the binary wire codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A value could not be serialized.
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },

    /// A frame did not contain a valid value of the expected type.
    #[error("failed to decode {what} ({len} bytes): {source}")]
    Decode {
        what: &'static str,
        len: usize,
        #[source]
        source: bincode::Error,
    },
}
