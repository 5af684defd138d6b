//! # Wire Codec
//!
//! Binary framing for records and log streams. Every frame is a single
//! `bincode` value; there is no envelope or version prefix.

use crate::entities::{AppLogFrame, BlockRecord};
use crate::errors::CodecError;

/// Encodes a record for the `block` and `filter` channels.
pub fn encode_record(record: &BlockRecord) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(record).map_err(|source| CodecError::Encode {
        what: "block record",
        source,
    })
}

/// Decodes a record received from a filter connection.
pub fn decode_record(bytes: &[u8]) -> Result<BlockRecord, CodecError> {
    bincode::deserialize(bytes).map_err(|source| CodecError::Decode {
        what: "block record",
        len: bytes.len(),
        source,
    })
}

/// Encodes one application's log lines for the `logs` channel.
pub fn encode_app_logs(frame: &AppLogFrame) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(frame).map_err(|source| CodecError::Encode {
        what: "log frame",
        source,
    })
}

/// Decodes a log-stream frame.
pub fn decode_app_logs(bytes: &[u8]) -> Result<AppLogFrame, CodecError> {
    bincode::deserialize(bytes).map_err(|source| CodecError::Decode {
        what: "log frame",
        len: bytes.len(),
        source,
    })
}
