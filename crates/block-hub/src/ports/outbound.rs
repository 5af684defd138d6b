//! Outbound ports (SPI) for the hub: the transport a connection is reached by.

use async_trait::async_trait;
use bytes::Bytes;

/// One WebSocket-level message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Binary payload; the only kind the hub sends or accepts as a reply.
    Binary(Bytes),
    /// Text payload; a protocol violation on the filter channel.
    Text(String),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Binary(b) => b.len(),
            Frame::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Binary(_) => "binary",
            Frame::Text(_) => "text",
        }
    }
}

/// Transport failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The peer is gone.
    #[error("connection closed")]
    Closed,
    /// Writing to the socket failed.
    #[error("send failed: {0}")]
    Send(String),
}

/// Write half of a connection.
///
/// Implemented by the WebSocket adapter in production and by in-memory doubles
/// in tests. Implementations must tolerate `close` being called more than once
/// and concurrently with `send_frame`.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Send one frame, flushing it to the peer.
    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError>;

    /// Close the connection. Idempotent.
    async fn close(&self);
}
