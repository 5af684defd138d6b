//! [`FrameSink`] over the write half of an axum WebSocket.

use crate::ports::outbound::{Frame, FrameSink, TransportError};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Upper bound on the close handshake against an unresponsive peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct WsFrameSink {
    tx: Mutex<SplitSink<WebSocket, Message>>,
    closed: AtomicBool,
}

impl WsFrameSink {
    pub fn new(tx: SplitSink<WebSocket, Message>) -> Self {
        Self {
            tx: Mutex::new(tx),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let message = match frame {
            Frame::Binary(bytes) => Message::Binary(bytes.to_vec()),
            Frame::Text(text) => Message::Text(text),
        };
        self.tx
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let handshake = async {
            let mut tx = self.tx.lock().await;
            let _ = tx.send(Message::Close(None)).await;
            let _ = tx.close().await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, handshake).await.is_err() {
            debug!("Close handshake timed out");
        }
    }
}
