//! Per-connection sessions.
//!
//! Each upgraded socket is split: the write half becomes a [`WsFrameSink`]
//! shared with the registry or the gate, the read half stays here. The
//! session owns the connection's lifecycle and deregisters it when the peer
//! goes away or the hub shuts down.

use crate::domain::connection::ChannelKey;
use crate::gate::FilterGate;
use crate::ports::outbound::{Frame, FrameSink};
use crate::registry::ConnectionRegistry;
use crate::ws::sink::WsFrameSink;
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Register a subscriber and hold it until either side hangs up.
///
/// Subscribers only receive; anything they send is ignored.
pub async fn run_subscriber_session(
    socket: WebSocket,
    key: ChannelKey,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
) {
    let (tx, mut rx) = socket.split();
    let sink = Arc::new(WsFrameSink::new(tx));
    let id = registry.add(key, sink.clone());
    info!(connection_id = %id, channel = %key, "Subscriber connected");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            message = rx.next() => match message {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(connection_id = %id, error = %e, "Subscriber read failed");
                    break;
                }
            },
        }
    }

    registry.remove(&key, &id);
    sink.close().await;
    info!(connection_id = %id, channel = %key, "Subscriber disconnected");
}

/// Attach the filter and feed its replies to the gate until it hangs up.
pub async fn run_filter_session(
    socket: WebSocket,
    gate: Arc<FilterGate>,
    shutdown: CancellationToken,
) {
    let (tx, mut rx) = socket.split();
    let sink = Arc::new(WsFrameSink::new(tx));
    let (id, inbox) = match gate.attach(sink.clone()).await {
        Ok(attached) => attached,
        Err(e) => {
            warn!(error = %e, "Rejecting filter connection");
            sink.close().await;
            return;
        }
    };

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            message = rx.next() => match message {
                Some(Ok(Message::Binary(data))) => Frame::Binary(Bytes::from(data)),
                Some(Ok(Message::Text(text))) => Frame::Text(text),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    debug!(connection_id = %id, error = %e, "Filter read failed");
                    break;
                }
            },
        };
        if !inbox.push(frame) {
            debug!(connection_id = %id, "Gate released filter");
            break;
        }
    }

    gate.detach(inbox).await;
    sink.close().await;
    info!(connection_id = %id, "Filter disconnected");
}
