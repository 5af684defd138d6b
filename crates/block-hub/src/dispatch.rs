//! # Broadcast Dispatcher
//!
//! Fire-and-forget fan-out of one frame to every subscriber under a key.
//!
//! Each connection gets its own task, so a slow or dead peer delays only
//! itself. A failed or timed-out send closes that connection and removes it
//! from the registry; nothing is reported back to the pipeline.
//!
//! Sends to the same connection are chained: a send starts only after the one
//! from the previous broadcast finished, so every subscriber sees frames in
//! broadcast order even when nobody waits on the [`Delivery`].

use crate::domain::connection::{ChannelKey, ConnectionId};
use crate::ports::outbound::Frame;
use crate::registry::{ConnectionRegistry, Subscriber};
use dashmap::DashMap;
use hub_telemetry::metrics::{CONNECTIONS_DROPPED, FRAMES_SENT};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Result of one per-connection send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// The connection failed or timed out and was dropped.
    Dropped,
    /// The broadcast was cancelled before the send finished.
    Cancelled,
}

/// Tally of a completed broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
    pub cancelled: usize,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.dropped + self.cancelled
    }
}

/// Handles of the send tasks spawned by one broadcast.
///
/// Dropping a `Delivery` does not stop the sends.
#[derive(Debug, Default)]
#[must_use = "drop the delivery to let the sends run detached"]
pub struct Delivery {
    handles: Vec<JoinHandle<SendOutcome>>,
}

impl Delivery {
    /// Number of send tasks spawned.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Combine with another broadcast's sends.
    pub fn extend(&mut self, other: Delivery) {
        self.handles.extend(other.handles);
    }

    /// Wait for every send to finish.
    pub async fn wait(self) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for handle in self.handles {
            match handle.await {
                Ok(SendOutcome::Delivered) => report.delivered += 1,
                Ok(SendOutcome::Dropped) => report.dropped += 1,
                Ok(SendOutcome::Cancelled) | Err(_) => report.cancelled += 1,
            }
        }
        report
    }
}

/// Latest queued send of one connection.
struct Lane {
    seq: u64,
    done: oneshot::Receiver<()>,
}

/// A send's place in its connection's lane.
struct Turn {
    seq: u64,
    /// Resolves once the previous send to the same connection is over.
    previous: Option<oneshot::Receiver<()>>,
    /// Dropped when this send is over.
    done: oneshot::Sender<()>,
}

/// Fans frames out to registered connections.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
    /// Only connections with a send in flight have an entry.
    lanes: Arc<DashMap<ConnectionId, Lane>>,
    next_seq: Arc<AtomicU64>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
            lanes: Arc::new(DashMap::new()),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Send `frame` to every connection registered under `key` right now.
    ///
    /// Returns as soon as the sends are spawned. Connections registered after
    /// the snapshot do not receive this frame. Each send queues behind the
    /// previous broadcast's send to the same connection.
    pub fn broadcast(&self, key: ChannelKey, frame: Frame, cancel: &CancellationToken) -> Delivery {
        let subscribers = self.registry.snapshot(&key);
        if subscribers.is_empty() {
            return Delivery::default();
        }

        debug!(
            channel = %key,
            subscribers = subscribers.len(),
            bytes = frame.len(),
            "Broadcasting frame"
        );

        let handles = subscribers
            .into_iter()
            .map(|subscriber| {
                let turn = self.take_turn(subscriber.id);
                tokio::spawn(send_one(
                    Arc::clone(&self.registry),
                    Arc::clone(&self.lanes),
                    subscriber,
                    turn,
                    frame.clone(),
                    self.send_timeout,
                    cancel.clone(),
                ))
            })
            .collect();

        Delivery { handles }
    }

    fn take_turn(&self, id: ConnectionId) -> Turn {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (done, rx) = oneshot::channel();
        let previous = self
            .lanes
            .insert(id, Lane { seq, done: rx })
            .map(|lane| lane.done);
        Turn {
            seq,
            previous,
            done,
        }
    }
}

async fn send_one(
    registry: Arc<ConnectionRegistry>,
    lanes: Arc<DashMap<ConnectionId, Lane>>,
    subscriber: Subscriber,
    turn: Turn,
    frame: Frame,
    send_timeout: Duration,
    cancel: CancellationToken,
) -> SendOutcome {
    let Turn {
        seq,
        previous,
        done: _done,
    } = turn;
    let channel = subscriber.key.kind().as_str();

    let result = tokio::select! {
        _ = cancel.cancelled() => None,
        result = async {
            if let Some(previous) = previous {
                // Err only means the previous send is gone, which is all we wait for.
                let _ = previous.await;
            }
            tokio::time::timeout(send_timeout, subscriber.sink.send_frame(frame)).await
        } => Some(result),
    };
    lanes.remove_if(&subscriber.id, |_, lane| lane.seq == seq);

    let Some(result) = result else {
        return SendOutcome::Cancelled;
    };

    let reason = match result {
        Ok(Ok(())) => {
            FRAMES_SENT.with_label_values(&[channel]).inc();
            return SendOutcome::Delivered;
        }
        Ok(Err(e)) => {
            warn!(
                connection_id = %subscriber.id,
                channel = %subscriber.key,
                error = %e,
                "Send failed, dropping subscriber"
            );
            "error"
        }
        Err(_) => {
            warn!(
                connection_id = %subscriber.id,
                channel = %subscriber.key,
                timeout_ms = send_timeout.as_millis() as u64,
                "Send timed out, dropping subscriber"
            );
            "timeout"
        }
    };

    subscriber.sink.close().await;
    if registry.remove(&subscriber.key, &subscriber.id) {
        CONNECTIONS_DROPPED.with_label_values(&[channel, reason]).inc();
    }
    SendOutcome::Dropped
}
