//! # Connection Registry
//!
//! Live subscriber connections, bucketed by [`ChannelKey`].
//!
//! Mutated from three places at once: handshake handlers adding connections,
//! broadcast tasks removing connections whose send failed, and reader tasks
//! removing connections their peer closed. Buckets live in a `DashMap`, so
//! each bucket is guarded by its shard lock and no lock is held across an
//! await point.

use crate::domain::connection::{ChannelKey, ConnectionId};
use crate::ports::outbound::FrameSink;
use dashmap::DashMap;
use hub_telemetry::metrics::SUBSCRIBERS;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A registered connection, as handed out by [`ConnectionRegistry::snapshot`].
#[derive(Clone)]
pub struct Subscriber {
    pub id: ConnectionId,
    pub key: ChannelKey,
    pub sink: Arc<dyn FrameSink>,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Subscriber connections by channel.
#[derive(Default)]
pub struct ConnectionRegistry {
    buckets: DashMap<ChannelKey, HashMap<ConnectionId, Arc<dyn FrameSink>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under `key`, returning its fresh identity.
    pub fn add(&self, key: ChannelKey, sink: Arc<dyn FrameSink>) -> ConnectionId {
        let id = ConnectionId::new();
        self.buckets.entry(key).or_default().insert(id, sink);
        SUBSCRIBERS.with_label_values(&[key.kind().as_str()]).inc();

        debug!(connection_id = %id, channel = %key, "Registered subscriber");
        id
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn remove(&self, key: &ChannelKey, id: &ConnectionId) -> bool {
        let removed = match self.buckets.get_mut(key) {
            Some(mut bucket) => bucket.remove(id).is_some(),
            None => false,
        };
        // The shard guard above is released before touching the map again.
        self.buckets.remove_if(key, |_, bucket| bucket.is_empty());

        if removed {
            SUBSCRIBERS.with_label_values(&[key.kind().as_str()]).dec();
            debug!(connection_id = %id, channel = %key, "Removed subscriber");
        }
        removed
    }

    /// Point-in-time copy of the connections under `key`.
    pub fn snapshot(&self, key: &ChannelKey) -> Vec<Subscriber> {
        self.buckets
            .get(key)
            .map(|bucket| {
                bucket
                    .iter()
                    .map(|(id, sink)| Subscriber {
                        id: *id,
                        key: *key,
                        sink: Arc::clone(sink),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of connections under `key`.
    pub fn len(&self, key: &ChannelKey) -> usize {
        self.buckets.get(key).map(|b| b.len()).unwrap_or(0)
    }

    pub fn contains(&self, key: &ChannelKey, id: &ConnectionId) -> bool {
        self.buckets
            .get(key)
            .map(|b| b.contains_key(id))
            .unwrap_or(false)
    }

    /// Number of connections across all channels.
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Keys that currently have at least one connection.
    pub fn keys(&self) -> Vec<ChannelKey> {
        self.buckets.iter().map(|b| *b.key()).collect()
    }

    /// Remove and return every connection.
    pub fn drain(&self) -> Vec<Subscriber> {
        let mut drained = Vec::new();
        for key in self.keys() {
            if let Some((key, bucket)) = self.buckets.remove(&key) {
                SUBSCRIBERS
                    .with_label_values(&[key.kind().as_str()])
                    .sub(bucket.len() as f64);
                drained.extend(bucket.into_iter().map(|(id, sink)| Subscriber { id, key, sink }));
            }
        }
        drained
    }
}
