//! Connection identity and channel addressing.
//!
//! Uses UUID v7 for time-ordered, never-reused connection identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one subscriber or filter connection.
///
/// Generated fresh on every successful handshake; two connections never share
/// an identity, even after one of them has closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a new connection ID (UUID v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of channel a connection subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Every record, in full.
    Block,
    /// Log lines of one application.
    Logs,
    /// The synchronous filter gate.
    Filter,
}

impl ChannelKind {
    /// Metric and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Block => "block",
            ChannelKind::Logs => "logs",
            ChannelKind::Filter => "filter",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registry bucket address: a broadcast channel kind plus its secondary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelKey {
    /// Full-record subscribers.
    Block,
    /// Log-stream subscribers of one application index.
    Logs(u64),
}

impl ChannelKey {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelKey::Block => ChannelKind::Block,
            ChannelKey::Logs(_) => ChannelKind::Logs,
        }
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Block => f.write_str("block"),
            ChannelKey::Logs(app) => write!(f, "logs/{}", app),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert_eq!(id1.to_string().len(), 36);
    }

    #[test]
    fn test_channel_key_kind() {
        assert_eq!(ChannelKey::Block.kind(), ChannelKind::Block);
        assert_eq!(ChannelKey::Logs(42).kind(), ChannelKind::Logs);
        assert_eq!(ChannelKey::Logs(42).to_string(), "logs/42");
    }
}
