//! Domain types for the hub.
//!
//! Configuration, errors, connection addressing and the two pure record
//! transforms (sanitizer, log collection). Nothing here touches a socket.

pub mod config;
pub mod connection;
pub mod error;
pub mod logs;
pub mod sanitizer;

// Re-exports for convenience
pub use config::{BroadcastConfig, ChannelsConfig, ConfigError, FilterConfig, HubConfig};
pub use connection::{ChannelKey, ChannelKind, ConnectionId};
pub use error::{GateError, HubError, HubResult, ProcessError};
pub use logs::{app_log_frames, collect_app_logs};
pub use sanitizer::{restore, strip, ExclusionSet};
