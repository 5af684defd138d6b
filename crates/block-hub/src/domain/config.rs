//! Hub configuration with validation.
//!
//! Every section has defaults, so an empty TOML document is a valid
//! configuration that enables all three channels on `127.0.0.1:8888`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main hub configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Address the WebSocket endpoints listen on
    pub listen_addr: String,
    /// Which channels accept connections
    pub channels: ChannelsConfig,
    /// Broadcast tuning
    pub broadcast: BroadcastConfig,
    /// Filter gate tuning
    pub filter: FilterConfig,
}

impl HubConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.channels.any_enabled() {
            return Err(ConfigError::NoChannelEnabled);
        }

        self.socket_addr()?;

        if self.broadcast.send_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "broadcast.send_timeout_ms cannot be 0".into(),
            ));
        }

        if self.filter.reply_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout(
                "filter.reply_timeout_ms cannot be 0".into(),
            ));
        }

        if self.filter.wait_on_init && !self.channels.filter {
            return Err(ConfigError::FilterDisabled);
        }

        Ok(())
    }

    /// Get the listen address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddr(self.listen_addr.clone()))
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8888".to_string(),
            channels: ChannelsConfig::default(),
            broadcast: BroadcastConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

/// Enabled channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Full-record channel (`/block`)
    pub block: bool,
    /// Per-application log channel (`/logs/:app_id`)
    pub logs: bool,
    /// Synchronous filter gate (`/filter`)
    pub filter: bool,
}

impl ChannelsConfig {
    pub fn any_enabled(&self) -> bool {
        self.block || self.logs || self.filter
    }
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            block: true,
            logs: true,
            filter: true,
        }
    }
}

/// Broadcast tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Deadline for a single send to a single connection
    pub send_timeout_ms: u64,
    /// Wait for every send of a record to finish before `process` returns.
    ///
    /// Off by default: broadcasts are fire-and-forget. Turning it on makes slow
    /// subscribers apply backpressure to the pipeline (bounded by the send
    /// timeout).
    pub await_delivery: bool,
}

impl BroadcastConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            await_delivery: false,
        }
    }
}

/// Filter gate tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Give up on a filter reply after this long (None = wait until the
    /// connection closes)
    pub reply_timeout_ms: Option<u64>,
    /// Block `init` until a filter connection attaches
    pub wait_on_init: bool,
    /// How long `init` waits for the filter when `wait_on_init` is set
    pub attach_timeout_ms: u64,
}

impl FilterConfig {
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(self.attach_timeout_ms)
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: None,
            wait_on_init: false,
            attach_timeout_ms: 30_000,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(String),
    /// Every channel is disabled
    #[error("at least one channel must be enabled")]
    NoChannelEnabled,
    /// Listen address does not parse as `ip:port`
    #[error("malformed listen address: {0:?}")]
    InvalidListenAddr(String),
    /// Zero or otherwise unusable timeout
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// `filter.wait_on_init` set while the filter channel is disabled
    #[error("filter.wait_on_init requires the filter channel")]
    FilterDisabled,
}
