//! # Block Distribution Hub
//!
//! Sits inside a block ingestion pipeline and hands every record to
//! WebSocket clients over three channels:
//!
//! - **block**: every record, in full, to any number of subscribers
//! - **logs**: per-application log lines, keyed by application index
//! - **filter**: one connection that receives each record and answers with
//!   the record that continues down the pipeline
//!
//! Broadcasts are fire-and-forget; a failing subscriber is dropped without
//! affecting anyone else. The filter exchange is synchronous and its failures
//! are returned to the caller.
//!
//! ## Architecture
//!
//! ```text
//! pipeline --process--> BlockDistributionHub
//!                         |  strip / restore (domain::sanitizer)
//!                         |-- BroadcastDispatcher --> ConnectionRegistry --> /block, /logs/:app
//!                         '-- FilterGate ------------------------------> /filter
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use block_hub::{BlockDistributionHub, BlockProcessor, HubConfig};
//!
//! let hub = BlockDistributionHub::new(HubConfig::default())?;
//! let addr = hub.init().await?;
//! let record = hub.process(record).await?;
//! hub.close().await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod dispatch;
pub mod domain;
pub mod gate;
pub mod ports;
pub mod registry;
pub mod router;
pub mod service;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports
pub use dispatch::{BroadcastDispatcher, Delivery, DeliveryReport, SendOutcome};
pub use domain::{
    app_log_frames, collect_app_logs, restore, strip, BroadcastConfig, ChannelKey, ChannelKind,
    ChannelsConfig, ConfigError, ConnectionId, ExclusionSet, FilterConfig, GateError, HubConfig,
    HubError, HubResult, ProcessError,
};
pub use gate::{FilterGate, GateInbox, GateOutcome, GateState};
pub use ports::{BlockProcessor, Frame, FrameSink, TransportError};
pub use registry::{ConnectionRegistry, Subscriber};
pub use service::BlockDistributionHub;
