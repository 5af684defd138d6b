//! # Hub Telemetry
//!
//! Logging and metrics for the block distribution hub.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with an env filter, pretty or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms served on `/metrics`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hub_telemetry::{init_logging, register_metrics, TelemetryConfig};
//!
//! init_logging(&TelemetryConfig::from_env())?;
//! register_metrics()?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HUB_SERVICE_NAME` | `block-hub` | Service name reported when logging starts |
//! | `HUB_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `HUB_JSON_LOGS` | `false` | Emit JSON log lines |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{encode_metrics, register_metrics};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}
