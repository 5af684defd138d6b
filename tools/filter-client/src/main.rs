//! hub-filter-client: reference client for the block distribution hub.
//!
//! By default it attaches to `/filter`, answers every record (optionally
//! dropping transactions from given senders) and logs a summary line per
//! record. With `--logs` it follows one application's log stream instead.
//!
//! ## Usage
//!
//! ```bash
//! # Echo every record back unchanged
//! hub-filter-client
//!
//! # Drop transactions sent by one account
//! hub-filter-client --drop-sender 5a1f...c3
//!
//! # Print the log lines of application 42
//! hub-filter-client --logs 42
//! ```

mod filter;
mod session;

use anyhow::Result;
use clap::Parser;
use hub_telemetry::{init_logging, TelemetryConfig};

use filter::FilterRule;

/// Block hub filter client
#[derive(Parser, Debug)]
#[command(name = "hub-filter-client")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Hub base URL
    #[arg(long, default_value = "ws://127.0.0.1:8888")]
    url: String,

    /// Drop top-level transactions sent by this address (hex, repeatable)
    #[arg(long = "drop-sender", value_name = "ADDRESS")]
    drop_senders: Vec<String>,

    /// Follow the log stream of this application instead of filtering
    #[arg(long, value_name = "APP_ID", conflicts_with = "drop_senders")]
    logs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    telemetry.service_name = "hub-filter-client".to_string();
    init_logging(&telemetry)?;

    match args.logs {
        Some(app_id) => session::follow_logs(&args.url, app_id).await,
        None => {
            let rule = FilterRule::from_hex(&args.drop_senders)?;
            session::run_filter(&args.url, &rule).await
        }
    }
}
