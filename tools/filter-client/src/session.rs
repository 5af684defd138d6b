//! WebSocket sessions against the hub.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use shared_types::{decode_app_logs, decode_record, encode_record};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

use crate::filter::FilterRule;

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Attach as the filter and answer every record until the hub hangs up.
pub async fn run_filter(base: &str, rule: &FilterRule) -> Result<()> {
    let url = endpoint(base, "filter");
    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    info!(url = %url, echo = rule.is_echo(), "Attached as filter");

    let (mut tx, mut rx) = socket.split();
    while let Some(message) = rx.next().await {
        match message.context("filter connection failed")? {
            Message::Binary(data) => {
                let mut record = decode_record(&data).context("hub sent an undecodable record")?;
                let dropped = rule.apply(&mut record);
                info!(
                    round = record.round(),
                    transactions = record.payset.len(),
                    dropped,
                    "Filtered record"
                );
                tx.send(Message::binary(encode_record(&record)?)).await?;
            }
            Message::Text(text) => warn!(text = %text.as_str(), "Ignoring text frame"),
            Message::Close(_) => break,
            _ => {}
        }
    }

    info!("Hub closed the filter connection");
    Ok(())
}

/// Print the log lines of one application as they arrive.
pub async fn follow_logs(base: &str, app_id: u64) -> Result<()> {
    let url = endpoint(base, &format!("logs/{app_id}"));
    let (socket, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    info!(url = %url, "Following application logs");

    let (_tx, mut rx) = socket.split();
    while let Some(message) = rx.next().await {
        match message.context("log connection failed")? {
            Message::Binary(data) => {
                let frame = decode_app_logs(&data).context("hub sent an undecodable log frame")?;
                for line in &frame.lines {
                    println!(
                        "{}\t{}\t{}",
                        frame.round,
                        frame.application_id,
                        String::from_utf8_lossy(line)
                    );
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
