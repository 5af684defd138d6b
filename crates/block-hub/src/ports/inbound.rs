//! Inbound ports (API) for the hub.

use crate::domain::error::{HubResult, ProcessError};
use async_trait::async_trait;
use shared_types::BlockRecord;
use std::net::SocketAddr;

/// Surface the ingestion pipeline drives, once per block.
#[async_trait]
pub trait BlockProcessor: Send + Sync {
    /// Start accepting connections. Returns the bound address.
    async fn init(&self) -> HubResult<SocketAddr>;

    /// Distribute one record and return the record that continues downstream.
    async fn process(&self, record: BlockRecord) -> Result<BlockRecord, ProcessError>;

    /// Close every live connection and stop accepting new ones. Idempotent.
    async fn close(&self) -> HubResult<()>;
}
