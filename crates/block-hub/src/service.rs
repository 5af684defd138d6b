//! # Block Distribution Hub Service
//!
//! Owns the server, the connection registry and the filter gate, and runs the
//! per-record pipeline:
//!
//! ```text
//! strip -> encode -> broadcast block/logs (fire-and-forget)
//!                 -> filter gate (synchronous) -> restore -> return
//! ```

use crate::dispatch::{BroadcastDispatcher, Delivery};
use crate::domain::config::HubConfig;
use crate::domain::connection::ChannelKey;
use crate::domain::error::{GateError, HubError, HubResult, ProcessError};
use crate::domain::logs::app_log_frames;
use crate::domain::sanitizer::{restore, strip};
use crate::gate::{FilterGate, GateOutcome};
use crate::ports::inbound::BlockProcessor;
use crate::ports::outbound::Frame;
use crate::registry::ConnectionRegistry;
use crate::router::{build_router, AppState};
use async_trait::async_trait;
use bytes::Bytes;
use hub_telemetry::metrics::{PROCESS_DURATION, RECORDS_PROCESSED};
use parking_lot::Mutex;
use shared_types::{encode_app_logs, encode_record, BlockRecord};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long `close` waits for the server task to wind down.
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

enum Lifecycle {
    Idle,
    Running {
        addr: SocketAddr,
        server: JoinHandle<()>,
    },
    Closed,
}

/// The hub.
pub struct BlockDistributionHub {
    config: HubConfig,
    registry: Arc<ConnectionRegistry>,
    dispatcher: BroadcastDispatcher,
    gate: Arc<FilterGate>,
    shutdown: CancellationToken,
    lifecycle: Mutex<Lifecycle>,
}

impl BlockDistributionHub {
    /// Create a hub. Validates the configuration; binds nothing yet.
    pub fn new(config: HubConfig) -> HubResult<Self> {
        config.validate()?;
        if let Err(e) = hub_telemetry::register_metrics() {
            warn!(error = %e, "Metrics unavailable");
        }

        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher =
            BroadcastDispatcher::new(Arc::clone(&registry), config.broadcast.send_timeout());
        let gate = Arc::new(FilterGate::new(config.filter.reply_timeout()));

        Ok(Self {
            config,
            registry,
            dispatcher,
            gate,
            shutdown: CancellationToken::new(),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<FilterGate> {
        &self.gate
    }

    /// Address the server is bound to, once `init` has succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle.lock() {
            Lifecycle::Running { addr, .. } => Some(*addr),
            _ => None,
        }
    }

    fn app_state(&self) -> AppState {
        AppState {
            registry: Arc::clone(&self.registry),
            gate: Arc::clone(&self.gate),
            channels: self.config.channels,
            shutdown: self.shutdown.clone(),
        }
    }

    /// Bind the listen address and start serving.
    ///
    /// With `filter.wait_on_init` set, returns only once a filter attached.
    pub async fn start(&self) -> HubResult<SocketAddr> {
        match &*self.lifecycle.lock() {
            Lifecycle::Idle => {}
            Lifecycle::Running { .. } => return Err(HubError::AlreadyInitialized),
            Lifecycle::Closed => return Err(HubError::Closed),
        }

        let listener = TcpListener::bind(self.config.socket_addr()?)
            .await
            .map_err(HubError::Bind)?;
        let addr = listener.local_addr().map_err(HubError::Bind)?;

        let router = build_router(self.app_state());
        let shutdown = self.shutdown.clone();
        let server = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Server error");
            }
        });

        {
            let mut lifecycle = self.lifecycle.lock();
            if !matches!(*lifecycle, Lifecycle::Idle) {
                server.abort();
                return Err(HubError::AlreadyInitialized);
            }
            *lifecycle = Lifecycle::Running { addr, server };
        }

        info!(
            addr = %addr,
            block = self.config.channels.block,
            logs = self.config.channels.logs,
            filter = self.config.channels.filter,
            "Block hub listening"
        );

        if self.config.filter.wait_on_init {
            info!("Waiting for a filter connection");
            let id = self
                .gate
                .wait_attached(self.config.filter.attach_timeout())
                .await?;
            info!(connection_id = %id, "Filter ready");
        }

        Ok(addr)
    }

    /// Distribute one record; `cancel` aborts the filter wait.
    ///
    /// The returned record is the filter's reply with stripped substructures
    /// put back, or the input itself when no filter is attached.
    pub async fn process_with_cancel(
        &self,
        record: BlockRecord,
        cancel: &CancellationToken,
    ) -> Result<BlockRecord, ProcessError> {
        let _timer = PROCESS_DURATION.start_timer();
        let round = record.round();

        let (stripped, exclusions) = strip(record);
        let payload = match encode_record(&stripped) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                RECORDS_PROCESSED.with_label_values(&["error"]).inc();
                error!(round, error = %e, "Failed to encode record");
                return Err(ProcessError::new(e, restore(stripped, exclusions)));
            }
        };

        let mut deliveries = Delivery::default();
        if self.config.channels.block {
            deliveries.extend(self.dispatcher.broadcast(
                ChannelKey::Block,
                Frame::Binary(payload.clone()),
                cancel,
            ));
        }
        if self.config.channels.logs {
            deliveries.extend(self.broadcast_logs(&stripped, cancel));
        }

        let outcome = if self.config.channels.filter {
            // A detached gate resolves on first poll, so closing the hub
            // only interrupts an exchange that is actually pending.
            tokio::select! {
                biased;
                outcome = self.gate.submit(payload, cancel) => outcome,
                _ = self.shutdown.cancelled() => Err(GateError::Cancelled),
            }
        } else {
            Ok(GateOutcome::PassThrough)
        };

        if self.config.broadcast.await_delivery {
            let report = deliveries.wait().await;
            debug!(
                round,
                attempted = report.attempted(),
                delivered = report.delivered,
                dropped = report.dropped,
                cancelled = report.cancelled,
                "Broadcast complete"
            );
        }

        match outcome {
            Ok(GateOutcome::PassThrough) => {
                RECORDS_PROCESSED.with_label_values(&["ok"]).inc();
                Ok(restore(stripped, exclusions))
            }
            Ok(GateOutcome::Replaced(reply)) => {
                RECORDS_PROCESSED.with_label_values(&["ok"]).inc();
                if reply.round() != round {
                    warn!(sent = round, received = reply.round(), "Filter changed the round");
                }
                Ok(restore(reply, exclusions))
            }
            Err(e) => {
                RECORDS_PROCESSED.with_label_values(&["error"]).inc();
                Err(ProcessError::new(e, restore(stripped, exclusions)))
            }
        }
    }

    /// One frame per application that both logged and has subscribers.
    fn broadcast_logs(&self, record: &BlockRecord, cancel: &CancellationToken) -> Delivery {
        let mut deliveries = Delivery::default();
        for frame in app_log_frames(record) {
            let key = ChannelKey::Logs(frame.application_id);
            if self.registry.len(&key) == 0 {
                continue;
            }
            match encode_app_logs(&frame) {
                Ok(bytes) => deliveries.extend(self.dispatcher.broadcast(
                    key,
                    Frame::Binary(Bytes::from(bytes)),
                    cancel,
                )),
                Err(e) => warn!(channel = %key, error = %e, "Failed to encode log frame"),
            }
        }
        deliveries
    }

    /// Close every connection and stop the server. Idempotent.
    pub async fn shutdown(&self) -> HubResult<()> {
        let server = match std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Closed) {
            Lifecycle::Running { server, .. } => Some(server),
            Lifecycle::Idle => None,
            Lifecycle::Closed => return Ok(()),
        };

        self.shutdown.cancel();

        let subscribers = self.registry.drain();
        let closed = subscribers.len();
        futures::future::join_all(subscribers.iter().map(|s| s.sink.close())).await;
        self.gate.close().await;

        if let Some(server) = server {
            if tokio::time::timeout(SERVER_STOP_TIMEOUT, server).await.is_err() {
                warn!("Server did not stop in time");
            }
        }

        info!(subscribers = closed, "Block hub closed");
        Ok(())
    }
}

#[async_trait]
impl BlockProcessor for BlockDistributionHub {
    async fn init(&self) -> HubResult<SocketAddr> {
        self.start().await
    }

    async fn process(&self, record: BlockRecord) -> Result<BlockRecord, ProcessError> {
        self.process_with_cancel(record, &CancellationToken::new())
            .await
    }

    async fn close(&self) -> HubResult<()> {
        self.shutdown().await
    }
}
