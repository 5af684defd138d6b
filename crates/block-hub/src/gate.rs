//! # Filter Gate
//!
//! Request/reply bridge to the single filter connection.
//!
//! The hub sends the encoded record to the filter and suspends until exactly
//! one reply arrives, the connection closes, the caller cancels, or the
//! optional reply deadline passes. With no filter attached the record passes
//! through untouched.
//!
//! ## States
//!
//! ```text
//! Detached --attach--> AttachedIdle --submit--> AttachedPending
//!     ^                  ^     |                      |
//!     |                  |     +-------detach---------+--> Detached
//!     |                  +---------- reply -----------+
//!     +------------------ close while pending --------+
//! ```
//!
//! The connection's reader task feeds inbound frames through a [`GateInbox`]
//! into a single-capacity channel owned by the slot. The slot lock is held for
//! the whole exchange, so only one record is ever pending.
//!
//! A record handed to the filter and then abandoned (timeout, cancellation,
//! or the caller dropping the call) leaves an answer in flight that no later
//! exchange could tell apart from its own. The gate closes such a connection
//! instead of reusing it.

use crate::domain::connection::ConnectionId;
use crate::domain::error::GateError;
use crate::ports::outbound::{Frame, FrameSink};
use bytes::Bytes;
use hub_telemetry::metrics::{GATE_FAILURES, GATE_PASS_THROUGH, GATE_ROUND_TRIP};
use serde::Serialize;
use shared_types::{decode_record, BlockRecord};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Observable gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Detached,
    AttachedIdle,
    AttachedPending,
}

/// Result of a successful [`FilterGate::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// No filter attached; keep the record that was submitted.
    PassThrough,
    /// The filter's reply.
    Replaced(BlockRecord),
}

/// Write end of the filter's reply channel, held by its reader task.
#[derive(Debug)]
pub struct GateInbox {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl GateInbox {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Hand one inbound frame to the gate.
    ///
    /// A frame arriving while an earlier one is still unread is discarded.
    /// Returns `false` once the gate has let go of this connection.
    pub fn push(&self, frame: Frame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                debug!(
                    connection_id = %self.id,
                    kind = frame.kind(),
                    "Filter frame dropped, previous frame unread"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

struct FilterSlot {
    id: ConnectionId,
    sink: Arc<dyn FrameSink>,
    replies: mpsc::Receiver<Frame>,
    /// Set from the moment a record is sent until its reply is read.
    awaiting_reply: bool,
}

/// Resets the pending flag even if the exchange future is dropped.
struct PendingGuard<'a>(&'a AtomicBool);

impl<'a> PendingGuard<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// At most one filter connection and the exchange protocol with it.
pub struct FilterGate {
    slot: Mutex<Option<FilterSlot>>,
    attached: watch::Sender<Option<ConnectionId>>,
    pending: AtomicBool,
    reply_timeout: Option<Duration>,
}

impl FilterGate {
    pub fn new(reply_timeout: Option<Duration>) -> Self {
        let (attached, _) = watch::channel(None);
        Self {
            slot: Mutex::new(None),
            attached,
            pending: AtomicBool::new(false),
            reply_timeout,
        }
    }

    pub fn state(&self) -> GateState {
        if self.attached.borrow().is_none() {
            GateState::Detached
        } else if self.pending.load(Ordering::SeqCst) {
            GateState::AttachedPending
        } else {
            GateState::AttachedIdle
        }
    }

    /// The attached connection, if any.
    pub fn attached(&self) -> Option<ConnectionId> {
        *self.attached.borrow()
    }

    pub fn is_attached(&self) -> bool {
        self.attached().is_some()
    }

    /// Attach a filter connection. Fails if one is already attached.
    pub async fn attach(
        &self,
        sink: Arc<dyn FrameSink>,
    ) -> Result<(ConnectionId, GateInbox), GateError> {
        if self.is_attached() {
            return Err(GateError::AlreadyAttached);
        }

        let mut slot = self.slot.lock().await;
        if slot.is_some() {
            return Err(GateError::AlreadyAttached);
        }

        let id = ConnectionId::new();
        let (tx, replies) = mpsc::channel(1);
        *slot = Some(FilterSlot {
            id,
            sink,
            replies,
            awaiting_reply: false,
        });
        self.attached.send_replace(Some(id));

        info!(connection_id = %id, "Filter attached");
        Ok((id, GateInbox { id, tx }))
    }

    /// Release the connection behind `inbox`.
    ///
    /// The inbox is dropped first, so an exchange pending on this connection
    /// ends with [`GateError::Disconnected`] before the slot is cleared. A
    /// no-op if the gate already let go of it.
    pub async fn detach(&self, inbox: GateInbox) {
        let id = inbox.id;
        drop(inbox);

        let mut slot = self.slot.lock().await;
        if slot.as_ref().map(|s| s.id) == Some(id) {
            *slot = None;
            self.attached.send_replace(None);
            info!(connection_id = %id, "Filter detached");
        }
    }

    /// Drop and close whatever filter is attached.
    pub async fn close(&self) {
        let taken = self.slot.lock().await.take();
        self.attached.send_replace(None);
        if let Some(slot) = taken {
            slot.sink.close().await;
            info!(connection_id = %slot.id, "Filter closed");
        }
    }

    /// Suspend until a filter is attached or `timeout` passes.
    pub async fn wait_attached(&self, timeout: Duration) -> Result<ConnectionId, GateError> {
        let mut rx = self.attached.subscribe();
        let attached = tokio::time::timeout(timeout, async {
            let id = rx.wait_for(Option::is_some).await.ok()?;
            *id
        })
        .await;

        match attached {
            Ok(Some(id)) => Ok(id),
            _ => Err(GateError::AttachTimeout(timeout)),
        }
    }

    /// Run one exchange with the attached filter.
    ///
    /// Closing the connection, a send failure, the reply deadline and
    /// cancellation abort the exchange. Each of them detaches and closes the
    /// filter once the record has been sent, so a reply is only ever read for
    /// the record it answers. Cancellation before the send leaves the filter
    /// attached.
    pub async fn submit(
        &self,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> Result<GateOutcome, GateError> {
        if !self.is_attached() {
            GATE_PASS_THROUGH.inc();
            return Ok(GateOutcome::PassThrough);
        }

        let mut guard = self.slot.lock().await;
        let Some(slot) = guard.as_mut() else {
            GATE_PASS_THROUGH.inc();
            return Ok(GateOutcome::PassThrough);
        };
        let id = slot.id;

        if slot.awaiting_reply {
            // An earlier call was dropped mid-exchange.
            warn!(connection_id = %id, "Filter owes a reply to an abandoned record, closing it");
            self.release(&mut guard).await;
            GATE_PASS_THROUGH.inc();
            return Ok(GateOutcome::PassThrough);
        }

        if !drain_stale(slot) {
            // Reader already gone: the filter left between exchanges.
            *guard = None;
            self.attached.send_replace(None);
            info!(connection_id = %id, "Filter gone before submission");
            GATE_PASS_THROUGH.inc();
            return Ok(GateOutcome::PassThrough);
        }

        let started = Instant::now();
        let result = {
            let _pending = PendingGuard::new(&self.pending);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(GateError::Cancelled),
                result = exchange(slot, payload, self.reply_timeout) => result,
            }
        };

        match result {
            Ok(record) => {
                GATE_ROUND_TRIP.observe(started.elapsed().as_secs_f64());
                debug!(
                    connection_id = %id,
                    round = record.round(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Filter replied"
                );
                Ok(GateOutcome::Replaced(record))
            }
            Err(e) => {
                GATE_FAILURES.with_label_values(&[e.reason()]).inc();
                let unanswered = guard.as_ref().is_some_and(|slot| slot.awaiting_reply);
                if unanswered || matches!(e, GateError::Transport(_)) {
                    self.release(&mut guard).await;
                }
                warn!(
                    connection_id = %id,
                    error = %e,
                    detached = unanswered,
                    "Filter exchange failed"
                );
                Err(e)
            }
        }
    }

    /// Clear the slot and close the connection it held.
    async fn release(&self, slot: &mut Option<FilterSlot>) {
        if let Some(slot) = slot.take() {
            self.attached.send_replace(None);
            slot.sink.close().await;
            info!(connection_id = %slot.id, "Filter released");
        }
    }
}

/// Discard frames that arrived outside an exchange. Returns `false` if the
/// reader has gone away.
fn drain_stale(slot: &mut FilterSlot) -> bool {
    loop {
        match slot.replies.try_recv() {
            Ok(frame) => {
                debug!(
                    connection_id = %slot.id,
                    kind = frame.kind(),
                    bytes = frame.len(),
                    "Discarding stale filter frame"
                );
            }
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

async fn exchange(
    slot: &mut FilterSlot,
    payload: Bytes,
    reply_timeout: Option<Duration>,
) -> Result<BlockRecord, GateError> {
    slot.awaiting_reply = true;
    slot.sink.send_frame(Frame::Binary(payload)).await?;

    let reply = match reply_timeout {
        Some(limit) => tokio::time::timeout(limit, slot.replies.recv())
            .await
            .map_err(|_| GateError::Timeout(limit))?,
        None => slot.replies.recv().await,
    };
    if reply.is_some() {
        slot.awaiting_reply = false;
    }

    match reply {
        Some(Frame::Binary(bytes)) => decode_record(&bytes).map_err(GateError::Decode),
        Some(other) => Err(GateError::UnexpectedFrame(other.kind())),
        None => Err(GateError::Disconnected),
    }
}
