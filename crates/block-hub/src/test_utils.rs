//! In-memory transport doubles for unit tests.

use crate::ports::outbound::{Frame, FrameSink, TransportError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// How a [`MockSink`] reacts to `send_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    /// Accept the frame and forward it to the test's wire receiver.
    Deliver,
    /// Fail immediately.
    Fail,
    /// Never complete.
    Hang,
}

pub(crate) struct MockSink {
    behavior: Behavior,
    wire: mpsc::UnboundedSender<Frame>,
    closed: AtomicBool,
    sent: AtomicUsize,
}

impl MockSink {
    /// A sink plus the receiving end of its wire.
    pub(crate) fn new(behavior: Behavior) -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
        let (wire, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(Self {
            behavior,
            wire,
            closed: AtomicBool::new(false),
            sent: AtomicUsize::new(0),
        });
        (sink, rx)
    }

    pub(crate) fn delivering() -> Arc<Self> {
        Self::new(Behavior::Deliver).0
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_frame(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        match self.behavior {
            Behavior::Deliver => {
                self.sent.fetch_add(1, Ordering::SeqCst);
                let _ = self.wire.send(frame);
                Ok(())
            }
            Behavior::Fail => Err(TransportError::Send("broken pipe".into())),
            Behavior::Hang => futures::future::pending().await,
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
