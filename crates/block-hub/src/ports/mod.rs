//! Ports of the hub: what the pipeline calls in, and what the hub calls out to.

pub mod inbound;
pub mod outbound;

pub use inbound::BlockProcessor;
pub use outbound::{Frame, FrameSink, TransportError};
