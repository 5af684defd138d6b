//! WebSocket adapter: the production [`FrameSink`](crate::ports::FrameSink)
//! and the per-connection sessions behind each route.

pub mod handler;
pub mod sink;

pub use handler::{run_filter_session, run_subscriber_session};
pub use sink::WsFrameSink;
