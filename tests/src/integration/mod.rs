//! Cross-component tests over real sockets.

pub mod channels;
pub mod filter_gate;
pub mod http;
