//! # Block Hub Test Suite
//!
//! End-to-end tests that run the real server on an ephemeral port and talk to
//! it with ordinary WebSocket and HTTP clients.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Hub startup, clients, fixtures
//! └── integration/
//!     ├── channels.rs   # /block and /logs fan-out
//!     ├── filter_gate.rs# /filter exchange
//!     └── http.rs       # Status codes, health, metrics, shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p hub-tests
//! cargo test -p hub-tests integration::filter_gate::
//! ```

#![allow(dead_code)]

pub mod harness;
pub mod integration;
