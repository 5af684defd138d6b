//! # Shared Types Crate
//!
//! Block record model consumed by the distribution hub and by every client that
//! connects to it.
//!
//! ## Design Principles
//!
//! - **One record shape**: the hub, its subscribers and the filter client all
//!   decode the same [`BlockRecord`].
//! - **Content-derived identity**: a transaction is identified by [`TxId`], a
//!   digest of its unsigned payload, never by its position in the payset.
//! - **Binary framing only**: [`codec`] is the single place that knows how a
//!   record becomes bytes on the wire.

pub mod codec;
pub mod entities;
pub mod errors;

pub use codec::{decode_app_logs, decode_record, encode_app_logs, encode_record};
pub use entities::*;
pub use errors::*;
