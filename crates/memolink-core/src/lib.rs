//! # Memolink Core
//!
//! Core types, traits, and errors shared by every Memolink crate.
//!
//! Memolink keeps a small store of voice memos in sync between two paired
//! devices (a phone and a watch). This crate holds the pieces both sides
//! agree on without caring how they are stored or framed on the wire.
//!
//! ## Key Types
//!
//! - [`MemoId`]: Caller-generated 128-bit identifier, unique across both peers
//! - [`PayloadRef`]: File name of a memo's audio payload inside the blob store
//! - [`MemoRecord`]: Write-once memo metadata
//! - [`MemoEvent`]: Changes published to observers of the record store
//!
//! ## Key Traits
//!
//! - [`PeerLink`]: The two delivery primitives of the pairing channel
//!   (best-effort message and guaranteed queued transfer)
//!
//! [`MockLink`] is an in-memory [`PeerLink`] pair used by tests and the
//! simulation.

pub mod error;
pub mod event;
pub mod id;
pub mod mock_link;
pub mod record;
pub mod transport;

// Re-export main types
pub use error::*;
pub use event::*;
pub use id::*;
pub use mock_link::*;
pub use record::*;
pub use transport::*;
