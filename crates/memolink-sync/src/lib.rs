//! # Memolink Sync
//!
//! Keeps the memo collections of a paired phone and watch converged.
//!
//! ## Pieces
//!
//! - [`codec`]: flat field-map wire format for metadata, deletes and payload
//!   headers
//! - [`assembly`]: pairs inbound metadata and payload halves by memo id, and
//!   remembers deleted ids
//! - [`SyncEngine`]: applies local and remote mutations in a fixed storage
//!   order and announces local ones to the peer
//! - [`SyncCoordinator`]: the single apply loop that owns the engine
//!
//! ## Channels
//!
//! Payloads always travel as queued transfers with a header naming the memo
//! id. Metadata and deletes use best-effort messages in
//! [`SyncMode::BestEffort`] and header-only queued transfers in
//! [`SyncMode::Hardened`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use memolink_sync::{SyncConfig, SyncCoordinator, SyncEngine};
//!
//! let engine = SyncEngine::new(records, blobs, link, SyncConfig::default(), events_tx);
//! let (handle, task) = SyncCoordinator::spawn(engine, shutdown_rx);
//!
//! let memo = handle.record(audio, 12.3, None).await?;
//! handle.delete(memo.id()).await?;
//! ```

pub mod assembly;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;

pub use assembly::{AssemblyState, AssemblyTable, Offer, ReceivedPayload};
pub use codec::{Envelope, FieldMap, Frame, InboundFrame, MemoMeta, PayloadHeader, WireValue};
pub use config::{SyncConfig, SyncMode};
pub use coordinator::{CoordinatorHandle, SyncCoordinator};
pub use engine::{ApplyOutcome, SyncEngine};
pub use error::{CodecError, SyncError, SyncResult};
