//! # Memolink Storage
//!
//! Durable storage for memo records and their audio payloads.
//!
//! ## Features
//!
//! - **RecordStore**: Most-recent-first memo sequence, persisted as one value
//!   under one durable key on every mutation, self-healing on load
//! - **BlobStore**: One file per payload, atomic writes, idempotent deletes
//! - **KeyValueStore trait**: Durable key-value abstraction
//! - **RedbKvStore**: redb-backed implementation for production
//! - **InMemoryKvStore**: In-memory implementation for testing/simulation
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use memolink_storage::{BlobStore, BlobStoreConfig, KvStoreConfig, RecordStore, RedbKvStore};
//!
//! let blobs = BlobStore::new(BlobStoreConfig::in_dir("./data")).await?;
//! let kv = Arc::new(RedbKvStore::open(KvStoreConfig::in_dir("./data"))?);
//!
//! // Records whose payload file is gone are skipped here
//! let records = RecordStore::load(kv, &blobs).await?;
//!
//! blobs.write(record.payload_ref(), &audio).await?;
//! records.create(record)?;
//! ```

pub mod blob_store;
pub mod error;
pub mod kv;
pub mod record_store;

// Re-exports
pub use blob_store::{BlobStore, BlobStoreConfig, SweepResult};
pub use error::StorageError;
pub use kv::{InMemoryKvStore, KeyValueStore, KvStoreConfig, RedbKvStore};
pub use record_store::{MEMOS_KEY, RecordStore};
