//! Error types for memolink-sync

use memolink_core::{ModelError, TransportError};
use memolink_storage::StorageError;
use thiserror::Error;

/// Errors raised while encoding or decoding wire frames
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// A frame that is missing required fields or cannot be parsed
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Encoding failed: {0}")]
    Encode(String),
}

impl CodecError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope(reason.into())
    }
}

/// Errors that can occur during synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid record: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Sync coordinator is not running")]
    CoordinatorClosed,
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
