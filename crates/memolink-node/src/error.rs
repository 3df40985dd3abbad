//! Error types for the memo node

use memolink_core::MemoId;
use memolink_storage::StorageError;
use memolink_sync::SyncError;
use thiserror::Error;

/// Errors that can occur in a memo node
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Node not started")]
    NotStarted,

    #[error("Node already started")]
    AlreadyStarted,

    #[error("Memo not found: {0}")]
    NotFound(MemoId),
}

/// Result type alias for node operations
pub type NodeResult<T> = Result<T, NodeError>;
