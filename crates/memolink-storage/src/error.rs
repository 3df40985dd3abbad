//! Error types for memolink-storage

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error while reading or writing durable storage
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested item was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload is larger than the configured maximum
    #[error("Storage capacity exceeded: {size} bytes (max {max})")]
    CapacityExceeded { size: u64, max: u64 },

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// A payload reference that cannot name a file
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new Database error
    pub fn database(message: impl ToString) -> Self {
        Self::Database(message.to_string())
    }

    /// Whether this error came from durable storage itself (as opposed to a
    /// lookup miss or bad input)
    pub fn is_io_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Database(_))
    }
}

/// Convert from postcard Error to StorageError
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}
