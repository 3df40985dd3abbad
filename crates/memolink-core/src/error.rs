//! Error types shared across Memolink crates

use thiserror::Error;

/// Errors raised when constructing model values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Invalid memo id: {0}")]
    InvalidId(String),

    #[error("Invalid payload reference: {0:?}")]
    InvalidPayloadRef(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),
}

/// Errors related to the pairing transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Peer is not reachable")]
    PeerUnreachable,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Link closed")]
    Closed,
}
