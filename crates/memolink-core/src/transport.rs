//! Transport abstraction for the device pairing channel
//!
//! The [`PeerLink`] trait models the two delivery primitives offered by the
//! OS pairing channel between a phone and its watch:
//!
//! - **Best-effort message** ([`PeerLink::send_message`]): delivered only if
//!   the peer is reachable right now; no retry, no acknowledgment.
//! - **Guaranteed queued transfer** ([`PeerLink::queue_transfer`]): persisted
//!   by the link until delivered, exactly once, FIFO per sender, with no
//!   ordering guarantee relative to messages.
//!
//! Sync logic is written against this trait so it can run over the real
//! channel or over [`MockLink`](crate::MockLink) in tests.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// A guaranteed-delivery transfer
///
/// The `header` is a small encoded metadata block attached to the transfer
/// (the pairing channel allows a metadata dictionary per transfer); the
/// `body` is the raw binary content, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub header: Vec<u8>,
    pub body: Bytes,
}

impl Transfer {
    /// Create a transfer with a header and binary body
    pub fn new(header: Vec<u8>, body: impl Into<Bytes>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }

    /// Create a header-only transfer
    pub fn header_only(header: Vec<u8>) -> Self {
        Self {
            header,
            body: Bytes::new(),
        }
    }
}

/// Something received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A best-effort message
    Message(Vec<u8>),
    /// A guaranteed transfer
    Transfer(Transfer),
}

/// The pairing channel to the other device
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Whether the peer can currently receive best-effort messages
    fn is_reachable(&self) -> bool;

    /// Send a best-effort message
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PeerUnreachable`] if the peer is not
    /// reachable; the message is dropped.
    async fn send_message(&self, data: Vec<u8>) -> Result<(), TransportError>;

    /// Queue a transfer for guaranteed delivery
    ///
    /// Succeeds whether or not the peer is reachable; the link owns retries.
    async fn queue_transfer(&self, transfer: Transfer) -> Result<(), TransportError>;

    /// Receive the next delivery from the peer
    ///
    /// Waits until something arrives or the link is closed.
    async fn recv(&self) -> Result<Delivery, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_constructors() {
        let t = Transfer::new(vec![1, 2], vec![3u8, 4, 5]);
        assert_eq!(t.header, vec![1, 2]);
        assert_eq!(&t.body[..], &[3, 4, 5]);

        let h = Transfer::header_only(vec![9]);
        assert!(h.body.is_empty());
    }

    #[test]
    fn test_peer_link_is_object_safe() {
        fn _assert_object_safe(_: &dyn PeerLink) {}
    }
}
