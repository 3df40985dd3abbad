//! In-memory pairing channel for testing
//!
//! [`MockLink::pair`] returns two connected endpoints that model the
//! delivery semantics of the real pairing channel:
//!
//! - best-effort messages are dropped while the pair is partitioned;
//! - queued transfers are held in a per-direction FIFO backlog while
//!   partitioned and flushed, in order, on reconnection.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use memolink_core::{Delivery, MockLink, PeerLink, Transfer};
//!
//! let (phone, watch) = MockLink::pair();
//!
//! phone.partition();
//! phone.send_message(b"lost".to_vec()).await.unwrap_err();
//! phone.queue_transfer(Transfer::header_only(b"kept".to_vec())).await.unwrap();
//!
//! phone.reconnect();
//! let delivery = watch.recv().await.unwrap();
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::transport::{Delivery, PeerLink, Transfer};

/// Deliveries travelling towards one endpoint
struct Lane {
    tx: mpsc::UnboundedSender<Delivery>,
    backlog: VecDeque<Transfer>,
}

impl Lane {
    fn flush(&mut self) {
        while let Some(transfer) = self.backlog.pop_front() {
            if let Err(mpsc::error::SendError(Delivery::Transfer(transfer))) =
                self.tx.send(Delivery::Transfer(transfer))
            {
                // Receiver is gone; keep the transfer queued
                self.backlog.push_front(transfer);
                break;
            }
        }
    }
}

struct LinkState {
    connected: bool,
    /// `lanes[i]` carries deliveries towards endpoint `i`
    lanes: [Lane; 2],
    dropped_messages: u64,
}

/// One endpoint of an in-memory pairing channel
pub struct MockLink {
    side: usize,
    state: Arc<Mutex<LinkState>>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Delivery>>,
}

impl MockLink {
    /// Create a connected pair of endpoints
    pub fn pair() -> (MockLink, MockLink) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();

        let state = Arc::new(Mutex::new(LinkState {
            connected: true,
            lanes: [
                Lane {
                    tx: tx_a,
                    backlog: VecDeque::new(),
                },
                Lane {
                    tx: tx_b,
                    backlog: VecDeque::new(),
                },
            ],
            dropped_messages: 0,
        }));

        let a = MockLink {
            side: 0,
            state: state.clone(),
            inbox: tokio::sync::Mutex::new(rx_a),
        };
        let b = MockLink {
            side: 1,
            state,
            inbox: tokio::sync::Mutex::new(rx_b),
        };
        (a, b)
    }

    fn peer_side(&self) -> usize {
        1 - self.side
    }

    /// Make the peer unreachable (affects both endpoints)
    pub fn partition(&self) {
        self.state.lock().connected = false;
    }

    /// Restore reachability and flush queued transfers in both directions
    pub fn reconnect(&self) {
        let mut state = self.state.lock();
        state.connected = true;
        for lane in state.lanes.iter_mut() {
            lane.flush();
        }
    }

    /// Whether the pair is currently connected
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Number of best-effort messages dropped so far (both directions)
    pub fn dropped_messages(&self) -> u64 {
        self.state.lock().dropped_messages
    }

    /// Number of transfers from this endpoint still waiting for delivery
    pub fn pending_transfers(&self) -> usize {
        self.state.lock().lanes[self.peer_side()].backlog.len()
    }
}

#[async_trait]
impl PeerLink for MockLink {
    fn is_reachable(&self) -> bool {
        self.is_connected()
    }

    async fn send_message(&self, data: Vec<u8>) -> Result<(), TransportError> {
        let peer = self.peer_side();
        let mut state = self.state.lock();
        if !state.connected {
            state.dropped_messages += 1;
            return Err(TransportError::PeerUnreachable);
        }
        state.lanes[peer]
            .tx
            .send(Delivery::Message(data))
            .map_err(|_| TransportError::SendFailed("peer endpoint dropped".into()))
    }

    async fn queue_transfer(&self, transfer: Transfer) -> Result<(), TransportError> {
        let peer = self.peer_side();
        let mut state = self.state.lock();
        let connected = state.connected;
        let lane = &mut state.lanes[peer];
        lane.backlog.push_back(transfer);
        if connected {
            lane.flush();
        }
        Ok(())
    }

    async fn recv(&self) -> Result<Delivery, TransportError> {
        let mut inbox = self.inbox.lock().await;
        inbox.recv().await.ok_or(TransportError::Closed)
    }
}
