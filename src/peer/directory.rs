use std::sync::Arc;

use crate::error::{MarketError, Result};
use crate::peer::{Peer, PeerId};

/// Fixed, ordered membership table for the ring.
///
/// Assembled once at bootstrap and shared read-only between every peer;
/// there is no dynamic join or leave. Position in the table IS the peer
/// ID, so ring successors are just increasing offsets mod N.
pub struct RingDirectory {
    peers: Vec<Arc<dyn Peer>>,
}

impl RingDirectory {
    pub fn new(peers: Vec<Arc<dyn Peer>>) -> Self {
        Self { peers }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Resolve a peer ID to its handle
    pub fn resolve(&self, peer_id: PeerId) -> Result<Arc<dyn Peer>> {
        self.peers
            .get(peer_id)
            .cloned()
            .ok_or(MarketError::NotFound(peer_id))
    }

    /// Ring successors of `peer_id` in forwarding order, skipping self
    pub fn successors(&self, peer_id: PeerId) -> impl Iterator<Item = PeerId> + '_ {
        let n = self.peers.len();
        (1..n).map(move |offset| (peer_id + offset) % n)
    }
}
