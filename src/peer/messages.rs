/// Dispatch-queue messages - one variant per inbound RPC plus the
/// locally-initiated actions (trade ticks, test hooks, status probes).
/// These never cross a process boundary; the handle enqueues them and the
/// actor loop consumes them one at a time.
use tokio::sync::oneshot;

use crate::catalog::Product;
use crate::clock::VectorClock;
use crate::peer::{PeerId, Role};

#[derive(Debug)]
pub enum PeerMessage {
    /// Begin periodic role behavior
    Start,

    /// One hop of an election round
    Election { path: Vec<PeerId> },

    /// Coordinator announcement walking the election path
    Coordinator { winner: PeerId, path: Vec<PeerId> },

    /// Availability probe (coordinator side)
    Discover {
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
    },

    /// Reply to a discover
    DiscoverAck {
        product: Product,
        amount: u32,
        available: bool,
        clock: VectorClock,
    },

    /// Purchase request (coordinator side)
    Buy {
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
    },

    /// Reply to a buy
    BuyAck {
        product: Product,
        amount: u32,
        bought: bool,
        clock: VectorClock,
    },

    /// Stock deposit (coordinator side)
    Offer {
        product: Product,
        amount: u32,
        clock: VectorClock,
        seller: PeerId,
    },

    /// Reply to an offer
    OfferAck { clock: VectorClock },

    /// Payment for one or more sold units
    Pay { price: u64, clock: VectorClock },

    /// Periodic trade attempt fired by the peer's own ticker
    TradeTick,

    /// Locally set the buy target and look it up at the coordinator
    InitiateDiscover { product: Product, amount: u32 },

    /// Locally set the buy target and buy without discovery
    InitiateBuy { product: Product, amount: u32 },

    /// Locally offer stock to the coordinator
    InitiateOffer { product: Product, amount: u32 },

    /// State snapshot for the ops/test surface
    Status { resp: oneshot::Sender<PeerStatus> },
}

/// Point-in-time view of a peer's mutable state
#[derive(Clone, Debug)]
pub struct PeerStatus {
    pub peer_id: PeerId,
    pub role: Role,
    pub coordinator_id: PeerId,
    pub clock: VectorClock,
    pub balance: u64,
    pub crashed: bool,
}
