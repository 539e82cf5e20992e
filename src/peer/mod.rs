use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

pub mod directory;
pub mod fault;
pub mod messages;
pub mod node;

use crate::catalog::Product;
use crate::clock::VectorClock;
use crate::error::{MarketError, Result};
pub use directory::RingDirectory;
pub use fault::FaultInjector;
pub use messages::{PeerMessage, PeerStatus};
pub use node::PeerNode;

/// Stable identifier of a ring member, in `[0, N)`
pub type PeerId = usize;

/// Which side of the market a peer works
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Buyer,
    Seller,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Buyer => write!(f, "Buyer"),
            Role::Seller => write!(f, "Seller"),
        }
    }
}

/// The inbound RPC surface every ring member exposes.
///
/// Calls are admitted into the target's bounded dispatch queue and return
/// as soon as they are enqueued; replies arrive later as separate
/// messages, never as return values. A call to a crashed peer fails with
/// `Unavailable` and has no side effects.
#[async_trait]
pub trait Peer: Send + Sync {
    fn peer_id(&self) -> PeerId;

    /// Start the peer's periodic role behavior
    async fn start(&self) -> Result<()>;

    /// One hop of a ring election round
    async fn election(&self, path: Vec<PeerId>) -> Result<()>;

    /// Coordinator announcement propagating back along the election path
    async fn coordinator(&self, winner: PeerId, path: Vec<PeerId>) -> Result<()>;

    async fn discover(
        &self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
    ) -> Result<()>;

    async fn discover_ack(
        &self,
        product: Product,
        amount: u32,
        available: bool,
        clock: VectorClock,
    ) -> Result<()>;

    async fn buy(
        &self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
    ) -> Result<()>;

    async fn buy_ack(
        &self,
        product: Product,
        amount: u32,
        bought: bool,
        clock: VectorClock,
    ) -> Result<()>;

    async fn offer(
        &self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        seller: PeerId,
    ) -> Result<()>;

    async fn offer_ack(&self, clock: VectorClock) -> Result<()>;

    async fn pay(&self, price: u64, clock: VectorClock) -> Result<()>;
}

/// In-process handle to a [`PeerNode`] actor.
///
/// Cloning is cheap; every clone shares the same dispatch queue and
/// crashed flag. The fault injector flips the flag through this handle.
#[derive(Clone)]
pub struct PeerHandle {
    peer_id: PeerId,
    tx: mpsc::Sender<PeerMessage>,
    crashed: Arc<AtomicBool>,
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("peer_id", &self.peer_id)
            .field("crashed", &self.is_crashed())
            .finish()
    }
}

impl PeerHandle {
    pub(crate) fn new(
        peer_id: PeerId,
        tx: mpsc::Sender<PeerMessage>,
        crashed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            peer_id,
            tx,
            crashed,
        }
    }

    fn submit(&self, msg: PeerMessage) -> Result<()> {
        if self.is_crashed() {
            return Err(MarketError::Unavailable(self.peer_id));
        }
        self.tx
            .try_send(msg)
            .map_err(|_| MarketError::Unavailable(self.peer_id))
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    pub fn set_crashed(&self, crashed: bool) {
        self.crashed.store(crashed, Ordering::SeqCst);
    }

    /// Snapshot of the peer's state. Part of the ops/test surface, not the
    /// trading protocol, so it bypasses the crashed flag.
    pub async fn status(&self) -> Result<PeerStatus> {
        let (resp, rx) = oneshot::channel();
        self.tx
            .try_send(PeerMessage::Status { resp })
            .map_err(|_| MarketError::Unavailable(self.peer_id))?;
        rx.await
            .map_err(|e| MarketError::Concurrency(format!("Status channel dropped: {}", e)))
    }

    /// Make the peer look for `amount` units of `product` right now
    pub async fn initiate_discover(&self, product: Product, amount: u32) -> Result<()> {
        self.submit(PeerMessage::InitiateDiscover { product, amount })
    }

    /// Make the peer buy without a preceding discovery
    pub async fn initiate_buy(&self, product: Product, amount: u32) -> Result<()> {
        self.submit(PeerMessage::InitiateBuy { product, amount })
    }

    /// Make the peer offer stock to the coordinator right now
    pub async fn initiate_offer(&self, product: Product, amount: u32) -> Result<()> {
        self.submit(PeerMessage::InitiateOffer { product, amount })
    }
}

#[async_trait]
impl Peer for PeerHandle {
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    async fn start(&self) -> Result<()> {
        self.submit(PeerMessage::Start)
    }

    async fn election(&self, path: Vec<PeerId>) -> Result<()> {
        self.submit(PeerMessage::Election { path })
    }

    async fn coordinator(&self, winner: PeerId, path: Vec<PeerId>) -> Result<()> {
        self.submit(PeerMessage::Coordinator { winner, path })
    }

    async fn discover(
        &self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
    ) -> Result<()> {
        self.submit(PeerMessage::Discover {
            product,
            amount,
            clock,
            requester,
        })
    }

    async fn discover_ack(
        &self,
        product: Product,
        amount: u32,
        available: bool,
        clock: VectorClock,
    ) -> Result<()> {
        self.submit(PeerMessage::DiscoverAck {
            product,
            amount,
            available,
            clock,
        })
    }

    async fn buy(
        &self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
    ) -> Result<()> {
        self.submit(PeerMessage::Buy {
            product,
            amount,
            clock,
            requester,
        })
    }

    async fn buy_ack(
        &self,
        product: Product,
        amount: u32,
        bought: bool,
        clock: VectorClock,
    ) -> Result<()> {
        self.submit(PeerMessage::BuyAck {
            product,
            amount,
            bought,
            clock,
        })
    }

    async fn offer(
        &self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        seller: PeerId,
    ) -> Result<()> {
        self.submit(PeerMessage::Offer {
            product,
            amount,
            clock,
            seller,
        })
    }

    async fn offer_ack(&self, clock: VectorClock) -> Result<()> {
        self.submit(PeerMessage::OfferAck { clock })
    }

    async fn pay(&self, price: u64, clock: VectorClock) -> Result<()> {
        self.submit(PeerMessage::Pay { price, clock })
    }
}
