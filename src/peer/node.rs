//! The trader peer actor.
//!
//! Every peer owns a bounded dispatch queue and processes one message at
//! a time, which is what serializes the coordinator-only critical section
//! {read clock, read/mutate ledger, write clock} without any cross-peer
//! locking. Election and coordinator announcements run through the same
//! loop, so trading logic always observes the latest committed
//! coordinator ID.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::catalog::Product;
use crate::clock::VectorClock;
use crate::error::{MarketError, Result};
use crate::ledger::SnapshotStore;
use crate::peer::directory::RingDirectory;
use crate::peer::messages::{PeerMessage, PeerStatus};
use crate::peer::{Peer, PeerHandle, PeerId, Role};
use crate::settings::{PeerConfig, RetryPolicy, MAX_TRADE_AMOUNT};

/// Mutable state owned by one peer's actor task
struct PeerContext {
    peer_id: PeerId,
    ring_size: usize,
    role: Role,
    coordinator_id: PeerId,
    clock: VectorClock,
    balance: u64,
    target_product: Product,
    target_amount: u32,
    config: PeerConfig,
    store: Arc<dyn SnapshotStore>,
}

pub struct PeerNode {
    ctx: PeerContext,
    inbox: mpsc::Receiver<PeerMessage>,
    // Self-sender for the trade ticker and the wait-retry path
    outbox: mpsc::Sender<PeerMessage>,
    crashed: Arc<AtomicBool>,
    ticker_running: bool,
}

impl PeerNode {
    /// Build a peer and the handle other ring members use to reach it.
    /// The node does nothing until [`PeerNode::spawn`] wires it to the
    /// shared directory.
    pub fn new(
        peer_id: PeerId,
        ring_size: usize,
        role: Role,
        config: PeerConfig,
        store: Arc<dyn SnapshotStore>,
    ) -> (Self, PeerHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let crashed = Arc::new(AtomicBool::new(false));
        let handle = PeerHandle::new(peer_id, tx.clone(), crashed.clone());

        let target_amount = rand::thread_rng().gen_range(1..=MAX_TRADE_AMOUNT);
        let node = Self {
            ctx: PeerContext {
                peer_id,
                ring_size,
                role,
                coordinator_id: config.initial_coordinator,
                clock: VectorClock::new(ring_size),
                balance: 0,
                target_product: Product::pick_random(),
                target_amount,
                config,
                store,
            },
            inbox: rx,
            outbox: tx,
            crashed,
            ticker_running: false,
        };
        (node, handle)
    }

    /// Run the dispatch loop on its own task
    pub fn spawn(self, directory: Arc<RingDirectory>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(directory))
    }

    async fn run(mut self, directory: Arc<RingDirectory>) {
        while let Some(msg) = self.inbox.recv().await {
            self.dispatch(msg, &directory).await;
        }
        debug!("[Peer<{}>] dispatch queue closed, stopping", self.ctx.peer_id);
    }

    async fn dispatch(&mut self, msg: PeerMessage, directory: &RingDirectory) {
        match msg {
            PeerMessage::Start => self.handle_start(),
            PeerMessage::Election { path } => self.handle_election(path, directory).await,
            PeerMessage::Coordinator { winner, path } => {
                self.handle_coordinator(winner, path, directory).await
            }
            PeerMessage::Discover {
                product,
                amount,
                clock,
                requester,
            } => {
                if let Err(err) = self
                    .handle_discover(product, amount, clock, requester, directory)
                    .await
                {
                    self.log_drop("discover", err);
                }
            }
            PeerMessage::DiscoverAck {
                product,
                amount,
                available,
                clock,
            } => {
                self.handle_discover_ack(product, amount, available, clock, directory)
                    .await
            }
            PeerMessage::Buy {
                product,
                amount,
                clock,
                requester,
            } => {
                if let Err(err) = self
                    .handle_buy(product, amount, clock, requester, directory)
                    .await
                {
                    self.log_drop("buy", err);
                }
            }
            PeerMessage::BuyAck {
                product,
                amount,
                bought,
                clock,
            } => self.handle_buy_ack(product, amount, bought, clock),
            PeerMessage::Offer {
                product,
                amount,
                clock,
                seller,
            } => {
                if let Err(err) = self
                    .handle_offer(product, amount, clock, seller, directory)
                    .await
                {
                    self.log_drop("offer", err);
                }
            }
            PeerMessage::OfferAck { clock } => self.handle_offer_ack(clock),
            PeerMessage::Pay { price, clock } => self.handle_pay(price, clock),
            PeerMessage::TradeTick => self.handle_trade_tick(directory).await,
            PeerMessage::InitiateDiscover { product, amount } => {
                self.ctx.target_product = product;
                self.ctx.target_amount = amount;
                self.send_discover(product, amount, directory).await;
            }
            PeerMessage::InitiateBuy { product, amount } => {
                self.ctx.target_product = product;
                self.ctx.target_amount = amount;
                self.send_buy(product, amount, directory).await;
            }
            PeerMessage::InitiateOffer { product, amount } => {
                self.send_offer(product, amount, directory).await;
            }
            PeerMessage::Status { resp } => {
                let _ = resp.send(PeerStatus {
                    peer_id: self.ctx.peer_id,
                    role: self.ctx.role,
                    coordinator_id: self.ctx.coordinator_id,
                    clock: self.ctx.clock.clone(),
                    balance: self.ctx.balance,
                    crashed: self.crashed.load(Ordering::SeqCst),
                });
            }
        }
    }

    fn log_drop(&self, operation: &str, err: MarketError) {
        match err {
            MarketError::NotCoordinator(_) => {
                warn!(
                    "[Peer<{}>] is not the coordinator, discarding {}",
                    self.ctx.peer_id, operation
                );
            }
            other => {
                error!(
                    "[Peer<{}>] failed handling {}: {}",
                    self.ctx.peer_id, operation, other
                );
            }
        }
    }

    // ---- election / coordinator -------------------------------------

    async fn handle_election(&mut self, path: Vec<PeerId>, directory: &RingDirectory) {
        if path.contains(&self.ctx.peer_id) {
            // Round closed: the path visited every currently-reachable peer.
            let winner = path.iter().copied().max().unwrap_or(self.ctx.peer_id);
            info!(
                "[Peer<{}>] election done, new coordinator is peer {}",
                self.ctx.peer_id, winner
            );
            self.handle_coordinator(winner, path, directory).await;
            return;
        }

        let mut path = path;
        path.push(self.ctx.peer_id);
        debug!(
            "[Peer<{}>] doing election, path {:?}",
            self.ctx.peer_id, path
        );

        for next in directory.successors(self.ctx.peer_id) {
            let forwarded = match directory.resolve(next) {
                Ok(peer) => peer.election(path.clone()).await,
                Err(err) => Err(err),
            };
            match forwarded {
                Ok(()) => return,
                Err(_) => {
                    warn!(
                        "[Peer<{}>] peer {} doesn't respond, trying next",
                        self.ctx.peer_id, next
                    );
                }
            }
        }

        // Every other ring member was tried and none accepted the round.
        error!(
            "[Peer<{}>] {}",
            self.ctx.peer_id,
            MarketError::Exhausted
        );
    }

    async fn handle_coordinator(
        &mut self,
        winner: PeerId,
        path: Vec<PeerId>,
        directory: &RingDirectory,
    ) {
        self.ctx.coordinator_id = winner;
        info!(
            "[Peer<{}>] sets coordinator to {}",
            self.ctx.peer_id, winner
        );

        let Some(position) = path.iter().position(|&id| id == self.ctx.peer_id) else {
            return;
        };
        for &next in &path[position + 1..] {
            let forwarded = match directory.resolve(next) {
                Ok(peer) => peer.coordinator(winner, path.clone()).await,
                Err(err) => Err(err),
            };
            match forwarded {
                Ok(()) => return,
                Err(_) => {
                    warn!(
                        "[Peer<{}>] peer {} doesn't respond, announcing to next in path",
                        self.ctx.peer_id, next
                    );
                }
            }
        }
    }

    // ---- coordinator-only trading ops -------------------------------

    fn require_coordinator(&self) -> Result<()> {
        if self.ctx.peer_id != self.ctx.coordinator_id {
            return Err(MarketError::NotCoordinator(self.ctx.peer_id));
        }
        Ok(())
    }

    async fn handle_discover(
        &mut self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
        directory: &RingDirectory,
    ) -> Result<()> {
        self.require_coordinator()?;

        let state = self.ctx.store.read_snapshot()?;
        let available = state.is_available(product, amount);
        self.ctx.clock.record_receive(self.ctx.peer_id, &clock);

        if available {
            info!(
                "[Peer<{}>] {} piece(s) of {} is available for peer {}",
                self.ctx.peer_id, amount, product, requester
            );
        } else {
            info!(
                "[Peer<{}>] {} piece(s) of {} is not available for peer {}",
                self.ctx.peer_id, amount, product, requester
            );
        }

        let reply = self.ctx.clock.clone();
        let outcome = match directory.resolve(requester) {
            Ok(peer) => peer.discover_ack(product, amount, available, reply).await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            warn!(
                "[Peer<{}>] could not reply to peer {}: {}",
                self.ctx.peer_id, requester, err
            );
        }
        Ok(())
    }

    async fn handle_buy(
        &mut self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        requester: PeerId,
        directory: &RingDirectory,
    ) -> Result<()> {
        self.require_coordinator()?;

        // Admission check and mutation form one atomic unit: nothing else
        // runs on this peer until the snapshot is written back.
        let mut state = self.ctx.store.read_snapshot()?;
        let admitted = self.ctx.clock.is_strictly_smaller(&clock);
        let available = state.is_available(product, amount);

        if !(admitted && available) {
            if !admitted {
                info!(
                    "[Peer<{}>] peer {} couldn't buy {}: timestamp is stale or concurrent",
                    self.ctx.peer_id, requester, product
                );
            } else {
                info!(
                    "[Peer<{}>] {} piece(s) of {} is not available for peer {}",
                    self.ctx.peer_id, amount, product, requester
                );
            }
            // No mutation on rejection; the reply carries the unchanged clock.
            let reply = self.ctx.clock.clone();
            let outcome = match directory.resolve(requester) {
                Ok(peer) => peer.buy_ack(product, amount, false, reply).await,
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                warn!(
                    "[Peer<{}>] could not reply to peer {}: {}",
                    self.ctx.peer_id, requester, err
                );
            }
            return Ok(());
        }

        self.ctx.clock.record_receive(self.ctx.peer_id, &clock);
        let payees = state.take_stock(product, amount);
        self.ctx.store.write_snapshot(&state)?;

        info!(
            "[Peer<{}>] {} piece(s) of {} bought by peer {}",
            self.ctx.peer_id, amount, product, requester
        );

        // One payment per sold unit, oldest supply first, fire-and-forget.
        let price = product.unit_price();
        let pay_clock = self.ctx.clock.clone();
        for payee in payees {
            let outcome = match directory.resolve(payee) {
                Ok(peer) => peer.pay(price, pay_clock.clone()).await,
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                warn!(
                    "[Peer<{}>] could not pay seller {}: {}",
                    self.ctx.peer_id, payee, err
                );
            }
        }

        let reply = self.ctx.clock.clone();
        let outcome = match directory.resolve(requester) {
            Ok(peer) => peer.buy_ack(product, amount, true, reply).await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            warn!(
                "[Peer<{}>] could not reply to peer {}: {}",
                self.ctx.peer_id, requester, err
            );
        }
        Ok(())
    }

    async fn handle_offer(
        &mut self,
        product: Product,
        amount: u32,
        clock: VectorClock,
        seller: PeerId,
        directory: &RingDirectory,
    ) -> Result<()> {
        self.require_coordinator()?;

        let mut state = self.ctx.store.read_snapshot()?;
        state.put_stock(product, amount, seller);
        self.ctx.clock.record_receive(self.ctx.peer_id, &clock);
        self.ctx.store.write_snapshot(&state)?;

        info!(
            "[Peer<{}>] {} piece(s) of {} offered by peer {} added to stock",
            self.ctx.peer_id, amount, product, seller
        );

        let reply = self.ctx.clock.clone();
        let outcome = match directory.resolve(seller) {
            Ok(peer) => peer.offer_ack(reply).await,
            Err(err) => Err(err),
        };
        if let Err(err) = outcome {
            warn!(
                "[Peer<{}>] could not reply to peer {}: {}",
                self.ctx.peer_id, seller, err
            );
        }
        Ok(())
    }

    // ---- role behavior ----------------------------------------------

    fn handle_start(&mut self) {
        info!(
            "[Peer<{}>] starting as {}",
            self.ctx.peer_id, self.ctx.role
        );
        if self.ticker_running {
            return;
        }
        self.ticker_running = true;

        // Stagger startup the way the original bootstrap did: a ring-sized
        // grace period plus a random phase, then a per-peer jittered period.
        let (initial_delay, period) = {
            let mut rng = rand::thread_rng();
            let base = self.ctx.config.trade_period;
            let phase = Duration::from_millis(rng.gen_range(0..base.as_millis().max(1) as u64));
            let grace = Duration::from_millis(self.ctx.ring_size as u64 * 200);
            let period_ms = rng.gen_range(base.as_millis() as u64 / 2..base.as_millis() as u64);
            (grace + phase, Duration::from_millis(period_ms.max(1)))
        };

        let tx = self.outbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;
            loop {
                if tx.send(PeerMessage::TradeTick).await.is_err() {
                    break;
                }
                tokio::time::sleep(period).await;
            }
        });
    }

    async fn handle_trade_tick(&mut self, directory: &RingDirectory) {
        if self.crashed.load(Ordering::SeqCst) {
            return;
        }
        // The coordinator holds the market; it does not trade against itself.
        if self.ctx.peer_id == self.ctx.coordinator_id {
            return;
        }
        match self.ctx.role {
            Role::Buyer => {
                let (product, amount) = (self.ctx.target_product, self.ctx.target_amount);
                self.send_discover(product, amount, directory).await;
            }
            Role::Seller => {
                let product = Product::pick_random();
                let amount = rand::thread_rng().gen_range(1..=MAX_TRADE_AMOUNT);
                self.send_offer(product, amount, directory).await;
            }
        }
    }

    async fn send_discover(&mut self, product: Product, amount: u32, directory: &RingDirectory) {
        let clock = self.ctx.clock.record_send(self.ctx.peer_id);
        info!(
            "[Peer<{}>] is looking for {} piece(s) of {}",
            self.ctx.peer_id, amount, product
        );
        let coordinator = self.ctx.coordinator_id;
        let outcome = match directory.resolve(coordinator) {
            Ok(peer) => peer.discover(product, amount, clock, self.ctx.peer_id).await,
            Err(err) => Err(err),
        };
        if outcome.is_err() {
            self.coordinator_unreachable(directory).await;
        }
    }

    async fn send_buy(&mut self, product: Product, amount: u32, directory: &RingDirectory) {
        let clock = self.ctx.clock.record_send(self.ctx.peer_id);
        info!(
            "[Peer<{}>] is buying {} piece(s) of {}",
            self.ctx.peer_id, amount, product
        );
        let coordinator = self.ctx.coordinator_id;
        let outcome = match directory.resolve(coordinator) {
            Ok(peer) => peer.buy(product, amount, clock, self.ctx.peer_id).await,
            Err(err) => Err(err),
        };
        if outcome.is_err() {
            self.coordinator_unreachable(directory).await;
        }
    }

    async fn send_offer(&mut self, product: Product, amount: u32, directory: &RingDirectory) {
        let clock = self.ctx.clock.record_send(self.ctx.peer_id);
        info!(
            "[Peer<{}>] offers {} piece(s) of {}",
            self.ctx.peer_id, amount, product
        );
        let coordinator = self.ctx.coordinator_id;
        let outcome = match directory.resolve(coordinator) {
            Ok(peer) => peer.offer(product, amount, clock, self.ctx.peer_id).await,
            Err(err) => Err(err),
        };
        if outcome.is_err() {
            self.coordinator_unreachable(directory).await;
        }
    }

    /// A trading call to the coordinator failed: trigger a fresh election,
    /// then follow the configured retry policy.
    async fn coordinator_unreachable(&mut self, directory: &RingDirectory) {
        warn!(
            "[Peer<{}>] could not connect with coordinator peer {}, starting election",
            self.ctx.peer_id, self.ctx.coordinator_id
        );
        self.handle_election(Vec::new(), directory).await;

        if self.ctx.config.retry_policy == RetryPolicy::WaitThenRetry {
            let tx = self.outbox.clone();
            let wait = self.ctx.config.retry_wait;
            tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                let _ = tx.send(PeerMessage::TradeTick).await;
            });
        }
    }

    async fn handle_discover_ack(
        &mut self,
        product: Product,
        amount: u32,
        available: bool,
        clock: VectorClock,
        directory: &RingDirectory,
    ) {
        if self.ctx.role != Role::Buyer {
            return;
        }
        self.ctx.clock.record_receive(self.ctx.peer_id, &clock);
        let is_current_target =
            product == self.ctx.target_product && amount == self.ctx.target_amount;
        if available && is_current_target {
            self.send_buy(product, amount, directory).await;
        }
    }

    fn handle_buy_ack(&mut self, product: Product, amount: u32, bought: bool, clock: VectorClock) {
        if self.ctx.role != Role::Buyer {
            return;
        }
        self.ctx.clock.record_receive(self.ctx.peer_id, &clock);
        if bought {
            info!(
                "[Peer<{}>] bought {} piece(s) of {}",
                self.ctx.peer_id, amount, product
            );
            // Done with this target; shop for something new next cycle.
            self.ctx.target_product = Product::pick_random();
            self.ctx.target_amount = rand::thread_rng().gen_range(1..=MAX_TRADE_AMOUNT);
        }
    }

    fn handle_offer_ack(&mut self, clock: VectorClock) {
        if self.ctx.role != Role::Seller {
            return;
        }
        self.ctx.clock.record_receive(self.ctx.peer_id, &clock);
    }

    fn handle_pay(&mut self, price: u64, clock: VectorClock) {
        if self.ctx.role != Role::Seller {
            return;
        }
        self.ctx.balance += price;
        self.ctx.clock.record_receive(self.ctx.peer_id, &clock);
        info!(
            "[Peer<{}>] received {} money",
            self.ctx.peer_id, price
        );
    }
}
