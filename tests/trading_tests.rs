use std::sync::Arc;
use std::time::Duration;

use tradepost::catalog::Product;
use tradepost::clock::VectorClock;
use tradepost::ledger::{MemoryStore, SnapshotStore};
use tradepost::peer::{Peer, PeerHandle, PeerId, PeerNode, RingDirectory, Role};
use tradepost::settings::PeerConfig;

/// Wire up an in-process ring of `roles.len()` peers sharing one ledger
/// store and one directory, and spawn every actor.
fn spawn_cluster(
    roles: &[Role],
    initial_coordinator: PeerId,
    store: Arc<dyn SnapshotStore>,
) -> Vec<PeerHandle> {
    let n = roles.len();
    let config = PeerConfig {
        initial_coordinator,
        ..Default::default()
    };

    let mut nodes = Vec::with_capacity(n);
    let mut handles = Vec::with_capacity(n);
    for (peer_id, role) in roles.iter().enumerate() {
        let (node, handle) = PeerNode::new(peer_id, n, *role, config.clone(), store.clone());
        nodes.push(node);
        handles.push(handle);
    }

    let directory = Arc::new(RingDirectory::new(
        handles
            .iter()
            .map(|handle| Arc::new(handle.clone()) as Arc<dyn Peer>)
            .collect(),
    ));
    for node in nodes {
        node.spawn(directory.clone());
    }
    handles
}

async fn wait_for_clock(handle: &PeerHandle, expected: &[u64]) {
    let mut last = Vec::new();
    for _ in 0..300 {
        let status = handle.status().await.expect("status");
        if status.clock.ticks() == expected {
            return;
        }
        last = status.clock.ticks().to_vec();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "peer {} clock never reached {:?}, last seen {:?}",
        handle.peer_id(),
        expected,
        last
    );
}

#[tokio::test]
async fn test_offer_stocks_ledger_and_advances_clocks() {
    let store = Arc::new(MemoryStore::new());
    let handles = spawn_cluster(&[Role::Seller, Role::Buyer], 1, store.clone());
    let seller = &handles[0];

    seller.initiate_offer(Product::Boars, 5).await.unwrap();
    wait_for_clock(seller, &[2, 1]).await;
    wait_for_clock(&handles[1], &[1, 1]).await;

    seller.initiate_offer(Product::Fish, 3).await.unwrap();
    wait_for_clock(seller, &[4, 2]).await;
    wait_for_clock(&handles[1], &[3, 2]).await;

    let state = store.read_snapshot().unwrap();
    assert!(state.is_available(Product::Boars, 5));
    assert!(state.is_available(Product::Fish, 3));
    assert!(!state.is_available(Product::Boars, 6));
    assert!(!state.is_available(Product::Fish, 4));
}

#[tokio::test]
async fn test_discover_then_buy_pays_sellers_fifo() {
    let store = Arc::new(MemoryStore::new());
    let handles = spawn_cluster(&[Role::Buyer, Role::Seller, Role::Buyer], 2, store.clone());
    let buyer = &handles[0];
    let seller = &handles[1];
    let coordinator = &handles[2];

    // Stock the market first.
    seller.initiate_offer(Product::Boars, 5).await.unwrap();
    wait_for_clock(seller, &[0, 2, 1]).await;
    wait_for_clock(coordinator, &[0, 1, 1]).await;
    assert_eq!(
        buyer.status().await.unwrap().clock,
        VectorClock::from_ticks(vec![0, 0, 0])
    );

    // Discovery finds the stock, so the buyer immediately buys.
    buyer.initiate_discover(Product::Boars, 3).await.unwrap();
    wait_for_clock(buyer, &[4, 1, 3]).await;
    wait_for_clock(coordinator, &[3, 1, 3]).await;
    wait_for_clock(seller, &[3, 5, 3]).await;

    // Three units sold out of five, one payment per unit.
    let state = store.read_snapshot().unwrap();
    assert!(!state.is_available(Product::Boars, 3));
    assert!(state.is_available(Product::Boars, 2));
    assert_eq!(
        seller.status().await.unwrap().balance,
        3 * Product::Boars.unit_price()
    );
}

#[tokio::test]
async fn test_stale_buy_is_rejected_without_mutation() {
    let store = Arc::new(MemoryStore::new());
    let handles = spawn_cluster(&[Role::Buyer, Role::Seller, Role::Buyer], 2, store.clone());
    let buyer = &handles[0];
    let seller = &handles[1];
    let coordinator = &handles[2];

    seller.initiate_offer(Product::Boars, 5).await.unwrap();
    wait_for_clock(coordinator, &[0, 1, 1]).await;

    // Buying without a prior discovery: the buyer's clock is concurrent
    // with the coordinator's, so admission fails.
    buyer.initiate_buy(Product::Boars, 3).await.unwrap();
    wait_for_clock(buyer, &[2, 1, 1]).await;

    // No mutation: coordinator clock, stock and seller balance untouched.
    assert_eq!(
        coordinator.status().await.unwrap().clock,
        VectorClock::from_ticks(vec![0, 1, 1])
    );
    let state = store.read_snapshot().unwrap();
    assert!(state.is_available(Product::Boars, 5));
    assert_eq!(seller.status().await.unwrap().balance, 0);
}

#[tokio::test]
async fn test_low_stock_buy_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let handles = spawn_cluster(&[Role::Buyer, Role::Seller, Role::Buyer], 2, store.clone());
    let buyer = &handles[0];
    let seller = &handles[1];
    let coordinator = &handles[2];

    seller.initiate_offer(Product::Boars, 5).await.unwrap();
    wait_for_clock(coordinator, &[0, 1, 1]).await;

    // Asking for more than the stock holds: discovery reports
    // unavailable and no buy follows.
    buyer.initiate_discover(Product::Boars, 6).await.unwrap();
    wait_for_clock(buyer, &[2, 1, 2]).await;
    wait_for_clock(coordinator, &[1, 1, 2]).await;

    // Forcing the buy anyway is admitted causally but fails on stock.
    buyer.initiate_buy(Product::Boars, 6).await.unwrap();
    wait_for_clock(buyer, &[4, 1, 2]).await;

    assert_eq!(
        coordinator.status().await.unwrap().clock,
        VectorClock::from_ticks(vec![1, 1, 2])
    );
    let state = store.read_snapshot().unwrap();
    assert!(state.is_available(Product::Boars, 5));
    assert_eq!(seller.status().await.unwrap().balance, 0);
}

#[tokio::test]
async fn test_non_coordinator_discards_trading_calls() {
    let store = Arc::new(MemoryStore::new());
    let handles = spawn_cluster(&[Role::Buyer, Role::Seller, Role::Buyer], 2, store.clone());

    // A misrouted offer at a peer that is not the coordinator is dropped
    // without touching the ledger or anyone's clock.
    handles[1]
        .offer(Product::Fish, 2, VectorClock::from_ticks(vec![0, 1, 0]), 1)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = store.read_snapshot().unwrap();
    assert!(!state.is_available(Product::Fish, 1));
    assert_eq!(
        handles[1].status().await.unwrap().clock,
        VectorClock::from_ticks(vec![0, 0, 0])
    );
}

#[tokio::test]
async fn test_trading_failure_triggers_reelection() {
    let store = Arc::new(MemoryStore::new());
    let handles = spawn_cluster(&[Role::Buyer, Role::Seller, Role::Buyer], 2, store.clone());
    let buyer = &handles[0];

    // The coordinator dies; the buyer's next discovery cannot reach it
    // and must trigger an election among the survivors.
    handles[2].set_crashed(true);
    buyer.initiate_discover(Product::Fish, 1).await.unwrap();

    for _ in 0..300 {
        let status_0 = handles[0].status().await.unwrap();
        let status_1 = handles[1].status().await.unwrap();
        if status_0.coordinator_id == 1 && status_1.coordinator_id == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("survivors never agreed on the new coordinator");
}
