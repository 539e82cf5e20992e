//! Coordinator-owned marketplace inventory.
//!
//! The ledger maps every catalog product to a FIFO queue of seller IDs,
//! one entry per unsold unit, oldest supply first. It is never kept in
//! memory between operations: the coordinator reads a fresh snapshot at
//! the start of each operation and writes the whole state back at the
//! end (see [`store::SnapshotStore`]).
use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::peer::PeerId;

pub mod store;

pub use store::{JsonFileStore, MemoryStore, SnapshotStore};

/// Per-product FIFO stock queues, tagged by supplying seller.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct LedgerState {
    stock: BTreeMap<Product, VecDeque<PeerId>>,
}

impl LedgerState {
    /// Empty queues for every catalog product
    pub fn empty() -> Self {
        let mut stock = BTreeMap::new();
        for product in Product::ALL {
            stock.insert(product, VecDeque::new());
        }
        Self { stock }
    }

    /// Stock-queue length is at least `amount`
    pub fn is_available(&self, product: Product, amount: u32) -> bool {
        self.stock
            .get(&product)
            .map(|queue| queue.len() >= amount as usize)
            .unwrap_or(false)
    }

    /// Remove the first `amount` units of `product` and return the sellers
    /// to pay, oldest supply first. A seller with several units in the
    /// prefix appears once per unit. Returns an empty list if the stock is
    /// insufficient, leaving the queue untouched.
    pub fn take_stock(&mut self, product: Product, amount: u32) -> Vec<PeerId> {
        if !self.is_available(product, amount) {
            return Vec::new();
        }
        match self.stock.get_mut(&product) {
            Some(queue) => queue.drain(..amount as usize).collect(),
            None => Vec::new(),
        }
    }

    /// Append `amount` units supplied by `seller`, preserving arrival order
    pub fn put_stock(&mut self, product: Product, amount: u32, seller: PeerId) {
        let queue = self.stock.entry(product).or_default();
        for _ in 0..amount {
            queue.push_back(seller);
        }
    }

    /// Units currently in stock for `product`
    pub fn stock_level(&self, product: Product) -> usize {
        self.stock.get(&product).map(|queue| queue.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_has_every_catalog_product() {
        let state = LedgerState::empty();
        for product in Product::ALL {
            assert_eq!(state.stock_level(product), 0);
            assert!(!state.is_available(product, 1));
            assert!(state.is_available(product, 0));
        }
    }

    #[test]
    fn test_put_then_take_is_fifo() {
        let mut state = LedgerState::empty();
        state.put_stock(Product::Boars, 3, 4);
        state.put_stock(Product::Boars, 2, 7);

        let payees = state.take_stock(Product::Boars, 4);
        assert_eq!(payees, vec![4, 4, 4, 7]);
        assert_eq!(state.stock_level(Product::Boars), 1);

        // The remaining unit belongs to the later seller.
        let rest = state.take_stock(Product::Boars, 1);
        assert_eq!(rest, vec![7]);
    }

    #[test]
    fn test_take_more_than_available_leaves_stock_untouched() {
        let mut state = LedgerState::empty();
        state.put_stock(Product::Fish, 2, 1);

        assert!(state.take_stock(Product::Fish, 3).is_empty());
        assert_eq!(state.stock_level(Product::Fish), 2);
    }

    #[test]
    fn test_products_do_not_share_queues() {
        let mut state = LedgerState::empty();
        state.put_stock(Product::Fish, 2, 1);
        state.put_stock(Product::Salt, 1, 2);

        assert!(state.is_available(Product::Fish, 2));
        assert!(!state.is_available(Product::Fish, 3));
        assert!(state.is_available(Product::Salt, 1));
        assert_eq!(state.take_stock(Product::Salt, 1), vec![2]);
        assert_eq!(state.stock_level(Product::Fish), 2);
    }
}
