//! Tradepost: a peer-to-peer commodity marketplace simulation.
//!
//! N trader peers (buyers and sellers) share a fixed ring. They elect the
//! highest-reachable-ID peer as coordinator via a ring-traversal election,
//! and all trading (discover/buy/offer) flows through the coordinator,
//! which owns the persisted stock ledger and gates purchases with a
//! vector-clock admission check. A fault injector intermittently crashes
//! and recovers coordinator-eligible peers to exercise re-election.

pub mod catalog;
pub mod cli;
pub mod clock;
pub mod error;
pub mod ledger;
pub mod peer;
pub mod settings;
