//! Tradepost application settings
use std::time::Duration;

use crate::error::{MarketError, Result};
use crate::peer::PeerId;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PEERS: &str = "4";
pub const DEFAULT_TRADE_PERIOD_MS: &str = "5000";
pub const DEFAULT_FAULT_PERIOD_MS: &str = "15000";
pub const DEFAULT_RETRY_WAIT_MS: &str = "1000";
pub const DEFAULT_RUN_SECS: &str = "60";
pub const DEFAULT_SNAPSHOT_PATH: &str = "trade_state.json";

/// Every peer starts out assuming this peer is coordinator until the
/// first election completes.
pub const BOOTSTRAP_COORDINATOR: PeerId = 0;

/// Capacity of each peer's inbound dispatch queue
pub const DISPATCH_QUEUE_CAPACITY: usize = 256;

/// Largest amount a trade tick will offer or ask for
pub const MAX_TRADE_AMOUNT: u32 = 5;

/// What a trader does after an outbound trading call to the coordinator
/// failed and a fresh election was triggered.
///
/// Exactly one policy is in effect per run; the behaviors are never
/// blended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Do nothing extra; the next scheduled trade tick retries.
    DeferToNextCycle,
    /// Schedule exactly one early retry tick after a bounded wait.
    WaitThenRetry,
}

impl std::fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryPolicy::DeferToNextCycle => write!(f, "defer"),
            RetryPolicy::WaitThenRetry => write!(f, "wait-retry"),
        }
    }
}

impl std::str::FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "defer" => Ok(RetryPolicy::DeferToNextCycle),
            "wait-retry" => Ok(RetryPolicy::WaitThenRetry),
            _ => Err(format!("Invalid retry policy: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    // Number of peers in the ring
    pub peers: usize,

    // Base period between trade ticks, per peer
    pub trade_period_ms: u64,

    // Period of the crash/recover toggle on coordinator-eligible peers
    pub fault_period_ms: u64,

    // Whether the fault injector runs at all
    pub fault_injection: bool,

    // Post-failure retry policy for traders
    pub retry_policy: RetryPolicy,

    // Bounded wait before the single retry under `wait-retry`
    pub retry_wait_ms: u64,

    // Where the ledger snapshot lives
    pub snapshot_path: String,

    // How long the simulation runs before the final summary
    pub run_secs: u64,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.peers < 2 {
            return Err(MarketError::Config(format!(
                "at least 2 peers required, got {}",
                self.peers
            )));
        }
        if self.trade_period_ms == 0 {
            return Err(MarketError::Config(
                "trade period must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn peer_config(&self) -> PeerConfig {
        PeerConfig {
            trade_period: Duration::from_millis(self.trade_period_ms),
            retry_policy: self.retry_policy,
            retry_wait: Duration::from_millis(self.retry_wait_ms),
            initial_coordinator: BOOTSTRAP_COORDINATOR,
            queue_capacity: DISPATCH_QUEUE_CAPACITY,
        }
    }

    pub fn fault_period(&self) -> Duration {
        Duration::from_millis(self.fault_period_ms)
    }
}

/// The slice of settings each peer actor needs
#[derive(Clone, Debug)]
pub struct PeerConfig {
    pub trade_period: Duration,
    pub retry_policy: RetryPolicy,
    pub retry_wait: Duration,
    pub initial_coordinator: PeerId,
    pub queue_capacity: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            trade_period: Duration::from_millis(5000),
            retry_policy: RetryPolicy::DeferToNextCycle,
            retry_wait: Duration::from_millis(1000),
            initial_coordinator: BOOTSTRAP_COORDINATOR,
            queue_capacity: DISPATCH_QUEUE_CAPACITY,
        }
    }
}
