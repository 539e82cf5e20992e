//! CLI for this application
//!
use crate::settings;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, clap::Parser)]
pub struct Cli {
    // Number of peers in the ring
    #[clap(
        long,
        default_value = settings::DEFAULT_PEERS,
        env("TRADEPOST_PEERS"),
        help = "Number of trader peers to simulate (even IDs buy, odd IDs sell)"
    )]
    pub peers: usize,

    // Base period between trade ticks
    #[clap(
        long,
        default_value = settings::DEFAULT_TRADE_PERIOD_MS,
        env("TRADEPOST_TRADE_PERIOD_MS"),
        help = "Base period in milliseconds between trade attempts per peer"
    )]
    pub trade_period_ms: u64,

    // Crash/recover toggle period
    #[clap(
        long,
        default_value = settings::DEFAULT_FAULT_PERIOD_MS,
        env("TRADEPOST_FAULT_PERIOD_MS"),
        help = "Period in milliseconds of the crash/recover toggle"
    )]
    pub fault_period_ms: u64,

    // Disable the fault injector
    #[clap(
        long,
        env("TRADEPOST_NO_FAULTS"),
        help = "Run without simulated crashes"
    )]
    pub no_faults: bool,

    // Post-failure retry policy
    #[clap(
        long,
        default_value = "defer",
        env("TRADEPOST_RETRY_POLICY"),
        help = "retry-policy after a failed coordinator call: 'defer' or 'wait-retry'"
    )]
    pub retry_policy: settings::RetryPolicy,

    // Bounded wait before the single retry under wait-retry
    #[clap(
        long,
        default_value = settings::DEFAULT_RETRY_WAIT_MS,
        env("TRADEPOST_RETRY_WAIT_MS"),
        help = "Wait in milliseconds before the single wait-retry attempt"
    )]
    pub retry_wait_ms: u64,

    // Ledger snapshot path
    #[clap(
        long,
        default_value = settings::DEFAULT_SNAPSHOT_PATH,
        env("TRADEPOST_SNAPSHOT_PATH"),
        help = "Path of the persisted ledger snapshot"
    )]
    pub snapshot_path: String,

    // Simulation duration
    #[clap(
        long,
        default_value = settings::DEFAULT_RUN_SECS,
        env("TRADEPOST_RUN_SECS"),
        help = "Seconds to run before printing the final summary"
    )]
    pub run_secs: u64,
}

impl Cli {
    pub fn into_settings(self) -> settings::Settings {
        settings::Settings {
            peers: self.peers,
            trade_period_ms: self.trade_period_ms,
            fault_period_ms: self.fault_period_ms,
            fault_injection: !self.no_faults,
            retry_policy: self.retry_policy,
            retry_wait_ms: self.retry_wait_ms,
            snapshot_path: self.snapshot_path,
            run_secs: self.run_secs,
        }
    }
}
