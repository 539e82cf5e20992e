use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradepost::cli;
use tradepost::ledger::{JsonFileStore, SnapshotStore};
use tradepost::peer::{FaultInjector, Peer, PeerNode, RingDirectory, Role};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradepost=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings();
    settings.validate()?;

    // The marketplace always starts empty.
    let store: Arc<dyn SnapshotStore> = Arc::new(JsonFileStore::new(&settings.snapshot_path));
    store.reset_snapshot()?;

    // Build the ring: even IDs buy, odd IDs sell, everybody shares one
    // directory and one ledger snapshot.
    let n = settings.peers;
    let config = settings.peer_config();
    let mut nodes = Vec::with_capacity(n);
    let mut handles = Vec::with_capacity(n);
    for peer_id in 0..n {
        let role = if peer_id % 2 == 0 {
            Role::Buyer
        } else {
            Role::Seller
        };
        let (node, handle) = PeerNode::new(peer_id, n, role, config.clone(), store.clone());
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

    info!("Starting tradepost with {} peers", n);
    for handle in &handles {
        handle.start().await?;
    }

    // Initial election from peer 0 bootstraps the first coordinator.
    handles[0].election(Vec::new()).await?;

    // The highest-ID peer wins elections while alive, so it is the one
    // worth crashing.
    let injector = if settings.fault_injection {
        Some(FaultInjector::spawn(
            handles[n - 1].clone(),
            settings.fault_period(),
        ))
    } else {
        None
    };

    tokio::time::sleep(std::time::Duration::from_secs(settings.run_secs)).await;

    if let Some(injector) = injector {
        injector.stop();
    }

    for handle in &handles {
        match handle.status().await {
            Ok(status) => info!(
                "[Peer<{}>] final state: role={} coordinator={} balance={} clock={:?}",
                status.peer_id,
                status.role,
                status.coordinator_id,
                status.balance,
                status.clock.ticks()
            ),
            Err(err) => info!("[Peer<{}>] final state unavailable: {}", handle.peer_id(), err),
        }
    }

    Ok(())
}
