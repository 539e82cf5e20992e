//! Periodic crash/recover toggling for coordinator-eligible peers.
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::peer::{Peer, PeerHandle};

/// Flips a peer's crashed flag on a periodic timer with a randomized
/// phase. While the flag is set every inbound call fails at admission;
/// on each crashed->alive transition the injector immediately triggers a
/// fresh election, because a recovering peer cannot trust its last known
/// coordinator.
pub struct FaultInjector {
    task: JoinHandle<()>,
}

impl FaultInjector {
    pub fn spawn(handle: PeerHandle, period: Duration) -> Self {
        let phase = {
            let mut rng = rand::thread_rng();
            Duration::from_millis(rng.gen_range(0..period.as_millis().max(1) as u64))
        };

        let task = tokio::spawn(async move {
            let peer_id = handle.peer_id();
            tokio::time::sleep(phase).await;
            loop {
                let was_crashed = handle.is_crashed();
                handle.set_crashed(!was_crashed);
                if was_crashed {
                    info!(
                        "[FaultInjector] peer {} recovered, triggering election",
                        peer_id
                    );
                    if let Err(err) = handle.election(Vec::new()).await {
                        warn!(
                            "[FaultInjector] post-recovery election on peer {} failed: {}",
                            peer_id, err
                        );
                    }
                } else {
                    info!("[FaultInjector] peer {} crashed", peer_id);
                }
                tokio::time::sleep(period).await;
            }
        });
        Self { task }
    }

    /// Cancel the toggle task, leaving the crashed flag as it is
    pub fn stop(self) {
        self.task.abort();
    }
}
