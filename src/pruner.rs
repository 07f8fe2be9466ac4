use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::clock::Clock;
use crate::rendezvous::RendezvousRegistry;

const PRUNE_INTERVAL_SECS: u64 = 30;

/// Spawns a background task that calls `RendezvousRegistry::prune_expired` every 30s.
/// Takes a `watch::Receiver<bool>` so process shutdown can signal the loop to exit instead
/// of being force-killed; the task never blocks shutdown because it only ever awaits the
/// timer tick or the shutdown signal, never an unbounded operation.
pub fn spawn_pruner_task(
    registry: Arc<RendezvousRegistry>,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(PRUNE_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pruned = registry.prune_expired(clock.now_ms());
                    if pruned > 0 {
                        tracing::info!(message = "rendezvous.pruned", pruned_count = pruned);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });
}
