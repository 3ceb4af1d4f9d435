use chrono::Utc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::store::ArtifactStore;

/// Periodically reclaim expired artifacts until the task is aborted
pub fn spawn_sweeper(store: ArtifactStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Artifact sweeper started (every {}s)", interval.as_secs());

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = store.sweep(Utc::now()).await;
            debug!("Sweep pass removed {} artifacts", removed);
        }
    })
}
