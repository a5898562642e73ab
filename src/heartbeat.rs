//! Heartbeat scheduler
//!
//! Periodic task that pings every connected subscriber to detect dead
//! peers and prune them (§4.6 Heartbeat scheduler, §5 cancellation).

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::registry::ConnectionRegistry;

/// Run the heartbeat loop until `shutdown` fires. Intended to be spawned
/// as its own task and aborted (or let its `shutdown` future resolve) at
/// process shutdown.
pub async fn run(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    tracing::info!(interval_secs = interval.as_secs(), "heartbeat scheduler started");

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tick(&registry).await;
            }
            _ = shutdown.changed() => {
                tracing::info!("heartbeat scheduler stopping");
                break;
            }
        }
    }
}

async fn tick(registry: &ConnectionRegistry) {
    let channels = registry.get_all_channels().await;
    let ping = json!({"type": "ping"});
    let mut total_pinged = 0usize;

    for (channel, _count) in channels {
        let snapshot = registry.get_channel_subscribers(&channel).await;
        let mut dead = Vec::new();

        for (id, sender) in &snapshot.entries {
            total_pinged += 1;
            if sender.try_send(ping.clone()).is_err() {
                dead.push(*id);
            }
        }

        for id in dead {
            registry.remove_client(id, &channel).await;
        }
    }

    let reclaimed = registry.cleanup_empty_channels().await;
    if !reclaimed.is_empty() {
        tracing::debug!(?reclaimed, "reclaimed empty ephemeral channels");
    }

    if total_pinged > 0 {
        tracing::debug!(total_pinged, "heartbeat tick complete");
    }
}
