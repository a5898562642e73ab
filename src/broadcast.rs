//! Broadcast engine (C4)
//!
//! Fans a single JSON payload out to every live subscriber of a channel,
//! pruning any subscriber whose send fails.

use serde_json::Value;

use crate::registry::ConnectionRegistry;

/// Send `payload` to every current subscriber of `channel`.
///
/// Takes a snapshot of the subscriber set, sends to each entry in snapshot
/// order, then removes dead subscribers outside the hot loop. Returns the
/// number of sends that succeeded (§4.4).
pub async fn broadcast(registry: &ConnectionRegistry, channel: &str, payload: &Value) -> usize {
    let snapshot = registry.get_channel_subscribers(channel).await;
    if snapshot.entries.is_empty() {
        return 0;
    }

    let mut sent = 0usize;
    let mut dead = Vec::new();

    for (id, sender) in &snapshot.entries {
        match sender.try_send(payload.clone()) {
            Ok(()) => sent += 1,
            Err(_) => {
                tracing::warn!(channel, subscriber = ?id, "failed to send to subscriber, marking dead");
                dead.push(*id);
            }
        }
    }

    for id in dead {
        registry.remove_client(id, channel).await;
    }

    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelName;
    use serde_json::json;

    #[tokio::test]
    async fn broadcast_to_empty_channel_returns_zero() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let sent = broadcast(&registry, "no-subscribers", &json!({"a": 1})).await;
        assert_eq!(sent, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers_in_order() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let channel = ChannelName::parse("broadcast.test").unwrap();
        let (_id1, mut rx1) = registry.add_client(&channel, None, None, 8).await;
        let (_id2, mut rx2) = registry.add_client(&channel, None, None, 8).await;

        let payload = json!({"broadcast": true});
        let sent = broadcast(&registry, "broadcast.test", &payload).await;

        assert_eq!(sent, 2);
        assert_eq!(rx1.recv().await.unwrap(), payload);
        assert_eq!(rx2.recv().await.unwrap(), payload);
    }

    #[tokio::test]
    async fn dead_subscriber_is_pruned_and_others_unaffected() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let channel = ChannelName::parse("prune.test").unwrap();
        let (dead_id, dead_rx) = registry.add_client(&channel, None, None, 8).await;
        let (_alive_id, mut alive_rx) = registry.add_client(&channel, None, None, 8).await;
        drop(dead_rx);

        let sent = broadcast(&registry, "prune.test", &json!({"x": 1})).await;

        assert_eq!(sent, 1);
        assert!(alive_rx.recv().await.is_some());
        assert!(registry.subscriber_info(dead_id).await.is_none());
        assert_eq!(registry.get_channel_count("prune.test").await, 1);
    }

    #[tokio::test]
    async fn channel_isolation_a_never_reaches_b() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let a = ChannelName::parse("channel.one").unwrap();
        let b = ChannelName::parse("channel.two").unwrap();
        let (_id_a, mut rx_a) = registry.add_client(&a, None, None, 8).await;
        let (_id_b, mut rx_b) = registry.add_client(&b, None, None, 8).await;

        broadcast(&registry, "channel.one", &json!({"only": "a"})).await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.try_recv().is_err());
    }
}
