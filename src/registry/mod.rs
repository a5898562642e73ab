//! Connection registry (C3)
//!
//! Owns the mapping from channel name to its live subscriber set, and the
//! per-subscriber metadata. Guarded by a single mutex: the whole spec'd
//! scale does not need finer-grained locking (§5), and a single lock makes
//! the invariants in §4.3 trivial to uphold.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::channel::ChannelName;
use crate::error::Error;

/// Opaque, unique, stable identifier for a live subscriber (§3 "Handle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Metadata the registry keeps per subscriber (§3 Subscriber).
#[derive(Debug, Clone)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub channel: String,
    pub user_id: Option<String>,
    pub wallet_address: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub messages_received: u64,
}

struct SubscriberEntry {
    sender: mpsc::Sender<Value>,
    channel: String,
    user_id: Option<String>,
    wallet_address: Option<String>,
    connected_at: DateTime<Utc>,
    messages_received: AtomicU64,
}

/// A point-in-time snapshot of one channel's subscribers, safe to iterate
/// without holding the registry lock (§3 Ownership, §5).
#[derive(Clone)]
pub struct ChannelSnapshot {
    pub entries: Vec<(SubscriberId, mpsc::Sender<Value>)>,
}

struct Inner {
    /// channel name -> ordered, duplicate-free list of subscriber handles (I1).
    channels: HashMap<String, Vec<SubscriberId>>,
    subscribers: HashMap<SubscriberId, SubscriberEntry>,
    /// Channels declared in configuration at startup; retained even when empty.
    pre_declared: std::collections::HashSet<String>,
    next_id: u64,
}

/// Thread-safe channel -> subscriber-set registry.
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new(pre_declared_channels: impl IntoIterator<Item = String>) -> Self {
        let pre_declared: std::collections::HashSet<String> =
            pre_declared_channels.into_iter().collect();
        let channels = pre_declared
            .iter()
            .cloned()
            .map(|name| (name, Vec::new()))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                channels,
                subscribers: HashMap::new(),
                pre_declared,
                next_id: 1,
            }),
        }
    }

    /// Register `channel` with an empty subscriber set if it doesn't
    /// already exist. Used by the front door's auto-creation policy (§4.6)
    /// before `add_client` is actually called, e.g. on publish to an
    /// unsubscribed channel.
    pub async fn ensure_channel(&self, channel: &ChannelName) {
        let mut inner = self.inner.lock().await;
        inner
            .channels
            .entry(channel.as_str().to_string())
            .or_default();
    }

    /// Add a session to `channel`, creating the channel if absent.
    /// Returns the new subscriber's handle and its outbound message queue.
    pub async fn add_client(
        &self,
        channel: &ChannelName,
        user_id: Option<String>,
        wallet_address: Option<String>,
        queue_capacity: usize,
    ) -> (SubscriberId, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let mut inner = self.inner.lock().await;

        let id = SubscriberId(inner.next_id);
        inner.next_id += 1;

        inner.subscribers.insert(
            id,
            SubscriberEntry {
                sender: tx,
                channel: channel.as_str().to_string(),
                user_id,
                wallet_address,
                connected_at: Utc::now(),
                messages_received: AtomicU64::new(0),
            },
        );
        inner
            .channels
            .entry(channel.as_str().to_string())
            .or_default()
            .push(id);

        (id, rx)
    }

    /// Remove `id` from `channel`. A no-op if the subscriber or channel is
    /// unknown — this is called from cleanup paths under arbitrary failure
    /// conditions and must never fail (§4.3 I4).
    pub async fn remove_client(&self, id: SubscriberId, channel: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(handles) = inner.channels.get_mut(channel) {
            handles.retain(|h| *h != id);
        }
        inner.subscribers.remove(&id);
    }

    /// Increment the inbound message counter for `id`. No-op if unknown.
    pub async fn record_message_received(&self, id: SubscriberId) {
        let inner = self.inner.lock().await;
        if let Some(entry) = inner.subscribers.get(&id) {
            entry.messages_received.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot of `channel`'s current subscribers, for the broadcast
    /// engine to iterate without holding the lock during I/O.
    pub async fn get_channel_subscribers(&self, channel: &str) -> ChannelSnapshot {
        let inner = self.inner.lock().await;
        let entries = inner
            .channels
            .get(channel)
            .map(|handles| {
                handles
                    .iter()
                    .filter_map(|id| {
                        inner
                            .subscribers
                            .get(id)
                            .map(|entry| (*id, entry.sender.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        ChannelSnapshot { entries }
    }

    pub async fn channel_exists(&self, channel: &str) -> bool {
        self.inner.lock().await.channels.contains_key(channel)
    }

    pub async fn get_channel_count(&self, channel: &str) -> usize {
        self.inner
            .lock()
            .await
            .channels
            .get(channel)
            .map(|h| h.len())
            .unwrap_or(0)
    }

    pub async fn get_all_channels(&self) -> HashMap<String, usize> {
        self.inner
            .lock()
            .await
            .channels
            .iter()
            .map(|(name, handles)| (name.clone(), handles.len()))
            .collect()
    }

    /// Sum of live subscribers across all channels (I3).
    pub async fn get_total_connections(&self) -> usize {
        self.inner
            .lock()
            .await
            .channels
            .values()
            .map(|h| h.len())
            .sum()
    }

    pub async fn subscriber_info(&self, id: SubscriberId) -> Option<SubscriberInfo> {
        let inner = self.inner.lock().await;
        inner.subscribers.get(&id).map(|entry| SubscriberInfo {
            id,
            channel: entry.channel.clone(),
            user_id: entry.user_id.clone(),
            wallet_address: entry.wallet_address.clone(),
            connected_at: entry.connected_at,
            messages_received: entry.messages_received.load(Ordering::Relaxed),
        })
    }

    /// Drop every channel and subscriber, per shutdown coordinator step 4.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.channels.clear();
        inner.subscribers.clear();
    }

    /// Remove every channel whose subscriber set is empty and whose kind is
    /// ephemeral-or-unknown, i.e. not pre-declared and not one of the
    /// permanent kinds (§4.3, P4).
    pub async fn cleanup_empty_channels(&self) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let pre_declared = inner.pre_declared.clone();
        let mut removed = Vec::new();

        let empty: Vec<String> = inner
            .channels
            .iter()
            .filter(|(name, handles)| {
                handles.is_empty()
                    && !pre_declared.contains(*name)
                    && should_reclaim(name)
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in empty {
            inner.channels.remove(&name);
            removed.push(name);
        }

        removed
    }
}

/// Whether an empty channel of this name is eligible for reclamation.
/// Only ephemeral or unclassified-kind channels qualify (§4.3: "kind
/// ephemeral-or-unknown"); global/user/strategy/public survive empty (P4).
fn should_reclaim(name: &str) -> bool {
    match ChannelName::parse(name) {
        Ok(parsed) => matches!(
            parsed.kind(),
            crate::channel::ChannelKind::EphemeralForgeJob
                | crate::channel::ChannelKind::EphemeralBacktest
                | crate::channel::ChannelKind::Other
        ),
        Err(_) => true,
    }
}

/// Borrowed reference to a live sender, used by callers holding an `Arc`.
pub type SharedRegistry = Arc<ConnectionRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn global() -> ChannelName {
        ChannelName::parse("global").unwrap()
    }

    fn forge() -> ChannelName {
        ChannelName::parse("forge.job.abc").unwrap()
    }

    #[tokio::test]
    async fn add_then_remove_restores_prior_state() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let channel = global();

        let before = registry.get_total_connections().await;
        let (id, _rx) = registry.add_client(&channel, None, None, 8).await;
        assert_eq!(registry.get_total_connections().await, before + 1);

        registry.remove_client(id, channel.as_str()).await;
        assert_eq!(registry.get_total_connections().await, before);
        assert!(registry.subscriber_info(id).await.is_none());
    }

    #[tokio::test]
    async fn remove_unknown_is_a_no_op() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        registry.remove_client(SubscriberId(999), "global").await;
        registry.remove_client(SubscriberId(999), "no-such-channel").await;
    }

    #[tokio::test]
    async fn no_duplicate_handles_per_channel() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let channel = global();
        let (id1, _rx1) = registry.add_client(&channel, None, None, 8).await;
        let (id2, _rx2) = registry.add_client(&channel, None, None, 8).await;
        assert_ne!(id1, id2);
        assert_eq!(registry.get_channel_count("global").await, 2);
    }

    #[tokio::test]
    async fn snapshot_is_independent_of_later_mutation() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let channel = global();
        let (id, _rx) = registry.add_client(&channel, None, None, 8).await;

        let snapshot = registry.get_channel_subscribers("global").await;
        registry.remove_client(id, "global").await;

        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(registry.get_channel_count("global").await, 0);
    }

    #[tokio::test]
    async fn cleanup_reclaims_ephemeral_but_not_permanent_channels() {
        let registry = ConnectionRegistry::new(vec!["global".to_string()]);
        registry.ensure_channel(&forge()).await;
        registry.ensure_channel(&ChannelName::parse("user.1").unwrap()).await;
        registry.ensure_channel(&ChannelName::parse("trade").unwrap()).await;
        registry.ensure_channel(&ChannelName::parse("strategy.momentum").unwrap()).await;

        let removed = registry.cleanup_empty_channels().await;
        assert_eq!(removed, vec!["forge.job.abc".to_string()]);
        assert!(registry.channel_exists("global").await);
        assert!(registry.channel_exists("user.1").await);
        assert!(registry.channel_exists("trade").await);
        assert!(registry.channel_exists("strategy.momentum").await);
        assert!(!registry.channel_exists("forge.job.abc").await);
    }

    #[tokio::test]
    async fn pre_declared_channel_survives_cleanup_even_when_empty() {
        let registry = ConnectionRegistry::new(vec!["forge.job.precreated".to_string()]);
        let removed = registry.cleanup_empty_channels().await;
        assert!(removed.is_empty());
        assert!(registry.channel_exists("forge.job.precreated").await);
    }

    #[tokio::test]
    async fn clear_drops_all_channels_and_subscribers() {
        let registry = ConnectionRegistry::new(vec!["global".to_string()]);
        let (id, _rx) = registry.add_client(&global(), None, None, 8).await;

        registry.clear().await;

        assert!(!registry.channel_exists("global").await);
        assert_eq!(registry.get_total_connections().await, 0);
        assert!(registry.subscriber_info(id).await.is_none());
    }

    #[tokio::test]
    async fn message_received_counter_increments() {
        let registry = ConnectionRegistry::new(Vec::<String>::new());
        let channel = global();
        let (id, _rx) = registry.add_client(&channel, None, None, 8).await;

        registry.record_message_received(id).await;
        registry.record_message_received(id).await;

        let info = registry.subscriber_info(id).await.unwrap();
        assert_eq!(info.messages_received, 2);
    }
}
