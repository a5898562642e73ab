//! Process-wide runtime counters (§3 Statistics)

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Monotonic counters plus the process start time. Counters are updated
/// without holding the registry lock (§5) and may be read without
/// synchronization — eventual consistency is acceptable for health/stats.
pub struct Stats {
    total_connections: AtomicU64,
    total_messages_sent: AtomicU64,
    total_messages_received: AtomicU64,
    start_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: f64,
    pub total_connections: u64,
    pub total_messages_sent: u64,
    pub total_messages_received: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            total_messages_sent: AtomicU64::new(0),
            total_messages_received: AtomicU64::new(0),
            start_time: Utc::now(),
        }
    }

    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_messages_sent(&self, count: u64) {
        self.total_messages_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_message_received(&self) {
        self.total_messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_seconds: self.uptime_seconds(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_messages_sent: self.total_messages_sent.load(Ordering::Relaxed),
            total_messages_received: self.total_messages_received.load(Ordering::Relaxed),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
