//! Shutdown coordinator
//!
//! Signals quiescence, runs registered cleanup callbacks within a bounded
//! timeout, and exposes a snapshot of its own state for diagnostics.
//! Grounded on the original broker's `ShutdownManager` (graceful shutdown
//! test suite): an explicit state machine, idempotent initiation, and
//! callbacks that run in registration order and cannot abort shutdown by
//! panicking.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

type Callback = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownState {
    Running,
    ShuttingDown,
    Shutdown,
}

#[derive(Debug, Serialize)]
pub struct ShutdownInfo {
    pub state: ShutdownState,
    pub is_shutting_down: bool,
    pub shutdown_started_at: Option<DateTime<Utc>>,
    pub shutdown_timeout: u64,
    pub grace_period: u64,
}

struct Inner {
    state: ShutdownState,
    shutdown_started_at: Option<DateTime<Utc>>,
    callbacks: Vec<Callback>,
}

/// Coordinates graceful shutdown across the heartbeat task, active
/// WebSocket sessions, and the HTTP listener.
pub struct ShutdownManager {
    inner: StdMutex<Inner>,
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
    pub shutdown_timeout: Duration,
    pub grace_period: Duration,
}

impl ShutdownManager {
    pub fn new(shutdown_timeout: Duration, grace_period: Duration) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            inner: StdMutex::new(Inner {
                state: ShutdownState::Running,
                shutdown_started_at: None,
                callbacks: Vec::new(),
            }),
            tx,
            rx,
            shutdown_timeout,
            grace_period,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().state == ShutdownState::Running
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.lock().unwrap().state != ShutdownState::Running
    }

    /// Register a cleanup callback, run in registration order when
    /// shutdown is initiated. A callback's own failure never stops
    /// subsequent callbacks or shutdown itself.
    pub fn register_shutdown_callback<F, Fut>(&self, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner
            .lock()
            .unwrap()
            .callbacks
            .push(Box::new(move || Box::pin(callback())));
    }

    /// Watch handle that resolves once shutdown has been initiated.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Idempotent: the first call records the timestamp and runs
    /// callbacks; later calls are no-ops.
    pub async fn initiate_shutdown(&self, reason: &str) {
        let already_started = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != ShutdownState::Running {
                true
            } else {
                inner.state = ShutdownState::ShuttingDown;
                inner.shutdown_started_at = Some(Utc::now());
                false
            }
        };

        if already_started {
            return;
        }

        tracing::info!(reason, "broker shutting down");
        let _ = self.tx.send(true);

        self.run_callbacks().await;
    }

    async fn run_callbacks(&self) {
        let count = self.inner.lock().unwrap().callbacks.len();
        for idx in 0..count {
            let fut = {
                let inner = self.inner.lock().unwrap();
                (inner.callbacks[idx])()
            };
            let result = tokio::time::timeout(self.shutdown_timeout, fut).await;
            if result.is_err() {
                tracing::warn!(callback = idx, "shutdown callback timed out");
            }
        }
    }

    pub fn mark_shutdown_complete(&self) {
        self.inner.lock().unwrap().state = ShutdownState::Shutdown;
    }

    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    pub async fn wait_for_shutdown_complete(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_shutdown())
            .await
            .is_ok()
    }

    pub fn get_shutdown_info(&self) -> ShutdownInfo {
        let inner = self.inner.lock().unwrap();
        ShutdownInfo {
            state: inner.state,
            is_shutting_down: inner.state != ShutdownState::Running,
            shutdown_started_at: inner.shutdown_started_at,
            shutdown_timeout: self.shutdown_timeout.as_secs(),
            grace_period: self.grace_period.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn initialization_defaults() {
        let manager = ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5));
        assert!(manager.is_running());
        assert!(!manager.is_shutting_down());
        assert_eq!(manager.shutdown_timeout, Duration::from_secs(30));
        assert_eq!(manager.grace_period, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn initiate_shutdown_changes_state() {
        let manager = ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5));
        manager.initiate_shutdown("test").await;

        assert!(!manager.is_running());
        assert!(manager.is_shutting_down());
        assert!(manager.get_shutdown_info().shutdown_started_at.is_some());
    }

    #[tokio::test]
    async fn initiate_shutdown_is_idempotent() {
        let manager = ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5));
        manager.initiate_shutdown("first").await;
        let first = manager.get_shutdown_info().shutdown_started_at;

        manager.initiate_shutdown("second").await;
        let second = manager.get_shutdown_info().shutdown_started_at;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn callbacks_run_in_registration_order() {
        let manager = ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5));
        let order = Arc::new(StdMutex::new(Vec::new()));

        for n in 1..=3 {
            let order = order.clone();
            manager.register_shutdown_callback(move || {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(n);
                }
            });
        }

        manager.initiate_shutdown("test").await;
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn callback_timeout_does_not_stop_remaining_callbacks() {
        let manager = ShutdownManager::new(Duration::from_millis(20), Duration::from_secs(5));
        let second_called = Arc::new(AtomicBool::new(false));

        manager.register_shutdown_callback(|| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let flag = second_called.clone();
        manager.register_shutdown_callback(move || {
            let flag = flag.clone();
            async move {
                flag.store(true, Ordering::SeqCst);
            }
        });

        manager.initiate_shutdown("test").await;
        assert!(manager.is_shutting_down());
        assert!(second_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wait_for_shutdown_blocks_until_initiated() {
        let manager = Arc::new(ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5)));
        let completed = Arc::new(AtomicBool::new(false));

        let waiter_manager = manager.clone();
        let waiter_flag = completed.clone();
        let wait_task = tokio::spawn(async move {
            waiter_manager.wait_for_shutdown().await;
            waiter_flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!completed.load(Ordering::SeqCst));

        manager.initiate_shutdown("test").await;
        tokio::time::timeout(Duration::from_secs(1), wait_task)
            .await
            .unwrap()
            .unwrap();
        assert!(completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wait_for_shutdown_complete_times_out_when_not_initiated() {
        let manager = ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5));
        let result = manager.wait_for_shutdown_complete(Duration::from_millis(50)).await;
        assert!(!result);
    }

    #[tokio::test]
    async fn wait_for_shutdown_complete_succeeds_when_initiated() {
        let manager = ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5));
        manager.initiate_shutdown("test").await;
        let result = manager.wait_for_shutdown_complete(Duration::from_secs(1)).await;
        assert!(result);
    }

    #[test]
    fn mark_shutdown_complete_changes_state() {
        let manager = ShutdownManager::new(Duration::from_secs(30), Duration::from_secs(5));
        manager.mark_shutdown_complete();
        assert_eq!(manager.get_shutdown_info().state, ShutdownState::Shutdown);
    }
}
