//! Redelivery Worker
//!
//! Background loop that drains due retry entries and replays each one
//! against a redelivery target, recording the outcome back into the
//! store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::entry::CallbackRetryEntry;
use crate::store::RetryStore;

/// Target of a redelivery attempt
///
/// Implemented by the ingestion side; the worker stays ignorant of how
/// a callback is actually processed. An `Err` counts as a failed
/// attempt and is rescheduled by the store.
#[async_trait]
pub trait RedeliverCallback: Send + Sync {
    async fn redeliver(&self, entry: &CallbackRetryEntry) -> anyhow::Result<()>;
}

/// Worker configuration
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Sleep between polls of the due set
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Polls the retry store and redelivers due callbacks
pub struct RedeliveryWorker {
    store: Arc<dyn RetryStore>,
    target: Arc<dyn RedeliverCallback>,
    config: WorkerConfig,
}

impl RedeliveryWorker {
    pub fn new(
        store: Arc<dyn RetryStore>,
        target: Arc<dyn RedeliverCallback>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            target,
            config,
        }
    }

    /// Drain everything due at `now`; returns (succeeded, failed)
    ///
    /// A failure on one entry never stops the sweep: the outcome is
    /// recorded and the next entry is attempted.
    pub async fn run_once(&self, now: DateTime<Utc>) -> (usize, usize) {
        let due = match self.store.get_due_retries(now).await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "Failed to poll retry store");
                return (0, 0);
            }
        };

        if due.is_empty() {
            return (0, 0);
        }
        tracing::debug!(count = due.len(), "Redelivering due callbacks");

        let mut succeeded = 0;
        let mut failed = 0;
        for entry in due {
            let outcome = self.target.redeliver(&entry).await;
            if let Err(e) = &outcome {
                tracing::warn!(
                    entry_id = %entry.id,
                    payment_id = %entry.payment_id,
                    attempts = entry.attempts,
                    error = %e,
                    "Callback redelivery failed"
                );
            }

            match self.store.mark_attempt(&entry.id, outcome.is_ok()).await {
                Ok(marked) => {
                    if outcome.is_ok() {
                        succeeded += 1;
                        tracing::info!(
                            entry_id = %entry.id,
                            payment_id = %entry.payment_id,
                            attempts = marked.attempts,
                            "Callback redelivered"
                        );
                    } else {
                        failed += 1;
                        if marked.status.is_terminal() {
                            tracing::warn!(
                                entry_id = %entry.id,
                                payment_id = %entry.payment_id,
                                attempts = marked.attempts,
                                "Retry entry exhausted"
                            );
                        }
                    }
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(entry_id = %entry.id, error = %e, "Failed to record attempt");
                }
            }
        }

        (succeeded, failed)
    }

    /// Run until the shutdown signal flips to `true` or its sender is
    /// dropped
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Redelivery worker started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    self.run_once(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Redelivery worker stopped");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::entry::{RetryEntryId, RetryStatus};
    use crate::store::MemoryRetryStore;

    /// Fails the first `fail_first` deliveries, then succeeds
    struct ScriptedTarget {
        fail_first: usize,
        calls: AtomicUsize,
    }

    impl ScriptedTarget {
        fn new(fail_first: usize) -> Self {
            Self {
                fail_first,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RedeliverCallback for ScriptedTarget {
        async fn redeliver(&self, _entry: &CallbackRetryEntry) -> anyhow::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                anyhow::bail!("gateway unreachable");
            }
            Ok(())
        }
    }

    fn payload() -> serde_json::Map<String, serde_json::Value> {
        let mut p = serde_json::Map::new();
        p.insert("status".into(), serde_json::json!("paid"));
        p
    }

    fn far_future() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::days(365)
    }

    async fn store_with_entry(store: &MemoryRetryStore) -> RetryEntryId {
        store
            .store_failed_callback("pay-1", payload(), HashMap::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_once_with_empty_store() {
        let store = Arc::new(MemoryRetryStore::default());
        let target = Arc::new(ScriptedTarget::new(0));
        let worker = RedeliveryWorker::new(store, target.clone(), WorkerConfig::default());

        assert_eq!(worker.run_once(far_future()).await, (0, 0));
        assert_eq!(target.calls(), 0);
    }

    #[tokio::test]
    async fn test_run_once_skips_entries_not_yet_due() {
        let store = Arc::new(MemoryRetryStore::default());
        store_with_entry(&store).await;
        let target = Arc::new(ScriptedTarget::new(0));
        let worker = RedeliveryWorker::new(store, target.clone(), WorkerConfig::default());

        assert_eq!(worker.run_once(Utc::now()).await, (0, 0));
        assert_eq!(target.calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_redelivery_marks_entry() {
        let store = Arc::new(MemoryRetryStore::default());
        let id = store_with_entry(&store).await;
        let target = Arc::new(ScriptedTarget::new(0));
        let worker = RedeliveryWorker::new(store.clone(), target, WorkerConfig::default());

        assert_eq!(worker.run_once(far_future()).await, (1, 0));

        let entry = store.get_entry(&id).await.unwrap();
        assert_eq!(entry.status, RetryStatus::Succeeded);
        assert_eq!(entry.attempts, 1);

        // A second sweep finds nothing
        assert_eq!(worker.run_once(far_future()).await, (0, 0));
    }

    #[tokio::test]
    async fn test_fail_then_succeed_across_sweeps() {
        let store = Arc::new(MemoryRetryStore::default());
        let id = store_with_entry(&store).await;
        let target = Arc::new(ScriptedTarget::new(1));
        let worker = RedeliveryWorker::new(store.clone(), target.clone(), WorkerConfig::default());

        assert_eq!(worker.run_once(far_future()).await, (0, 1));
        let entry = store.get_entry(&id).await.unwrap();
        assert_eq!(entry.status, RetryStatus::Pending);
        assert_eq!(entry.attempts, 1);

        assert_eq!(worker.run_once(far_future()).await, (1, 0));
        let entry = store.get_entry(&id).await.unwrap();
        assert_eq!(entry.status, RetryStatus::Succeeded);
        assert_eq!(entry.attempts, 2);
        assert_eq!(target.calls(), 2);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_sweep() {
        let store = Arc::new(MemoryRetryStore::default());
        store_with_entry(&store).await;
        let second = store
            .store_failed_callback("pay-2", payload(), HashMap::new())
            .await
            .unwrap();
        // First delivery (oldest entry) fails, second succeeds
        let target = Arc::new(ScriptedTarget::new(1));
        let worker = RedeliveryWorker::new(store.clone(), target.clone(), WorkerConfig::default());

        assert_eq!(worker.run_once(far_future()).await, (1, 1));
        assert_eq!(target.calls(), 2);
        assert_eq!(
            store.get_entry(&second).await.unwrap().status,
            RetryStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn test_exhausted_entries_leave_the_due_set() {
        let store = Arc::new(MemoryRetryStore::new(BackoffPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(10),
            2,
        )));
        let id = store_with_entry(&store).await;
        let target = Arc::new(ScriptedTarget::new(usize::MAX));
        let worker = RedeliveryWorker::new(store.clone(), target.clone(), WorkerConfig::default());

        assert_eq!(worker.run_once(far_future()).await, (0, 1));
        assert_eq!(worker.run_once(far_future()).await, (0, 1));
        assert_eq!(
            store.get_entry(&id).await.unwrap().status,
            RetryStatus::Exhausted
        );

        // Exhausted entries are never delivered again
        assert_eq!(worker.run_once(far_future()).await, (0, 0));
        assert_eq!(target.calls(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryRetryStore::default());
        let target = Arc::new(ScriptedTarget::new(0));
        let worker = RedeliveryWorker::new(
            store,
            target,
            WorkerConfig {
                poll_interval: Duration::from_secs(3600),
            },
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));
        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_when_shutdown_sender_dropped() {
        // Entry becomes due after 1 ms, well inside the first poll
        let store = Arc::new(MemoryRetryStore::new(BackoffPolicy::new(
            Duration::from_millis(1),
            Duration::from_secs(1),
            5,
        )));
        store_with_entry(&store).await;
        let target = Arc::new(ScriptedTarget::new(0));
        let worker = RedeliveryWorker::new(
            store,
            target.clone(),
            WorkerConfig {
                poll_interval: Duration::from_millis(20),
            },
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        // The loop sweeps while the sender is alive
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while target.calls() == 0 {
            assert!(std::time::Instant::now() < deadline, "due entry never swept");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Dropping the sender without ever signalling must stop the loop
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker kept running after sender drop")
            .unwrap();
    }
}
