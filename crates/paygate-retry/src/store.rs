//! Retry Store
//!
//! Queue contract between the webhook ingestion path (which appends
//! failed deliveries) and the redelivery worker (which drains due
//! entries and records outcomes).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::backoff::BackoffPolicy;
use crate::entry::{CallbackRetryEntry, RetryEntryId, RetryStatus};
use crate::error::{Result, RetryError};

/// Storage trait for failed callback deliveries
#[async_trait]
pub trait RetryStore: Send + Sync {
    /// Record a failed delivery
    ///
    /// Creates a pending entry with zero attempts, scheduled one base
    /// interval out. The payload is stored verbatim, including the raw
    /// body under [`crate::RAW_BODY_KEY`]. Entries are never
    /// deduplicated by payment: each failed delivery is recorded
    /// independently.
    async fn store_failed_callback(
        &self,
        payment_id: &str,
        payload: serde_json::Map<String, serde_json::Value>,
        headers: HashMap<String, String>,
    ) -> Result<RetryEntryId>;

    /// Pending entries with `next_retry_at <= now`, oldest-due first
    async fn get_due_retries(&self, now: DateTime<Utc>) -> Result<Vec<CallbackRetryEntry>>;

    /// Record the outcome of one redelivery attempt
    ///
    /// Increments the attempt counter; success transitions the entry to
    /// `Succeeded`, failure reschedules it with backoff and exhausts it
    /// once the attempt limit is reached. Marking an already-terminal
    /// entry is a no-op returning the stored entry, so racing workers
    /// cannot double-count attempts.
    async fn mark_attempt(
        &self,
        id: &RetryEntryId,
        succeeded: bool,
    ) -> Result<CallbackRetryEntry>;

    /// Load a single entry for audit/inspection
    async fn get_entry(&self, id: &RetryEntryId) -> Result<CallbackRetryEntry>;
}

/// In-memory retry store
///
/// Reference implementation of the queue contract; entries do not
/// survive a restart. Each operation takes the map lock once, so
/// readers never observe a half-written entry.
pub struct MemoryRetryStore {
    entries: RwLock<HashMap<RetryEntryId, CallbackRetryEntry>>,
    policy: BackoffPolicy,
}

impl Default for MemoryRetryStore {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl MemoryRetryStore {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Number of stored entries, any status
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All entries recorded for a payment, oldest first
    pub async fn entries_for_payment(&self, payment_id: &str) -> Vec<CallbackRetryEntry> {
        let entries = self.entries.read().await;
        let mut found: Vec<_> = entries
            .values()
            .filter(|e| e.payment_id == payment_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        found
    }
}

#[async_trait]
impl RetryStore for MemoryRetryStore {
    async fn store_failed_callback(
        &self,
        payment_id: &str,
        payload: serde_json::Map<String, serde_json::Value>,
        headers: HashMap<String, String>,
    ) -> Result<RetryEntryId> {
        let now = Utc::now();
        let entry = CallbackRetryEntry {
            id: RetryEntryId::new(),
            payment_id: payment_id.to_string(),
            payload,
            headers,
            status: RetryStatus::Pending,
            attempts: 0,
            next_retry_at: self.policy.next_retry_at(now, 0),
            created_at: now,
        };
        let id = entry.id.clone();

        let mut entries = self.entries.write().await;
        entries.insert(id.clone(), entry);
        Ok(id)
    }

    async fn get_due_retries(&self, now: DateTime<Utc>) -> Result<Vec<CallbackRetryEntry>> {
        let entries = self.entries.read().await;
        let mut due: Vec<_> = entries.values().filter(|e| e.is_due(now)).cloned().collect();
        due.sort_by(|a, b| {
            a.next_retry_at
                .cmp(&b.next_retry_at)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(due)
    }

    async fn mark_attempt(
        &self,
        id: &RetryEntryId,
        succeeded: bool,
    ) -> Result<CallbackRetryEntry> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| RetryError::EntryNotFound(id.clone()))?;

        if entry.status.is_terminal() {
            return Ok(entry.clone());
        }

        entry.attempts += 1;
        if succeeded {
            entry.status = RetryStatus::Succeeded;
        } else if entry.attempts >= self.policy.max_attempts {
            entry.status = RetryStatus::Exhausted;
        } else {
            entry.next_retry_at = self.policy.next_retry_at(Utc::now(), entry.attempts);
        }

        Ok(entry.clone())
    }

    async fn get_entry(&self, id: &RetryEntryId) -> Result<CallbackRetryEntry> {
        let entries = self.entries.read().await;
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| RetryError::EntryNotFound(id.clone()))
    }
}
