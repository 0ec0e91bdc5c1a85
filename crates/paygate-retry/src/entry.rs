//! Retry Entry Model
//!
//! A durable record of one failed webhook delivery awaiting redelivery.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved payload key holding the exact request body as received.
///
/// Gateways sign the raw body, so redelivery has to replay it
/// byte-for-byte; reserializing the parsed payload could reorder fields
/// or change whitespace and break signature checks.
pub const RAW_BODY_KEY: &str = "_raw_body";

/// Unique retry entry identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetryEntryId(String);

impl RetryEntryId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RetryEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RetryEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of a retry entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStatus {
    /// Waiting for its next scheduled attempt
    Pending,

    /// Redelivered successfully (terminal)
    Succeeded,

    /// Attempt limit reached; kept for audit, never rescheduled (terminal)
    Exhausted,
}

impl RetryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryStatus::Succeeded | RetryStatus::Exhausted)
    }
}

/// One recorded delivery failure
///
/// The retry store owns entries exclusively: the ingestion path only
/// appends, the redelivery worker mutates them through `mark_attempt`.
/// Several pending entries may reference the same payment; the store
/// deduplicates by entry identity only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallbackRetryEntry {
    /// Unique identifier
    pub id: RetryEntryId,

    /// Payment this callback belongs to (referenced, not owned)
    pub payment_id: String,

    /// Parsed callback fields plus the raw body under [`RAW_BODY_KEY`]
    pub payload: serde_json::Map<String, serde_json::Value>,

    /// Request headers as received, case preserved
    pub headers: HashMap<String, String>,

    /// Delivery state
    pub status: RetryStatus,

    /// Completed delivery attempts
    pub attempts: u32,

    /// When the entry next becomes due
    pub next_retry_at: DateTime<Utc>,

    /// When the failure was first recorded
    pub created_at: DateTime<Utc>,
}

impl CallbackRetryEntry {
    /// Whether the entry is eligible for redelivery at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == RetryStatus::Pending && self.next_retry_at <= now
    }

    /// The raw request body captured at creation, if present
    pub fn raw_body(&self) -> Option<&str> {
        self.payload.get(RAW_BODY_KEY).and_then(|v| v.as_str())
    }
}
