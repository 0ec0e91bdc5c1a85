//! # paygate-retry
//!
//! Durable retry queue for failed payment-gateway callback deliveries.
//!
//! When a webhook arrives and the downstream payment flow cannot apply it
//! (gateway unreachable, upstream timeout), the delivery is captured here
//! and replayed later on an exponential backoff schedule instead of being
//! dropped.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  store_failed   ┌──────────────┐  get_due /
//! │  Ingestion  │────callback────▶│  RetryStore  │◀──mark_attempt──┐
//! │   (HTTP)    │                 │  (queue)     │                 │
//! └─────────────┘                 └──────────────┘          ┌──────┴──────────┐
//!                                                           │ RedeliveryWorker│
//!        ┌──────────────────┐          redeliver            │  (poll loop)    │
//!        │ RedeliverCallback│◀───────────────────────────────┤                 │
//!        │   (target)       │                               └─────────────────┘
//!        └──────────────────┘
//! ```
//!
//! Entries move `Pending → Succeeded` on a delivered replay, or
//! `Pending → Exhausted` once the attempt limit is hit. Terminal entries
//! are kept for audit but never redelivered.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use paygate_retry::{MemoryRetryStore, RedeliveryWorker, RetryStore, WorkerConfig};
//!
//! let store = Arc::new(MemoryRetryStore::default());
//!
//! // Ingestion side: capture a failed delivery
//! let entry_id = store
//!     .store_failed_callback("pay-123", payload, headers)
//!     .await?;
//!
//! // Worker side: replay due entries in the background
//! let worker = RedeliveryWorker::new(store, target, WorkerConfig::default());
//! tokio::spawn(worker.run(shutdown_rx));
//! ```

mod backoff;
mod entry;
mod error;
mod store;
mod worker;

pub use backoff::BackoffPolicy;
pub use entry::{CallbackRetryEntry, RetryEntryId, RetryStatus, RAW_BODY_KEY};
pub use error::{Result, RetryError};
pub use store::{MemoryRetryStore, RetryStore};
pub use worker::{RedeliverCallback, RedeliveryWorker, WorkerConfig};
