//! Callback Ingestion
//!
//! The synchronous path behind the webhook endpoint: load the payment,
//! hand the callback to the payment flow with a deadline, and on a
//! transient failure capture the delivery in the retry queue. The same
//! delegation is what the redelivery worker replays later.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use paygate_retry::{
    CallbackRetryEntry, RedeliverCallback, RetryEntryId, RetryStore, RAW_BODY_KEY,
};

use crate::error::{PaymentError, Result};
use crate::flow::PaymentFlow;
use crate::payment::{Payment, PaymentId, PaymentRepository};

/// What happened to one inbound callback
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Applied synchronously
    Processed,

    /// Transient failure captured in the retry queue
    ///
    /// The gateway still receives a failure status so its own retry
    /// mechanism stays live alongside the internal one.
    QueuedForRetry {
        entry_id: RetryEntryId,
        reason: String,
    },
}

/// Ingests gateway callbacks and feeds the retry queue
pub struct CallbackIngestor {
    repository: Arc<dyn PaymentRepository>,
    flow: Arc<dyn PaymentFlow>,
    retry_store: Arc<dyn RetryStore>,
    timeout: Duration,
}

impl CallbackIngestor {
    pub fn new(
        repository: Arc<dyn PaymentRepository>,
        flow: Arc<dyn PaymentFlow>,
        retry_store: Arc<dyn RetryStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            repository,
            flow,
            retry_store,
            timeout,
        }
    }

    /// Process one inbound callback
    ///
    /// `data` must be the parsed form of `raw_body`. Valid JSON is
    /// valid UTF-8, which keeps the body copy captured for redelivery
    /// byte-identical to the received bytes.
    ///
    /// Unknown payments and non-retryable failures surface unchanged.
    /// A transient failure is recorded for redelivery and reported as
    /// [`CallbackOutcome::QueuedForRetry`].
    pub async fn ingest(
        &self,
        payment_id: &PaymentId,
        data: serde_json::Map<String, serde_json::Value>,
        headers: HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<CallbackOutcome> {
        let payment = self.repository.get_by_id(payment_id).await?;

        let error = match self.delegate(&payment, &data, &headers, raw_body).await {
            Ok(()) => {
                tracing::info!(payment_id = %payment_id, "Callback processed");
                return Ok(CallbackOutcome::Processed);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        // Parsed fields plus the received body under the reserved key;
        // the replay verifies signatures against that copy.
        let mut payload = data;
        payload.insert(
            RAW_BODY_KEY.into(),
            serde_json::Value::String(String::from_utf8_lossy(raw_body).into_owned()),
        );

        match self
            .retry_store
            .store_failed_callback(payment_id.as_str(), payload, headers)
            .await
        {
            Ok(entry_id) => {
                let reason = error.to_string();
                tracing::warn!(
                    payment_id = %payment_id,
                    entry_id = %entry_id,
                    reason = %reason,
                    "Callback queued for retry"
                );
                Ok(CallbackOutcome::QueuedForRetry { entry_id, reason })
            }
            Err(store_err) => {
                tracing::error!(
                    payment_id = %payment_id,
                    error = %store_err,
                    "Failed to queue callback for retry"
                );
                Err(error)
            }
        }
    }

    /// One bounded call into the payment flow
    async fn delegate(
        &self,
        payment: &Payment,
        data: &serde_json::Map<String, serde_json::Value>,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<()> {
        let delegation = self.flow.handle_callback(payment, data, headers, raw_body);
        match tokio::time::timeout(self.timeout, delegation).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PaymentError::Communication(format!(
                "callback processing timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl RedeliverCallback for CallbackIngestor {
    /// Replay a queued delivery through the same flow delegation
    ///
    /// No re-enqueue on failure: the worker records the outcome and
    /// the store reschedules or exhausts the entry.
    async fn redeliver(&self, entry: &CallbackRetryEntry) -> anyhow::Result<()> {
        let payment_id = PaymentId::from_string(&entry.payment_id);
        let payment = self.repository.get_by_id(&payment_id).await?;

        let raw_body = entry
            .raw_body()
            .map(|s| s.as_bytes().to_vec())
            .unwrap_or_default();
        let mut data = entry.payload.clone();
        data.remove(RAW_BODY_KEY);

        self.delegate(&payment, &data, &entry.headers, &raw_body)
            .await?;
        Ok(())
    }
}
