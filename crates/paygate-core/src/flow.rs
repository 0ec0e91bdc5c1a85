//! Payment Flow
//!
//! The boundary to the component that owns payment lifecycle logic.
//! Callback ingestion only ever talks to this trait; `ProcessorFlow`
//! is the bundled implementation that resolves the backend from the
//! registry and applies gateway-reported statuses verbatim.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::payment::{NewPayment, Order, Payment, PaymentRepository};
use crate::processor::TransactionResult;
use crate::registry::ProcessorRegistry;

/// Payment lifecycle operations, as ingestion and the HTTP layer see them
#[async_trait]
pub trait PaymentFlow: Send + Sync {
    /// Open a payment for an order
    ///
    /// Amount, currency, and description default from the order when
    /// not given.
    async fn create_payment(
        &self,
        order: &Order,
        backend: &str,
        amount: Option<Decimal>,
        currency: Option<String>,
        description: Option<String>,
    ) -> Result<Payment>;

    /// Register the payment with its gateway and say where to go next
    async fn prepare(&self, payment: &Payment, order: &Order) -> Result<TransactionResult>;

    /// Apply one gateway callback to the payment
    async fn handle_callback(
        &self,
        payment: &Payment,
        data: &serde_json::Map<String, serde_json::Value>,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<()>;
}

/// Flow implementation backed by the processor registry
///
/// Status transition legality is not checked here: whatever status the
/// backend confirms is written to the repository. Repeated deliveries
/// of the same status land on the same value, which keeps overlapping
/// redelivery paths safe.
pub struct ProcessorFlow {
    repository: Arc<dyn PaymentRepository>,
    registry: Arc<ProcessorRegistry>,
}

impl ProcessorFlow {
    pub fn new(repository: Arc<dyn PaymentRepository>, registry: Arc<ProcessorRegistry>) -> Self {
        Self {
            repository,
            registry,
        }
    }
}

#[async_trait]
impl PaymentFlow for ProcessorFlow {
    async fn create_payment(
        &self,
        order: &Order,
        backend: &str,
        amount: Option<Decimal>,
        currency: Option<String>,
        description: Option<String>,
    ) -> Result<Payment> {
        // Fail before persisting anything if the backend is unknown
        self.registry.get_by_slug(backend)?;

        let payment = self
            .repository
            .create(NewPayment {
                order_id: order.id.clone(),
                backend: backend.to_string(),
                amount_required: amount.unwrap_or(order.total),
                currency: currency.unwrap_or_else(|| order.currency.clone()),
                description: description.unwrap_or_else(|| order.description.clone()),
            })
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %order.id,
            backend = %backend,
            "Payment created"
        );
        Ok(payment)
    }

    async fn prepare(&self, payment: &Payment, order: &Order) -> Result<TransactionResult> {
        let processor = self.registry.get_by_slug(&payment.backend)?;
        processor.prepare_transaction(payment, order).await
    }

    async fn handle_callback(
        &self,
        payment: &Payment,
        data: &serde_json::Map<String, serde_json::Value>,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<()> {
        let processor = self.registry.get_by_slug(&payment.backend)?;
        let status = processor
            .handle_callback(payment, data, headers, raw_body)
            .await?;

        let external_id = data.get("external_id").and_then(|v| v.as_str());
        self.repository
            .update_status(&payment.id, &status, external_id)
            .await?;

        tracing::info!(
            payment_id = %payment.id,
            status = %status,
            "Payment status updated from callback"
        );
        Ok(())
    }
}
