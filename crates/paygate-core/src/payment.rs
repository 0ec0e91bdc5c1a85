//! Payment Model
//!
//! Payment records and the repository boundary. Status values are
//! opaque strings here: the legality of status transitions is owned by
//! the external payment flow, this crate only stores what it is told.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};

/// Unique payment identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(String);

impl PaymentId {
    /// Generate a new random payment id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Parse from string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payment record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id
    pub id: PaymentId,

    /// Order this payment pays for
    pub order_id: String,

    /// Amount the gateway is asked to collect
    pub amount_required: Decimal,

    /// ISO currency code
    pub currency: String,

    /// Current status as reported by the payment flow (opaque)
    pub status: String,

    /// Backend slug handling this payment
    pub backend: String,

    /// Gateway-side identifier, once known
    pub external_id: Option<String>,

    /// Human-readable description shown at the gateway
    pub description: String,

    /// Amount confirmed paid
    pub amount_paid: Decimal,

    /// Amount locked by a pre-authorization
    pub amount_locked: Decimal,

    /// Amount refunded
    pub amount_refunded: Decimal,

    /// Fraud screening verdict, if the gateway reported one
    pub fraud_status: Option<String>,

    /// Fraud screening message
    pub fraud_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Fields needed to open a payment
#[derive(Clone, Debug, Deserialize)]
pub struct NewPayment {
    pub order_id: String,
    pub backend: String,
    pub amount_required: Decimal,
    pub currency: String,
    pub description: String,
}

impl Payment {
    /// Create a fresh payment in status `new`
    pub fn new(fields: NewPayment) -> Self {
        Self {
            id: PaymentId::new(),
            order_id: fields.order_id,
            amount_required: fields.amount_required,
            currency: fields.currency,
            status: "new".into(),
            backend: fields.backend,
            external_id: None,
            description: fields.description,
            amount_paid: Decimal::ZERO,
            amount_locked: Decimal::ZERO,
            amount_refunded: Decimal::ZERO,
            fraud_status: None,
            fraud_message: None,
            created_at: Utc::now(),
        }
    }
}

/// Payment storage trait
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Load a payment; unknown ids fail with `PaymentNotFound`
    async fn get_by_id(&self, id: &PaymentId) -> Result<Payment>;

    /// Open a new payment
    async fn create(&self, fields: NewPayment) -> Result<Payment>;

    /// Save or update a payment
    async fn save(&self, payment: &Payment) -> Result<()>;

    /// Apply a gateway-reported status, recording the gateway's id
    async fn update_status(
        &self,
        id: &PaymentId,
        status: &str,
        external_id: Option<&str>,
    ) -> Result<Payment>;

    /// All payments opened for an order, oldest first
    async fn list_by_order(&self, order_id: &str) -> Result<Vec<Payment>>;
}

/// In-memory payment repository (for development and tests)
pub struct MemoryPaymentRepository {
    payments: RwLock<HashMap<PaymentId, Payment>>,
}

impl Default for MemoryPaymentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPaymentRepository {
    pub fn new() -> Self {
        Self {
            payments: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl PaymentRepository for MemoryPaymentRepository {
    async fn get_by_id(&self, id: &PaymentId) -> Result<Payment> {
        let payments = self.payments.read().await;
        payments
            .get(id)
            .cloned()
            .ok_or_else(|| PaymentError::PaymentNotFound(id.to_string()))
    }

    async fn create(&self, fields: NewPayment) -> Result<Payment> {
        let payment = Payment::new(fields);
        let mut payments = self.payments.write().await;
        payments.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    async fn save(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        payments.insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: &PaymentId,
        status: &str,
        external_id: Option<&str>,
    ) -> Result<Payment> {
        let mut payments = self.payments.write().await;
        let payment = payments
            .get_mut(id)
            .ok_or_else(|| PaymentError::PaymentNotFound(id.to_string()))?;

        payment.status = status.to_string();
        if let Some(external) = external_id {
            payment.external_id = Some(external.to_string());
        }

        Ok(payment.clone())
    }

    async fn list_by_order(&self, order_id: &str) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut found: Vec<_> = payments
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

/// An order as the host application sees it
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    /// Order id in the host application
    pub id: String,

    /// Total to collect
    pub total: Decimal,

    /// ISO currency code
    pub currency: String,

    /// Description shown at the gateway
    pub description: String,
}

/// Order lookup provided by the host application
#[async_trait]
pub trait OrderResolver: Send + Sync {
    /// Resolve an order id; `Ok(None)` means the order does not exist
    async fn resolve(&self, order_id: &str) -> Result<Option<Order>>;
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn new_fields(order_id: &str) -> NewPayment {
        NewPayment {
            order_id: order_id.into(),
            backend: "dummy".into(),
            amount_required: dec!(99.90),
            currency: "EUR".into(),
            description: "Order".into(),
        }
    }

    #[test]
    fn test_new_payment_defaults() {
        let payment = Payment::new(new_fields("ord-1"));

        assert_eq!(payment.status, "new");
        assert_eq!(payment.amount_required, dec!(99.90));
        assert_eq!(payment.amount_paid, Decimal::ZERO);
        assert_eq!(payment.amount_locked, Decimal::ZERO);
        assert_eq!(payment.amount_refunded, Decimal::ZERO);
        assert!(payment.external_id.is_none());
        assert!(payment.fraud_status.is_none());
    }

    #[tokio::test]
    async fn test_get_by_id_unknown_payment() {
        let repo = MemoryPaymentRepository::new();
        let missing = PaymentId::from_string("pay-missing");

        assert!(matches!(
            repo.get_by_id(&missing).await,
            Err(PaymentError::PaymentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let repo = MemoryPaymentRepository::new();
        let created = repo.create(new_fields("ord-1")).await.unwrap();

        let loaded = repo.get_by_id(&created.id).await.unwrap();
        assert_eq!(loaded.order_id, "ord-1");
        assert_eq!(loaded.backend, "dummy");
    }

    #[tokio::test]
    async fn test_update_status_records_external_id() {
        let repo = MemoryPaymentRepository::new();
        let created = repo.create(new_fields("ord-1")).await.unwrap();

        let updated = repo
            .update_status(&created.id, "paid", Some("gw-42"))
            .await
            .unwrap();
        assert_eq!(updated.status, "paid");
        assert_eq!(updated.external_id.as_deref(), Some("gw-42"));

        // A later update without an external id keeps the recorded one
        let updated = repo.update_status(&created.id, "refunded", None).await.unwrap();
        assert_eq!(updated.status, "refunded");
        assert_eq!(updated.external_id.as_deref(), Some("gw-42"));
    }

    #[tokio::test]
    async fn test_list_by_order_in_creation_order() {
        let repo = MemoryPaymentRepository::new();
        let first = repo.create(new_fields("ord-1")).await.unwrap();
        let second = repo.create(new_fields("ord-1")).await.unwrap();
        repo.create(new_fields("ord-2")).await.unwrap();

        let listed = repo.list_by_order("ord-1").await.unwrap();
        let ids: Vec<_> = listed.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}
