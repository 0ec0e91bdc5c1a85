//! Processor Interface
//!
//! The contract a payment backend implements: describe itself, prepare
//! a transaction with its gateway, and confirm inbound callbacks.
//! Backends ship as plugins loaded by the registry's discovery step.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::payment::{Order, Payment};

/// Identity and capabilities of a payment backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessorDescriptor {
    /// Stable short identifier (e.g. "dummy", "payu")
    pub slug: String,

    /// Human-readable label
    pub display_name: String,

    /// Currency codes this backend can charge in
    pub accepted_currencies: Vec<String>,
}

impl ProcessorDescriptor {
    pub fn new(
        slug: impl Into<String>,
        display_name: impl Into<String>,
        accepted_currencies: Vec<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            display_name: display_name.into(),
            accepted_currencies,
        }
    }

    /// Check whether this backend accepts a currency (case-insensitive)
    pub fn accepts(&self, currency: &str) -> bool {
        let wanted = currency.to_uppercase();
        self.accepted_currencies
            .iter()
            .any(|c| c.to_uppercase() == wanted)
    }
}

/// What the caller should do next to move a prepared payment forward
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Where to send the paying user, if the gateway is redirect-based
    pub redirect_url: Option<String>,

    /// HTTP method for the redirect or form submission
    pub method: String,

    /// Form fields to POST, for form-based gateways
    pub form_data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TransactionResult {
    /// Plain GET redirect to the gateway
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            redirect_url: Some(url.into()),
            method: "GET".into(),
            form_data: None,
        }
    }

    /// Form POST to the gateway
    pub fn form(
        action: impl Into<String>,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            redirect_url: Some(action.into()),
            method: "POST".into(),
            form_data: Some(fields),
        }
    }
}

/// A payment backend
#[async_trait]
pub trait Processor: Send + Sync {
    /// Identity and accepted currencies
    fn descriptor(&self) -> ProcessorDescriptor;

    /// Register the payment with the gateway and say where to go next
    async fn prepare_transaction(
        &self,
        payment: &Payment,
        order: &Order,
    ) -> Result<TransactionResult>;

    /// Verify and interpret an inbound callback
    ///
    /// Returns the gateway-confirmed payment status. Signature
    /// verification happens here; a failed check is `InvalidCallback`.
    /// `raw_body` is the exact bytes received, since gateway signatures
    /// are computed over them.
    async fn handle_callback(
        &self,
        payment: &Payment,
        data: &serde_json::Map<String, serde_json::Value>,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<String>;
}

/// Factory a backend package exposes for discovery
///
/// Loading parses the backend's settings; a misconfigured plugin fails
/// here rather than at first use.
pub trait ProcessorPlugin: Send + Sync {
    /// Slug the loaded processor will register under
    fn slug(&self) -> &str;

    /// Build a processor from its settings block
    fn load(&self, settings: &serde_json::Value) -> Result<Arc<dyn Processor>>;
}
