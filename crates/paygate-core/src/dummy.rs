//! Dummy Backend
//!
//! Built-in processor for a simple push-confirmation gateway: prepare
//! registers the payment over REST and redirects the user to the
//! returned gateway page; callbacks are authenticated with an
//! HMAC-SHA256 signature over the raw body.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::payment::{Order, Payment};
use crate::processor::{Processor, ProcessorDescriptor, ProcessorPlugin, TransactionResult};

type HmacSha256 = Hmac<Sha256>;

/// Signature header the gateway sends with each callback
pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

const DEFAULT_CURRENCIES: &[&str] = &["EUR", "USD", "PLN"];

/// Settings block for the dummy backend
#[derive(Debug, Deserialize)]
struct DummySettings {
    /// Gateway base URL, e.g. `http://localhost:9000/paywall`
    gateway: String,

    /// Shared secret for callback signatures
    secret: String,

    /// Base URL the gateway should post callbacks to, if any
    #[serde(default)]
    callback_base: Option<String>,

    /// Accepted currencies (defaults to EUR/USD/PLN)
    #[serde(default)]
    currencies: Option<Vec<String>>,
}

/// Processor for the dummy push-confirmation gateway
pub struct DummyProcessor {
    settings: DummySettings,
    client: reqwest::Client,
}

impl DummyProcessor {
    fn new(settings: DummySettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    fn currencies(&self) -> Vec<String> {
        self.settings.currencies.clone().unwrap_or_else(|| {
            DEFAULT_CURRENCIES.iter().map(|c| (*c).to_string()).collect()
        })
    }

    /// Constant-time check of the header value against HMAC-SHA256 of
    /// the raw body
    fn verify_signature(&self, raw_body: &[u8], signature: &str) -> Result<()> {
        // Malformed hex answers the same way as a wrong MAC
        let sig = hex::decode(signature.trim())
            .map_err(|_| PaymentError::InvalidCallback("signature mismatch".to_string()))?;
        let mut mac = HmacSha256::new_from_slice(self.settings.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(raw_body);
        mac.verify_slice(&sig)
            .map_err(|_| PaymentError::InvalidCallback("signature mismatch".to_string()))
    }

    fn signature_from(headers: &HashMap<String, String>) -> Option<&str> {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(SIGNATURE_HEADER))
            .map(|(_, value)| value.as_str())
    }
}

#[async_trait]
impl Processor for DummyProcessor {
    fn descriptor(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new("dummy", "Dummy Gateway", self.currencies())
    }

    async fn prepare_transaction(
        &self,
        payment: &Payment,
        order: &Order,
    ) -> Result<TransactionResult> {
        let mut registration = serde_json::json!({
            "ext_id": payment.id.as_str(),
            "value": payment.amount_required.to_string(),
            "currency": payment.currency,
            "description": order.description,
        });
        if let Some(base) = &self.settings.callback_base {
            registration["callback"] = serde_json::Value::String(format!(
                "{}/callback/{}",
                base.trim_end_matches('/'),
                payment.id
            ));
        }

        let url = format!("{}/register", self.settings.gateway.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&registration)
            .send()
            .await
            .map_err(|e| PaymentError::Communication(format!("gateway unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(PaymentError::ChargeFailure(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaymentError::Communication(format!("invalid gateway response: {e}")))?;
        let redirect = body["url"].as_str().ok_or_else(|| {
            PaymentError::Communication("gateway response missing url".to_string())
        })?;

        tracing::debug!(payment_id = %payment.id, redirect = %redirect, "Payment registered with gateway");
        Ok(TransactionResult::redirect(redirect))
    }

    async fn handle_callback(
        &self,
        _payment: &Payment,
        data: &serde_json::Map<String, serde_json::Value>,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
    ) -> Result<String> {
        let signature = Self::signature_from(headers).ok_or_else(|| {
            PaymentError::InvalidCallback(format!("missing {SIGNATURE_HEADER} header"))
        })?;

        // Signatures are computed over the exact bytes received
        self.verify_signature(raw_body, signature)?;

        data.get("status")
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| PaymentError::InvalidCallback("missing status field".to_string()))
    }
}

/// Discovery plugin for the dummy backend
pub struct DummyPlugin;

impl ProcessorPlugin for DummyPlugin {
    fn slug(&self) -> &str {
        "dummy"
    }

    fn load(&self, settings: &serde_json::Value) -> Result<Arc<dyn Processor>> {
        let settings: DummySettings = serde_json::from_value(settings.clone())
            .map_err(|e| PaymentError::Credentials(format!("dummy backend settings: {e}")))?;
        Ok(Arc::new(DummyProcessor::new(settings)))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::payment::NewPayment;

    fn processor(secret: &str) -> DummyProcessor {
        DummyProcessor::new(DummySettings {
            gateway: "http://localhost:9000/paywall".into(),
            secret: secret.into(),
            callback_base: None,
            currencies: None,
        })
    }

    fn payment() -> Payment {
        Payment::new(NewPayment {
            order_id: "ord-1".into(),
            backend: "dummy".into(),
            amount_required: Decimal::ONE,
            currency: "EUR".into(),
            description: "Order".into(),
        })
    }

    fn order() -> Order {
        Order {
            id: "ord-1".into(),
            total: Decimal::ONE,
            currency: "EUR".into(),
            description: "Order".into(),
        }
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_plugin_requires_gateway_and_secret() {
        let err = DummyPlugin
            .load(&serde_json::json!({}))
            .err()
            .expect("load without gateway/secret should fail");
        assert!(matches!(err, PaymentError::Credentials(_)));

        let err = DummyPlugin
            .load(&serde_json::json!({"gateway": "http://localhost:9000"}))
            .err()
            .expect("load without secret should fail");
        assert!(matches!(err, PaymentError::Credentials(_)));

        let loaded = DummyPlugin
            .load(&serde_json::json!({
                "gateway": "http://localhost:9000",
                "secret": "hunter2",
            }))
            .unwrap();
        assert_eq!(loaded.descriptor().slug, "dummy");
    }

    #[test]
    fn test_plugin_honors_configured_currencies() {
        let loaded = DummyPlugin
            .load(&serde_json::json!({
                "gateway": "http://localhost:9000",
                "secret": "hunter2",
                "currencies": ["GBP"],
            }))
            .unwrap();

        assert!(loaded.descriptor().accepts("GBP"));
        assert!(!loaded.descriptor().accepts("EUR"));
    }

    #[test]
    fn test_default_currencies() {
        let descriptor = processor("s").descriptor();
        assert!(descriptor.accepts("EUR"));
        assert!(descriptor.accepts("USD"));
        assert!(descriptor.accepts("PLN"));
    }

    #[tokio::test]
    async fn test_callback_rejects_missing_signature() {
        let p = processor("hunter2");
        let body = br#"{"status":"paid"}"#;
        let data = serde_json::from_slice(body).unwrap();

        let err = p
            .handle_callback(&payment(), &data, &HashMap::new(), body)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidCallback(_)));
    }

    #[tokio::test]
    async fn test_callback_rejects_wrong_signature() {
        let p = processor("hunter2");
        let body = br#"{"status":"paid"}"#;
        let data = serde_json::from_slice(body).unwrap();
        let mut headers = HashMap::new();
        headers.insert(
            SIGNATURE_HEADER.to_string(),
            sign("other-secret", body),
        );

        let err = p
            .handle_callback(&payment(), &data, &headers, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidCallback(_)));
    }

    #[tokio::test]
    async fn test_callback_rejects_tampered_signature() {
        let p = processor("hunter2");
        let body = br#"{"status":"paid"}"#;
        let data = serde_json::from_slice(body).unwrap();

        // Valid signature with only the final hex digit changed
        let mut sig = sign("hunter2", body);
        let flipped = if sig.ends_with('0') { '1' } else { '0' };
        sig.pop();
        sig.push(flipped);

        let mut headers = HashMap::new();
        headers.insert(SIGNATURE_HEADER.to_string(), sig);
        let err = p
            .handle_callback(&payment(), &data, &headers, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidCallback(_)));
    }

    #[tokio::test]
    async fn test_callback_rejects_malformed_signature() {
        let p = processor("hunter2");
        let body = br#"{"status":"paid"}"#;
        let data = serde_json::from_slice(body).unwrap();

        // Not hex, and hex of the wrong length
        for forged in ["zz".repeat(32), "deadbeef".to_string()] {
            let mut headers = HashMap::new();
            headers.insert(SIGNATURE_HEADER.to_string(), forged);
            let err = p
                .handle_callback(&payment(), &data, &headers, body)
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::InvalidCallback(_)));
        }
    }

    #[tokio::test]
    async fn test_callback_signature_covers_exact_bytes() {
        let p = processor("hunter2");
        let body = br#"{"status":  "paid"}"#;
        let data = serde_json::from_slice(body).unwrap();
        let mut headers = HashMap::new();
        // Signed over a normalized form of the same JSON
        headers.insert(
            SIGNATURE_HEADER.to_string(),
            sign("hunter2", br#"{"status":"paid"}"#),
        );

        let err = p
            .handle_callback(&payment(), &data, &headers, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidCallback(_)));
    }

    #[tokio::test]
    async fn test_callback_accepts_valid_signature() {
        let p = processor("hunter2");
        let body = br#"{"status":"paid"}"#;
        let data = serde_json::from_slice(body).unwrap();
        let mut headers = HashMap::new();
        // Header name arrives lowercased, value uppercased
        headers.insert(
            "x-gateway-signature".to_string(),
            sign("hunter2", body).to_uppercase(),
        );

        let status = p
            .handle_callback(&payment(), &data, &headers, body)
            .await
            .unwrap();
        assert_eq!(status, "paid");
    }

    #[tokio::test]
    async fn test_callback_requires_status_field() {
        let p = processor("hunter2");
        let body = br#"{"paid": true}"#;
        let data = serde_json::from_slice(body).unwrap();
        let mut headers = HashMap::new();
        headers.insert(SIGNATURE_HEADER.to_string(), sign("hunter2", body));

        let err = p
            .handle_callback(&payment(), &data, &headers, body)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidCallback(_)));
    }

    #[tokio::test]
    async fn test_prepare_against_dead_gateway_is_communication() {
        // Nothing listens on port 9; the connection fails immediately
        let p = DummyProcessor::new(DummySettings {
            gateway: "http://127.0.0.1:9/paywall".into(),
            secret: "hunter2".into(),
            callback_base: None,
            currencies: None,
        });

        let err = p
            .prepare_transaction(&payment(), &order())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Communication(_)));
    }
}
