//! Gateway Configuration
//!
//! Explicit configuration passed to the pieces that need it. Nothing
//! here is process-global: the host constructs one value and hands it
//! to the registry, the flow, and the server.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Payment gateway configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PaygateConfig {
    /// Backend slug used when a request does not name one
    pub default_backend: String,

    /// Where the paying user lands after a successful payment
    pub success_url: String,

    /// Where the paying user lands after a failed payment
    pub failure_url: String,

    /// Per-backend settings blocks, keyed by slug
    pub backends: HashMap<String, serde_json::Value>,

    /// Upper bound on one callback delegation, in seconds
    pub callback_timeout_secs: u64,
}

impl Default for PaygateConfig {
    fn default() -> Self {
        Self {
            default_backend: "dummy".into(),
            success_url: "http://localhost:3000/order/success".into(),
            failure_url: "http://localhost:3000/order/failure".into(),
            backends: HashMap::new(),
            callback_timeout_secs: 30,
        }
    }
}

impl PaygateConfig {
    /// Read configuration from `PAYGATE_*` environment variables
    ///
    /// `PAYGATE_BACKENDS` carries the per-backend settings as inline
    /// JSON, e.g. `{"dummy":{"gateway":"http://localhost:9000","secret":"x"}}`.
    /// A value that does not parse is dropped with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let backends = std::env::var("PAYGATE_BACKENDS")
            .ok()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!(error = %e, "PAYGATE_BACKENDS is not valid JSON, ignoring");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            default_backend: std::env::var("PAYGATE_DEFAULT_BACKEND")
                .unwrap_or(defaults.default_backend),
            success_url: std::env::var("PAYGATE_SUCCESS_URL").unwrap_or(defaults.success_url),
            failure_url: std::env::var("PAYGATE_FAILURE_URL").unwrap_or(defaults.failure_url),
            backends,
            callback_timeout_secs: std::env::var("PAYGATE_CALLBACK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.callback_timeout_secs),
        }
    }

    /// Settings block for a backend, if configured
    pub fn backend_settings(&self, slug: &str) -> Option<&serde_json::Value> {
        self.backends.get(slug)
    }

    /// Callback delegation bound as a `Duration`
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}
