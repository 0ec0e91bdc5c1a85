//! Application State

use std::sync::Arc;

use paygate_core::{
    CallbackIngestor, OrderResolver, PaygateConfig, PaymentFlow, PaymentRepository,
    ProcessorRegistry,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration
    pub config: Arc<PaygateConfig>,

    /// Payment storage
    pub repository: Arc<dyn PaymentRepository>,

    /// Registered payment backends
    pub registry: Arc<ProcessorRegistry>,

    /// Payment lifecycle operations
    pub flow: Arc<dyn PaymentFlow>,

    /// Order lookup (optional - None disables payment creation)
    pub order_resolver: Option<Arc<dyn OrderResolver>>,

    /// Webhook ingestion with retry queueing
    pub ingestor: Arc<CallbackIngestor>,
}
