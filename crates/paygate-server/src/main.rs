//! paygate HTTP Server
//!
//! Axum-based server exposing the payment API, gateway callbacks, and
//! post-payment redirects, with a background redelivery worker for
//! failed callbacks.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use paygate_core::{
    CallbackIngestor, DummyPlugin, MemoryPaymentRepository, PaygateConfig, ProcessorFlow,
    ProcessorPlugin, ProcessorRegistry,
};
use paygate_retry::{MemoryRetryStore, RedeliveryWorker, WorkerConfig};
use paygate_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = Arc::new(PaygateConfig::from_env());

    // Storage (in-memory; swap for a persistent implementation in production)
    let repository = Arc::new(MemoryPaymentRepository::new());
    let retry_store = Arc::new(MemoryRetryStore::default());

    // Discover payment backends
    let registry = Arc::new(ProcessorRegistry::new());
    let plugins: Vec<Arc<dyn ProcessorPlugin>> = vec![Arc::new(DummyPlugin)];
    let summary = registry.discover(&plugins, &config);

    tracing::info!("Registered {} payment backends:", summary.registered);
    for slug in registry.slugs() {
        tracing::info!("  • {}", slug);
    }
    for (slug, error) in &summary.failed {
        tracing::warn!("⚠ Backend '{}' failed to load: {}", slug, error);
        tracing::warn!("  Set its settings block in PAYGATE_BACKENDS");
    }

    // Payment flow and callback ingestion
    let flow = Arc::new(ProcessorFlow::new(repository.clone(), registry.clone()));
    let ingestor = Arc::new(CallbackIngestor::new(
        repository.clone(),
        flow.clone(),
        retry_store.clone(),
        config.callback_timeout(),
    ));

    // Background redelivery of queued callbacks
    let (worker_shutdown, worker_signal) = tokio::sync::watch::channel(false);
    let worker = RedeliveryWorker::new(
        retry_store.clone(),
        ingestor.clone(),
        WorkerConfig::default(),
    );
    let worker_task = tokio::spawn(worker.run(worker_signal));

    // Order resolution is host-application territory; without it the
    // payment-creation route reports a configuration error.
    tracing::warn!("⚠ No order resolver configured - POST /payments disabled");

    let state = AppState {
        config: config.clone(),
        repository,
        registry,
        flow,
        order_resolver: None,
        ingestor,
    };

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let handle = paygate_server::start(&addr, state).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 paygate server running on {}", handle.url);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                 - Health check");
    tracing::info!("  POST /callback/{{payment_id}}  - Gateway PUSH callback");
    tracing::info!("  POST /payments               - Create payment");
    tracing::info!("  GET  /payments?order_id=     - List payments for order");
    tracing::info!("  GET  /payments/{{payment_id}}  - Get payment");
    tracing::info!("  GET  /success/{{payment_id}}   - Success redirect");
    tracing::info!("  GET  /failure/{{payment_id}}   - Failure redirect");
    tracing::info!("");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    let _ = worker_shutdown.send(true);
    let _ = worker_task.await;
    handle.shutdown().await;

    Ok(())
}
