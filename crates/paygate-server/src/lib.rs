//! # paygate-server
//!
//! Axum HTTP surface for paygate: the gateway callback endpoint, the
//! payment REST API, and the success/failure redirect pages.
//!
//! The server is a thin layer: handlers translate HTTP to calls on
//! [`AppState`] and map the payment error taxonomy back to wire
//! responses. Everything stateful lives behind the traits in
//! `paygate-core`.

pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    create_payment, failure_redirect, get_payment, handle_callback, health_check, list_payments,
    success_redirect,
};

pub use crate::state::AppState;

/// Handle to a running server
pub struct PaygateHandle {
    /// Base URL, e.g. `http://127.0.0.1:43017`
    pub url: String,

    /// Bound address (useful when listening on port 0)
    pub local_addr: std::net::SocketAddr,

    shutdown: tokio::sync::oneshot::Sender<()>,
}

impl PaygateHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        // Gateway callbacks
        .route("/callback/{payment_id}", post(handle_callback))
        // Payment API
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/{payment_id}", get(get_payment))
        // Post-payment redirects
        .route("/success/{payment_id}", get(success_redirect))
        .route("/failure/{payment_id}", get(failure_redirect))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server. Returns a handle that can shut it down.
pub async fn start(addr: &str, state: AppState) -> anyhow::Result<PaygateHandle> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let url = format!("http://{local_addr}");
    tracing::info!(%url, "paygate listening");

    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .ok();
    });

    Ok(PaygateHandle {
        url,
        local_addr,
        shutdown: tx,
    })
}
