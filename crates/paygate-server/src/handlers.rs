//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use paygate_core::{
    CallbackOutcome, ErrorBody, Payment, PaymentError, PaymentId, TransactionResult,
};

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backends: usize,
}

#[derive(Serialize)]
pub struct CallbackAck {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: String,
    pub amount_required: Decimal,
    pub currency: String,
    pub status: String,
    pub backend: String,
    pub external_id: Option<String>,
    pub description: String,
    pub amount_paid: Decimal,
    pub amount_locked: Decimal,
    pub amount_refunded: Decimal,
    pub fraud_status: Option<String>,
    pub fraud_message: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            order_id: payment.order_id,
            amount_required: payment.amount_required,
            currency: payment.currency,
            status: payment.status,
            backend: payment.backend,
            external_id: payment.external_id,
            description: payment.description,
            amount_paid: payment.amount_paid,
            amount_locked: payment.amount_locked,
            amount_refunded: payment.amount_refunded,
            fraud_status: payment.fraud_status,
            fraud_message: payment.fraud_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentListResponse {
    pub items: Vec<PaymentResponse>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListPaymentsQuery {
    pub order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    pub payment_id: String,
    pub redirect_url: Option<String>,
    pub method: String,
    pub form_data: Option<serde_json::Map<String, serde_json::Value>>,
}

impl CreatePaymentResponse {
    fn new(payment: &Payment, result: TransactionResult) -> Self {
        Self {
            payment_id: payment.id.to_string(),
            redirect_url: result.redirect_url,
            method: result.method,
            form_data: result.form_data,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        backends: state.registry.len(),
    })
}

/// Gateway PUSH callback endpoint
pub async fn handle_callback(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payment_id = PaymentId::from_string(payment_id);

    // An unknown payment outranks a malformed body
    state.repository.get_by_id(&payment_id).await?;

    let data: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&body)
        .map_err(|e| PaymentError::InvalidCallback(format!("malformed JSON body: {e}")))?;

    let outcome = state
        .ingestor
        .ingest(&payment_id, data, collect_headers(&headers), &body)
        .await?;

    match outcome {
        CallbackOutcome::Processed => {
            Ok((StatusCode::OK, Json(CallbackAck { status: "ok" })).into_response())
        }
        CallbackOutcome::QueuedForRetry { reason, .. } => Ok((
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody::new(
                format!("Callback processing failed: {reason}"),
                "callback_failed",
            )),
        )
            .into_response()),
    }
}

/// Get a single payment
pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .repository
        .get_by_id(&PaymentId::from_string(payment_id))
        .await?;
    Ok(Json(payment.into()))
}

/// List payments for an order
pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<PaymentListResponse>, ApiError> {
    let payments = state.repository.list_by_order(&query.order_id).await?;
    let items: Vec<PaymentResponse> = payments.into_iter().map(Into::into).collect();
    let total = items.len();
    Ok(Json(PaymentListResponse { items, total }))
}

/// Create a payment for an order and prepare it with its backend
pub async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentRequest>,
) -> Result<(StatusCode, Json<CreatePaymentResponse>), ApiError> {
    let resolver = state
        .order_resolver
        .as_ref()
        .ok_or_else(|| ApiError::Configuration("No order resolver configured".into()))?;

    let order = resolver
        .resolve(&body.order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {} not found", body.order_id)))?;

    let backend = body
        .backend
        .unwrap_or_else(|| state.config.default_backend.clone());

    let payment = state
        .flow
        .create_payment(&order, &backend, body.amount, body.currency, body.description)
        .await?;
    let result = state.flow.prepare(&payment, &order).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePaymentResponse::new(&payment, result)),
    ))
}

/// Send the paying user to the configured success page
pub async fn success_redirect(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Redirect, ApiError> {
    let payment_id = PaymentId::from_string(payment_id);
    state.repository.get_by_id(&payment_id).await?;

    let url = append_payment_id(&state.config.success_url, payment_id.as_str());
    Ok(Redirect::temporary(&url))
}

/// Send the paying user to the configured failure page
pub async fn failure_redirect(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Redirect, ApiError> {
    let payment_id = PaymentId::from_string(payment_id);
    state.repository.get_by_id(&payment_id).await?;

    let url = append_payment_id(&state.config.failure_url, payment_id.as_str());
    Ok(Redirect::temporary(&url))
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn append_payment_id(url: &str, payment_id: &str) -> String {
    if url.contains('?') {
        format!("{url}&payment_id={payment_id}")
    } else {
        format!("{url}?payment_id={payment_id}")
    }
}
