//! HTTP Error Mapping
//!
//! Converts the payment error taxonomy into responses. Statuses and
//! codes are fixed per kind; the body shape is `{"detail", "code"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use paygate_core::{ErrorBody, PaymentError};

/// Errors a handler can return
#[derive(Debug)]
pub enum ApiError {
    /// Classified payment failure; status and code come from the taxonomy
    Payment(PaymentError),

    /// Host-side lookup miss (e.g. unknown order)
    NotFound(String),

    /// Server misconfiguration (e.g. no order resolver wired)
    Configuration(String),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self::Payment(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Payment(err) => (
                StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                ErrorBody::from(&err),
            ),
            ApiError::NotFound(detail) => {
                (StatusCode::NOT_FOUND, ErrorBody::new(detail, "not_found"))
            }
            ApiError::Configuration(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new(detail, "configuration_error"),
            ),
        };
        (status, Json(body)).into_response()
    }
}
