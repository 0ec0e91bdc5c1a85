//! Payment Error Taxonomy
//!
//! Closed classification of every failure the payment flow can raise.
//! Each variant carries exactly one stable wire code and HTTP status,
//! fixed across backends; the exhaustive matches below make an
//! unclassified failure impossible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment processing errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Generic processing failure, not more specifically classified
    #[error("Payment processing failed: {0}")]
    Processing(String),

    /// Gateway or downstream unreachable, timed out, or returned 5xx
    #[error("Communication error: {0}")]
    Communication(String),

    /// Gateway rejected or failed the charge itself
    ///
    /// A communication-class failure: it classifies as
    /// `communication_error` and is retryable, but keeps its own
    /// variant so callers can tell a refused charge from a dead wire.
    #[error("Charge failed: {0}")]
    ChargeFailure(String),

    /// Callback failed signature or payload validation
    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    /// Payment flow refused a status change
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Backend credentials missing or malformed
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Referenced payment does not exist
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// No processor registered under the slug
    #[error("Processor not found: {0}")]
    ProcessorNotFound(String),
}

impl PaymentError {
    /// Stable machine-readable code for error responses
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Processing(_) => "payment_error",
            PaymentError::Communication(_) | PaymentError::ChargeFailure(_) => {
                "communication_error"
            }
            PaymentError::InvalidCallback(_) => "invalid_callback",
            PaymentError::InvalidTransition { .. } => "invalid_transition",
            PaymentError::Credentials(_) => "credentials_error",
            PaymentError::PaymentNotFound(_) | PaymentError::ProcessorNotFound(_) => "not_found",
        }
    }

    /// HTTP status for error responses, fixed per kind
    pub fn http_status(&self) -> u16 {
        match self {
            PaymentError::Processing(_) | PaymentError::InvalidCallback(_) => 400,
            PaymentError::Communication(_) | PaymentError::ChargeFailure(_) => 502,
            PaymentError::InvalidTransition { .. } => 409,
            PaymentError::Credentials(_) => 500,
            PaymentError::PaymentNotFound(_) | PaymentError::ProcessorNotFound(_) => 404,
        }
    }

    /// Check if redelivery can succeed without code or config changes
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::Communication(_) | PaymentError::ChargeFailure(_)
        )
    }
}

/// Wire shape of an error response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub detail: String,

    /// Stable machine-readable code
    pub code: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            code: code.into(),
        }
    }
}

impl From<&PaymentError> for ErrorBody {
    fn from(err: &PaymentError) -> Self {
        Self::new(err.to_string(), err.code())
    }
}
