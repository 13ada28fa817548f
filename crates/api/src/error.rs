//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout settlement error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    let status = match &err {
        CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
        // The buyer must change payment method; retrying as-is cannot
        // succeed.
        CheckoutError::GatewayDeclined(_) | CheckoutError::AuthorizationFailed { .. } => {
            StatusCode::PAYMENT_REQUIRED
        }
        CheckoutError::InventoryRejected(_) => StatusCode::CONFLICT,
        CheckoutError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        CheckoutError::CaptureFailed { .. } => StatusCode::BAD_GATEWAY,
        CheckoutError::CommitFailed(_)
        | CheckoutError::Storage(_)
        | CheckoutError::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "checkout failed with a server error");
    }
    (status, err.to_string())
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<storage::StorageError> for ApiError {
    fn from(err: storage::StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
