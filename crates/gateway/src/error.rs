//! Gateway error types.

use common::IntentRef;
use thiserror::Error;

/// Errors returned by payment gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The provider could not be reached or timed out. Safe to retry;
    /// no funds were reserved.
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),

    /// The provider declined the authorization. Not retryable; the
    /// buyer must change payment method.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// A previously authorized intent could not be captured.
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// A void of a not-yet-captured authorization failed.
    #[error("Void failed: {0}")]
    VoidFailed(String),

    /// The provider has no record of the intent reference.
    #[error("Unknown payment intent: {0}")]
    UnknownIntent(IntentRef),
}

impl GatewayError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
