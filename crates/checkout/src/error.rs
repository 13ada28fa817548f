//! Checkout error taxonomy.

use common::{ListingId, OrderId};
use domain::DomainError;
use storage::StorageError;
use thiserror::Error;

/// Errors reported to the buyer for a failed checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart had no usable lines left after the snapshot.
    #[error("Cart is empty")]
    EmptyCart,

    /// The gateway refused the authorization for a non-payment reason.
    #[error("Payment authorization failed: {reason}")]
    AuthorizationFailed { reason: String },

    /// The provider declined the payment; the buyer must change payment
    /// method. Not retryable.
    #[error("Payment declined: {0}")]
    GatewayDeclined(String),

    /// The provider could not be reached; nothing was reserved or
    /// committed. Safe to retry.
    #[error("Payment provider unavailable: {0}")]
    GatewayUnavailable(String),

    /// The named listings lost availability mid-checkout. Nothing was
    /// committed and the authorization was voided; the buyer can adjust
    /// their cart and retry.
    #[error("Listings no longer available: {}", format_ids(.0))]
    InventoryRejected(Vec<ListingId>),

    /// The settlement transaction failed for a non-stock reason.
    #[error("Order could not be committed: {0}")]
    CommitFailed(String),

    /// Capture failed after the local commit. The buyer was not charged
    /// and the stock was restored; the order is recorded as failed.
    #[error("Payment capture failed for order {order_id}; no charge was made and the items were restored")]
    CaptureFailed { order_id: OrderId },

    /// Storage error outside the taxonomy above.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl CheckoutError {
    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::GatewayUnavailable(_))
    }
}

fn format_ids(ids: &[ListingId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
