//! Domain error types.

use common::ListingId;
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors arising from domain-level validation and state transitions.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A cart line carried a non-positive quantity.
    #[error("Quantity must be positive for listing {listing_id}")]
    InvalidQuantity { listing_id: ListingId },

    /// An order status transition is not allowed.
    #[error("Invalid order status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// A stored status string could not be parsed.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    /// A stored payment method string could not be parsed.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),
}
