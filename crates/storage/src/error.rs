//! Storage error types.

use common::{ListingId, OrderId};
use domain::{DomainError, IdempotencyKey};
use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// One or more listings could not satisfy the requested quantity
    /// (short stock, inactive, or deleted). Nothing was modified.
    #[error("Insufficient stock for listings: {}", format_ids(.listing_ids))]
    InsufficientStock { listing_ids: Vec<ListingId> },

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Another order already exists for this idempotency key.
    #[error("An order already exists for idempotency key {0}")]
    DuplicateKey(IdempotencyKey),

    /// A domain invariant was violated while mutating stored state.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

fn format_ids(ids: &[ListingId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
