//! Shared identifier types used across the marketplace checkout crates.

pub mod types;

pub use types::{BuyerId, IntentRef, ListingId, OrderId};
