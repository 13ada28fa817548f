//! Domain layer for marketplace checkout settlement.
//!
//! Holds the entities and value objects shared by the storage, gateway,
//! and checkout crates: fixed-point money, listings, cart lines, priced
//! line items frozen at snapshot time, and the order records that form
//! the system of record for what was sold.

pub mod cart;
pub mod error;
pub mod listing;
pub mod money;
pub mod order;
pub mod payment;

pub use cart::{CartLine, PricedLineItem};
pub use error::DomainError;
pub use listing::Listing;
pub use money::Money;
pub use order::{IdempotencyKey, Order, OrderLine, OrderStatus};
pub use payment::PaymentMethod;
