//! Persistence layer for marketplace checkout settlement.
//!
//! The [`MarketStore`] trait covers the three storage concerns checkout
//! depends on: listing catalog and cart reads, the atomic settlement
//! commit (inventory decrement joined with the order insert in one
//! transaction), and the plain order-store façade.
//!
//! Two implementations are provided: [`InMemoryStore`] for tests and
//! development, and [`PostgresStore`] backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StorageError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::MarketStore;
