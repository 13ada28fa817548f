//! Checkout settlement orchestration.
//!
//! Turns a buyer's cart into a durable order by sequencing:
//! cart snapshot → payment authorization → inventory commit →
//! payment capture, with compensating actions on failure.
//!
//! The local inventory decrement and the external payment capture
//! cannot share one transaction, so the orchestrator applies the saga
//! pattern: an authorization that outlives a rejected commit is voided,
//! and a capture failure after a committed decrement triggers a
//! re-credit that restores the stock and fails the order.

pub mod error;
pub mod events;
pub mod orchestrator;
pub mod reconcile;
pub mod snapshot;
pub mod state;

pub use error::CheckoutError;
pub use events::{OrderEvent, OrderEvents};
pub use orchestrator::{CheckoutOrchestrator, CheckoutReceipt, CheckoutRequest};
pub use reconcile::{ReconcileReport, Reconciler};
pub use snapshot::{CartSnapshot, snapshot};
pub use state::CheckoutState;
