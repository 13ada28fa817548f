use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, ListingId, OrderId};
use domain::{CartLine, IdempotencyKey, Listing, Order, OrderLine};

use crate::Result;

/// Core trait for marketplace storage implementations.
///
/// Groups the listing catalog and cart reads consumed by the cart
/// snapshot, the settlement commit boundary, and the order-store
/// façade. All implementations must be thread-safe (Send + Sync);
/// concurrency correctness is the implementation's responsibility —
/// callers hold no locks of their own.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Fetches a listing by ID.
    ///
    /// Returns None if the listing does not exist.
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>>;

    /// Fetches the current cart lines for a buyer.
    async fn cart_lines(&self, buyer: BuyerId) -> Result<Vec<CartLine>>;

    /// Empties a buyer's cart.
    async fn clear_cart(&self, buyer: BuyerId) -> Result<()>;

    /// Commits a settled checkout: decrements every listing quantity and
    /// inserts the pending order with its lines, all in one transaction.
    ///
    /// Every involved listing is locked (or the equivalent) in ascending
    /// listing-id order before any quantity check. If any listing is
    /// inactive, missing, or short of stock, the whole operation fails
    /// with `InsufficientStock` and no row is modified. Fails with
    /// `DuplicateKey` if an order already exists for the order's
    /// idempotency key.
    async fn commit_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()>;

    /// Compensating re-credit after a post-commit capture failure:
    /// restores the decremented quantities from the order's lines and
    /// marks the order failed, in one transaction.
    ///
    /// Idempotent: re-crediting an already-failed order is a no-op, so
    /// the caller can retry until it succeeds.
    async fn recredit_order(&self, order_id: OrderId, reason: &str) -> Result<()>;

    /// Marks a pending order confirmed.
    async fn mark_confirmed(&self, order_id: OrderId) -> Result<()>;

    /// Marks a pending order failed with a reason. Does not touch
    /// inventory; use [`recredit_order`](Self::recredit_order) when stock
    /// must be restored.
    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<()>;

    /// Fetches an order by ID.
    async fn order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Fetches the lines of an order.
    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Lists a buyer's orders, newest first.
    async fn orders_for_buyer(&self, buyer: BuyerId) -> Result<Vec<Order>>;

    /// Looks up the order previously created under an idempotency key.
    async fn order_for_key(&self, key: &IdempotencyKey) -> Result<Option<Order>>;

    /// Lists pending orders created before the cutoff, for the
    /// reconciliation sweep.
    async fn stale_pending_orders(&self, older_than: DateTime<Utc>) -> Result<Vec<Order>>;
}

// Lets callers that hold a shared store (the web layer, the sweep task)
// pass it wherever a `MarketStore` is expected.
#[async_trait]
impl<T: MarketStore + ?Sized> MarketStore for std::sync::Arc<T> {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        (**self).listing(id).await
    }

    async fn cart_lines(&self, buyer: BuyerId) -> Result<Vec<CartLine>> {
        (**self).cart_lines(buyer).await
    }

    async fn clear_cart(&self, buyer: BuyerId) -> Result<()> {
        (**self).clear_cart(buyer).await
    }

    async fn commit_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()> {
        (**self).commit_order(order, lines).await
    }

    async fn recredit_order(&self, order_id: OrderId, reason: &str) -> Result<()> {
        (**self).recredit_order(order_id, reason).await
    }

    async fn mark_confirmed(&self, order_id: OrderId) -> Result<()> {
        (**self).mark_confirmed(order_id).await
    }

    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<()> {
        (**self).mark_failed(order_id, reason).await
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).order(order_id).await
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        (**self).order_lines(order_id).await
    }

    async fn orders_for_buyer(&self, buyer: BuyerId) -> Result<Vec<Order>> {
        (**self).orders_for_buyer(buyer).await
    }

    async fn order_for_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        (**self).order_for_key(key).await
    }

    async fn stale_pending_orders(&self, older_than: DateTime<Utc>) -> Result<Vec<Order>> {
        (**self).stale_pending_orders(older_than).await
    }
}
