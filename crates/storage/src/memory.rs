use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, ListingId, OrderId};
use domain::{CartLine, DomainError, IdempotencyKey, Listing, Money, Order, OrderLine, OrderStatus};
use tokio::sync::RwLock;

use crate::{MarketStore, Result, StorageError};

#[derive(Debug, Default)]
struct StoreState {
    listings: HashMap<ListingId, Listing>,
    carts: HashMap<BuyerId, Vec<CartLine>>,
    orders: HashMap<OrderId, Order>,
    order_lines: HashMap<OrderId, Vec<OrderLine>>,
}

/// In-memory marketplace store for testing and development.
///
/// Provides the same interface and atomicity guarantees as the
/// PostgreSQL implementation: the settlement commit runs entirely under
/// a single write guard, so concurrent checkouts serialize on it and
/// either all of a commit's effects are visible or none are.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a listing.
    pub async fn insert_listing(&self, listing: Listing) {
        self.state
            .write()
            .await
            .listings
            .insert(listing.id, listing);
    }

    /// Replaces a buyer's cart.
    pub async fn set_cart(&self, buyer: BuyerId, lines: Vec<CartLine>) {
        self.state.write().await.carts.insert(buyer, lines);
    }

    /// Returns the available quantity of a listing, if it exists.
    pub async fn quantity_available(&self, id: ListingId) -> Option<u32> {
        self.state
            .read()
            .await
            .listings
            .get(&id)
            .map(|l| l.quantity_available)
    }

    /// Updates a listing's unit price.
    pub async fn set_listing_price(&self, id: ListingId, unit_price: Money) {
        if let Some(listing) = self.state.write().await.listings.get_mut(&id) {
            listing.unit_price = unit_price;
        }
    }

    /// Activates or deactivates a listing.
    pub async fn set_listing_active(&self, id: ListingId, active: bool) {
        if let Some(listing) = self.state.write().await.listings.get_mut(&id) {
            listing.active = active;
        }
    }

    /// Returns the total number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        Ok(self.state.read().await.listings.get(&id).cloned())
    }

    async fn cart_lines(&self, buyer: BuyerId) -> Result<Vec<CartLine>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .get(&buyer)
            .cloned()
            .unwrap_or_default())
    }

    async fn clear_cart(&self, buyer: BuyerId) -> Result<()> {
        self.state.write().await.carts.remove(&buyer);
        Ok(())
    }

    async fn commit_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()> {
        // The whole commit runs under one write guard, mirroring the
        // row-locked transaction of the Postgres store.
        let mut state = self.state.write().await;

        if state
            .orders
            .values()
            .any(|o| o.idempotency_key == order.idempotency_key)
        {
            return Err(StorageError::DuplicateKey(order.idempotency_key.clone()));
        }

        // Evaluate every line before touching any quantity.
        let mut rejected: Vec<ListingId> = Vec::new();
        for line in lines {
            match state.listings.get(&line.listing_id) {
                Some(listing) if listing.can_fulfill(line.quantity) => {}
                _ => rejected.push(line.listing_id),
            }
        }
        if !rejected.is_empty() {
            rejected.sort();
            return Err(StorageError::InsufficientStock {
                listing_ids: rejected,
            });
        }

        for line in lines {
            if let Some(listing) = state.listings.get_mut(&line.listing_id) {
                listing.quantity_available -= line.quantity;
            }
        }
        state.orders.insert(order.id, order.clone());
        state.order_lines.insert(order.id, lines.to_vec());
        Ok(())
    }

    async fn recredit_order(&self, order_id: OrderId, reason: &str) -> Result<()> {
        let mut state = self.state.write().await;

        let status = state
            .orders
            .get(&order_id)
            .map(|o| o.status)
            .ok_or(StorageError::OrderNotFound(order_id))?;

        // Retried compensations land here; nothing left to restore.
        if status == OrderStatus::Failed {
            return Ok(());
        }
        // Validate the transition before touching any quantity; a
        // confirmed sale keeps its decrement.
        if !status.can_fail() {
            return Err(StorageError::Domain(DomainError::InvalidStatusTransition {
                from: status,
                to: OrderStatus::Failed,
            }));
        }

        let lines = state.order_lines.get(&order_id).cloned().unwrap_or_default();
        for line in &lines {
            if let Some(listing) = state.listings.get_mut(&line.listing_id) {
                listing.quantity_available += line.quantity;
            }
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.fail(reason)?;
        }
        Ok(())
    }

    async fn mark_confirmed(&self, order_id: OrderId) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StorageError::OrderNotFound(order_id))?;
        order.confirm()?;
        Ok(())
    }

    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or(StorageError::OrderNotFound(order_id))?;
        order.fail(reason)?;
        Ok(())
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&order_id).cloned())
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        Ok(self
            .state
            .read()
            .await
            .order_lines
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn orders_for_buyer(&self, buyer: BuyerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| o.buyer_id == buyer)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn order_for_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .find(|o| &o.idempotency_key == key)
            .cloned())
    }

    async fn stale_pending_orders(&self, older_than: DateTime<Utc>) -> Result<Vec<Order>> {
        Ok(self
            .state
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < older_than)
            .cloned()
            .collect())
    }
}
