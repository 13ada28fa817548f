//! Order confirmation events for downstream consumers.
//!
//! The messaging/notification layer subscribes to these; publication is
//! fire-and-forget and happens outside the settlement transaction, so a
//! slow or absent subscriber can never affect a checkout.

use common::{BuyerId, OrderId};
use domain::OrderStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A change in an order's externally-visible status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub buyer_id: BuyerId,
    pub status: OrderStatus,
}

/// Broadcast channel for order events.
#[derive(Debug, Clone)]
pub struct OrderEvents {
    tx: broadcast::Sender<OrderEvent>,
}

impl OrderEvents {
    /// Creates a new event channel.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Subscribes to order events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Send errors (no active subscriber) are
    /// ignored.
    pub fn publish(&self, event: OrderEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for OrderEvents {
    fn default() -> Self {
        Self::new()
    }
}
