//! Orders and the order status state machine.

use chrono::{DateTime, Utc};
use common::{BuyerId, IntentRef, ListingId, OrderId};
use serde::{Deserialize, Serialize};

use crate::cart::PricedLineItem;
use crate::error::DomainError;
use crate::money::Money;
use crate::payment::PaymentMethod;

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Inventory is committed but the payment capture is not yet settled.
    #[default]
    Pending,

    /// Payment captured; the only externally-visible success state (terminal).
    Confirmed,

    /// Capture failed and the stock was re-credited (terminal).
    Failed,
}

impl OrderStatus {
    /// Returns true if the order can be confirmed from this status.
    pub fn can_confirm(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be failed from this status.
    pub fn can_fail(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Failed => "failed",
        }
    }

    /// Parses a status from its stored string form.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client-supplied idempotency key scoping one checkout attempt.
///
/// A retried request carrying the same key returns the original order
/// instead of creating a duplicate or double-decrementing stock.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates a key from a client-supplied token.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A durable order record, the system of record for what was sold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: BuyerId,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub payment_reference: IntentRef,
    pub idempotency_key: IdempotencyKey,
    pub status: OrderStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new pending order for a settled checkout attempt.
    pub fn pending(
        buyer_id: BuyerId,
        total: Money,
        payment_method: PaymentMethod,
        payment_reference: IntentRef,
        idempotency_key: IdempotencyKey,
    ) -> Self {
        Self {
            id: OrderId::new(),
            buyer_id,
            total,
            payment_method,
            payment_reference,
            idempotency_key,
            status: OrderStatus::Pending,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Marks the order confirmed.
    pub fn confirm(&mut self) -> Result<(), DomainError> {
        if !self.status.can_confirm() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: OrderStatus::Confirmed,
            });
        }
        self.status = OrderStatus::Confirmed;
        Ok(())
    }

    /// Marks the order failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        if !self.status.can_fail() {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: OrderStatus::Failed,
            });
        }
        self.status = OrderStatus::Failed;
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}

/// One sold line of an order.
///
/// `unit_price` is copied from the snapshot's [`PricedLineItem`], never
/// recomputed from the live listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub listing_id: ListingId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderLine {
    /// Builds the order lines for a snapshot's priced items.
    pub fn from_snapshot(order_id: OrderId, items: &[PricedLineItem]) -> Vec<Self> {
        items
            .iter()
            .map(|item| OrderLine {
                order_id,
                listing_id: item.listing_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect()
    }
}
