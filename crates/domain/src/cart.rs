//! Cart lines and the priced line items frozen at snapshot time.

use common::ListingId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// A line in a buyer's cart: a listing and a requested quantity.
///
/// Ephemeral session state; it has no lifecycle beyond the buyer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub listing_id: ListingId,
    pub quantity: u32,
}

impl CartLine {
    /// Creates a cart line; the quantity must be positive.
    pub fn new(listing_id: ListingId, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { listing_id });
        }
        Ok(Self {
            listing_id,
            quantity,
        })
    }
}

/// A cart line joined against its listing with the price captured at
/// snapshot time.
///
/// Immutable once created: later checkout stages use these values and
/// never re-query the live listing, so a price edit mid-checkout cannot
/// drift into the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLineItem {
    pub listing_id: ListingId,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl PricedLineItem {
    /// Prices a cart line at the given snapshot-time unit price.
    pub fn price(line: &CartLine, unit_price: Money) -> Self {
        Self {
            listing_id: line.listing_id,
            quantity: line.quantity,
            unit_price,
            line_total: unit_price.multiply(line.quantity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_line_rejects_zero_quantity() {
        let listing_id = ListingId::new();
        let err = CartLine::new(listing_id, 0).unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity { .. }));
    }

    #[test]
    fn priced_line_item_captures_total() {
        let line = CartLine::new(ListingId::new(), 3).unwrap();
        let item = PricedLineItem::price(&line, Money::from_cents(250));
        assert_eq!(item.quantity, 3);
        assert_eq!(item.unit_price, Money::from_cents(250));
        assert_eq!(item.line_total, Money::from_cents(750));
    }
}
