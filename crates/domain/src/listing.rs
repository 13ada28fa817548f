//! Product listings.

use common::{BuyerId, ListingId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A product listing offered by a seller.
///
/// `quantity_available` is mutated only by the settlement commit and the
/// compensating re-credit in the storage layer; it never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller: BuyerId,
    pub title: String,
    pub unit_price: Money,
    pub quantity_available: u32,
    pub active: bool,
}

impl Listing {
    /// Creates a new active listing.
    pub fn new(
        seller: BuyerId,
        title: impl Into<String>,
        unit_price: Money,
        quantity_available: u32,
    ) -> Self {
        Self {
            id: ListingId::new(),
            seller,
            title: title.into(),
            unit_price,
            quantity_available,
            active: true,
        }
    }

    /// Returns true if the listing can satisfy a sale of `quantity` units.
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        self.active && self.quantity_available >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_fulfill_requires_active_and_stock() {
        let mut listing = Listing::new(BuyerId::new(), "Heirloom tomatoes", Money::from_cents(350), 4);
        assert!(listing.can_fulfill(4));
        assert!(!listing.can_fulfill(5));

        listing.active = false;
        assert!(!listing.can_fulfill(1));
    }
}
