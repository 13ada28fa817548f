//! Cart snapshot: the priced, validated line items a checkout settles.

use common::{BuyerId, ListingId};
use domain::{Money, PricedLineItem};
use storage::MarketStore;

use crate::error::{CheckoutError, Result};

/// A buyer's cart resolved against live listing state, with prices
/// frozen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub lines: Vec<PricedLineItem>,
    pub total: Money,
    /// Listings that vanished or went inactive since they were added to
    /// the cart; reported to the buyer as a warning, not a failure.
    pub dropped: Vec<ListingId>,
}

/// Resolves a buyer's cart into priced line items.
///
/// Lines whose listing no longer exists or is inactive are dropped with
/// a warning and checkout proceeds with the rest; if none remain the
/// snapshot fails with `EmptyCart`. Unit prices are captured here and
/// never re-queried by later stages.
pub async fn snapshot<S: MarketStore>(store: &S, buyer_id: BuyerId) -> Result<CartSnapshot> {
    let cart = store.cart_lines(buyer_id).await?;

    let mut lines = Vec::with_capacity(cart.len());
    let mut dropped = Vec::new();

    for line in &cart {
        if line.quantity == 0 {
            tracing::warn!(%buyer_id, listing_id = %line.listing_id, "dropping zero-quantity cart line");
            dropped.push(line.listing_id);
            continue;
        }
        match store.listing(line.listing_id).await? {
            Some(listing) if listing.active => {
                lines.push(PricedLineItem::price(line, listing.unit_price));
            }
            _ => {
                tracing::warn!(
                    %buyer_id,
                    listing_id = %line.listing_id,
                    "dropping cart line for missing or inactive listing"
                );
                dropped.push(line.listing_id);
            }
        }
    }

    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let total = lines.iter().map(|l| l.line_total).sum();
    Ok(CartSnapshot {
        lines,
        total,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use domain::{CartLine, Listing};
    use storage::InMemoryStore;

    use super::*;

    async fn listing_with(store: &InMemoryStore, cents: i64, qty: u32) -> Listing {
        let listing = Listing::new(BuyerId::new(), "Red kuri squash", Money::from_cents(cents), qty);
        store.insert_listing(listing.clone()).await;
        listing
    }

    #[tokio::test]
    async fn prices_and_totals_are_frozen_at_snapshot() {
        let store = InMemoryStore::new();
        let a = listing_with(&store, 500, 2).await;
        let b = listing_with(&store, 1200, 5).await;

        let buyer = BuyerId::new();
        store
            .set_cart(buyer, vec![
                CartLine::new(a.id, 2).unwrap(),
                CartLine::new(b.id, 1).unwrap(),
            ])
            .await;

        let snap = snapshot(&store, buyer).await.unwrap();
        assert_eq!(snap.lines.len(), 2);
        assert_eq!(snap.total, Money::from_cents(2200));
        assert!(snap.dropped.is_empty());

        // A later price edit must not leak into the snapshot.
        store.set_listing_price(a.id, Money::from_cents(999)).await;
        assert_eq!(snap.lines[0].unit_price, Money::from_cents(500));
    }

    #[tokio::test]
    async fn inactive_and_missing_listings_are_dropped() {
        let store = InMemoryStore::new();
        let live = listing_with(&store, 300, 3).await;
        let gone = listing_with(&store, 300, 3).await;
        store.set_listing_active(gone.id, false).await;
        let vanished = ListingId::new();

        let buyer = BuyerId::new();
        store
            .set_cart(buyer, vec![
                CartLine::new(live.id, 1).unwrap(),
                CartLine::new(gone.id, 1).unwrap(),
                CartLine { listing_id: vanished, quantity: 1 },
            ])
            .await;

        let snap = snapshot(&store, buyer).await.unwrap();
        assert_eq!(snap.lines.len(), 1);
        assert_eq!(snap.lines[0].listing_id, live.id);
        assert_eq!(snap.dropped, vec![gone.id, vanished]);
    }

    #[tokio::test]
    async fn all_lines_dropped_is_empty_cart() {
        let store = InMemoryStore::new();
        let gone = listing_with(&store, 300, 3).await;
        store.set_listing_active(gone.id, false).await;

        let buyer = BuyerId::new();
        store
            .set_cart(buyer, vec![CartLine::new(gone.id, 1).unwrap()])
            .await;

        let err = snapshot(&store, buyer).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn empty_cart_fails() {
        let store = InMemoryStore::new();
        let err = snapshot(&store, BuyerId::new()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }
}
