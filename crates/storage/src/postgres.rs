use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, IntentRef, ListingId, OrderId};
use domain::{
    CartLine, IdempotencyKey, Listing, Money, Order, OrderLine, OrderStatus, PaymentMethod,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{MarketStore, Result, StorageError};

/// PostgreSQL-backed marketplace store.
///
/// The settlement commit and the compensating re-credit each run in a
/// single transaction with explicit `FOR UPDATE` row locks on every
/// touched listing, acquired in ascending listing-id order so that two
/// checkouts intersecting on the same listings cannot deadlock.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_listing(row: PgRow) -> Result<Listing> {
        Ok(Listing {
            id: ListingId::from_uuid(row.try_get::<Uuid, _>("id")?),
            seller: BuyerId::from_uuid(row.try_get::<Uuid, _>("seller_id")?),
            title: row.try_get("title")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity_available: row.try_get::<i32, _>("quantity_available")? as u32,
            active: row.try_get("active")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let method: String = row.try_get("payment_method")?;
        let status: String = row.try_get("status")?;
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
            total: Money::from_cents(row.try_get("total_cents")?),
            payment_method: PaymentMethod::parse(&method).map_err(StorageError::Domain)?,
            payment_reference: IntentRef::new(row.try_get::<String, _>("payment_reference")?),
            idempotency_key: IdempotencyKey::new(row.try_get::<String, _>("idempotency_key")?),
            status: OrderStatus::parse(&status).map_err(StorageError::Domain)?,
            failure_reason: row.try_get("failure_reason")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            listing_id: ListingId::from_uuid(row.try_get::<Uuid, _>("listing_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
        })
    }

    /// Locks every listing in `ids` in ascending-id order and returns
    /// the listings that cannot satisfy the requested quantities.
    ///
    /// The locks are acquired before any quantity is evaluated, so a
    /// concurrent commit on an overlapping set of listings serializes
    /// here rather than racing the checks.
    async fn lock_and_check(
        tx: &mut Transaction<'_, Postgres>,
        requested: &[(ListingId, u32)],
    ) -> Result<Vec<ListingId>> {
        let mut ids: Vec<Uuid> = requested.iter().map(|(id, _)| id.as_uuid()).collect();
        ids.sort();

        let rows = sqlx::query(
            r#"
            SELECT id, quantity_available, active
            FROM listings
            WHERE id = ANY($1)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut **tx)
        .await?;

        let mut available: HashMap<Uuid, (i32, bool)> = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id")?;
            let quantity: i32 = row.try_get("quantity_available")?;
            let active: bool = row.try_get("active")?;
            available.insert(id, (quantity, active));
        }

        let mut rejected: Vec<ListingId> = Vec::new();
        for (listing_id, quantity) in requested {
            match available.get(&listing_id.as_uuid()) {
                Some((have, true)) if *have >= *quantity as i32 => {}
                _ => rejected.push(*listing_id),
            }
        }
        rejected.sort();
        Ok(rejected)
    }
}

#[async_trait]
impl MarketStore for PostgresStore {
    async fn listing(&self, id: ListingId) -> Result<Option<Listing>> {
        let row = sqlx::query(
            r#"
            SELECT id, seller_id, title, unit_price_cents, quantity_available, active
            FROM listings
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_listing).transpose()
    }

    async fn cart_lines(&self, buyer: BuyerId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            "SELECT listing_id, quantity FROM cart_lines WHERE buyer_id = $1 ORDER BY added_at",
        )
        .bind(buyer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    listing_id: ListingId::from_uuid(row.try_get::<Uuid, _>("listing_id")?),
                    quantity: row.try_get::<i32, _>("quantity")? as u32,
                })
            })
            .collect()
    }

    async fn clear_cart(&self, buyer: BuyerId) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE buyer_id = $1")
            .bind(buyer.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn commit_order(&self, order: &Order, lines: &[OrderLine]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let requested: Vec<(ListingId, u32)> =
            lines.iter().map(|l| (l.listing_id, l.quantity)).collect();
        let rejected = Self::lock_and_check(&mut tx, &requested).await?;
        if !rejected.is_empty() {
            // Dropping the transaction rolls back; no listing was modified.
            return Err(StorageError::InsufficientStock {
                listing_ids: rejected,
            });
        }

        for line in lines {
            sqlx::query(
                "UPDATE listings SET quantity_available = quantity_available - $1 WHERE id = $2",
            )
            .bind(line.quantity as i32)
            .bind(line.listing_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO orders
                (id, buyer_id, total_cents, payment_method, payment_reference,
                 idempotency_key, status, failure_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.buyer_id.as_uuid())
        .bind(order.total.cents())
        .bind(order.payment_method.as_str())
        .bind(order.payment_reference.as_str())
        .bind(order.idempotency_key.as_str())
        .bind(order.status.as_str())
        .bind(&order.failure_reason)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_idempotency_key_unique")
            {
                return StorageError::DuplicateKey(order.idempotency_key.clone());
            }
            StorageError::Database(e)
        })?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (order_id, listing_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(line.order_id.as_uuid())
            .bind(line.listing_id.as_uuid())
            .bind(line.quantity as i32)
            .bind(line.unit_price.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn recredit_order(&self, order_id: OrderId, reason: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        let status = status.ok_or(StorageError::OrderNotFound(order_id))?;
        let status = OrderStatus::parse(&status).map_err(StorageError::Domain)?;

        match status {
            // A retried compensation; the stock is already restored.
            OrderStatus::Failed => return Ok(()),
            OrderStatus::Pending => {}
            OrderStatus::Confirmed => {
                return Err(StorageError::Domain(
                    domain::DomainError::InvalidStatusTransition {
                        from: status,
                        to: OrderStatus::Failed,
                    },
                ));
            }
        }

        let lines = sqlx::query(
            "SELECT order_id, listing_id, quantity, unit_price_cents FROM order_lines WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Self::row_to_order_line)
        .collect::<Result<Vec<_>>>()?;

        // Same ascending-id lock order as the commit path.
        let mut ids: Vec<Uuid> = lines.iter().map(|l| l.listing_id.as_uuid()).collect();
        ids.sort();
        sqlx::query("SELECT id FROM listings WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await?;

        for line in &lines {
            sqlx::query(
                "UPDATE listings SET quantity_available = quantity_available + $1 WHERE id = $2",
            )
            .bind(line.quantity as i32)
            .bind(line.listing_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE orders SET status = 'failed', failure_reason = $2 WHERE id = $1")
            .bind(order_id.as_uuid())
            .bind(reason)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_confirmed(&self, order_id: OrderId) -> Result<()> {
        let updated =
            sqlx::query("UPDATE orders SET status = 'confirmed' WHERE id = $1 AND status = 'pending'")
                .bind(order_id.as_uuid())
                .execute(&self.pool)
                .await?;
        if updated.rows_affected() == 0 {
            let current = self
                .order(order_id)
                .await?
                .ok_or(StorageError::OrderNotFound(order_id))?;
            return Err(StorageError::Domain(
                domain::DomainError::InvalidStatusTransition {
                    from: current.status,
                    to: OrderStatus::Confirmed,
                },
            ));
        }
        Ok(())
    }

    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE orders SET status = 'failed', failure_reason = $2 WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id.as_uuid())
        .bind(reason)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            let current = self
                .order(order_id)
                .await?
                .ok_or(StorageError::OrderNotFound(order_id))?;
            return Err(StorageError::Domain(
                domain::DomainError::InvalidStatusTransition {
                    from: current.status,
                    to: OrderStatus::Failed,
                },
            ));
        }
        Ok(())
    }

    async fn order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, buyer_id, total_cents, payment_method, payment_reference,
                   idempotency_key, status, failure_reason, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn order_lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(
            "SELECT order_id, listing_id, quantity, unit_price_cents FROM order_lines WHERE order_id = $1",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_line).collect()
    }

    async fn orders_for_buyer(&self, buyer: BuyerId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, buyer_id, total_cents, payment_method, payment_reference,
                   idempotency_key, status, failure_reason, created_at
            FROM orders
            WHERE buyer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(buyer.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn order_for_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, buyer_id, total_cents, payment_method, payment_reference,
                   idempotency_key, status, failure_reason, created_at
            FROM orders
            WHERE idempotency_key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn stale_pending_orders(&self, older_than: DateTime<Utc>) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, buyer_id, total_cents, payment_method, payment_reference,
                   idempotency_key, status, failure_reason, created_at
            FROM orders
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}
