//! PostgreSQL integration tests.
//!
//! These tests need a local Docker daemon and use a shared PostgreSQL
//! container; they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p storage --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use common::{BuyerId, IntentRef, ListingId};
use domain::{CartLine, IdempotencyKey, Listing, Money, Order, OrderLine, OrderStatus, PaymentMethod};
use serial_test::serial;
use sqlx::PgPool;
use storage::{MarketStore, PostgresStore, StorageError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_marketplace_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_lines, orders, cart_lines, listings")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

async fn seed_listing(store: &PostgresStore, qty: u32, cents: i64) -> Listing {
    let listing = Listing::new(BuyerId::new(), "Golden beets", Money::from_cents(cents), qty);
    sqlx::query(
        r#"
        INSERT INTO listings (id, seller_id, title, unit_price_cents, quantity_available, active)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(listing.id.as_uuid())
    .bind(listing.seller.as_uuid())
    .bind(&listing.title)
    .bind(listing.unit_price.cents())
    .bind(listing.quantity_available as i32)
    .bind(listing.active)
    .execute(store.pool())
    .await
    .unwrap();
    listing
}

fn pending_order(buyer: BuyerId, total_cents: i64, key: &str) -> Order {
    Order::pending(
        buyer,
        Money::from_cents(total_cents),
        PaymentMethod::Card,
        IntentRef::new(format!("ch_{key}")),
        IdempotencyKey::new(key),
    )
}

fn line(order: &Order, listing: &Listing, quantity: u32) -> OrderLine {
    OrderLine {
        order_id: order.id,
        listing_id: listing.id,
        quantity,
        unit_price: listing.unit_price,
    }
}

async fn available(store: &PostgresStore, id: ListingId) -> i32 {
    sqlx::query_scalar("SELECT quantity_available FROM listings WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
#[serial]
async fn commit_order_decrements_stock() {
    let store = get_test_store().await;
    let listing = seed_listing(&store, 5, 300).await;

    let order = pending_order(BuyerId::new(), 600, "pg-commit");
    store
        .commit_order(&order, &[line(&order, &listing, 2)])
        .await
        .unwrap();

    assert_eq!(available(&store, listing.id).await, 3);
    let stored = store.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.total, Money::from_cents(600));
    assert_eq!(store.order_lines(order.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
#[serial]
async fn short_batch_rolls_back_entirely() {
    let store = get_test_store().await;
    let plenty = seed_listing(&store, 10, 100).await;
    let scarce = seed_listing(&store, 1, 100).await;

    let order = pending_order(BuyerId::new(), 500, "pg-short");
    let lines = vec![line(&order, &plenty, 3), line(&order, &scarce, 2)];

    let err = store.commit_order(&order, &lines).await.unwrap_err();
    match err {
        StorageError::InsufficientStock { listing_ids } => {
            assert_eq!(listing_ids, vec![scarce.id]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(available(&store, plenty.id).await, 10);
    assert_eq!(available(&store, scarce.id).await, 1);
    assert!(store.order(order.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
#[serial]
async fn concurrent_commits_never_oversell() {
    let store = get_test_store().await;
    let listing = seed_listing(&store, 3, 100).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        let listing = listing.clone();
        handles.push(tokio::spawn(async move {
            let order = pending_order(BuyerId::new(), 100, &format!("pg-race-{i}"));
            let result = store
                .commit_order(&order, &[line(&order, &listing, 1)])
                .await;
            result.is_ok()
        }));
    }

    let mut committed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            committed += 1;
        }
    }

    assert_eq!(committed, 3);
    assert_eq!(available(&store, listing.id).await, 0);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
#[serial]
async fn duplicate_idempotency_key_is_rejected() {
    let store = get_test_store().await;
    let listing = seed_listing(&store, 5, 100).await;

    let buyer = BuyerId::new();
    let first = pending_order(buyer, 100, "pg-dup");
    store
        .commit_order(&first, &[line(&first, &listing, 1)])
        .await
        .unwrap();

    let second = pending_order(buyer, 100, "pg-dup");
    let err = store
        .commit_order(&second, &[line(&second, &listing, 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey(_)));
    assert_eq!(available(&store, listing.id).await, 4);

    let found = store
        .order_for_key(&IdempotencyKey::new("pg-dup"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
#[serial]
async fn recredit_restores_stock_and_is_idempotent() {
    let store = get_test_store().await;
    let listing = seed_listing(&store, 2, 100).await;

    let order = pending_order(BuyerId::new(), 200, "pg-recredit");
    store
        .commit_order(&order, &[line(&order, &listing, 2)])
        .await
        .unwrap();
    assert_eq!(available(&store, listing.id).await, 0);

    store
        .recredit_order(order.id, "capture failed")
        .await
        .unwrap();
    assert_eq!(available(&store, listing.id).await, 2);
    let stored = store.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);

    store
        .recredit_order(order.id, "capture failed")
        .await
        .unwrap();
    assert_eq!(available(&store, listing.id).await, 2);
}

#[tokio::test]
#[ignore = "requires a local Docker daemon"]
#[serial]
async fn cart_roundtrip() {
    let store = get_test_store().await;
    let listing = seed_listing(&store, 5, 100).await;
    let buyer = BuyerId::new();

    sqlx::query("INSERT INTO cart_lines (buyer_id, listing_id, quantity) VALUES ($1, $2, $3)")
        .bind(buyer.as_uuid())
        .bind(listing.id.as_uuid())
        .bind(2i32)
        .execute(store.pool())
        .await
        .unwrap();

    let lines = store.cart_lines(buyer).await.unwrap();
    assert_eq!(lines, vec![CartLine {
        listing_id: listing.id,
        quantity: 2
    }]);

    store.clear_cart(buyer).await.unwrap();
    assert!(store.cart_lines(buyer).await.unwrap().is_empty());
}
