//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::BuyerId;
use domain::{CartLine, Listing, Money};
use gateway::{CardProcessor, PaymentGateway};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::{InMemoryStore, MarketStore};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, InMemoryStore, CardProcessor) {
    let store = InMemoryStore::new();
    let card = CardProcessor::new();
    let gateway: Arc<dyn PaymentGateway> = Arc::new(card.clone());
    let state = api::create_state(store.clone(), gateway);
    let app = api::create_app(state, get_metrics_handle());
    (app, store, card)
}

async fn seed_cart(store: &InMemoryStore, cents: i64, stock: u32, wanted: u32) -> (BuyerId, Listing) {
    let listing = Listing::new(
        BuyerId::new(),
        "Sugar snap peas",
        Money::from_cents(cents),
        stock,
    );
    store.insert_listing(listing.clone()).await;

    let buyer = BuyerId::new();
    store
        .set_cart(buyer, vec![CartLine::new(listing.id, wanted).unwrap()])
        .await;
    (buyer, listing)
}

fn checkout_request(buyer: BuyerId, key: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/checkout")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_string(&serde_json::json!({
                "buyer_id": buyer.to_string(),
                "idempotency_key": key,
                "payment_method": "card",
                "payment_token": "tok_visa"
            }))
            .unwrap(),
        ))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["provider"], "card");
}

#[tokio::test]
async fn test_checkout_and_get_order() {
    let (app, store, _) = setup();
    let (buyer, _) = seed_cart(&store, 500, 5, 2).await;

    let response = app
        .clone()
        .oneshot(checkout_request(buyer, "key-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let receipt = body_json(response).await;
    assert_eq!(receipt["state"], "Confirmed");
    assert_eq!(receipt["total_cents"], 1000);
    let order_id = receipt["order_id"].as_str().unwrap().to_string();

    let get_response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);

    let order = body_json(get_response).await;
    assert_eq!(order["id"], order_id);
    assert_eq!(order["status"], "confirmed");
    assert_eq!(order["total_cents"], 1000);
    assert_eq!(order["lines"].as_array().unwrap().len(), 1);
    assert_eq!(order["lines"][0]["unit_price_cents"], 500);
}

#[tokio::test]
async fn test_checkout_is_idempotent_over_http() {
    let (app, store, card) = setup();
    let (buyer, listing) = seed_cart(&store, 500, 5, 1).await;

    let first = app
        .clone()
        .oneshot(checkout_request(buyer, "retry-key"))
        .await
        .unwrap();
    let first = body_json(first).await;

    let second = app
        .oneshot(checkout_request(buyer, "retry-key"))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second = body_json(second).await;

    assert_eq!(second["order_id"], first["order_id"]);
    assert_eq!(store.quantity_available(listing.id).await, Some(4));
    assert_eq!(store.order_count().await, 1);
    let order = store
        .order_for_key(&domain::IdempotencyKey::new("retry-key"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(card.charge_count(&order.payment_reference), 1);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let (app, store, _) = setup();
    let (buyer, listing) = seed_cart(&store, 500, 1, 2).await;

    let response = app.oneshot(checkout_request(buyer, "key-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains(&listing.id.to_string())
    );
    assert_eq!(store.quantity_available(listing.id).await, Some(1));
}

#[tokio::test]
async fn test_declined_payment_is_payment_required() {
    let (app, store, card) = setup();
    let (buyer, _) = seed_cart(&store, 500, 5, 1).await;
    card.set_decline(true);

    let response = app.oneshot(checkout_request(buyer, "key-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_unavailable_gateway_is_service_unavailable() {
    let (app, store, card) = setup();
    let (buyer, _) = seed_cart(&store, 500, 5, 1).await;
    card.set_unavailable(true);

    let response = app.oneshot(checkout_request(buyer, "key-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_capture_failure_is_bad_gateway() {
    let (app, store, card) = setup();
    let (buyer, listing) = seed_cart(&store, 500, 5, 2).await;
    card.set_fail_on_capture(true);

    let response = app.oneshot(checkout_request(buyer, "key-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // The compensation ran before the response was produced.
    assert_eq!(store.quantity_available(listing.id).await, Some(5));
}

#[tokio::test]
async fn test_empty_cart_is_bad_request() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(checkout_request(BuyerId::new(), "key-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_buyer_id_is_bad_request() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/checkout")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_string(&serde_json::json!({
                        "buyer_id": "not-a-uuid",
                        "idempotency_key": "key-1",
                        "payment_method": "card",
                        "payment_token": "tok_visa"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_payment_method_is_bad_request() {
    let (app, store, _) = setup();
    let (buyer, _) = seed_cart(&store, 500, 5, 1).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/checkout")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_string(&serde_json::json!({
                        "buyer_id": buyer.to_string(),
                        "idempotency_key": "key-1",
                        "payment_method": "bank_transfer",
                        "payment_token": "tok"
                    }))
                    .unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _, _) = setup();
    let fake_id = uuid::Uuid::new_v4();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{fake_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_orders_for_buyer() {
    let (app, store, _) = setup();
    let (buyer, _) = seed_cart(&store, 700, 5, 1).await;

    let checkout = app
        .clone()
        .oneshot(checkout_request(buyer, "key-1"))
        .await
        .unwrap();
    assert_eq!(checkout.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/orders?buyer_id={buyer}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let orders = body_json(response).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["total_cents"], 700);
    assert_eq!(orders[0]["buyer_id"], buyer.to_string());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
