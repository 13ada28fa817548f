//! HTTP API server with observability for checkout settlement.
//!
//! Provides REST endpoints for settling carts into orders and looking
//! them up afterwards, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{CheckoutOrchestrator, OrderEvents, Reconciler};
use gateway::PaymentGateway;
use metrics_exporter_prometheus::PrometheusHandle;
use storage::MarketStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::checkout::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: MarketStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/checkout", post(routes::checkout::settle::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a store and a payment gateway.
pub fn create_state<S: MarketStore + Clone + 'static>(
    store: S,
    gateway: Arc<dyn PaymentGateway>,
) -> Arc<AppState<S>> {
    let provider = gateway.provider();
    let orchestrator = CheckoutOrchestrator::new(store.clone(), gateway);
    Arc::new(AppState {
        orchestrator,
        store,
        provider,
    })
}

/// Spawns the periodic reconciliation sweep for stranded pending orders.
pub fn spawn_reconciler<S: MarketStore + Clone + 'static>(
    store: S,
    gateway: Arc<dyn PaymentGateway>,
    events: OrderEvents,
    config: &Config,
) -> tokio::task::JoinHandle<()> {
    let grace = chrono::Duration::seconds(config.reconcile_grace_secs as i64);
    let interval = std::time::Duration::from_secs(config.reconcile_interval_secs);
    let reconciler = Reconciler::new(store, gateway, events, grace);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = reconciler.run_once().await {
                tracing::warn!(error = %e, "reconcile pass failed");
            }
        }
    })
}
