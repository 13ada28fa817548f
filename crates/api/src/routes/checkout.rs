//! Checkout settlement endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::{CheckoutOrchestrator, CheckoutRequest};
use common::BuyerId;
use domain::{IdempotencyKey, PaymentMethod};
use gateway::PaymentGateway;
use serde::{Deserialize, Serialize};
use storage::MarketStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: MarketStore> {
    pub orchestrator: CheckoutOrchestrator<S, Arc<dyn PaymentGateway>>,
    pub store: S,
    /// Name of the payment provider the server was started with.
    pub provider: &'static str,
}

#[derive(Deserialize)]
pub struct CheckoutRequestBody {
    pub buyer_id: String,
    pub idempotency_key: String,
    pub payment_method: String,
    pub payment_token: String,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub state: String,
    pub total_cents: i64,
    pub dropped_listings: Vec<String>,
}

/// POST /checkout — settle the buyer's cart into an order.
#[tracing::instrument(skip(state, req))]
pub async fn settle<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CheckoutRequestBody>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let buyer_id = parse_buyer_id(&req.buyer_id)?;
    if req.idempotency_key.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "idempotency_key must not be empty".to_string(),
        ));
    }
    let payment_method = PaymentMethod::parse(&req.payment_method)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let receipt = state
        .orchestrator
        .checkout(CheckoutRequest {
            buyer_id,
            idempotency_key: IdempotencyKey::new(req.idempotency_key),
            payment_method,
            payment_token: req.payment_token,
        })
        .await?;

    Ok(Json(CheckoutResponse {
        order_id: receipt.order_id.to_string(),
        state: receipt.state.to_string(),
        total_cents: receipt.total.cents(),
        dropped_listings: receipt.dropped.iter().map(ToString::to_string).collect(),
    }))
}

pub(crate) fn parse_buyer_id(id: &str) -> Result<BuyerId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid buyer_id: {e}")))?;
    Ok(BuyerId::from_uuid(uuid))
}
