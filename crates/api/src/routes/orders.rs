//! Order lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::OrderId;
use domain::{Order, OrderLine};
use serde::{Deserialize, Serialize};
use storage::MarketStore;

use crate::error::ApiError;
use crate::routes::checkout::{AppState, parse_buyer_id};

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub buyer_id: String,
    pub status: String,
    pub total_cents: i64,
    pub payment_method: String,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub lines: Vec<OrderLineResponse>,
}

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub listing_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub buyer_id: String,
}

fn order_response(order: Order, lines: Vec<OrderLine>) -> OrderResponse {
    OrderResponse {
        id: order.id.to_string(),
        buyer_id: order.buyer_id.to_string(),
        status: order.status.to_string(),
        total_cents: order.total.cents(),
        payment_method: order.payment_method.to_string(),
        failure_reason: order.failure_reason,
        created_at: order.created_at.to_rfc3339(),
        lines: lines
            .into_iter()
            .map(|line| OrderLineResponse {
                listing_id: line.listing_id.to_string(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
            })
            .collect(),
    }
}

/// GET /orders/:id — load an order with its lines.
#[tracing::instrument(skip(state))]
pub async fn get<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .store
        .order(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;
    let lines = state.store.order_lines(order_id).await?;

    Ok(Json(order_response(order, lines)))
}

/// GET /orders?buyer_id=... — list a buyer's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let buyer_id = parse_buyer_id(&query.buyer_id)?;
    let orders = state.store.orders_for_buyer(buyer_id).await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in orders {
        let lines = state.store.order_lines(order.id).await?;
        responses.push(order_response(order, lines));
    }

    Ok(Json(responses))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
