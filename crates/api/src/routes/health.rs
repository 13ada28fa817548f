//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use storage::MarketStore;

use crate::routes::checkout::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// The payment provider this instance settles against, so a probe
    /// can tell a card deployment from a wallet one.
    pub provider: &'static str,
}

/// GET /health — liveness plus the configured payment provider.
pub async fn check<S: MarketStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        provider: state.provider,
    })
}
