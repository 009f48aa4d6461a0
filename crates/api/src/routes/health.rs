//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tax_enabled: bool,
    pub orders: usize,
}

/// GET /health: process liveness plus whether tax is being computed.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        tax_enabled: state.tax.config().enabled,
        orders: state.orders.len().await,
    })
}
