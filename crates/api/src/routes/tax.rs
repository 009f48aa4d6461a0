//! Tax computation and transaction lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tax_engine::{PresentOptions, ReconciliationSummary, TaxResult};
use tax_store::{AdjustmentRepository, TaxAdjustment, TransactionRef, TransactionRegistry};

use crate::error::ApiError;
use crate::routes::orders::{OrderResponse, load, parse_order_id};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ComputeParams {
    /// Document date for orders that are not completed yet.
    pub document_date: Option<NaiveDate>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComputeResponse {
    Applied {
        summary: ReconciliationSummary,
        order: OrderResponse,
    },
    Bypassed {
        order: OrderResponse,
    },
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LifecycleResponse {
    Applied { transaction: TransactionRef },
    Bypassed,
}

#[derive(Serialize)]
pub struct TaxStateResponse {
    pub transaction: Option<TransactionRef>,
    pub adjustments: Vec<TaxAdjustment>,
}

/// POST /orders/{id}/tax: compute tax and apply it to the order.
///
/// A consistency failure still writes the adjustments and flags the order,
/// so the order is saved back whatever the outcome.
#[tracing::instrument(skip(state, params))]
pub async fn compute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<ComputeParams>,
) -> Result<Json<ComputeResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let _guard = state.locks.acquire(order_id).await;

    let mut order = load(&state, order_id).await?;
    let mut options = PresentOptions::from_config(state.tax.config());
    if let Some(date) = params.document_date {
        options = options.with_document_date(date);
    }

    let result = state
        .tax
        .compute_with(&mut order, &state.ship_from, options)
        .await;
    let response = OrderResponse::from(&order);
    state.orders.insert(order).await;

    match result {
        TaxResult::Applied(summary) => Ok(Json(ComputeResponse::Applied {
            summary,
            order: response,
        })),
        TaxResult::Bypassed => Ok(Json(ComputeResponse::Bypassed { order: response })),
        TaxResult::Failed(err) => Err(err.into()),
    }
}

/// GET /orders/{id}/tax: the order's registered transaction and adjustments.
#[tracing::instrument(skip(state))]
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaxStateResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    load(&state, order_id).await?;

    let store = state.tax.store();
    Ok(Json(TaxStateResponse {
        transaction: store.transaction_for(order_id).await?,
        adjustments: store.adjustments_for_order(order_id).await?,
    }))
}

/// POST /orders/{id}/tax/commit
#[tracing::instrument(skip(state))]
pub async fn commit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let _guard = state.locks.acquire(order_id).await;
    load(&state, order_id).await?;

    lifecycle_response(state.tax.commit(order_id).await)
}

/// POST /orders/{id}/tax/void: void the transaction. The order can no
/// longer have tax computed.
#[tracing::instrument(skip(state))]
pub async fn void(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let _guard = state.locks.acquire(order_id).await;
    load(&state, order_id).await?;

    lifecycle_response(state.tax.void(order_id).await)
}

fn lifecycle_response(
    result: TaxResult<TransactionRef>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    match result {
        TaxResult::Applied(transaction) => Ok(Json(LifecycleResponse::Applied { transaction })),
        TaxResult::Bypassed => Ok(Json(LifecycleResponse::Bypassed)),
        TaxResult::Failed(err) => Err(err.into()),
    }
}
