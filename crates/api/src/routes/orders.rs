//! Order book endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{Money, OrderId};
use domain::{
    Address, LineItem, Order, OrderTotals, PromotionAdjustment, PromotionScope, Shipment,
    TaxCategory, TaxableOrder,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub number: String,
    pub customer_code: String,
    pub currency: Option<String>,
    pub ship_address: Option<Address>,
    pub completed_on: Option<NaiveDate>,
    #[serde(default)]
    pub line_items: Vec<LineItemRequest>,
    #[serde(default)]
    pub shipments: Vec<ShipmentRequest>,
    #[serde(default)]
    pub promotions: Vec<PromotionRequest>,
}

#[derive(Deserialize)]
pub struct LineItemRequest {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub quantity: u32,
    pub tax_code: Option<String>,
}

#[derive(Deserialize)]
pub struct ShipmentRequest {
    pub id: i64,
    pub method: String,
    pub cost_cents: i64,
    pub tax_code: Option<String>,
}

#[derive(Deserialize)]
pub struct PromotionRequest {
    pub id: i64,
    pub label: String,
    pub amount_cents: i64,
    pub scope: PromotionScope,
}

impl LineItemRequest {
    fn into_line_item(self) -> LineItem {
        let item = LineItem::new(
            self.id,
            self.sku,
            self.name,
            Money::from_cents(self.price_cents),
            self.quantity,
        );
        match self.tax_code {
            Some(code) => item.with_tax_category(TaxCategory::new(code.as_str(), Some(code.as_str()))),
            None => item,
        }
    }
}

impl ShipmentRequest {
    fn into_shipment(self) -> Shipment {
        let shipment = Shipment::new(self.id, self.method, Money::from_cents(self.cost_cents));
        match self.tax_code {
            Some(code) => shipment.with_tax_category(TaxCategory::new(code.as_str(), Some(code.as_str()))),
            None => shipment,
        }
    }
}

impl PromotionRequest {
    fn into_promotion(self) -> PromotionAdjustment {
        PromotionAdjustment::new(
            self.id,
            self.label,
            Money::from_cents(self.amount_cents),
            self.scope,
        )
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub number: String,
    pub completed_on: Option<NaiveDate>,
    pub tax_out_of_sync: Option<String>,
    pub totals: OrderTotals,
    pub line_items: Vec<LineItem>,
    pub shipments: Vec<Shipment>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            number: order.number().to_string(),
            completed_on: order.completed_on(),
            tax_out_of_sync: order.tax_out_of_sync().map(String::from),
            totals: order.totals(),
            line_items: order.line_items().to_vec(),
            shipments: order.shipments().to_vec(),
        }
    }
}

// -- Handlers --

/// POST /orders: build an order from line items, shipments and promotions.
#[tracing::instrument(skip(state, req), fields(number = %req.number))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    if req.number.trim().is_empty() {
        return Err(ApiError::BadRequest("Order number is required".to_string()));
    }

    let mut order = Order::new(req.number, req.customer_code);
    if let Some(currency) = req.currency {
        order.set_currency(currency);
    }
    if let Some(address) = req.ship_address {
        order.set_ship_address(address);
    }
    for item in req.line_items {
        order.add_line_item(item.into_line_item())?;
    }
    for shipment in req.shipments {
        order.add_shipment(shipment.into_shipment())?;
    }
    for promotion in req.promotions {
        order.apply_promotion(promotion.into_promotion())?;
    }
    if let Some(date) = req.completed_on {
        order.complete(date);
    }
    order.recalculate_totals(&[]);

    let response = OrderResponse::from(&order);
    if let Err(existing) = state.orders.insert_new(order).await {
        return Err(ApiError::Conflict(format!(
            "Order number {} is already used by order {existing}",
            response.number
        )));
    }
    metrics::counter!("orders_created_total").increment(1);
    tracing::info!(order_id = %response.id, "order created");

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = load(&state, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/line_items: add a line item. Existing tax stays in
/// place until the next computation.
#[tracing::instrument(skip(state, req))]
pub async fn add_line_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<LineItemRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let _guard = state.locks.acquire(order_id).await;

    let mut order = load(&state, order_id).await?;
    order.add_line_item(req.into_line_item())?;
    let adjustments = tax_store::AdjustmentRepository::adjustments_for_order(
        state.tax.store(),
        order_id,
    )
    .await?;
    order.recalculate_totals(&adjustments);

    let response = OrderResponse::from(&order);
    state.orders.insert(order).await;
    Ok(Json(response))
}

pub(crate) async fn load(state: &AppState, order_id: OrderId) -> Result<Order, ApiError> {
    state
        .orders
        .get(order_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Order {order_id} not found")))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
