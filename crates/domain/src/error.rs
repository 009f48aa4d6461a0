//! Domain error types.

use common::{LineItemId, ShipmentId};
use thiserror::Error;

/// Errors raised while building or mutating an order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Negative price or shipping cost.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: String },

    /// A line item with the same id is already on the order.
    #[error("Duplicate line item: {0}")]
    DuplicateLineItem(LineItemId),

    /// A shipment with the same id is already on the order.
    #[error("Duplicate shipment: {0}")]
    DuplicateShipment(ShipmentId),

    /// Promotions can only reduce the order total.
    #[error("Invalid promotion amount: {amount} (must not be positive)")]
    InvalidPromotionAmount { amount: String },

    /// Promotion scoped to a line item or shipment that is not on the order.
    #[error("Promotion target not found: {0}")]
    PromotionTargetNotFound(String),
}
