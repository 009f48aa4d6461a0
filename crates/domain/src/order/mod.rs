//! Order aggregate and its value objects.

mod aggregate;
mod value_objects;

pub use aggregate::{Order, OrderTotals};
pub use value_objects::{Address, LineItem, PromotionAdjustment, PromotionScope, Shipment};
