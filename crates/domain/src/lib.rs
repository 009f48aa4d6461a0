//! Host-side order model for the tax workspace.
//!
//! This crate provides:
//! - The [`TaxableOrder`] capability the tax engine depends on
//! - A reference [`Order`] aggregate implementing it, including the
//!   totals-recalculation hook
//! - Line items, shipments, promotions, addresses and tax categories
//! - The default tax-code table keyed by target kind

pub mod error;
pub mod order;
pub mod tax_code;
pub mod taxable;

pub use error::OrderError;
pub use order::{
    Address, LineItem, Order, OrderTotals, PromotionAdjustment, PromotionScope, Shipment,
};
pub use tax_code::{TaxCategory, TaxCodeTable};
pub use taxable::TaxableOrder;
