//! Shared types for the tax reconciliation workspace.
//!
//! Identifiers, the [`TaxTarget`] that names what a tax line applies to, and
//! the decimal-backed [`Money`] type used by every other crate.

pub mod money;
pub mod target;
pub mod transaction;
pub mod types;

pub use money::Money;
pub use target::{TargetKind, TargetParseError, TaxTarget};
pub use transaction::{TransactionType, UnknownTransactionType};
pub use types::{LineItemId, OrderId, ShipmentId};
