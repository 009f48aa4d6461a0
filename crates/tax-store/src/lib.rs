//! Persistence for tax adjustments and the per-order transaction registry.
//!
//! The [`AdjustmentRepository`] and [`TransactionRegistry`] traits are the
//! find-or-create seams the reconciler writes through. Both an in-memory
//! implementation (tests, single-process hosts) and a PostgreSQL one are
//! provided.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use common::{Money, OrderId, TaxTarget, TransactionType};
pub use error::{Result, StoreError};
pub use memory::InMemoryTaxStore;
pub use postgres::PostgresTaxStore;
pub use record::{
    AdjustmentId, Jurisdiction, TaxAdjustment, TaxRate, TransactionRef, TransactionStatus,
};
pub use store::{AdjustmentRepository, TransactionRegistry};
