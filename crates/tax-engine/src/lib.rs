//! Sales-tax computation and reconciliation.
//!
//! This crate provides:
//! - The transaction presenter turning a [`TaxableOrder`](domain::TaxableOrder)
//!   into a request document
//! - [`TaxAdjustmentReconciler`], which applies a response document to an
//!   order's persisted tax adjustments
//! - Create-versus-adjust planning over the transaction registry
//! - The [`TaxResult`] envelope and its error taxonomy
//! - [`TaxService`], tying the above to a [`TaxServiceClient`](tax_client::TaxServiceClient)

pub mod config;
pub mod envelope;
pub mod error;
pub mod presenter;
pub mod reconciler;
pub mod registry;
pub mod service;

pub use config::{AdjustmentReason, TaxConfig};
pub use envelope::{ErrorCategory, RecommendedAction, TaxResult};
pub use error::{ConsistencyError, ReconciliationError, Result, TaxError, ValidationError};
pub use presenter::{PresentOptions, present, present_adjustment};
pub use reconciler::{
    AppliedTax, CONSISTENCY_TOLERANCE, ReconciliationSummary, TaxAdjustmentReconciler,
};
pub use registry::{RemoteOperation, plan};
pub use service::TaxService;
