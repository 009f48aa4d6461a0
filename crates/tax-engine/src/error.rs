//! Tax engine error types.

use common::{Money, OrderId};
use tax_client::TransportError;
use tax_store::StoreError;
use thiserror::Error;

use crate::reconciler::ReconciliationSummary;

/// A request or response that cannot be applied to the order as it stands.
///
/// Validation always completes before anything is written, so a
/// validation failure leaves no partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("response line {0:?} does not name a line item or shipment")]
    UnrecognisedLineNumber(String),

    #[error("response line {0:?} names a target that is not on the order")]
    UnknownTarget(String),

    #[error("response line {0:?} appears more than once")]
    DuplicateLine(String),

    #[error("response line {line_number:?} carries negative tax {amount}")]
    NegativeTax { line_number: String, amount: Money },

    #[error("discount line {line_number:?} carries tax {amount}")]
    TaxedDiscountLine { line_number: String, amount: Money },

    #[error("order {order_number} has no completion date and none was supplied")]
    MissingDocumentDate { order_number: String },

    #[error("document code {code:?} already belongs to order {owner}")]
    CodeClaimed { code: String, owner: OrderId },

    #[error("order {0} has no number to use as document code")]
    MissingDocumentCode(OrderId),
}

/// Applied tax does not add up to the total the service reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("applied tax {applied} differs from reported total {reported} by {difference}")]
pub struct ConsistencyError {
    pub applied: Money,
    pub reported: Money,
    pub difference: Money,
}

/// Failure applying a response document to an order.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Adjustments were written and the order flagged; `summary` describes
    /// what was applied.
    #[error("{source}")]
    Consistency {
        source: ConsistencyError,
        summary: Box<ReconciliationSummary>,
    },

    #[error("persistence error: {0}")]
    Store(#[from] StoreError),
}

/// Every failure the tax service can surface to a caller.
#[derive(Debug, Error)]
pub enum TaxError {
    #[error("tax service transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("consistency error: {source}")]
    Consistency {
        source: ConsistencyError,
        summary: Box<ReconciliationSummary>,
    },

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The order's remote transaction was voided; it cannot be adjusted,
    /// committed or voided again.
    #[error("transaction {code} for order {order_id} is voided")]
    TransactionClosed { order_id: OrderId, code: String },

    #[error("no transaction registered for order {0}")]
    NotRegistered(OrderId),
}

impl From<ReconciliationError> for TaxError {
    fn from(error: ReconciliationError) -> Self {
        match error {
            ReconciliationError::Validation(e) => TaxError::Validation(e),
            ReconciliationError::Consistency { source, summary } => {
                TaxError::Consistency { source, summary }
            }
            ReconciliationError::Store(e) => TaxError::Persistence(e),
        }
    }
}

/// Convenience type alias for tax engine results.
pub type Result<T> = std::result::Result<T, TaxError>;
