//! Create-versus-adjust planning from the transaction registry.

use common::OrderId;
use tax_store::{TransactionRef, TransactionStatus};

use crate::error::TaxError;

/// The remote call a computation must make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOperation {
    /// No transaction exists yet for the order.
    Create,
    /// Replace the content of the order's existing transaction.
    Adjust { code: String },
}

/// Decides the remote operation from the order's registered transaction.
///
/// A voided transaction is closed for good: computing tax again would need
/// a new document code, which is the host's decision.
pub fn plan(
    order_id: OrderId,
    existing: Option<&TransactionRef>,
) -> Result<RemoteOperation, TaxError> {
    match existing {
        None => Ok(RemoteOperation::Create),
        Some(transaction) if transaction.status == TransactionStatus::Voided => {
            Err(TaxError::TransactionClosed {
                order_id,
                code: transaction.code.clone(),
            })
        }
        Some(transaction) => Ok(RemoteOperation::Adjust {
            code: transaction.code.clone(),
        }),
    }
}

/// Returns the registered transaction if it is still live.
pub fn require_live(
    order_id: OrderId,
    existing: Option<TransactionRef>,
) -> Result<TransactionRef, TaxError> {
    match existing {
        None => Err(TaxError::NotRegistered(order_id)),
        Some(transaction) if !transaction.is_live() => Err(TaxError::TransactionClosed {
            order_id,
            code: transaction.code,
        }),
        Some(transaction) => Ok(transaction),
    }
}
