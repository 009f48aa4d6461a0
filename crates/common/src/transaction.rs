//! Remote transaction document types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Document type of a remote tax transaction.
///
/// Serialized with the remote service's PascalCase names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionType {
    /// Estimate only; never recorded by the remote service.
    SalesOrder,
    /// Recorded sale; the normal document for a placed order.
    #[default]
    SalesInvoice,
    ReturnOrder,
    ReturnInvoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transaction type: {0:?}")]
pub struct UnknownTransactionType(pub String);

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::SalesOrder => "SalesOrder",
            TransactionType::SalesInvoice => "SalesInvoice",
            TransactionType::ReturnOrder => "ReturnOrder",
            TransactionType::ReturnInvoice => "ReturnInvoice",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SalesOrder" => Ok(TransactionType::SalesOrder),
            "SalesInvoice" => Ok(TransactionType::SalesInvoice),
            "ReturnOrder" => Ok(TransactionType::ReturnOrder),
            "ReturnInvoice" => Ok(TransactionType::ReturnInvoice),
            other => Err(UnknownTransactionType(other.to_string())),
        }
    }
}
