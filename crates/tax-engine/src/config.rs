//! Tax service configuration.

use common::TransactionType;
use domain::TaxCodeTable;
use serde::{Deserialize, Serialize};

pub use tax_client::AdjustmentReason;

/// Settings passed to [`crate::TaxService`] at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxConfig {
    /// When false every computation is bypassed and the host's own tax
    /// behaviour applies.
    pub enabled: bool,
    pub company_code: String,
    /// Reason sent with every adjust call.
    pub adjustment_reason: AdjustmentReason,
    pub adjustment_description: String,
    pub transaction_type: TransactionType,
    /// Commit documents as part of create and adjust.
    pub commit_on_create: bool,
    /// On a registry miss, look for an existing remote transaction with the
    /// order's document code before creating one.
    pub recover_orphaned_transactions: bool,
    pub tax_codes: TaxCodeTable,
}

impl TaxConfig {
    pub fn new(company_code: impl Into<String>) -> Self {
        Self {
            company_code: company_code.into(),
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_adjustment_reason(mut self, reason: AdjustmentReason) -> Self {
        self.adjustment_reason = reason;
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn with_orphan_recovery(mut self, enabled: bool) -> Self {
        self.recover_orphaned_transactions = enabled;
        self
    }
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            company_code: "DEFAULT".to_string(),
            adjustment_reason: AdjustmentReason::PriceAdjusted,
            adjustment_description: "Order updated".to_string(),
            transaction_type: TransactionType::SalesInvoice,
            commit_on_create: false,
            recover_orphaned_transactions: true,
            tax_codes: TaxCodeTable::default(),
        }
    }
}
