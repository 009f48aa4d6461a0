//! Persisted tax records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Money, OrderId, StoreError, TaxTarget, TransactionType};

/// Label given to adjustments when the tax rate carries no name.
pub const DEFAULT_ADJUSTMENT_LABEL: &str = "Sales Tax";

/// Unique identifier for a tax adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjustmentId(Uuid);

impl AdjustmentId {
    /// Creates a new random adjustment ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an adjustment ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AdjustmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AdjustmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One taxing authority's share of a line's tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub name: String,
    /// Authority level, e.g. `State`, `County`, `City`, `Special`.
    pub kind: String,
    pub region: Option<String>,
    pub country: Option<String>,
    pub rate: Decimal,
    pub tax: Money,
}

/// Rate metadata that produced a tax adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaxRate {
    pub name: String,
    /// Combined rate across all jurisdictions.
    pub rate: Decimal,
    pub jurisdictions: Vec<Jurisdiction>,
}

impl TaxRate {
    /// Builds a rate from its jurisdictions, summing their rates.
    pub fn from_jurisdictions(name: impl Into<String>, jurisdictions: Vec<Jurisdiction>) -> Self {
        let rate = jurisdictions.iter().map(|j| j.rate).sum();
        Self {
            name: name.into(),
            rate,
            jurisdictions,
        }
    }
}

/// Tax owed on a single line item or shipment.
///
/// An adjustment is created once per target and then mutated in place on
/// every later reconciliation; its id and creation time never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxAdjustment {
    pub id: AdjustmentId,
    pub order_id: OrderId,
    pub target: TaxTarget,
    pub amount: Money,
    pub label: String,
    pub source: TaxRate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaxAdjustment {
    /// Creates a fresh adjustment for a target.
    pub fn new(order_id: OrderId, target: TaxTarget, amount: Money, source: TaxRate) -> Self {
        let now = Utc::now();
        Self {
            id: AdjustmentId::new(),
            order_id,
            target,
            amount,
            label: label_for(&source),
            source,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites amount and source. Returns true if anything changed.
    pub fn apply(&mut self, amount: Money, source: TaxRate) -> bool {
        let changed = self.amount != amount || self.source != source;
        if changed {
            self.amount = amount;
            self.label = label_for(&source);
            self.source = source;
            self.updated_at = Utc::now();
        }
        changed
    }
}

fn label_for(source: &TaxRate) -> String {
    if source.name.trim().is_empty() {
        DEFAULT_ADJUSTMENT_LABEL.to_string()
    } else {
        source.name.clone()
    }
}

/// Lifecycle status of a remote transaction as last seen locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransactionStatus {
    #[default]
    Saved,
    Committed,
    Voided,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Saved => "Saved",
            TransactionStatus::Committed => "Committed",
            TransactionStatus::Voided => "Voided",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Saved" => Ok(TransactionStatus::Saved),
            "Committed" => Ok(TransactionStatus::Committed),
            "Voided" => Ok(TransactionStatus::Voided),
            other => Err(StoreError::InvalidRecord(format!(
                "unknown transaction status {other:?}"
            ))),
        }
    }
}

/// The single remote transaction associated with an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRef {
    pub order_id: OrderId,
    pub code: String,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRef {
    pub fn new(order_id: OrderId, code: impl Into<String>, transaction_type: TransactionType) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            code: code.into(),
            transaction_type,
            status: TransactionStatus::Saved,
            created_at: now,
            updated_at: now,
        }
    }

    /// A voided transaction can no longer be adjusted or committed.
    pub fn is_live(&self) -> bool {
        self.status != TransactionStatus::Voided
    }
}
