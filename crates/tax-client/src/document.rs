//! Request and response documents exchanged with the remote tax service.
//!
//! Field names follow the service's camelCase JSON contract. Amounts travel
//! as JSON numbers and are held as [`Decimal`] on this side.

use chrono::NaiveDate;
use common::TransactionType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Prefix of line numbers that carry a promotion discount.
pub const DISCOUNT_LINE_PREFIX: &str = "DI-";

/// Postal address block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBlock {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addresses {
    pub ship_from: AddressBlock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_to: Option<AddressBlock>,
}

/// One taxable line, or a discount line when `amount` is negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEntry {
    /// `LI-<id>`, `FR-<id>` or `DI-<promotion id>`.
    pub number: String,
    pub quantity: u32,
    /// Extended amount (unit price times quantity).
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub tax_code: String,
    pub item_code: String,
    pub description: String,
    /// For discount lines, the line number the discount applies to.
    /// Absent for order-level discounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_target: Option<String>,
}

impl LineEntry {
    pub fn is_discount(&self) -> bool {
        self.number.starts_with(DISCOUNT_LINE_PREFIX)
    }
}

/// Document sent to create a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDocument {
    pub company_code: String,
    /// Document code; the order number.
    pub code: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub date: NaiveDate,
    pub customer_code: String,
    pub currency_code: String,
    pub commit: bool,
    pub addresses: Addresses,
    pub lines: Vec<LineEntry>,
}

impl RequestDocument {
    /// Serializes the document. Field order is fixed by the struct layout,
    /// so equal documents always produce equal bytes.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Lines that are not discounts.
    pub fn taxable_lines(&self) -> impl Iterator<Item = &LineEntry> {
        self.lines.iter().filter(|line| !line.is_discount())
    }

    pub fn discount_lines(&self) -> impl Iterator<Item = &LineEntry> {
        self.lines.iter().filter(|line| line.is_discount())
    }
}

/// Reason codes accepted by the adjust endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AdjustmentReason {
    NotAdjusted,
    SourcingIssue,
    ReconciledWithGeneralLedger,
    ExemptCertApplied,
    #[default]
    PriceAdjusted,
    ProductReturned,
    ProductExchanged,
    BadDebt,
    Other,
    Offline,
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentReason::NotAdjusted => "NotAdjusted",
            AdjustmentReason::SourcingIssue => "SourcingIssue",
            AdjustmentReason::ReconciledWithGeneralLedger => "ReconciledWithGeneralLedger",
            AdjustmentReason::ExemptCertApplied => "ExemptCertApplied",
            AdjustmentReason::PriceAdjusted => "PriceAdjusted",
            AdjustmentReason::ProductReturned => "ProductReturned",
            AdjustmentReason::ProductExchanged => "ProductExchanged",
            AdjustmentReason::BadDebt => "BadDebt",
            AdjustmentReason::Other => "Other",
            AdjustmentReason::Offline => "Offline",
        }
    }
}

impl std::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AdjustmentReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            AdjustmentReason::NotAdjusted,
            AdjustmentReason::SourcingIssue,
            AdjustmentReason::ReconciledWithGeneralLedger,
            AdjustmentReason::ExemptCertApplied,
            AdjustmentReason::PriceAdjusted,
            AdjustmentReason::ProductReturned,
            AdjustmentReason::ProductExchanged,
            AdjustmentReason::BadDebt,
            AdjustmentReason::Other,
            AdjustmentReason::Offline,
        ]
        .into_iter()
        .find(|reason| reason.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown adjustment reason: {s}"))
    }
}

/// Body of an adjust call: the replacement document plus why it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustTransactionRequest {
    pub adjustment_reason: AdjustmentReason,
    pub adjustment_description: String,
    pub new_transaction: RequestDocument,
}

/// Lifecycle state reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DocumentStatus {
    Temporary,
    #[default]
    Saved,
    Posted,
    Committed,
    Cancelled,
    Adjusted,
    #[serde(other)]
    Unknown,
}

/// One taxing authority's share of a line's tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JurisdictionDetail {
    #[serde(rename = "jurisName")]
    pub jurisdiction_name: String,
    #[serde(rename = "jurisType", default)]
    pub jurisdiction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
}

/// Tax computed for one request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseLine {
    pub line_number: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub taxable_amount: Decimal,
    #[serde(default)]
    pub details: Vec<JurisdictionDetail>,
}

/// Transaction as returned by create, adjust, commit, void and get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDocument {
    pub code: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_tax: Decimal,
    #[serde(default)]
    pub lines: Vec<ResponseLine>,
}

impl ResponseDocument {
    pub fn line(&self, line_number: &str) -> Option<&ResponseLine> {
        self.lines.iter().find(|line| line.line_number == line_number)
    }
}
