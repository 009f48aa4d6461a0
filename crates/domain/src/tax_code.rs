//! Tax categories and the default tax-code table.

use common::TargetKind;
use serde::{Deserialize, Serialize};

/// Default code for tangible goods with no category.
pub const DEFAULT_LINE_ITEM_TAX_CODE: &str = "P0000000";

/// Default code for freight.
pub const DEFAULT_SHIPMENT_TAX_CODE: &str = "FR000000";

/// Host tax category attached to a product or shipping method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCategory {
    pub name: String,
    /// Remote tax code, e.g. `NT` for non-taxable goods.
    pub tax_code: Option<String>,
}

impl TaxCategory {
    pub fn new(name: impl Into<String>, tax_code: Option<&str>) -> Self {
        Self {
            name: name.into(),
            tax_code: tax_code.map(str::to_string),
        }
    }

    /// Returns the category's code if it is present and non-blank.
    pub fn code(&self) -> Option<&str> {
        self.tax_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Fallback tax codes keyed by target kind, supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCodeTable {
    pub line_item: String,
    pub shipment: String,
}

impl TaxCodeTable {
    pub fn code_for(&self, kind: TargetKind) -> &str {
        match kind {
            TargetKind::LineItem => &self.line_item,
            TargetKind::Shipment => &self.shipment,
        }
    }

    /// Resolves the code to send for a target: the category's own code when
    /// it has one, otherwise the table default for the kind.
    pub fn resolve(&self, kind: TargetKind, category: Option<&TaxCategory>) -> String {
        category
            .and_then(TaxCategory::code)
            .unwrap_or_else(|| self.code_for(kind))
            .to_string()
    }
}

impl Default for TaxCodeTable {
    fn default() -> Self {
        Self {
            line_item: DEFAULT_LINE_ITEM_TAX_CODE.to_string(),
            shipment: DEFAULT_SHIPMENT_TAX_CODE.to_string(),
        }
    }
}
