//! Tax targets and their wire line numbers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{LineItemId, ShipmentId};

const LINE_ITEM_PREFIX: &str = "LI-";
const SHIPMENT_PREFIX: &str = "FR-";

/// The kind of object a tax line can be charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    LineItem,
    Shipment,
}

impl TargetKind {
    /// Returns the stable name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::LineItem => "line_item",
            TargetKind::Shipment => "shipment",
        }
    }
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A line item or shipment that owns a tax adjustment.
///
/// On the wire a target is identified by its line number: `LI-<id>` for
/// line items and `FR-<id>` for shipments (freight).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TaxTarget {
    LineItem(LineItemId),
    Shipment(ShipmentId),
}

/// Error returned when a line number does not name a known target kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised line number: {0:?}")]
pub struct TargetParseError(pub String);

impl TaxTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            TaxTarget::LineItem(_) => TargetKind::LineItem,
            TaxTarget::Shipment(_) => TargetKind::Shipment,
        }
    }

    /// Raw host identifier, regardless of kind.
    pub fn raw_id(&self) -> i64 {
        match self {
            TaxTarget::LineItem(id) => id.as_i64(),
            TaxTarget::Shipment(id) => id.as_i64(),
        }
    }

    /// Rebuilds a target from its storage representation.
    pub fn from_parts(kind: TargetKind, id: i64) -> Self {
        match kind {
            TargetKind::LineItem => TaxTarget::LineItem(LineItemId::new(id)),
            TargetKind::Shipment => TaxTarget::Shipment(ShipmentId::new(id)),
        }
    }

    /// Returns the wire line number for this target.
    pub fn line_number(&self) -> String {
        match self {
            TaxTarget::LineItem(id) => format!("{LINE_ITEM_PREFIX}{id}"),
            TaxTarget::Shipment(id) => format!("{SHIPMENT_PREFIX}{id}"),
        }
    }

    /// Parses a wire line number back into a target.
    pub fn parse_line_number(number: &str) -> Result<Self, TargetParseError> {
        let parse_id = |raw: &str| {
            raw.parse::<i64>()
                .map_err(|_| TargetParseError(number.to_string()))
        };

        if let Some(raw) = number.strip_prefix(LINE_ITEM_PREFIX) {
            Ok(TaxTarget::LineItem(LineItemId::new(parse_id(raw)?)))
        } else if let Some(raw) = number.strip_prefix(SHIPMENT_PREFIX) {
            Ok(TaxTarget::Shipment(ShipmentId::new(parse_id(raw)?)))
        } else {
            Err(TargetParseError(number.to_string()))
        }
    }
}

impl std::fmt::Display for TaxTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.line_number())
    }
}

impl std::str::FromStr for TaxTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line_number(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_numbers_use_kind_prefixes() {
        assert_eq!(TaxTarget::LineItem(LineItemId::new(1)).line_number(), "LI-1");
        assert_eq!(TaxTarget::Shipment(ShipmentId::new(9)).line_number(), "FR-9");
    }

    #[test]
    fn parse_line_number_accepts_both_kinds() {
        assert_eq!(
            TaxTarget::parse_line_number("LI-12").unwrap(),
            TaxTarget::LineItem(LineItemId::new(12))
        );
        assert_eq!(
            "FR-3".parse::<TaxTarget>().unwrap(),
            TaxTarget::Shipment(ShipmentId::new(3))
        );
    }

    #[test]
    fn parse_line_number_rejects_unknown_prefix_and_garbage_ids() {
        assert!(TaxTarget::parse_line_number("DI-1").is_err());
        assert!(TaxTarget::parse_line_number("LI-abc").is_err());
        assert!(TaxTarget::parse_line_number("").is_err());
    }

    #[test]
    fn from_parts_round_trips_storage_representation() {
        let target = TaxTarget::Shipment(ShipmentId::new(5));
        assert_eq!(TaxTarget::from_parts(target.kind(), target.raw_id()), target);
        assert_eq!(target.kind().as_str(), "shipment");
    }
}
