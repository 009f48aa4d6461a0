//! Value objects for the order domain.

use common::{LineItemId, Money, ShipmentId, TargetKind};
use serde::{Deserialize, Serialize};

use crate::tax_code::{TaxCategory, TaxCodeTable};

/// Postal address used for ship-to and ship-from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    /// State or province code.
    pub region: String,
    pub postal_code: String,
    /// ISO 3166 alpha-2 country code.
    pub country: String,
}

impl Address {
    pub fn new(
        line1: impl Into<String>,
        city: impl Into<String>,
        region: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            line1: line1.into(),
            line2: None,
            city: city.into(),
            region: region.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }
}

/// A purchasable line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub sku: String,
    pub name: String,
    /// Price per unit.
    pub price: Money,
    pub quantity: u32,
    pub tax_category: Option<TaxCategory>,

    /// Sum of promotions scoped to this line. Set by totals recalculation.
    #[serde(default)]
    pub promo_total: Money,

    /// Tax charged on this line. Set by totals recalculation.
    #[serde(default)]
    pub additional_tax_total: Money,
}

impl LineItem {
    pub fn new(
        id: impl Into<LineItemId>,
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            sku: sku.into(),
            name: name.into(),
            price,
            quantity,
            tax_category: None,
            promo_total: Money::zero(),
            additional_tax_total: Money::zero(),
        }
    }

    pub fn with_tax_category(mut self, category: TaxCategory) -> Self {
        self.tax_category = Some(category);
        self
    }

    /// Returns price * quantity, before promotions.
    pub fn amount(&self) -> Money {
        self.price.multiply(self.quantity)
    }

    /// Amount after line-level promotions.
    pub fn discounted_amount(&self) -> Money {
        self.amount() + self.promo_total
    }

    pub fn tax_code(&self, table: &TaxCodeTable) -> String {
        table.resolve(TargetKind::LineItem, self.tax_category.as_ref())
    }
}

/// A shipment whose freight cost may be taxable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    /// Shipping method name, sent as the line description.
    pub method: String,
    pub cost: Money,
    pub tax_category: Option<TaxCategory>,

    #[serde(default)]
    pub promo_total: Money,

    #[serde(default)]
    pub additional_tax_total: Money,
}

impl Shipment {
    pub fn new(id: impl Into<ShipmentId>, method: impl Into<String>, cost: Money) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            cost,
            tax_category: None,
            promo_total: Money::zero(),
            additional_tax_total: Money::zero(),
        }
    }

    pub fn with_tax_category(mut self, category: TaxCategory) -> Self {
        self.tax_category = Some(category);
        self
    }

    pub fn tax_code(&self, table: &TaxCodeTable) -> String {
        table.resolve(TargetKind::Shipment, self.tax_category.as_ref())
    }
}

/// What a promotion adjustment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum PromotionScope {
    LineItem(LineItemId),
    Shipment(ShipmentId),
    Order,
}

/// A discount applied by the host promotion engine. Amount is never
/// positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionAdjustment {
    pub id: i64,
    pub label: String,
    pub amount: Money,
    pub scope: PromotionScope,
}

impl PromotionAdjustment {
    pub fn new(id: i64, label: impl Into<String>, amount: Money, scope: PromotionScope) -> Self {
        Self {
            id,
            label: label.into(),
            amount,
            scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_item_amount_multiplies_quantity() {
        let item = LineItem::new(1, "SKU-1", "Widget", Money::from_cents(1000), 3);
        assert_eq!(item.amount(), Money::from_cents(3000));
    }

    #[test]
    fn discounted_amount_applies_line_promotions() {
        let mut item = LineItem::new(1, "SKU-1", "Widget", Money::from_cents(1000), 4);
        item.promo_total = Money::from_cents(-400);
        assert_eq!(item.discounted_amount(), Money::from_cents(3600));
    }

    #[test]
    fn tax_code_falls_back_to_table_default() {
        let table = TaxCodeTable::default();
        let item = LineItem::new(1, "SKU-1", "Widget", Money::from_cents(1000), 1);
        assert_eq!(item.tax_code(&table), "P0000000");

        let exempt = item.with_tax_category(TaxCategory::new("Exempt", Some("NT")));
        assert_eq!(exempt.tax_code(&table), "NT");

        let shipment = Shipment::new(1, "UPS Ground", Money::from_cents(500));
        assert_eq!(shipment.tax_code(&table), "FR000000");
    }

    #[test]
    fn promotion_scope_serializes_with_tag() {
        let json = serde_json::to_value(PromotionScope::LineItem(LineItemId::new(2))).unwrap();
        assert_eq!(json, serde_json::json!({"type": "line_item", "id": 2}));
        let order = serde_json::to_value(PromotionScope::Order).unwrap();
        assert_eq!(order, serde_json::json!({"type": "order"}));
    }
}
