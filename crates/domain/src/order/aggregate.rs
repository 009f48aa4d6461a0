//! Reference order aggregate.

use chrono::NaiveDate;
use common::{LineItemId, Money, OrderId, ShipmentId, TaxTarget};
use serde::{Deserialize, Serialize};
use tax_store::TaxAdjustment;

use crate::error::OrderError;
use crate::taxable::TaxableOrder;

use super::{Address, LineItem, PromotionAdjustment, PromotionScope, Shipment};

/// Order-level totals, recomputed by [`Order::recalculate_totals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub item_total: Money,
    pub ship_total: Money,
    /// Sum of all promotions; never positive.
    pub promo_total: Money,
    pub additional_tax_total: Money,
    pub total: Money,
}

/// Order aggregate root as seen by the tax engine.
///
/// Stands in for the host platform's order: it owns line items, shipments
/// and promotions, and knows how to roll tax adjustments up into totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    number: String,
    currency: String,
    customer_code: String,
    ship_address: Option<Address>,
    completed_on: Option<NaiveDate>,
    line_items: Vec<LineItem>,
    shipments: Vec<Shipment>,
    promotions: Vec<PromotionAdjustment>,
    totals: OrderTotals,
    tax_out_of_sync: Option<String>,
}

impl Order {
    /// Creates an empty USD order.
    pub fn new(number: impl Into<String>, customer_code: impl Into<String>) -> Self {
        Self::with_id(OrderId::new(), number, customer_code)
    }

    pub fn with_id(
        id: OrderId,
        number: impl Into<String>,
        customer_code: impl Into<String>,
    ) -> Self {
        Self {
            id,
            number: number.into(),
            currency: "USD".to_string(),
            customer_code: customer_code.into(),
            ship_address: None,
            completed_on: None,
            line_items: Vec::new(),
            shipments: Vec::new(),
            promotions: Vec::new(),
            totals: OrderTotals::default(),
            tax_out_of_sync: None,
        }
    }

    pub fn set_currency(&mut self, currency: impl Into<String>) {
        self.currency = currency.into();
    }

    pub fn set_ship_address(&mut self, address: Address) {
        self.ship_address = Some(address);
    }

    /// Records the completion date used as the tax document date.
    pub fn complete(&mut self, on: NaiveDate) {
        self.completed_on = Some(on);
    }

    pub fn add_line_item(&mut self, item: LineItem) -> Result<(), OrderError> {
        if item.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }
        if item.price.is_negative() {
            return Err(OrderError::InvalidPrice {
                price: item.price.to_string(),
            });
        }
        if self.line_item(item.id).is_some() {
            return Err(OrderError::DuplicateLineItem(item.id));
        }
        self.line_items.push(item);
        Ok(())
    }

    pub fn add_shipment(&mut self, shipment: Shipment) -> Result<(), OrderError> {
        if shipment.cost.is_negative() {
            return Err(OrderError::InvalidPrice {
                price: shipment.cost.to_string(),
            });
        }
        if self.shipment(shipment.id).is_some() {
            return Err(OrderError::DuplicateShipment(shipment.id));
        }
        self.shipments.push(shipment);
        Ok(())
    }

    /// Applies a promotion adjustment and refreshes the scoped promo totals.
    pub fn apply_promotion(&mut self, promotion: PromotionAdjustment) -> Result<(), OrderError> {
        if promotion.amount.is_positive() {
            return Err(OrderError::InvalidPromotionAmount {
                amount: promotion.amount.to_string(),
            });
        }
        match promotion.scope {
            PromotionScope::LineItem(id) if self.line_item(id).is_none() => {
                return Err(OrderError::PromotionTargetNotFound(
                    TaxTarget::LineItem(id).line_number(),
                ));
            }
            PromotionScope::Shipment(id) if self.shipment(id).is_none() => {
                return Err(OrderError::PromotionTargetNotFound(
                    TaxTarget::Shipment(id).line_number(),
                ));
            }
            _ => {}
        }
        self.promotions.push(promotion);
        self.refresh_promo_totals();
        Ok(())
    }

    /// Removes a line item. Its tax adjustment, if any, is the host's to
    /// delete.
    pub fn remove_line_item(&mut self, id: LineItemId) -> Option<LineItem> {
        let index = self.line_items.iter().position(|item| item.id == id)?;
        self.promotions
            .retain(|p| p.scope != PromotionScope::LineItem(id));
        let removed = self.line_items.remove(index);
        self.refresh_promo_totals();
        Some(removed)
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn line_item(&self, id: LineItemId) -> Option<&LineItem> {
        self.line_items.iter().find(|item| item.id == id)
    }

    pub fn shipment(&self, id: ShipmentId) -> Option<&Shipment> {
        self.shipments.iter().find(|s| s.id == id)
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn additional_tax_total(&self) -> Money {
        self.totals.additional_tax_total
    }

    pub fn tax_out_of_sync(&self) -> Option<&str> {
        self.tax_out_of_sync.as_deref()
    }

    pub fn completed_on(&self) -> Option<NaiveDate> {
        self.completed_on
    }

    fn refresh_promo_totals(&mut self) {
        for item in &mut self.line_items {
            item.promo_total = self
                .promotions
                .iter()
                .filter(|p| p.scope == PromotionScope::LineItem(item.id))
                .map(|p| p.amount)
                .sum();
        }
        for shipment in &mut self.shipments {
            shipment.promo_total = self
                .promotions
                .iter()
                .filter(|p| p.scope == PromotionScope::Shipment(shipment.id))
                .map(|p| p.amount)
                .sum();
        }
    }
}

impl TaxableOrder for Order {
    fn order_id(&self) -> OrderId {
        self.id
    }

    fn number(&self) -> &str {
        &self.number
    }

    fn currency(&self) -> &str {
        &self.currency
    }

    fn customer_code(&self) -> &str {
        &self.customer_code
    }

    fn transaction_date(&self) -> Option<NaiveDate> {
        self.completed_on
    }

    fn ship_address(&self) -> Option<&Address> {
        self.ship_address.as_ref()
    }

    fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    fn shipments(&self) -> &[Shipment] {
        &self.shipments
    }

    fn promotion_adjustments(&self) -> &[PromotionAdjustment] {
        &self.promotions
    }

    fn recalculate_totals(&mut self, tax_adjustments: &[TaxAdjustment]) {
        self.refresh_promo_totals();

        let tax_for = |target: TaxTarget| -> Money {
            tax_adjustments
                .iter()
                .filter(|a| a.order_id == self.id && a.target == target)
                .map(|a| a.amount)
                .sum()
        };

        let line_taxes: Vec<Money> = self
            .line_items
            .iter()
            .map(|item| tax_for(TaxTarget::LineItem(item.id)))
            .collect();
        let shipment_taxes: Vec<Money> = self
            .shipments
            .iter()
            .map(|s| tax_for(TaxTarget::Shipment(s.id)))
            .collect();

        for (item, tax) in self.line_items.iter_mut().zip(line_taxes) {
            item.additional_tax_total = tax;
        }
        for (shipment, tax) in self.shipments.iter_mut().zip(shipment_taxes) {
            shipment.additional_tax_total = tax;
        }

        let item_total: Money = self.line_items.iter().map(LineItem::amount).sum();
        let ship_total: Money = self.shipments.iter().map(|s| s.cost).sum();
        let promo_total: Money = self.promotions.iter().map(|p| p.amount).sum();
        let additional_tax_total: Money = self
            .line_items
            .iter()
            .map(|i| i.additional_tax_total)
            .chain(self.shipments.iter().map(|s| s.additional_tax_total))
            .sum();

        self.totals = OrderTotals {
            item_total,
            ship_total,
            promo_total,
            additional_tax_total,
            total: item_total + ship_total + promo_total + additional_tax_total,
        };

        tracing::debug!(
            order_id = %self.id,
            total = %self.totals.total,
            additional_tax_total = %additional_tax_total,
            "order totals recalculated"
        );
    }

    fn flag_tax_out_of_sync(&mut self, reason: &str) {
        self.tax_out_of_sync = Some(reason.to_string());
    }

    fn clear_tax_flag(&mut self) {
        self.tax_out_of_sync = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tax_store::TaxRate;

    fn order_with_two_items() -> Order {
        let mut order = Order::new("R100", "customer@example.com");
        order
            .add_line_item(LineItem::new(1, "SKU-1", "Widget", Money::from_cents(1000), 2))
            .unwrap();
        order
            .add_line_item(LineItem::new(2, "SKU-2", "Gadget", Money::from_cents(1000), 3))
            .unwrap();
        order
    }

    fn tax(order: &Order, target: TaxTarget, cents: i64) -> TaxAdjustment {
        TaxAdjustment::new(order.id(), target, Money::from_cents(cents), TaxRate::default())
    }

    #[test]
    fn add_line_item_rejects_zero_quantity_and_duplicates() {
        let mut order = order_with_two_items();
        let zero = LineItem::new(3, "SKU-3", "Thing", Money::from_cents(100), 0);
        assert_eq!(
            order.add_line_item(zero),
            Err(OrderError::InvalidQuantity { quantity: 0 })
        );

        let dup = LineItem::new(1, "SKU-1", "Widget", Money::from_cents(100), 1);
        assert_eq!(
            order.add_line_item(dup),
            Err(OrderError::DuplicateLineItem(LineItemId::new(1)))
        );
    }

    #[test]
    fn apply_promotion_validates_scope_and_sign() {
        let mut order = order_with_two_items();
        let positive = PromotionAdjustment::new(
            1,
            "Bad",
            Money::from_cents(100),
            PromotionScope::Order,
        );
        assert!(matches!(
            order.apply_promotion(positive),
            Err(OrderError::InvalidPromotionAmount { .. })
        ));

        let missing = PromotionAdjustment::new(
            2,
            "Missing",
            Money::from_cents(-100),
            PromotionScope::LineItem(LineItemId::new(99)),
        );
        assert_eq!(
            order.apply_promotion(missing),
            Err(OrderError::PromotionTargetNotFound("LI-99".to_string()))
        );
    }

    #[test]
    fn line_promotion_updates_line_promo_total() {
        let mut order = order_with_two_items();
        order
            .apply_promotion(PromotionAdjustment::new(
                1,
                "10% off",
                Money::from_cents(-200),
                PromotionScope::LineItem(LineItemId::new(1)),
            ))
            .unwrap();

        let item = order.line_item(LineItemId::new(1)).unwrap();
        assert_eq!(item.promo_total, Money::from_cents(-200));
        assert_eq!(item.discounted_amount(), Money::from_cents(1800));
    }

    #[test]
    fn recalculate_totals_rolls_up_tax() {
        let mut order = order_with_two_items();
        let adjustments = vec![
            tax(&order, TaxTarget::LineItem(LineItemId::new(1)), 160),
            tax(&order, TaxTarget::LineItem(LineItemId::new(2)), 240),
        ];

        order.recalculate_totals(&adjustments);

        assert_eq!(order.totals().item_total, Money::from_cents(5000));
        assert_eq!(order.additional_tax_total(), Money::from_cents(400));
        assert_eq!(order.total(), Money::from_cents(5400));
        assert_eq!(
            order.line_item(LineItemId::new(2)).unwrap().additional_tax_total,
            Money::from_cents(240)
        );
    }

    #[test]
    fn recalculate_totals_includes_shipping_and_promotions() {
        let mut order = order_with_two_items();
        order
            .add_shipment(Shipment::new(1, "UPS Ground", Money::from_cents(500)))
            .unwrap();
        order
            .apply_promotion(PromotionAdjustment::new(
                1,
                "$20 off",
                Money::from_cents(-2000),
                PromotionScope::Order,
            ))
            .unwrap();

        let adjustments = vec![
            tax(&order, TaxTarget::LineItem(LineItemId::new(1)), 100),
            tax(&order, TaxTarget::Shipment(ShipmentId::new(1)), 40),
        ];
        order.recalculate_totals(&adjustments);

        let totals = order.totals();
        assert_eq!(totals.ship_total, Money::from_cents(500));
        assert_eq!(totals.promo_total, Money::from_cents(-2000));
        assert_eq!(totals.additional_tax_total, Money::from_cents(140));
        assert_eq!(totals.total, Money::from_cents(5000 + 500 - 2000 + 140));
    }

    #[test]
    fn recalculate_totals_ignores_other_orders_adjustments() {
        let mut order = order_with_two_items();
        let foreign = TaxAdjustment::new(
            OrderId::new(),
            TaxTarget::LineItem(LineItemId::new(1)),
            Money::from_cents(999),
            TaxRate::default(),
        );
        order.recalculate_totals(&[foreign]);
        assert_eq!(order.additional_tax_total(), Money::zero());
    }

    #[test]
    fn remove_line_item_drops_scoped_promotions() {
        let mut order = order_with_two_items();
        order
            .apply_promotion(PromotionAdjustment::new(
                1,
                "Line promo",
                Money::from_cents(-100),
                PromotionScope::LineItem(LineItemId::new(1)),
            ))
            .unwrap();

        let removed = order.remove_line_item(LineItemId::new(1)).unwrap();
        assert_eq!(removed.id, LineItemId::new(1));
        assert!(order.promotion_adjustments().is_empty());
        assert_eq!(order.line_items().len(), 1);
    }

    #[test]
    fn tax_flag_can_be_set_and_cleared() {
        let mut order = order_with_two_items();
        order.flag_tax_out_of_sync("sum mismatch");
        assert_eq!(order.tax_out_of_sync(), Some("sum mismatch"));
        order.clear_tax_flag();
        assert!(order.tax_out_of_sync().is_none());
    }

    #[test]
    fn targets_lists_line_items_then_shipments() {
        let mut order = order_with_two_items();
        order
            .add_shipment(Shipment::new(7, "Freight", Money::from_cents(100)))
            .unwrap();
        assert_eq!(
            order.targets(),
            vec![
                TaxTarget::LineItem(LineItemId::new(1)),
                TaxTarget::LineItem(LineItemId::new(2)),
                TaxTarget::Shipment(ShipmentId::new(7)),
            ]
        );
        assert!(order.has_target(TaxTarget::Shipment(ShipmentId::new(7))));
        assert!(!order.has_target(TaxTarget::Shipment(ShipmentId::new(8))));
    }
}
