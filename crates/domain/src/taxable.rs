//! The capability the tax engine needs from a host order.

use chrono::NaiveDate;
use common::{OrderId, TaxTarget};
use tax_store::TaxAdjustment;

use crate::order::{Address, LineItem, PromotionAdjustment, Shipment};

/// Read access to an order's taxable state plus the hooks the reconciler
/// invokes after writing adjustments.
///
/// Hosts implement this with an adapter over their own order type.
pub trait TaxableOrder: Send + Sync {
    fn order_id(&self) -> OrderId;

    /// Order number; used as the remote document code.
    fn number(&self) -> &str;

    /// ISO 4217 currency code.
    fn currency(&self) -> &str;

    fn customer_code(&self) -> &str;

    /// Date the sale is reported on. `None` means "not yet completed"; the
    /// caller must then supply a date explicitly.
    fn transaction_date(&self) -> Option<NaiveDate>;

    fn ship_address(&self) -> Option<&Address>;

    fn line_items(&self) -> &[LineItem];

    fn shipments(&self) -> &[Shipment];

    fn promotion_adjustments(&self) -> &[PromotionAdjustment];

    /// Recomputes line, shipment and order totals from the given tax
    /// adjustments, which are every adjustment the order currently has.
    fn recalculate_totals(&mut self, tax_adjustments: &[TaxAdjustment]);

    /// Marks the order's tax as needing a re-sync.
    fn flag_tax_out_of_sync(&mut self, reason: &str);

    fn clear_tax_flag(&mut self);

    /// Every line item then every shipment, in order.
    fn targets(&self) -> Vec<TaxTarget> {
        self.line_items()
            .iter()
            .map(|item| TaxTarget::LineItem(item.id))
            .chain(
                self.shipments()
                    .iter()
                    .map(|shipment| TaxTarget::Shipment(shipment.id)),
            )
            .collect()
    }

    fn has_target(&self, target: TaxTarget) -> bool {
        match target {
            TaxTarget::LineItem(id) => self.line_items().iter().any(|item| item.id == id),
            TaxTarget::Shipment(id) => self.shipments().iter().any(|s| s.id == id),
        }
    }
}
