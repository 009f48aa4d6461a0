//! Builds request documents from order state.
//!
//! Presenting is a pure function of the order: the same order state always
//! yields the same document, and therefore the same JSON bytes. Nothing here
//! reads the clock.

use chrono::NaiveDate;
use common::{TaxTarget, TransactionType};
use domain::{Address, PromotionAdjustment, PromotionScope, TaxCodeTable, TaxableOrder};
use tax_client::{
    AddressBlock, Addresses, AdjustTransactionRequest, AdjustmentReason, DISCOUNT_LINE_PREFIX,
    LineEntry, RequestDocument,
};

use crate::config::TaxConfig;
use crate::error::ValidationError;

/// Per-call presentation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentOptions {
    pub company_code: String,
    pub transaction_type: TransactionType,
    pub commit: bool,
    /// Used when the order has no completion date of its own.
    pub document_date: Option<NaiveDate>,
    pub tax_codes: TaxCodeTable,
}

impl PresentOptions {
    pub fn from_config(config: &TaxConfig) -> Self {
        Self {
            company_code: config.company_code.clone(),
            transaction_type: config.transaction_type,
            commit: config.commit_on_create,
            document_date: None,
            tax_codes: config.tax_codes.clone(),
        }
    }

    pub fn with_document_date(mut self, date: NaiveDate) -> Self {
        self.document_date = Some(date);
        self
    }
}

/// Converts a host address into the wire address block.
pub fn address_block(address: &Address) -> AddressBlock {
    AddressBlock {
        line1: address.line1.clone(),
        line2: address.line2.clone(),
        city: address.city.clone(),
        region: address.region.clone(),
        postal_code: address.postal_code.clone(),
        country: address.country.clone(),
    }
}

/// Presents an order as a create-transaction document.
///
/// Lines are emitted line items first, then shipments, then one negative
/// discount line per non-zero promotion adjustment.
pub fn present<O: TaxableOrder + ?Sized>(
    order: &O,
    ship_from: &Address,
    options: &PresentOptions,
) -> Result<RequestDocument, ValidationError> {
    if order.number().trim().is_empty() {
        return Err(ValidationError::MissingDocumentCode(order.order_id()));
    }
    let date = order
        .transaction_date()
        .or(options.document_date)
        .ok_or_else(|| ValidationError::MissingDocumentDate {
            order_number: order.number().to_string(),
        })?;

    let item_lines = order.line_items().iter().map(|item| LineEntry {
        number: TaxTarget::LineItem(item.id).line_number(),
        quantity: item.quantity,
        amount: item.amount().amount(),
        tax_code: item.tax_code(&options.tax_codes),
        item_code: item.sku.clone(),
        description: item.name.clone(),
        discount_target: None,
    });

    let shipment_lines = order.shipments().iter().map(|shipment| LineEntry {
        number: TaxTarget::Shipment(shipment.id).line_number(),
        quantity: 1,
        amount: shipment.cost.amount(),
        tax_code: shipment.tax_code(&options.tax_codes),
        item_code: shipment.method.clone(),
        description: shipment.method.clone(),
        discount_target: None,
    });

    let discount_lines = order
        .promotion_adjustments()
        .iter()
        .filter(|promotion| !promotion.amount.is_zero())
        .map(|promotion| discount_line(order, promotion, &options.tax_codes));

    Ok(RequestDocument {
        company_code: options.company_code.clone(),
        code: order.number().to_string(),
        transaction_type: options.transaction_type,
        date,
        customer_code: order.customer_code().to_string(),
        currency_code: order.currency().to_string(),
        commit: options.commit,
        addresses: Addresses {
            ship_from: address_block(ship_from),
            ship_to: order.ship_address().map(address_block),
        },
        lines: item_lines
            .chain(shipment_lines)
            .chain(discount_lines)
            .collect(),
    })
}

/// A discount is taxed under the code of whatever it discounts; order-level
/// discounts use the line-item default.
fn discount_line<O: TaxableOrder + ?Sized>(
    order: &O,
    promotion: &PromotionAdjustment,
    tax_codes: &TaxCodeTable,
) -> LineEntry {
    let (target, tax_code) = match promotion.scope {
        PromotionScope::LineItem(id) => (
            Some(TaxTarget::LineItem(id)),
            order
                .line_items()
                .iter()
                .find(|item| item.id == id)
                .map(|item| item.tax_code(tax_codes)),
        ),
        PromotionScope::Shipment(id) => (
            Some(TaxTarget::Shipment(id)),
            order
                .shipments()
                .iter()
                .find(|shipment| shipment.id == id)
                .map(|shipment| shipment.tax_code(tax_codes)),
        ),
        PromotionScope::Order => (None, None),
    };

    LineEntry {
        number: format!("{DISCOUNT_LINE_PREFIX}{}", promotion.id),
        quantity: 1,
        amount: promotion.amount.amount(),
        tax_code: tax_code.unwrap_or_else(|| tax_codes.line_item.clone()),
        item_code: format!("PROMO-{}", promotion.id),
        description: promotion.label.clone(),
        discount_target: target.map(|t| t.line_number()),
    }
}

/// Wraps a document for the adjust endpoint.
pub fn present_adjustment(
    document: RequestDocument,
    reason: AdjustmentReason,
    description: impl Into<String>,
) -> AdjustTransactionRequest {
    AdjustTransactionRequest {
        adjustment_reason: reason,
        adjustment_description: description.into(),
        new_transaction: document,
    }
}
