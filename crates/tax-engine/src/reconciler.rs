//! Applies a response document to an order's tax adjustments.
//!
//! The reconciler trusts the response verbatim: it never re-derives how the
//! remote service spread discounts across lines. Its job is to turn the
//! response into exactly one adjustment per line item and shipment, keep the
//! order's transaction reference current and hand the result back to the
//! order's totals hook.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use common::{Money, OrderId, TaxTarget, TransactionType};
use domain::TaxableOrder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tax_client::{
    DISCOUNT_LINE_PREFIX, DocumentStatus, JurisdictionDetail, ResponseDocument, ResponseLine,
};
use tax_store::{
    AdjustmentRepository, Jurisdiction, TaxAdjustment, TaxRate, TransactionRef,
    TransactionRegistry, TransactionStatus,
};

use crate::error::{ConsistencyError, ReconciliationError, ValidationError};

/// Largest tolerated gap between applied tax and the reported total.
pub const CONSISTENCY_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 3);

/// Name given to the rate of a line that carried no jurisdiction detail.
const UNDETAILED_RATE_NAME: &str = "Sales Tax";

/// Tax written for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedTax {
    pub target: TaxTarget,
    pub amount: Money,
    /// False when the response did not mention the target and it was
    /// zero-filled.
    pub reported: bool,
}

/// What a reconciliation wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub order_id: OrderId,
    pub transaction_code: String,
    pub transaction_type: TransactionType,
    /// Reported targets in response order, then zero-filled targets.
    pub applied: Vec<AppliedTax>,
    pub total_applied: Money,
    pub reported_total: Money,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ReconciliationSummary {
    pub fn amount_for(&self, target: TaxTarget) -> Option<Money> {
        self.applied
            .iter()
            .find(|applied| applied.target == target)
            .map(|applied| applied.amount)
    }
}

/// A response line that passed validation.
struct ResolvedLine {
    target: TaxTarget,
    amount: Money,
    source: TaxRate,
}

/// Reconciles response documents against one store that holds both the
/// adjustments and the transaction registry.
#[derive(Debug, Clone)]
pub struct TaxAdjustmentReconciler<S> {
    store: S,
}

impl<S> TaxAdjustmentReconciler<S>
where
    S: AdjustmentRepository + TransactionRegistry,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies `response` to `order`.
    ///
    /// Every response line is validated before anything is written. All
    /// adjustments are then upserted as one batch, the transaction
    /// reference is registered and the order's totals are recalculated.
    /// A total mismatch beyond [`CONSISTENCY_TOLERANCE`] is reported as
    /// [`ReconciliationError::Consistency`] after all of that has happened,
    /// with the order flagged out of sync.
    #[tracing::instrument(
        skip(self, order, response),
        fields(order_id = %order.order_id(), code = %response.code, lines = response.lines.len())
    )]
    pub async fn reconcile<O: TaxableOrder + ?Sized>(
        &self,
        order: &mut O,
        response: &ResponseDocument,
    ) -> Result<ReconciliationSummary, ReconciliationError> {
        let order_id = order.order_id();
        let resolved = match resolve_lines(&*order, &response.lines) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting tax response");
                metrics::counter!("tax_reconciliations_total", "outcome" => "invalid").increment(1);
                return Err(e.into());
            }
        };

        let existing: HashMap<TaxTarget, TaxAdjustment> = self
            .store
            .adjustments_for_order(order_id)
            .await?
            .into_iter()
            .map(|adjustment| (adjustment.target, adjustment))
            .collect();

        let reported: HashSet<TaxTarget> = resolved.iter().map(|line| line.target).collect();
        let missing: Vec<TaxTarget> = order
            .targets()
            .into_iter()
            .filter(|target| !reported.contains(target))
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                missing = ?missing.iter().map(TaxTarget::line_number).collect::<Vec<_>>(),
                "response omitted targets; writing zero adjustments"
            );
        }

        let mut summary = ReconciliationSummary {
            order_id,
            transaction_code: response.code.clone(),
            transaction_type: response.transaction_type,
            applied: Vec::with_capacity(resolved.len() + missing.len()),
            total_applied: Money::zero(),
            reported_total: Money::new(response.total_tax),
            created: 0,
            updated: 0,
            unchanged: 0,
        };

        let fills = missing.into_iter().map(|target| {
            (
                ResolvedLine {
                    target,
                    amount: Money::zero(),
                    source: TaxRate::default(),
                },
                false,
            )
        });
        let mut batch = Vec::new();
        for (line, was_reported) in resolved.into_iter().map(|l| (l, true)).chain(fills) {
            let adjustment = match existing.get(&line.target) {
                Some(current) => {
                    let mut adjustment = current.clone();
                    if adjustment.apply(line.amount, line.source) {
                        summary.updated += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                    adjustment
                }
                None => {
                    summary.created += 1;
                    TaxAdjustment::new(order_id, line.target, line.amount, line.source)
                }
            };
            summary.total_applied += line.amount;
            summary.applied.push(AppliedTax {
                target: line.target,
                amount: line.amount,
                reported: was_reported,
            });
            batch.push(adjustment);
        }

        if !batch.is_empty() {
            self.store.upsert_adjustments(batch).await?;
        }

        let consistency = check_consistency(summary.total_applied, summary.reported_total);

        self.register_transaction(order_id, response).await?;

        let adjustments = self.store.adjustments_for_order(order_id).await?;
        order.recalculate_totals(&adjustments);

        match consistency {
            Ok(()) => {
                order.clear_tax_flag();
                metrics::counter!("tax_reconciliations_total", "outcome" => "applied").increment(1);
                tracing::info!(
                    created = summary.created,
                    updated = summary.updated,
                    total = %summary.total_applied,
                    "tax response reconciled"
                );
                Ok(summary)
            }
            Err(source) => {
                order.flag_tax_out_of_sync(&source.to_string());
                metrics::counter!("tax_reconciliations_total", "outcome" => "inconsistent")
                    .increment(1);
                metrics::counter!("tax_consistency_errors_total").increment(1);
                tracing::error!(
                    applied = %source.applied,
                    reported = %source.reported,
                    "tax response totals are inconsistent; order flagged"
                );
                Err(ReconciliationError::Consistency {
                    source,
                    summary: Box::new(summary),
                })
            }
        }
    }

    /// Creates the order's transaction reference or updates it in place
    /// with the response's code and type.
    async fn register_transaction(
        &self,
        order_id: OrderId,
        response: &ResponseDocument,
    ) -> Result<TransactionRef, ReconciliationError> {
        let status = status_from_document(response.status);
        let transaction = match self.store.transaction_for(order_id).await? {
            Some(mut current) => {
                current.code = response.code.clone();
                current.transaction_type = response.transaction_type;
                current.status = status;
                current.updated_at = Utc::now();
                current
            }
            None => {
                let mut created =
                    TransactionRef::new(order_id, response.code.clone(), response.transaction_type);
                created.status = status;
                created
            }
        };
        Ok(self.store.register(transaction).await?)
    }
}

/// Maps the remote document status onto the locally tracked lifecycle.
pub fn status_from_document(status: DocumentStatus) -> TransactionStatus {
    match status {
        DocumentStatus::Committed | DocumentStatus::Posted => TransactionStatus::Committed,
        DocumentStatus::Cancelled => TransactionStatus::Voided,
        _ => TransactionStatus::Saved,
    }
}

/// Validates response lines against the order.
///
/// Discount lines the request carried may be echoed back untaxed; they are
/// dropped here. Any other line must name a target on the order.
fn resolve_lines<O: TaxableOrder + ?Sized>(
    order: &O,
    lines: &[ResponseLine],
) -> Result<Vec<ResolvedLine>, ValidationError> {
    let mut seen = HashSet::with_capacity(lines.len());
    let mut echoed = HashSet::new();
    let mut resolved = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(promotion_id) = echoed_discount(order, &line.line_number) {
            if !line.tax.is_zero() {
                return Err(ValidationError::TaxedDiscountLine {
                    line_number: line.line_number.clone(),
                    amount: Money::new(line.tax),
                });
            }
            if !echoed.insert(promotion_id) {
                return Err(ValidationError::DuplicateLine(line.line_number.clone()));
            }
            continue;
        }

        let target = TaxTarget::parse_line_number(&line.line_number)
            .map_err(|_| ValidationError::UnrecognisedLineNumber(line.line_number.clone()))?;
        if !order.has_target(target) {
            return Err(ValidationError::UnknownTarget(line.line_number.clone()));
        }
        if !seen.insert(target) {
            return Err(ValidationError::DuplicateLine(line.line_number.clone()));
        }
        let amount = Money::new(line.tax);
        if amount.is_negative() {
            return Err(ValidationError::NegativeTax {
                line_number: line.line_number.clone(),
                amount,
            });
        }
        resolved.push(ResolvedLine {
            target,
            amount,
            source: tax_rate_from(&line.details),
        });
    }
    Ok(resolved)
}

/// Returns the promotion id when `line_number` is a discount line for a
/// promotion on the order.
fn echoed_discount<O: TaxableOrder + ?Sized>(order: &O, line_number: &str) -> Option<i64> {
    let id: i64 = line_number.strip_prefix(DISCOUNT_LINE_PREFIX)?.parse().ok()?;
    order
        .promotion_adjustments()
        .iter()
        .any(|promotion| promotion.id == id)
        .then_some(id)
}

fn tax_rate_from(details: &[JurisdictionDetail]) -> TaxRate {
    let name = if details.is_empty() {
        UNDETAILED_RATE_NAME.to_string()
    } else {
        details
            .iter()
            .map(|detail| detail.jurisdiction_name.as_str())
            .collect::<Vec<_>>()
            .join(" + ")
    };
    let jurisdictions = details
        .iter()
        .map(|detail| Jurisdiction {
            name: detail.jurisdiction_name.clone(),
            kind: detail.jurisdiction_type.clone(),
            region: detail.region.clone(),
            country: detail.country.clone(),
            rate: detail.rate,
            tax: Money::new(detail.tax),
        })
        .collect();
    TaxRate::from_jurisdictions(name, jurisdictions)
}

fn check_consistency(applied: Money, reported: Money) -> Result<(), ConsistencyError> {
    let tolerance = Money::new(CONSISTENCY_TOLERANCE);
    if applied.approx_eq(reported, tolerance) {
        Ok(())
    } else {
        Err(ConsistencyError {
            applied,
            reported,
            difference: (applied - reported).abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::LineItemId;
    use domain::{LineItem, Order, PromotionAdjustment, PromotionScope};
    use tax_store::InMemoryTaxStore;

    fn response(lines: Vec<(&str, i64)>, total_cents: i64) -> ResponseDocument {
        ResponseDocument {
            code: "R100".into(),
            transaction_type: TransactionType::SalesInvoice,
            status: DocumentStatus::Saved,
            date: None,
            total_tax: Decimal::new(total_cents, 2),
            lines: lines
                .into_iter()
                .map(|(number, cents)| ResponseLine {
                    line_number: number.into(),
                    tax: Decimal::new(cents, 2),
                    taxable_amount: Decimal::ZERO,
                    details: vec![],
                })
                .collect(),
        }
    }

    fn order() -> Order {
        let mut order = Order::new("R100", "c");
        order
            .add_line_item(LineItem::new(1, "SKU-1", "Widget", Money::from_cents(1000), 1))
            .unwrap();
        order
    }

    #[test]
    fn tolerance_is_half_a_cent() {
        assert_eq!(CONSISTENCY_TOLERANCE, Decimal::new(5, 3));
        assert!(check_consistency(Money::from_cents(400), Money::new(Decimal::new(4004, 3))).is_ok());
        assert!(check_consistency(Money::from_cents(400), Money::from_cents(401)).is_err());
    }

    #[test]
    fn rate_name_joins_jurisdictions() {
        let details = vec![
            JurisdictionDetail {
                jurisdiction_name: "ALABAMA".into(),
                jurisdiction_type: "STA".into(),
                region: Some("AL".into()),
                country: Some("US".into()),
                rate: Decimal::new(4, 2),
                tax: Decimal::new(40, 2),
            },
            JurisdictionDetail {
                jurisdiction_name: "MONTGOMERY".into(),
                jurisdiction_type: "CTY".into(),
                region: Some("AL".into()),
                country: Some("US".into()),
                rate: Decimal::new(4, 2),
                tax: Decimal::new(40, 2),
            },
        ];
        let rate = tax_rate_from(&details);
        assert_eq!(rate.name, "ALABAMA + MONTGOMERY");
        assert_eq!(rate.rate, Decimal::new(8, 2));
        assert_eq!(rate.jurisdictions[1].tax, Money::from_cents(40));
        assert_eq!(tax_rate_from(&[]).name, "Sales Tax");
    }

    #[test]
    fn document_status_maps_to_local_lifecycle() {
        assert_eq!(status_from_document(DocumentStatus::Saved), TransactionStatus::Saved);
        assert_eq!(
            status_from_document(DocumentStatus::Committed),
            TransactionStatus::Committed
        );
        assert_eq!(status_from_document(DocumentStatus::Cancelled), TransactionStatus::Voided);
    }

    #[tokio::test]
    async fn validation_failure_writes_nothing() {
        let store = InMemoryTaxStore::new();
        let reconciler = TaxAdjustmentReconciler::new(store.clone());
        let mut order = order();

        let err = reconciler
            .reconcile(&mut order, &response(vec![("LI-1", 80), ("LI-1", 80)], 160))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconciliationError::Validation(ValidationError::DuplicateLine(_))
        ));
        assert_eq!(store.adjustment_count().await, 0);
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn negative_tax_is_rejected() {
        let reconciler = TaxAdjustmentReconciler::new(InMemoryTaxStore::new());
        let err = reconciler
            .reconcile(&mut order(), &response(vec![("LI-1", -80)], -80))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconciliationError::Validation(ValidationError::NegativeTax { .. })
        ));
    }

    fn promoted_order() -> Order {
        let mut order = order();
        order
            .apply_promotion(PromotionAdjustment::new(
                7,
                "Widget promo",
                Money::from_cents(-100),
                PromotionScope::LineItem(LineItemId::new(1)),
            ))
            .unwrap();
        order
    }

    #[tokio::test]
    async fn discount_line_without_promotion_is_unrecognised() {
        let reconciler = TaxAdjustmentReconciler::new(InMemoryTaxStore::new());
        let err = reconciler
            .reconcile(&mut promoted_order(), &response(vec![("LI-1", 72), ("DI-3", 0)], 72))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconciliationError::Validation(ValidationError::UnrecognisedLineNumber(ref n)) if n == "DI-3"
        ));
    }

    #[tokio::test]
    async fn echoed_discount_line_is_skipped() {
        let store = InMemoryTaxStore::new();
        let reconciler = TaxAdjustmentReconciler::new(store.clone());
        let mut order = promoted_order();

        let summary = reconciler
            .reconcile(&mut order, &response(vec![("LI-1", 72), ("DI-7", 0)], 72))
            .await
            .unwrap();

        assert_eq!(summary.applied.len(), 1);
        assert_eq!(summary.total_applied, Money::from_cents(72));
        assert_eq!(store.adjustment_count().await, 1);
    }

    #[tokio::test]
    async fn taxed_discount_line_is_rejected() {
        let store = InMemoryTaxStore::new();
        let reconciler = TaxAdjustmentReconciler::new(store.clone());

        let err = reconciler
            .reconcile(&mut promoted_order(), &response(vec![("LI-1", 72), ("DI-7", 5)], 77))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconciliationError::Validation(ValidationError::TaxedDiscountLine { ref line_number, .. })
                if line_number == "DI-7"
        ));
        assert_eq!(store.adjustment_count().await, 0);
    }

    #[tokio::test]
    async fn adjusting_refreshes_transaction_timestamp() {
        let store = InMemoryTaxStore::new();
        let reconciler = TaxAdjustmentReconciler::new(store.clone());
        let mut order = order();

        reconciler
            .reconcile(&mut order, &response(vec![("LI-1", 80)], 80))
            .await
            .unwrap();
        let first = store.transaction_for(order.id()).await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        reconciler
            .reconcile(&mut order, &response(vec![("LI-1", 90)], 90))
            .await
            .unwrap();
        let second = store.transaction_for(order.id()).await.unwrap().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[tokio::test]
    async fn summary_counts_created_updated_and_unchanged() {
        let store = InMemoryTaxStore::new();
        let reconciler = TaxAdjustmentReconciler::new(store.clone());
        let mut order = order();
        order
            .add_line_item(LineItem::new(2, "SKU-2", "Gadget", Money::from_cents(1000), 1))
            .unwrap();

        let first = reconciler
            .reconcile(&mut order, &response(vec![("LI-1", 80), ("LI-2", 80)], 160))
            .await
            .unwrap();
        assert_eq!((first.created, first.updated, first.unchanged), (2, 0, 0));

        let second = reconciler
            .reconcile(&mut order, &response(vec![("LI-1", 80), ("LI-2", 90)], 170))
            .await
            .unwrap();
        assert_eq!((second.created, second.updated, second.unchanged), (0, 1, 1));
        assert_eq!(
            second.amount_for(TaxTarget::LineItem(LineItemId::new(2))),
            Some(Money::from_cents(90))
        );
    }
}
