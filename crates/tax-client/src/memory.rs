//! In-memory tax service for tests and local runs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::client::TaxServiceClient;
use crate::document::{
    AdjustTransactionRequest, AdjustmentReason, DocumentStatus, JurisdictionDetail, LineEntry,
    RequestDocument, ResponseDocument, ResponseLine,
};
use crate::error::{Result, TransportError};

/// Tax codes the fake treats as exempt.
const EXEMPT_TAX_CODES: &[&str] = &["NT"];

/// A call received by [`InMemoryTaxService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Create { code: String },
    Adjust { code: String, reason: AdjustmentReason },
    Void { code: String },
    Commit { code: String },
    Get { code: String },
}

#[derive(Debug, Default)]
struct InMemoryTaxState {
    transactions: HashMap<(String, String), ResponseDocument>,
    scripted: VecDeque<ResponseDocument>,
    failures: VecDeque<TransportError>,
    calls: Vec<RecordedCall>,
}

/// Flat-rate stand-in for the remote service.
///
/// Computes `round(taxable * rate, 2)` per line, where the taxable base is
/// the line amount minus its own discounts and its price-proportional share
/// of order-level discounts. Freight lines take no share of order-level
/// discounts. Scripted responses and injected failures take precedence over
/// computation, in FIFO order.
#[derive(Debug, Clone)]
pub struct InMemoryTaxService {
    rate: Decimal,
    jurisdiction: String,
    state: Arc<RwLock<InMemoryTaxState>>,
}

impl Default for InMemoryTaxService {
    fn default() -> Self {
        Self::new(Decimal::new(8, 2))
    }
}

impl InMemoryTaxService {
    pub fn new(rate: Decimal) -> Self {
        Self {
            rate,
            jurisdiction: "STATE".to_string(),
            state: Arc::default(),
        }
    }

    pub fn with_jurisdiction(mut self, name: impl Into<String>) -> Self {
        self.jurisdiction = name.into();
        self
    }

    fn state(&self) -> RwLockWriteGuard<'_, InMemoryTaxState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a response returned verbatim by the next create or adjust.
    pub fn script_response(&self, response: ResponseDocument) {
        self.state().scripted.push_back(response);
    }

    /// Makes the next call of any kind fail with `error`.
    pub fn fail_next(&self, error: TransportError) {
        self.state().failures.push_back(error);
    }

    /// Stores a transaction as if it had been created by an earlier,
    /// unrecorded call.
    pub fn seed_transaction(&self, company_code: &str, response: ResponseDocument) {
        self.state()
            .transactions
            .insert((company_code.to_string(), response.code.clone()), response);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn transaction(&self, company_code: &str, code: &str) -> Option<ResponseDocument> {
        self.state()
            .transactions
            .get(&(company_code.to_string(), code.to_string()))
            .cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.state().transactions.len()
    }

    fn calculate(&self, document: &RequestDocument) -> ResponseDocument {
        let taxable: Vec<_> = document.taxable_lines().collect();
        let mut bases: Vec<Decimal> = taxable.iter().map(|line| line.amount).collect();

        let mut order_discount = Decimal::ZERO;
        for discount in document.discount_lines() {
            match &discount.discount_target {
                Some(target) => {
                    if let Some(index) = taxable.iter().position(|line| &line.number == target) {
                        bases[index] += discount.amount;
                    }
                }
                None => order_discount += discount.amount,
            }
        }

        if !order_discount.is_zero() {
            allocate_order_discount(&discount_eligibility(&taxable), &mut bases, order_discount);
        }

        let lines: Vec<ResponseLine> = taxable
            .iter()
            .zip(bases)
            .map(|(line, base)| {
                let exempt = EXEMPT_TAX_CODES.contains(&line.tax_code.as_str());
                let rate = if exempt { Decimal::ZERO } else { self.rate };
                let base = base.max(Decimal::ZERO);
                let tax = (base * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                ResponseLine {
                    line_number: line.number.clone(),
                    tax,
                    taxable_amount: if exempt { Decimal::ZERO } else { base },
                    details: vec![JurisdictionDetail {
                        jurisdiction_name: self.jurisdiction.clone(),
                        jurisdiction_type: "STA".to_string(),
                        region: document.addresses.ship_to.as_ref().map(|a| a.region.clone()),
                        country: document.addresses.ship_to.as_ref().map(|a| a.country.clone()),
                        rate,
                        tax,
                    }],
                }
            })
            .collect();

        ResponseDocument {
            code: document.code.clone(),
            transaction_type: document.transaction_type,
            status: if document.commit {
                DocumentStatus::Committed
            } else {
                DocumentStatus::Saved
            },
            date: Some(document.date),
            total_tax: lines.iter().map(|line| line.tax).sum(),
            lines,
        }
    }

    fn next_response(&self, document: &RequestDocument) -> ResponseDocument {
        let scripted = self.state().scripted.pop_front();
        scripted.unwrap_or_else(|| self.calculate(document))
    }

    fn begin(&self, call: RecordedCall) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn not_found(endpoint: &str, code: &str) -> TransportError {
        TransportError::Client {
            endpoint: endpoint.to_string(),
            status: 404,
            body: format!("EntityNotFoundError: transaction {code}"),
        }
    }

    fn update_status(
        &self,
        endpoint: &str,
        company_code: &str,
        code: &str,
        status: DocumentStatus,
    ) -> Result<ResponseDocument> {
        let mut state = self.state();
        let existing = state
            .transactions
            .get_mut(&(company_code.to_string(), code.to_string()))
            .ok_or_else(|| Self::not_found(endpoint, code))?;
        if existing.status == DocumentStatus::Cancelled {
            return Err(TransportError::Client {
                endpoint: endpoint.to_string(),
                status: 400,
                body: format!("InvalidDocumentStatus: transaction {code} is cancelled"),
            });
        }
        existing.status = status;
        Ok(existing.clone())
    }
}

/// Freight lines take no share of order-level discounts.
fn discount_eligibility(lines: &[&LineEntry]) -> Vec<bool> {
    lines
        .iter()
        .map(|line| !line.number.starts_with("FR-"))
        .collect()
}

/// Spreads `discount` over the eligible bases in proportion to their
/// amount, rounding each share to cents and putting the remainder on the
/// last eligible line.
fn allocate_order_discount(eligible: &[bool], bases: &mut [Decimal], discount: Decimal) {
    let eligible_total: Decimal = bases
        .iter()
        .zip(eligible)
        .filter(|(_, ok)| **ok)
        .map(|(base, _)| *base)
        .sum();
    if eligible_total <= Decimal::ZERO {
        return;
    }

    let Some(last) = eligible.iter().rposition(|ok| *ok) else {
        return;
    };
    let mut allocated = Decimal::ZERO;
    for index in 0..bases.len() {
        if !eligible[index] {
            continue;
        }
        let share = if index == last {
            discount - allocated
        } else {
            (discount * bases[index] / eligible_total)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        allocated += share;
        bases[index] += share;
    }
}

#[async_trait]
impl TaxServiceClient for InMemoryTaxService {
    async fn create_transaction(&self, document: &RequestDocument) -> Result<ResponseDocument> {
        self.begin(RecordedCall::Create {
            code: document.code.clone(),
        })?;

        let key = (document.company_code.clone(), document.code.clone());
        if self.state().transactions.contains_key(&key) {
            return Err(TransportError::Client {
                endpoint: "transactions/create".to_string(),
                status: 400,
                body: format!("DuplicateDocumentCode: {}", document.code),
            });
        }

        let response = self.next_response(document);
        self.state().transactions.insert(key, response.clone());
        Ok(response)
    }

    async fn adjust_transaction(
        &self,
        company_code: &str,
        code: &str,
        request: &AdjustTransactionRequest,
    ) -> Result<ResponseDocument> {
        self.begin(RecordedCall::Adjust {
            code: code.to_string(),
            reason: request.adjustment_reason,
        })?;

        let key = (company_code.to_string(), code.to_string());
        match self.state().transactions.get(&key).map(|t| t.status) {
            None => return Err(Self::not_found("adjust", code)),
            Some(DocumentStatus::Cancelled) => {
                return Err(TransportError::Client {
                    endpoint: "adjust".to_string(),
                    status: 400,
                    body: format!("CannotAdjustCancelledTransaction: {code}"),
                });
            }
            Some(_) => {}
        }

        let mut response = self.next_response(&request.new_transaction);
        response.code = code.to_string();
        self.state().transactions.insert(key, response.clone());
        Ok(response)
    }

    async fn void_transaction(&self, company_code: &str, code: &str) -> Result<ResponseDocument> {
        self.begin(RecordedCall::Void {
            code: code.to_string(),
        })?;
        self.update_status("void", company_code, code, DocumentStatus::Cancelled)
    }

    async fn commit_transaction(
        &self,
        company_code: &str,
        code: &str,
    ) -> Result<ResponseDocument> {
        self.begin(RecordedCall::Commit {
            code: code.to_string(),
        })?;
        self.update_status("commit", company_code, code, DocumentStatus::Committed)
    }

    async fn get_transaction(
        &self,
        company_code: &str,
        code: &str,
    ) -> Result<Option<ResponseDocument>> {
        self.begin(RecordedCall::Get {
            code: code.to_string(),
        })?;
        Ok(self.transaction(company_code, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{AddressBlock, Addresses};
    use chrono::NaiveDate;
    use common::TransactionType;

    fn line(number: &str, cents: i64, quantity: u32) -> LineEntry {
        LineEntry {
            number: number.to_string(),
            quantity,
            amount: Decimal::new(cents, 2),
            tax_code: "P0000000".to_string(),
            item_code: number.to_string(),
            description: number.to_string(),
            discount_target: None,
        }
    }

    fn discount(id: i64, cents: i64, target: Option<&str>) -> LineEntry {
        LineEntry {
            discount_target: target.map(str::to_string),
            ..line(&format!("DI-{id}"), cents, 1)
        }
    }

    fn document(lines: Vec<LineEntry>) -> RequestDocument {
        let address = AddressBlock {
            line1: "915 S Jackson St".into(),
            line2: None,
            city: "Montgomery".into(),
            region: "AL".into(),
            postal_code: "36104".into(),
            country: "US".into(),
        };
        RequestDocument {
            company_code: "ACME".into(),
            code: "R100".into(),
            transaction_type: TransactionType::SalesInvoice,
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            customer_code: "c".into(),
            currency_code: "USD".into(),
            commit: false,
            addresses: Addresses {
                ship_from: address.clone(),
                ship_to: Some(address),
            },
            lines,
        }
    }

    fn adjust(doc: RequestDocument) -> AdjustTransactionRequest {
        AdjustTransactionRequest {
            adjustment_reason: AdjustmentReason::PriceAdjusted,
            adjustment_description: "order changed".into(),
            new_transaction: doc,
        }
    }

    #[tokio::test]
    async fn computes_flat_rate_per_line() {
        let service = InMemoryTaxService::default();
        let response = service
            .create_transaction(&document(vec![line("LI-1", 2000, 2), line("LI-2", 3000, 3)]))
            .await
            .unwrap();

        assert_eq!(response.line("LI-1").unwrap().tax, Decimal::new(160, 2));
        assert_eq!(response.line("LI-2").unwrap().tax, Decimal::new(240, 2));
        assert_eq!(response.total_tax, Decimal::new(400, 2));
        assert_eq!(
            response.line("LI-1").unwrap().details[0].region.as_deref(),
            Some("AL")
        );
    }

    #[tokio::test]
    async fn applies_line_discount_to_its_target_only() {
        let service = InMemoryTaxService::default();
        let response = service
            .create_transaction(&document(vec![
                line("LI-1", 4000, 4),
                line("LI-2", 3000, 3),
                discount(1, -400, Some("LI-1")),
            ]))
            .await
            .unwrap();

        assert_eq!(response.line("LI-1").unwrap().taxable_amount, Decimal::new(3600, 2));
        assert_eq!(response.line("LI-2").unwrap().taxable_amount, Decimal::new(3000, 2));
        assert!(response.line("DI-1").is_none());
    }

    #[tokio::test]
    async fn spreads_order_discount_by_amount_excluding_freight() {
        let service = InMemoryTaxService::default();
        let response = service
            .create_transaction(&document(vec![
                line("LI-1", 4000, 4),
                line("LI-2", 3000, 3),
                line("FR-1", 500, 1),
                discount(2, -2000, None),
            ]))
            .await
            .unwrap();

        let first = response.line("LI-1").unwrap().taxable_amount;
        let second = response.line("LI-2").unwrap().taxable_amount;
        assert_eq!(first, Decimal::new(2857, 2));
        assert_eq!(second, Decimal::new(2143, 2));
        assert_eq!(first + second, Decimal::new(5000, 2));
        assert_eq!(response.line("FR-1").unwrap().taxable_amount, Decimal::new(500, 2));
    }

    #[tokio::test]
    async fn exempt_code_yields_zero_tax_line() {
        let service = InMemoryTaxService::default();
        let mut exempt = line("LI-2", 1000, 1);
        exempt.tax_code = "NT".into();
        let response = service
            .create_transaction(&document(vec![line("LI-1", 1000, 1), exempt]))
            .await
            .unwrap();

        assert_eq!(response.line("LI-2").unwrap().tax, Decimal::ZERO);
        assert_eq!(response.total_tax, Decimal::new(80, 2));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let service = InMemoryTaxService::default();
        let doc = document(vec![line("LI-1", 1000, 1)]);
        service.create_transaction(&doc).await.unwrap();

        let err = service.create_transaction(&doc).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_retryable());
        assert_eq!(service.transaction_count(), 1);
    }

    #[tokio::test]
    async fn adjust_replaces_existing_transaction() {
        let service = InMemoryTaxService::default();
        service
            .create_transaction(&document(vec![line("LI-1", 1000, 1)]))
            .await
            .unwrap();

        let response = service
            .adjust_transaction("ACME", "R100", &adjust(document(vec![line("LI-1", 2000, 2)])))
            .await
            .unwrap();

        assert_eq!(response.total_tax, Decimal::new(160, 2));
        assert_eq!(
            service.transaction("ACME", "R100").unwrap().total_tax,
            Decimal::new(160, 2)
        );
        assert_eq!(
            service.calls(),
            vec![
                RecordedCall::Create { code: "R100".into() },
                RecordedCall::Adjust {
                    code: "R100".into(),
                    reason: AdjustmentReason::PriceAdjusted
                },
            ]
        );
    }

    #[tokio::test]
    async fn adjust_unknown_transaction_is_not_found() {
        let service = InMemoryTaxService::default();
        let err = service
            .adjust_transaction("ACME", "missing", &adjust(document(vec![])))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn voided_transaction_cannot_be_adjusted_or_committed() {
        let service = InMemoryTaxService::default();
        service
            .create_transaction(&document(vec![line("LI-1", 1000, 1)]))
            .await
            .unwrap();
        let voided = service.void_transaction("ACME", "R100").await.unwrap();
        assert_eq!(voided.status, DocumentStatus::Cancelled);

        let adjust_err = service
            .adjust_transaction("ACME", "R100", &adjust(document(vec![])))
            .await
            .unwrap_err();
        assert_eq!(adjust_err.status(), Some(400));
        assert!(service.commit_transaction("ACME", "R100").await.is_err());
    }

    #[tokio::test]
    async fn scripted_responses_and_failures_are_fifo() {
        let service = InMemoryTaxService::default();
        service.fail_next(TransportError::Timeout {
            endpoint: "create".into(),
        });
        let scripted = ResponseDocument {
            code: "R100".into(),
            transaction_type: TransactionType::SalesInvoice,
            status: DocumentStatus::Saved,
            date: None,
            total_tax: Decimal::new(123, 2),
            lines: vec![],
        };
        service.script_response(scripted.clone());

        let doc = document(vec![line("LI-1", 1000, 1)]);
        let err = service.create_transaction(&doc).await.unwrap_err();
        assert!(err.is_retryable());

        let response = service.create_transaction(&doc).await.unwrap();
        assert_eq!(response, scripted);
    }

    #[tokio::test]
    async fn get_returns_seeded_transaction() {
        let service = InMemoryTaxService::default();
        assert!(service.get_transaction("ACME", "R100").await.unwrap().is_none());

        service.seed_transaction(
            "ACME",
            ResponseDocument {
                code: "R100".into(),
                transaction_type: TransactionType::SalesInvoice,
                status: DocumentStatus::Saved,
                date: None,
                total_tax: Decimal::ZERO,
                lines: vec![],
            },
        );
        let found = service.get_transaction("ACME", "R100").await.unwrap();
        assert_eq!(found.unwrap().code, "R100");
    }
}
