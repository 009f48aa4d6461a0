//! Orchestrates present, call, reconcile for one order.

use common::OrderId;
use domain::{Address, TaxableOrder};
use tax_client::{TaxServiceClient, TransportError};
use tax_store::{AdjustmentRepository, TransactionRef, TransactionRegistry, TransactionStatus};

use crate::config::TaxConfig;
use crate::envelope::TaxResult;
use crate::error::{Result, TaxError, ValidationError};
use crate::presenter::{PresentOptions, present, present_adjustment};
use crate::reconciler::{ReconciliationSummary, TaxAdjustmentReconciler, status_from_document};
use crate::registry::{RemoteOperation, plan, require_live};

/// Computes, commits and voids tax for orders.
///
/// Callers must not run two operations for the same order at once: the
/// registry lookup and the remote call are not atomic. Different orders
/// may run concurrently.
pub struct TaxService<S, C>
where
    S: AdjustmentRepository + TransactionRegistry,
    C: TaxServiceClient,
{
    config: TaxConfig,
    client: C,
    reconciler: TaxAdjustmentReconciler<S>,
}

impl<S, C> TaxService<S, C>
where
    S: AdjustmentRepository + TransactionRegistry,
    C: TaxServiceClient,
{
    pub fn new(config: TaxConfig, store: S, client: C) -> Self {
        Self {
            config,
            client,
            reconciler: TaxAdjustmentReconciler::new(store),
        }
    }

    pub fn config(&self) -> &TaxConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.reconciler.store()
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Computes tax for the order's current state and applies it.
    ///
    /// Creates the remote transaction on the first call and adjusts it on
    /// every later one.
    #[tracing::instrument(skip(self, order, ship_from), fields(order_id = %order.order_id(), number = %order.number()))]
    pub async fn compute<O: TaxableOrder + ?Sized>(
        &self,
        order: &mut O,
        ship_from: &Address,
    ) -> TaxResult {
        self.compute_with(order, ship_from, PresentOptions::from_config(&self.config))
            .await
    }

    /// Like [`compute`](Self::compute) with explicit presentation options,
    /// e.g. to supply a document date for an order that is not completed.
    pub async fn compute_with<O: TaxableOrder + ?Sized>(
        &self,
        order: &mut O,
        ship_from: &Address,
        options: PresentOptions,
    ) -> TaxResult {
        if !self.config.enabled {
            tracing::debug!("tax service disabled; bypassing");
            metrics::counter!("tax_calculations_total", "outcome" => "bypassed").increment(1);
            return TaxResult::Bypassed;
        }

        let start = std::time::Instant::now();
        let result = self.try_compute(order, ship_from, &options).await;
        metrics::histogram!("tax_calculation_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(summary) => {
                metrics::counter!("tax_calculations_total", "outcome" => "applied").increment(1);
                tracing::info!(
                    code = %summary.transaction_code,
                    total_tax = %summary.total_applied,
                    "tax computed"
                );
            }
            Err(e) => {
                metrics::counter!("tax_calculations_total", "outcome" => "failed").increment(1);
                record_failure(e);
            }
        }
        result.into()
    }

    async fn try_compute<O: TaxableOrder + ?Sized>(
        &self,
        order: &mut O,
        ship_from: &Address,
        options: &PresentOptions,
    ) -> Result<ReconciliationSummary> {
        let document = present(&*order, ship_from, options)?;
        let operation = self.resolve_operation(&*order).await?;

        let response = match &operation {
            RemoteOperation::Create => self.client.create_transaction(&document).await?,
            RemoteOperation::Adjust { code } => {
                let request = present_adjustment(
                    document,
                    self.config.adjustment_reason,
                    self.config.adjustment_description.clone(),
                );
                self.client
                    .adjust_transaction(&self.config.company_code, code, &request)
                    .await?
            }
        };
        tracing::debug!(?operation, code = %response.code, "tax service responded");

        Ok(self.reconciler.reconcile(order, &response).await?)
    }

    /// Looks up the order's transaction, adopting an orphaned remote one
    /// when the registry has nothing and recovery is enabled.
    async fn resolve_operation<O: TaxableOrder + ?Sized>(
        &self,
        order: &O,
    ) -> Result<RemoteOperation> {
        let order_id = order.order_id();
        let existing = self.store().transaction_for(order_id).await?;
        if existing.is_some() {
            return plan(order_id, existing.as_ref());
        }

        self.ensure_unclaimed(order_id, order.number()).await?;
        if !self.config.recover_orphaned_transactions {
            return Ok(RemoteOperation::Create);
        }

        let Some(remote) = self
            .client
            .get_transaction(&self.config.company_code, order.number())
            .await?
        else {
            return Ok(RemoteOperation::Create);
        };
        if remote.code != order.number() {
            self.ensure_unclaimed(order_id, &remote.code).await?;
        }

        let mut adopted = TransactionRef::new(order_id, remote.code.clone(), remote.transaction_type);
        adopted.status = status_from_document(remote.status);
        let adopted = self.store().register(adopted).await?;
        metrics::counter!("tax_orphans_recovered_total").increment(1);
        tracing::warn!(
            code = %adopted.code,
            status = %adopted.status,
            "adopted orphaned remote transaction"
        );
        plan(order_id, Some(&adopted))
    }

    /// Fails when another order already holds the remote document `code`.
    async fn ensure_unclaimed(&self, order_id: OrderId, code: &str) -> Result<()> {
        match self.store().transaction_by_code(code).await? {
            Some(claimed) if claimed.order_id != order_id => {
                tracing::warn!(%code, owner = %claimed.order_id, "document code already claimed");
                Err(ValidationError::CodeClaimed {
                    code: code.to_string(),
                    owner: claimed.order_id,
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    /// Commits the order's registered transaction.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&self, order_id: OrderId) -> TaxResult<TransactionRef> {
        self.lifecycle(order_id, TransactionStatus::Committed).await
    }

    /// Voids the order's registered transaction. A voided transaction
    /// blocks every later computation for the order.
    #[tracing::instrument(skip(self))]
    pub async fn void(&self, order_id: OrderId) -> TaxResult<TransactionRef> {
        self.lifecycle(order_id, TransactionStatus::Voided).await
    }

    async fn lifecycle(
        &self,
        order_id: OrderId,
        status: TransactionStatus,
    ) -> TaxResult<TransactionRef> {
        if !self.config.enabled {
            return TaxResult::Bypassed;
        }
        let result = self.try_lifecycle(order_id, status).await;
        if let Err(e) = &result {
            record_failure(e);
        }
        result.into()
    }

    async fn try_lifecycle(
        &self,
        order_id: OrderId,
        status: TransactionStatus,
    ) -> Result<TransactionRef> {
        let existing = self.store().transaction_for(order_id).await?;
        let transaction = require_live(order_id, existing)?;
        let company = &self.config.company_code;

        let response = match status {
            TransactionStatus::Voided => {
                self.client.void_transaction(company, &transaction.code).await?
            }
            _ => {
                self.client
                    .commit_transaction(company, &transaction.code)
                    .await?
            }
        };
        tracing::debug!(remote_status = ?response.status, "lifecycle call accepted");

        let updated = self.store().update_status(order_id, status).await?;
        tracing::info!(code = %updated.code, status = %updated.status, "transaction status updated");
        Ok(updated)
    }
}

fn record_failure(error: &TaxError) {
    if let TaxError::Transport(transport) = error {
        let retryable = if transport.is_retryable() { "true" } else { "false" };
        metrics::counter!("tax_transport_errors_total", "retryable" => retryable).increment(1);
    }
    match error {
        TaxError::Consistency { .. } | TaxError::Persistence(_) => {
            tracing::error!(error = %error, category = ?error.category(), "tax operation failed")
        }
        TaxError::Transport(TransportError::Server { .. } | TransportError::Timeout { .. }) => {
            tracing::warn!(error = %error, "tax service unavailable")
        }
        _ => tracing::warn!(error = %error, category = ?error.category(), "tax operation failed"),
    }
}
