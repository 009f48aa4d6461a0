use async_trait::async_trait;

use crate::{OrderId, Result, TaxAdjustment, TaxTarget, TransactionRef, TransactionStatus};

/// Find-or-create access to tax adjustments.
///
/// Adjustments are keyed by `(order, target)`; at most one exists per key.
/// Nothing in this trait deletes an adjustment: removing a line item's
/// adjustment is the host's job.
#[async_trait]
pub trait AdjustmentRepository: Send + Sync {
    /// Returns the adjustment owned by `target`, if one exists.
    async fn find_adjustment(
        &self,
        order_id: OrderId,
        target: TaxTarget,
    ) -> Result<Option<TaxAdjustment>>;

    /// Inserts the adjustment, or updates the existing one for the same
    /// target in place.
    ///
    /// The stored record keeps the id and creation time it was first
    /// written with; the returned value reflects what was stored.
    async fn upsert_adjustment(&self, adjustment: TaxAdjustment) -> Result<TaxAdjustment>;

    /// Upserts a batch of adjustments atomically: either all are written or
    /// none are.
    async fn upsert_adjustments(
        &self,
        adjustments: Vec<TaxAdjustment>,
    ) -> Result<Vec<TaxAdjustment>>;

    /// Returns every adjustment for an order, line items first, each kind
    /// ordered by target id.
    async fn adjustments_for_order(&self, order_id: OrderId) -> Result<Vec<TaxAdjustment>>;
}

/// Registry of the one remote transaction each order owns.
///
/// Callers must serialize work per order; the registry only guarantees a
/// single row per order, not mutual exclusion across a remote round trip.
#[async_trait]
pub trait TransactionRegistry: Send + Sync {
    /// Returns the order's transaction reference, if one was registered.
    async fn transaction_for(&self, order_id: OrderId) -> Result<Option<TransactionRef>>;

    /// Returns the transaction reference carrying the remote document
    /// `code`, whichever order owns it.
    async fn transaction_by_code(&self, code: &str) -> Result<Option<TransactionRef>>;

    /// Stores the order's transaction reference, updating it in place if
    /// one already exists. The original creation time is preserved.
    async fn register(&self, transaction: TransactionRef) -> Result<TransactionRef>;

    /// Records a lifecycle change for the order's transaction.
    ///
    /// Fails with `TransactionNotFound` if nothing is registered.
    async fn update_status(
        &self,
        order_id: OrderId,
        status: TransactionStatus,
    ) -> Result<TransactionRef>;
}
