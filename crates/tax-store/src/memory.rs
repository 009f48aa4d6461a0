use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    OrderId, Result, StoreError, TaxAdjustment, TaxTarget, TransactionRef, TransactionStatus,
    store::{AdjustmentRepository, TransactionRegistry},
};

/// In-memory tax store for tests and single-process hosts.
///
/// Provides the same interface as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryTaxStore {
    adjustments: Arc<RwLock<BTreeMap<(OrderId, TaxTarget), TaxAdjustment>>>,
    transactions: Arc<RwLock<HashMap<OrderId, TransactionRef>>>,
}

impl InMemoryTaxStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of adjustments stored across all orders.
    pub async fn adjustment_count(&self) -> usize {
        self.adjustments.read().await.len()
    }

    /// Returns the number of registered transactions.
    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }

    /// Clears all adjustments and transactions.
    pub async fn clear(&self) {
        self.adjustments.write().await.clear();
        self.transactions.write().await.clear();
    }

    fn merge(existing: Option<&TaxAdjustment>, mut incoming: TaxAdjustment) -> TaxAdjustment {
        if let Some(existing) = existing {
            incoming.id = existing.id;
            incoming.created_at = existing.created_at;
        }
        incoming
    }
}

#[async_trait]
impl AdjustmentRepository for InMemoryTaxStore {
    async fn find_adjustment(
        &self,
        order_id: OrderId,
        target: TaxTarget,
    ) -> Result<Option<TaxAdjustment>> {
        let store = self.adjustments.read().await;
        Ok(store.get(&(order_id, target)).cloned())
    }

    async fn upsert_adjustment(&self, adjustment: TaxAdjustment) -> Result<TaxAdjustment> {
        let mut store = self.adjustments.write().await;
        let key = (adjustment.order_id, adjustment.target);
        let stored = Self::merge(store.get(&key), adjustment);
        store.insert(key, stored.clone());
        Ok(stored)
    }

    async fn upsert_adjustments(
        &self,
        adjustments: Vec<TaxAdjustment>,
    ) -> Result<Vec<TaxAdjustment>> {
        // A single write guard makes the batch atomic for readers.
        let mut store = self.adjustments.write().await;
        let mut stored = Vec::with_capacity(adjustments.len());
        for adjustment in adjustments {
            let key = (adjustment.order_id, adjustment.target);
            let merged = Self::merge(store.get(&key), adjustment);
            store.insert(key, merged.clone());
            stored.push(merged);
        }
        Ok(stored)
    }

    async fn adjustments_for_order(&self, order_id: OrderId) -> Result<Vec<TaxAdjustment>> {
        let store = self.adjustments.read().await;
        Ok(store
            .iter()
            .filter(|((id, _), _)| *id == order_id)
            .map(|(_, adjustment)| adjustment.clone())
            .collect())
    }
}

#[async_trait]
impl TransactionRegistry for InMemoryTaxStore {
    async fn transaction_for(&self, order_id: OrderId) -> Result<Option<TransactionRef>> {
        Ok(self.transactions.read().await.get(&order_id).cloned())
    }

    async fn transaction_by_code(&self, code: &str) -> Result<Option<TransactionRef>> {
        Ok(self
            .transactions
            .read()
            .await
            .values()
            .find(|transaction| transaction.code == code)
            .cloned())
    }

    async fn register(&self, mut transaction: TransactionRef) -> Result<TransactionRef> {
        let mut store = self.transactions.write().await;
        if let Some(existing) = store.get(&transaction.order_id) {
            transaction.created_at = existing.created_at;
        }
        store.insert(transaction.order_id, transaction.clone());
        Ok(transaction)
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: TransactionStatus,
    ) -> Result<TransactionRef> {
        let mut store = self.transactions.write().await;
        let transaction = store
            .get_mut(&order_id)
            .ok_or(StoreError::TransactionNotFound(order_id))?;
        transaction.status = status;
        transaction.updated_at = Utc::now();
        Ok(transaction.clone())
    }
}
