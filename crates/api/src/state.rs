//! Shared application state: the order book, per-order locks and the tax
//! service.

use std::collections::HashMap;
use std::sync::Arc;

use common::OrderId;
use domain::{Address, Order, TaxableOrder};
use tax_client::TaxServiceClient;
use tax_engine::TaxService;
use tax_store::InMemoryTaxStore;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Tax client chosen at start-up: the HTTP client or the in-memory fake.
pub type SharedTaxClient = Arc<dyn TaxServiceClient>;

pub type AppTaxService = TaxService<InMemoryTaxStore, SharedTaxClient>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: OrderBook,
    pub locks: OrderLocks,
    pub tax: AppTaxService,
    pub ship_from: Address,
}

impl AppState {
    pub fn new(tax: AppTaxService, ship_from: Address) -> Self {
        Self {
            orders: OrderBook::default(),
            locks: OrderLocks::default(),
            tax,
            ship_from,
        }
    }
}

/// In-process store of host orders.
#[derive(Default)]
pub struct OrderBook {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl OrderBook {
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id(), order);
    }

    /// Adds a new order unless another order already uses its number, in
    /// which case the holder's id is returned.
    pub async fn insert_new(&self, order: Order) -> Result<(), OrderId> {
        let mut orders = self.orders.write().await;
        if let Some(existing) = orders.values().find(|o| o.number() == order.number()) {
            return Err(existing.id());
        }
        orders.insert(order.id(), order);
        Ok(())
    }

    pub async fn get(&self, id: OrderId) -> Option<Order> {
        self.orders.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }
}

/// One async mutex per order. Tax operations on the same order run one at
/// a time; different orders proceed concurrently.
///
/// Entries nobody holds or waits on are dropped on the next `acquire`.
#[derive(Default)]
pub struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    /// Waits for exclusive access to `id`. Access is released when the
    /// guard drops.
    pub async fn acquire(&self, id: OrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // The map's own reference is the only one left on an idle lock.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}
