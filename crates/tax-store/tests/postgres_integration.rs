//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and run serially.
//! Run with:
//!
//! ```bash
//! cargo test -p tax-store --test postgres_integration
//! ```

use std::str::FromStr;
use std::sync::Arc;

use common::{LineItemId, ShipmentId};
use rust_decimal::Decimal;
use serial_test::serial;
use sqlx::PgPool;
use tax_store::{
    AdjustmentRepository, Jurisdiction, Money, OrderId, PostgresTaxStore, StoreError,
    TaxAdjustment, TaxRate, TaxTarget, TransactionRef, TransactionRegistry, TransactionStatus,
    TransactionType,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_tax_tables.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresTaxStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE tax_adjustments, sales_invoice_transactions")
        .execute(&pool)
        .await
        .unwrap();

    PostgresTaxStore::new(pool)
}

fn state_rate(tax: Money) -> TaxRate {
    TaxRate::from_jurisdictions(
        "AvaTax",
        vec![Jurisdiction {
            name: "CALIFORNIA".to_string(),
            kind: "State".to_string(),
            region: Some("CA".to_string()),
            country: Some("US".to_string()),
            rate: Decimal::from_str("0.08").unwrap(),
            tax,
        }],
    )
}

fn line(id: i64) -> TaxTarget {
    TaxTarget::LineItem(LineItemId::new(id))
}

#[tokio::test]
#[serial]
async fn upsert_and_find_adjustment() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let adjustment = TaxAdjustment::new(
        order_id,
        line(1),
        Money::from_cents(80),
        state_rate(Money::from_cents(80)),
    );
    let stored = store.upsert_adjustment(adjustment.clone()).await.unwrap();
    assert_eq!(stored.id, adjustment.id);

    let found = store
        .find_adjustment(order_id, line(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.amount, Money::from_cents(80));
    assert_eq!(found.source.jurisdictions.len(), 1);
    assert_eq!(found.label, "AvaTax");
}

#[tokio::test]
#[serial]
async fn upsert_keeps_original_identity() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let first = store
        .upsert_adjustment(TaxAdjustment::new(
            order_id,
            line(1),
            Money::from_cents(80),
            state_rate(Money::from_cents(80)),
        ))
        .await
        .unwrap();

    // A brand-new record for the same target must update, not duplicate.
    let second = store
        .upsert_adjustment(TaxAdjustment::new(
            order_id,
            line(1),
            Money::from_cents(160),
            state_rate(Money::from_cents(160)),
        ))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.amount, Money::from_cents(160));
    assert_eq!(store.adjustments_for_order(order_id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn batch_upsert_orders_line_items_before_shipments() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    store
        .upsert_adjustments(vec![
            TaxAdjustment::new(
                order_id,
                TaxTarget::Shipment(ShipmentId::new(1)),
                Money::from_cents(40),
                TaxRate::default(),
            ),
            TaxAdjustment::new(order_id, line(2), Money::from_cents(240), TaxRate::default()),
            TaxAdjustment::new(order_id, line(1), Money::from_cents(160), TaxRate::default()),
        ])
        .await
        .unwrap();

    let targets: Vec<TaxTarget> = store
        .adjustments_for_order(order_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.target)
        .collect();
    assert_eq!(
        targets,
        vec![line(1), line(2), TaxTarget::Shipment(ShipmentId::new(1))]
    );
}

#[tokio::test]
#[serial]
async fn batch_upsert_is_atomic() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    // The second record violates the non-negative constraint.
    let result = store
        .upsert_adjustments(vec![
            TaxAdjustment::new(order_id, line(1), Money::from_cents(80), TaxRate::default()),
            TaxAdjustment::new(order_id, line(2), Money::from_cents(-1), TaxRate::default()),
        ])
        .await;

    assert!(matches!(result, Err(StoreError::Database(_))));
    assert!(store.adjustments_for_order(order_id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn register_and_update_transaction() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    assert!(store.transaction_for(order_id).await.unwrap().is_none());

    let first = store
        .register(TransactionRef::new(order_id, "R100", TransactionType::SalesInvoice))
        .await
        .unwrap();
    let second = store
        .register(TransactionRef::new(order_id, "R100", TransactionType::SalesInvoice))
        .await
        .unwrap();
    assert_eq!(second.created_at, first.created_at);

    let committed = store
        .update_status(order_id, TransactionStatus::Committed)
        .await
        .unwrap();
    assert_eq!(committed.status, TransactionStatus::Committed);

    let loaded = store.transaction_for(order_id).await.unwrap().unwrap();
    assert_eq!(loaded.code, "R100");
    assert_eq!(loaded.transaction_type, TransactionType::SalesInvoice);
    assert_eq!(loaded.status, TransactionStatus::Committed);
}

#[tokio::test]
#[serial]
async fn transaction_by_code_returns_owning_order() {
    let store = get_test_store().await;
    let order_id = OrderId::new();
    let code = format!("R-{order_id}");

    assert!(store.transaction_by_code(&code).await.unwrap().is_none());

    store
        .register(TransactionRef::new(order_id, code.clone(), TransactionType::SalesInvoice))
        .await
        .unwrap();

    let found = store.transaction_by_code(&code).await.unwrap().unwrap();
    assert_eq!(found.order_id, order_id);
}

#[tokio::test]
#[serial]
async fn update_status_without_transaction_fails() {
    let store = get_test_store().await;
    let order_id = OrderId::new();

    let result = store.update_status(order_id, TransactionStatus::Voided).await;
    assert!(matches!(result, Err(StoreError::TransactionNotFound(id)) if id == order_id));
}
