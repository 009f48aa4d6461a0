use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AdjustmentId, Money, OrderId, Result, StoreError, TaxAdjustment, TaxRate, TaxTarget,
    TransactionRef, TransactionStatus, TransactionType,
    store::{AdjustmentRepository, TransactionRegistry},
};
use common::TargetKind;

const ADJUSTMENT_COLUMNS: &str =
    "id, order_id, target_kind, target_id, amount, label, source, created_at, updated_at";

const TRANSACTION_COLUMNS: &str =
    "order_id, code, transaction_type, status, created_at, updated_at";

/// PostgreSQL-backed tax store implementation.
#[derive(Clone)]
pub struct PostgresTaxStore {
    pool: PgPool,
}

impl PostgresTaxStore {
    /// Creates a new PostgreSQL tax store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_adjustment(row: PgRow) -> Result<TaxAdjustment> {
        let kind: String = row.try_get("target_kind")?;
        let kind = match kind.as_str() {
            "line_item" => TargetKind::LineItem,
            "shipment" => TargetKind::Shipment,
            other => {
                return Err(StoreError::InvalidRecord(format!(
                    "unknown target kind {other:?}"
                )));
            }
        };
        let source: TaxRate = serde_json::from_value(row.try_get("source")?)?;

        Ok(TaxAdjustment {
            id: AdjustmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            target: TaxTarget::from_parts(kind, row.try_get("target_id")?),
            amount: Money::new(row.try_get::<Decimal, _>("amount")?),
            label: row.try_get("label")?,
            source,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_transaction(row: PgRow) -> Result<TransactionRef> {
        let transaction_type: String = row.try_get("transaction_type")?;
        let status: String = row.try_get("status")?;

        Ok(TransactionRef {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            code: row.try_get("code")?,
            transaction_type: transaction_type
                .parse::<TransactionType>()
                .map_err(|e| StoreError::InvalidRecord(e.to_string()))?,
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn upsert_in(
        tx: &mut Transaction<'_, Postgres>,
        adjustment: &TaxAdjustment,
    ) -> Result<TaxAdjustment> {
        let source = serde_json::to_value(&adjustment.source)?;

        // On conflict the existing id and created_at win.
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tax_adjustments ({ADJUSTMENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ON CONSTRAINT unique_adjustment_target DO UPDATE SET
                amount = EXCLUDED.amount,
                label = EXCLUDED.label,
                source = EXCLUDED.source,
                updated_at = EXCLUDED.updated_at
            RETURNING {ADJUSTMENT_COLUMNS}
            "#
        ))
        .bind(adjustment.id.as_uuid())
        .bind(adjustment.order_id.as_uuid())
        .bind(adjustment.target.kind().as_str())
        .bind(adjustment.target.raw_id())
        .bind(adjustment.amount.amount())
        .bind(&adjustment.label)
        .bind(source)
        .bind(adjustment.created_at)
        .bind(adjustment.updated_at)
        .fetch_one(&mut **tx)
        .await?;

        Self::row_to_adjustment(row)
    }
}

#[async_trait]
impl AdjustmentRepository for PostgresTaxStore {
    async fn find_adjustment(
        &self,
        order_id: OrderId,
        target: TaxTarget,
    ) -> Result<Option<TaxAdjustment>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            SELECT {ADJUSTMENT_COLUMNS}
            FROM tax_adjustments
            WHERE order_id = $1 AND target_kind = $2 AND target_id = $3
            "#
        ))
        .bind(order_id.as_uuid())
        .bind(target.kind().as_str())
        .bind(target.raw_id())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_adjustment).transpose()
    }

    async fn upsert_adjustment(&self, adjustment: TaxAdjustment) -> Result<TaxAdjustment> {
        let mut tx = self.pool.begin().await?;
        let stored = Self::upsert_in(&mut tx, &adjustment).await?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn upsert_adjustments(
        &self,
        adjustments: Vec<TaxAdjustment>,
    ) -> Result<Vec<TaxAdjustment>> {
        let mut tx = self.pool.begin().await?;

        let mut stored = Vec::with_capacity(adjustments.len());
        for adjustment in &adjustments {
            stored.push(Self::upsert_in(&mut tx, adjustment).await?);
        }

        tx.commit().await?;
        tracing::debug!(count = stored.len(), "tax adjustments upserted");
        Ok(stored)
    }

    async fn adjustments_for_order(&self, order_id: OrderId) -> Result<Vec<TaxAdjustment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ADJUSTMENT_COLUMNS}
            FROM tax_adjustments
            WHERE order_id = $1
            ORDER BY target_kind ASC, target_id ASC
            "#
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_adjustment).collect()
    }
}

#[async_trait]
impl TransactionRegistry for PostgresTaxStore {
    async fn transaction_for(&self, order_id: OrderId) -> Result<Option<TransactionRef>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM sales_invoice_transactions WHERE order_id = $1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn transaction_by_code(&self, code: &str) -> Result<Option<TransactionRef>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM sales_invoice_transactions WHERE code = $1 LIMIT 1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_transaction).transpose()
    }

    async fn register(&self, transaction: TransactionRef) -> Result<TransactionRef> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO sales_invoice_transactions ({TRANSACTION_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (order_id) DO UPDATE SET
                code = EXCLUDED.code,
                transaction_type = EXCLUDED.transaction_type,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(transaction.order_id.as_uuid())
        .bind(&transaction.code)
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.status.as_str())
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(order_id = %transaction.order_id, code = %transaction.code, "transaction registered");
        Self::row_to_transaction(row)
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: TransactionStatus,
    ) -> Result<TransactionRef> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE sales_invoice_transactions
            SET status = $2, updated_at = NOW()
            WHERE order_id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        ))
        .bind(order_id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_transaction(row),
            None => Err(StoreError::TransactionNotFound(order_id)),
        }
    }
}
