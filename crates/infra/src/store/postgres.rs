//! Postgres-backed ledger and aggregate stores.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (serialization failure) | `40001` | `Conflict` |
//! | Database (deadlock detected) | `40P01` | `Conflict` |
//! | Database (connection exception) | `08xxx` | `Unavailable` |
//! | Database (admin shutdown / cannot connect now) | `57P01` / `57P03` | `Unavailable` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` |
//! | Decode / ColumnDecode / ColumnNotFound | N/A | `Corrupt` |
//! | Other | N/A | `Backend` |
//!
//! ## Transactions
//!
//! - `batch_snapshot` reads inside a `REPEATABLE READ READ ONLY` transaction so
//!   the reconciler sees one consistent batch set.
//! - `replace_summaries` and `delete_movements` each commit as a single
//!   transaction; dropping the future before commit rolls back.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::instrument;
use uuid::Uuid;

use stockrecon_core::{BatchId, MovementId, VariantId};
use stockrecon_inventory::{InventorySummary, MovementKind, PurchaseBatch, StockMovement};

use super::{AggregateStore, BatchRef, LedgerStore, MovementFilter, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

/// Open a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create the ledger and aggregate tables if they do not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

/// Postgres-backed ledger store (`purchase_batches`, `stock_movements`).
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: Arc<PgPool>,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), err)]
    async fn batch_snapshot(&self) -> Result<Vec<PurchaseBatch>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let rows = sqlx::query(
            r#"
            SELECT id, variant_id, unit_cost, remaining_quantity, received_at
            FROM purchase_batches
            ORDER BY variant_id, id
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("batch_snapshot", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        rows.iter().map(batch_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn batches_for_variant(&self, variant_id: VariantId) -> Result<Vec<PurchaseBatch>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, variant_id, unit_cost, remaining_quantity, received_at
            FROM purchase_batches
            WHERE variant_id = $1
            ORDER BY id
            "#,
        )
        .bind(variant_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("batches_for_variant", e))?;

        rows.iter().map(batch_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn live_batch_ids(&self) -> Result<BTreeSet<BatchId>, StoreError> {
        let rows = sqlx::query("SELECT id FROM purchase_batches")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("live_batch_ids", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<Uuid, _>("id")
                    .map(BatchId::from_uuid)
                    .map_err(|e| map_sqlx_error("live_batch_ids", e))
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn ledger_totals(&self) -> Result<BTreeMap<VariantId, Decimal>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT variant_id, SUM(remaining_quantity) AS total
            FROM purchase_batches
            GROUP BY variant_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ledger_totals", e))?;

        rows.iter()
            .map(|row| {
                let variant_id: Uuid = row
                    .try_get("variant_id")
                    .map_err(|e| map_sqlx_error("ledger_totals", e))?;
                let total: Decimal = row
                    .try_get("total")
                    .map_err(|e| map_sqlx_error("ledger_totals", e))?;
                Ok((VariantId::from_uuid(variant_id), total))
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn movements(&self, filter: MovementFilter) -> Result<Vec<StockMovement>, StoreError> {
        let variant_param: Option<Uuid> = filter.variant_id.map(|v| *v.as_uuid());
        let kinds_param: Option<Vec<String>> = filter
            .kinds
            .as_ref()
            .map(|kinds| kinds.iter().map(|k| k.as_str().to_string()).collect());
        let batch_ref_param = match filter.batch_ref {
            BatchRef::Any => "any",
            BatchRef::Present => "present",
            BatchRef::Absent => "absent",
        };

        let rows = sqlx::query(
            r#"
            SELECT id, variant_id, batch_id, kind, quantity_delta, occurred_at
            FROM stock_movements
            WHERE ($1::uuid IS NULL OR variant_id = $1)
                AND ($2::text[] IS NULL OR kind = ANY($2))
                AND (
                    $3::text = 'any'
                    OR ($3::text = 'present' AND batch_id IS NOT NULL)
                    OR ($3::text = 'absent' AND batch_id IS NULL)
                )
            ORDER BY occurred_at, id
            "#,
        )
        .bind(variant_param)
        .bind(kinds_param)
        .bind(batch_ref_param)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn delete_movements(&self, ids: &[MovementId]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let result = sqlx::query("DELETE FROM stock_movements WHERE id = ANY($1)")
            .bind(&uuids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_movements", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(result.rows_affected())
    }
}

/// Postgres-backed aggregate store (`inventory_summaries`).
#[derive(Debug, Clone)]
pub struct PostgresAggregateStore {
    pool: Arc<PgPool>,
}

impl PostgresAggregateStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl AggregateStore for PostgresAggregateStore {
    #[instrument(skip(self), err)]
    async fn get(&self, variant_id: VariantId) -> Result<Option<InventorySummary>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT variant_id, total_quantity, average_cost, last_updated
            FROM inventory_summaries
            WHERE variant_id = $1
            "#,
        )
        .bind(variant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_summary", e))?;

        row.as_ref().map(summary_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<InventorySummary>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT variant_id, total_quantity, average_cost, last_updated
            FROM inventory_summaries
            ORDER BY variant_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_summaries", e))?;

        rows.iter().map(summary_from_row).collect()
    }

    #[instrument(skip(self, summaries), fields(count = summaries.len()), err)]
    async fn replace_summaries(&self, summaries: Vec<InventorySummary>) -> Result<usize, StoreError> {
        if summaries.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for summary in &summaries {
            sqlx::query(
                r#"
                INSERT INTO inventory_summaries (
                    variant_id,
                    total_quantity,
                    average_cost,
                    last_updated
                )
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (variant_id)
                DO UPDATE SET
                    total_quantity = EXCLUDED.total_quantity,
                    average_cost = EXCLUDED.average_cost,
                    last_updated = EXCLUDED.last_updated
                "#,
            )
            .bind(summary.variant_id.as_uuid())
            .bind(summary.total_quantity)
            .bind(summary.average_cost)
            .bind(summary.last_updated)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace_summaries", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(summaries.len())
    }
}

// Row decoding

fn batch_from_row(row: &PgRow) -> Result<PurchaseBatch, StoreError> {
    let decode = |e| map_sqlx_error("decode_batch", e);
    Ok(PurchaseBatch {
        id: BatchId::from_uuid(row.try_get("id").map_err(decode)?),
        variant_id: VariantId::from_uuid(row.try_get("variant_id").map_err(decode)?),
        unit_cost: row.try_get("unit_cost").map_err(decode)?,
        remaining_quantity: row.try_get("remaining_quantity").map_err(decode)?,
        received_at: row.try_get("received_at").map_err(decode)?,
    })
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, StoreError> {
    let decode = |e| map_sqlx_error("decode_movement", e);
    let kind: String = row.try_get("kind").map_err(decode)?;
    let kind: MovementKind = kind
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("stock_movements.kind: {e}")))?;
    let batch_id: Option<Uuid> = row.try_get("batch_id").map_err(decode)?;

    Ok(StockMovement {
        id: MovementId::from_uuid(row.try_get("id").map_err(decode)?),
        variant_id: VariantId::from_uuid(row.try_get("variant_id").map_err(decode)?),
        batch_id: batch_id.map(BatchId::from_uuid),
        kind,
        quantity_delta: row.try_get("quantity_delta").map_err(decode)?,
        occurred_at: row.try_get("occurred_at").map_err(decode)?,
    })
}

fn summary_from_row(row: &PgRow) -> Result<InventorySummary, StoreError> {
    let decode = |e| map_sqlx_error("decode_summary", e);
    Ok(InventorySummary {
        variant_id: VariantId::from_uuid(row.try_get("variant_id").map_err(decode)?),
        total_quantity: row.try_get("total_quantity").map_err(decode)?,
        average_cost: row.try_get("average_cost").map_err(decode)?,
        last_updated: row.try_get("last_updated").map_err(decode)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                Some("57P01") | Some("57P03") => StoreError::Unavailable(msg),
                Some(code) if code.starts_with("08") => StoreError::Unavailable(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {}: {}", operation, e)),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("failed to decode row in {}: {}", operation, err))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
