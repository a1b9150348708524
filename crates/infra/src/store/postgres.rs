//! Postgres-backed ledger store.
//!
//! Products and movements live in two tables (see `migrations/`). The ledger
//! invariants are enforced by the engine and backed by the schema: unique SKU and
//! EAN-13, a foreign key with `ON DELETE CASCADE`, and check constraints on the
//! movement kind and arithmetic.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Constraint` |
//! | Database (foreign key violation) | `23503` | `Constraint` |
//! | Database (check / not-null violation) | `23514` / `23502` | `Constraint` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Transient` |
//! | Database (other) | Any other | `Transient` |
//! | RowNotFound | N/A | `NotFound` |
//! | ColumnDecode / Decode | N/A | `Corrupt` |
//! | PoolClosed / PoolTimedOut / Io / Tls / Protocol | N/A | `Transient` |
//!
//! ## Isolation
//!
//! Units of work run at Postgres' default READ COMMITTED level and lock the
//! product row with `SELECT ... FOR UPDATE`, which serializes concurrent writers
//! of the same product for the whole read-modify-write.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};
use uuid::Uuid;

use stockledger_core::{MovementId, ProductId};
use stockledger_inventory::{Ean13, HistoryQuery, Product, Sku, StockMovement};

use super::r#trait::{LedgerStore, UnitOfWork};
use crate::error::StoreError;

const SCHEMA: &str = include_str!("../../migrations/0001_create_products_and_movements.sql");

const PRODUCT_COLUMNS: &str = "id, sku, ean13, name, stock_qty, created_at, updated_at";
const MOVEMENT_COLUMNS: &str =
    "id, product_id, delta, qty_before, qty_after, reason, kind, created_at";

/// Postgres-backed ledger store.
///
/// Cheap to clone: `PgPool` is a reference-counted handle. Each unit of work
/// checks out one pooled connection and returns it when the transaction ends.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

/// A Postgres transaction. Dropping it without commit rolls back (sqlx semantics).
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn find_product_for_update(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_product_for_update", e))?;

        row.map(|r| decode_product(&r)).transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn save_quantity(&mut self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_qty = $2, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.quantity())
        .bind(product.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("save_quantity", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("product {}", product.id_typed())));
        }
        Ok(())
    }

    #[instrument(
        skip(self, movement),
        fields(movement_id = %movement.id_typed(), product_id = %movement.product_id()),
        err
    )]
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id,
                product_id,
                delta,
                qty_before,
                qty_after,
                reason,
                kind,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(movement.id_typed().as_uuid())
        .bind(movement.product_id().as_uuid())
        .bind(movement.delta())
        .bind(movement.qty_before())
        .bind(movement.qty_after())
        .bind(movement.reason())
        .bind(movement.kind().as_str())
        .bind(movement.created_at())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn ledger_for(&mut self, id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        let rows = sqlx::query(&ledger_query())
            .bind(id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ledger_for", e))?;

        rows.iter().map(decode_movement).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait::async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }

    #[instrument(
        skip(self, product),
        fields(product_id = %product.id_typed(), sku = %product.sku()),
        err
    )]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (
                id,
                sku,
                ean13,
                name,
                stock_qty,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.sku().as_str())
        .bind(product.ean13().as_str())
        .bind(product.name())
        .bind(product.quantity())
        .bind(product.created_at())
        .bind(product.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(|r| decode_product(&r)).transpose()
    }

    #[instrument(skip(self), fields(sku = %sku), err)]
    async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1"))
            .bind(sku.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product_by_sku", e))?;

        row.map(|r| decode_product(&r)).transpose()
    }

    #[instrument(skip(self), fields(product_count = tracing::field::Empty), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        Span::current().record("product_count", rows.len() as u64);
        rows.iter().map(decode_product).collect()
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(
        skip(self, query),
        fields(product_id = ?query.product_id, limit = query.limit),
        err
    )]
    async fn list_movements(&self, query: HistoryQuery) -> Result<Vec<StockMovement>, StoreError> {
        let product_param: Option<Uuid> = query.product_id.map(|id| *id.as_uuid());

        let rows = sqlx::query(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM stock_movements
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY created_at DESC, seq DESC
            LIMIT $2
            "#
        ))
        .bind(product_param)
        .bind(i64::from(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter().map(decode_movement).collect()
    }
}

/// One product's ledger in chain order.
///
/// Ordered by `seq` only: the product row lock makes insertion order the chain
/// order, while `created_at` follows the wall clock and can step backwards.
fn ledger_query() -> String {
    format!(
        "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
         WHERE product_id = $1 ORDER BY seq ASC"
    )
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    sku: String,
    ean13: String,
    name: String,
    stock_qty: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            sku: row.try_get("sku")?,
            ean13: row.try_get("ean13")?,
            name: row.try_get("name")?,
            stock_qty: row.try_get("stock_qty")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let sku = Sku::parse(&row.sku)
            .map_err(|e| StoreError::Corrupt(format!("product {} sku: {e}", row.id)))?;
        let ean13 = Ean13::parse(&row.ean13)
            .map_err(|e| StoreError::Corrupt(format!("product {} ean13: {e}", row.id)))?;
        Ok(Product::restore(
            ProductId::from_uuid(row.id),
            sku,
            ean13,
            row.name,
            row.stock_qty,
            row.created_at,
            row.updated_at,
        ))
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    delta: i64,
    qty_before: i64,
    qty_after: i64,
    reason: Option<String>,
    kind: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            delta: row.try_get("delta")?,
            qty_before: row.try_get("qty_before")?,
            qty_after: row.try_get("qty_after")?,
            reason: row.try_get("reason")?,
            kind: row.try_get("kind")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("movement {} kind: {e}", row.id)))?;
        Ok(StockMovement::restore(
            MovementId::from_uuid(row.id),
            ProductId::from_uuid(row.product_id),
            row.delta,
            row.qty_before,
            row.qty_after,
            row.reason,
            kind,
            row.created_at,
        ))
    }
}

fn decode_product(row: &PgRow) -> Result<Product, StoreError> {
    let row = ProductRow::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize product row: {e}")))?;
    row.try_into()
}

fn decode_movement(row: &PgRow) -> Result<StockMovement, StoreError> {
    let row = MovementRow::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize movement row: {e}")))?;
    row.try_into()
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique, foreign key, check, not-null
                Some("23505") | Some("23503") | Some("23514") | Some("23502") => {
                    StoreError::Constraint(msg)
                }
                // serialization failure, deadlock
                Some("40001") | Some("40P01") => StoreError::Transient(msg),
                _ => StoreError::Transient(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            StoreError::NotFound(format!("unexpected row not found in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Transient(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transient(format!("timed out acquiring connection in {operation}"))
        }
        _ => StoreError::Transient(format!("sqlx error in {operation}: {err}")),
    }
}
