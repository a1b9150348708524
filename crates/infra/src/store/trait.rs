use std::sync::Arc;

use stockledger_core::ProductId;
use stockledger_inventory::{HistoryQuery, Product, Sku, StockMovement};

use crate::error::StoreError;

/// One store transaction: the unit in which a quantity write and its ledger
/// entry are committed together.
///
/// ## Lifecycle
///
/// A unit of work is obtained from [`LedgerStore::begin`] and ends with exactly
/// one of [`commit`](UnitOfWork::commit) or [`rollback`](UnitOfWork::rollback).
/// Dropping it without either rolls back, so an early return or panic never
/// leaves a half-written operation behind and always releases the session.
///
/// ## Isolation
///
/// [`find_product_for_update`](UnitOfWork::find_product_for_update) must hold a
/// write lock on the product until the unit of work ends. Two units of work
/// touching the same product are therefore serialized, and the read-modify-write
/// of the quantity cannot lose an update.
#[async_trait::async_trait]
pub trait UnitOfWork: Send {
    /// Load a product and lock it for the rest of this unit of work.
    async fn find_product_for_update(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    /// Persist the product's current quantity (and `updated_at`).
    async fn save_quantity(&mut self, product: &Product) -> Result<(), StoreError>;

    /// Append a ledger entry.
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError>;

    /// Full ledger of one product, oldest first.
    async fn ledger_for(&mut self, id: ProductId) -> Result<Vec<StockMovement>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Durable record store for products and their ledgers.
///
/// Implementations:
/// - [`InMemoryLedgerStore`](super::InMemoryLedgerStore) for tests/dev
/// - [`PostgresLedgerStore`](super::PostgresLedgerStore) for production
///
/// Single-statement operations (catalogue reads/writes, history listing) are
/// atomic on their own and do not need a unit of work.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Start a unit of work. The returned handle owns its session.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;

    /// Insert a new product. SKU and EAN-13 must be unique.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError>;

    /// All products, oldest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Delete a product and, by cascade, its ledger. Returns `false` when absent.
    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError>;

    /// Movements newest first, restricted and capped by `query`.
    async fn list_movements(&self, query: HistoryQuery) -> Result<Vec<StockMovement>, StoreError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        (**self).begin().await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        (**self).insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }

    async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        (**self).get_product_by_sku(sku).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products().await
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        (**self).delete_product(id).await
    }

    async fn list_movements(&self, query: HistoryQuery) -> Result<Vec<StockMovement>, StoreError> {
        (**self).list_movements(query).await
    }
}
