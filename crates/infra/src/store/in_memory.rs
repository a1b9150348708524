use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use stockledger_core::ProductId;
use stockledger_inventory::{HistoryQuery, Product, Sku, StockMovement};

use super::r#trait::{LedgerStore, UnitOfWork};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Tables {
    /// Insertion (creation) order.
    products: Vec<Product>,
    /// Commit order.
    movements: Vec<StockMovement>,
}

impl Tables {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id_typed() == id)
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Not optimized for performance: a unit of work holds
/// the whole store exclusively, which is a stricter isolation than the per-row
/// lock the Postgres store takes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Staged writes on top of an exclusive lock; nothing is visible until commit.
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    tables: OwnedMutexGuard<Tables>,
    staged_products: Vec<Product>,
    staged_movements: Vec<StockMovement>,
}

#[async_trait::async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_product_for_update(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        if let Some(staged) = self.staged_products.iter().find(|p| p.id_typed() == id) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.tables.product(id).cloned())
    }

    async fn save_quantity(&mut self, product: &Product) -> Result<(), StoreError> {
        let id = product.id_typed();
        if self.tables.product(id).is_none() {
            return Err(StoreError::NotFound(format!("product {id}")));
        }
        self.staged_products.retain(|p| p.id_typed() != id);
        self.staged_products.push(product.clone());
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        if self.tables.product(movement.product_id()).is_none() {
            return Err(StoreError::Constraint(format!(
                "movement references unknown product {}",
                movement.product_id()
            )));
        }
        self.staged_movements.push(movement.clone());
        Ok(())
    }

    async fn ledger_for(&mut self, id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        Ok(self
            .tables
            .movements
            .iter()
            .chain(self.staged_movements.iter())
            .filter(|m| m.product_id() == id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryUnitOfWork {
            mut tables,
            staged_products,
            staged_movements,
        } = *self;

        for staged in staged_products {
            if let Some(row) = tables
                .products
                .iter_mut()
                .find(|p| p.id_typed() == staged.id_typed())
            {
                *row = staged;
            }
        }
        tables.movements.extend(staged_movements);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged writes are discarded with the guard.
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tables = self.tables.clone().lock_owned().await;
        Ok(Box::new(InMemoryUnitOfWork {
            tables,
            staged_products: Vec::new(),
            staged_movements: Vec::new(),
        }))
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.product(product.id_typed()).is_some() {
            return Err(StoreError::Constraint(format!(
                "duplicate product id {}",
                product.id_typed()
            )));
        }
        if tables.products.iter().any(|p| p.sku() == product.sku()) {
            return Err(StoreError::Constraint(format!(
                "sku '{}' already exists",
                product.sku()
            )));
        }
        if tables.products.iter().any(|p| p.ean13() == product.ean13()) {
            return Err(StoreError::Constraint(format!(
                "ean13 '{}' already exists",
                product.ean13()
            )));
        }
        tables.products.push(product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.tables.lock().await.product(id).cloned())
    }

    async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.products.iter().find(|p| p.sku() == sku).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.tables.lock().await.products.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.products.len();
        tables.products.retain(|p| p.id_typed() != id);
        if tables.products.len() == before {
            return Ok(false);
        }
        tables.movements.retain(|m| m.product_id() != id);
        Ok(true)
    }

    async fn list_movements(&self, query: HistoryQuery) -> Result<Vec<StockMovement>, StoreError> {
        let tables = self.tables.lock().await;
        // Reverse commit order first so the stable sort keeps later commits ahead on ties.
        let mut rows: Vec<StockMovement> = tables
            .movements
            .iter()
            .rev()
            .filter(|m| query.product_id.is_none_or(|id| m.product_id() == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        rows.truncate(query.limit as usize);
        Ok(rows)
    }
}
