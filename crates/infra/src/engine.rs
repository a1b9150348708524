//! Stock ledger engine (application-level orchestration).
//!
//! The engine is the only code path that changes a product's quantity. Every
//! change runs this pipeline inside one unit of work:
//!
//! ```text
//! begin
//!   ↓
//! 1. Lock the product row (stale ids surface as NotFound here)
//!   ↓
//! 2. Plan the movement (pure: before, after, kind, reason)
//!   ↓
//! 3. Apply it to the product (quantity := qty_after)
//!   ↓
//! 4. Write the quantity, insert the movement
//!   ↓
//! commit            (any failure above: rollback, error to caller)
//! ```
//!
//! The engine holds no state between calls and does no locking of its own; the
//! store's row lock is what keeps concurrent writers of one product from
//! interleaving.

use chrono::Utc;
use tracing::{info, instrument, warn};

use stockledger_core::ProductId;
use stockledger_inventory::{
    HistoryQuery, LedgerAudit, MovementKind, NegativeStockPolicy, NewProduct, Product, Sku,
    StockMovement, audit_ledger, plan_adjustment, plan_movement,
};

use crate::error::LedgerError;
use crate::store::{LedgerStore, UnitOfWork};

/// Default cap on a single history listing.
pub const DEFAULT_MAX_HISTORY_LIMIT: u32 = 1000;

/// Policy knobs for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub negative_stock: NegativeStockPolicy,
    pub max_history_limit: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            negative_stock: NegativeStockPolicy::Allow,
            max_history_limit: DEFAULT_MAX_HISTORY_LIMIT,
        }
    }
}

/// Ledger engine over any [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct LedgerEngine<S> {
    store: S,
    settings: EngineSettings,
}

impl<S> LedgerEngine<S> {
    pub fn new(store: S, settings: EngineSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> LedgerEngine<S>
where
    S: LedgerStore,
{
    // -------------------------
    // Catalogue
    // -------------------------

    /// Create a product. The initial quantity is a baseline, not a ledger entry.
    #[instrument(skip(self, new), fields(sku = %new.sku), err)]
    pub async fn create_product(&self, new: NewProduct) -> Result<Product, LedgerError> {
        let product = Product::create(ProductId::new(), new, Utc::now());
        self.store.insert_product(&product).await?;
        info!(product_id = %product.id_typed(), quantity = product.quantity(), "product created");
        Ok(product)
    }

    pub async fn get_product(&self, id: ProductId) -> Result<Product, LedgerError> {
        self.store.get_product(id).await?.ok_or(LedgerError::NotFound)
    }

    pub async fn get_product_by_sku(&self, sku: &str) -> Result<Product, LedgerError> {
        let sku = Sku::parse(sku)?;
        self.store
            .get_product_by_sku(&sku)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, LedgerError> {
        Ok(self.store.list_products().await?)
    }

    /// Delete a product together with its ledger.
    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), LedgerError> {
        if !self.store.delete_product(id).await? {
            return Err(LedgerError::NotFound);
        }
        info!("product deleted");
        Ok(())
    }

    // -------------------------
    // Ledger operations
    // -------------------------

    /// Change a product's quantity by `delta` and record the movement, atomically.
    ///
    /// Returns the new movement; its `qty_after` is the new stock level.
    #[instrument(skip(self, reason), fields(product_id = %product_id, kind = %kind), err)]
    pub async fn apply_delta(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: Option<String>,
        kind: MovementKind,
    ) -> Result<StockMovement, LedgerError> {
        let mut uow = self.store.begin().await?;
        let result = self
            .apply_delta_in(uow.as_mut(), product_id, delta, reason, kind)
            .await;
        let movement = finish(uow, result).await?;
        info!(
            movement_id = %movement.id_typed(),
            qty_before = movement.qty_before(),
            qty_after = movement.qty_after(),
            "stock movement recorded"
        );
        Ok(movement)
    }

    /// Bring a product to exactly `target` with an `ADJUST` movement.
    ///
    /// The delta is computed from the quantity read under the row lock. A target
    /// equal to the current quantity still records a zero-delta movement.
    #[instrument(skip(self, reason), fields(product_id = %product_id), err)]
    pub async fn set_absolute(
        &self,
        product_id: ProductId,
        target: i64,
        reason: Option<String>,
    ) -> Result<StockMovement, LedgerError> {
        let mut uow = self.store.begin().await?;
        let result = self
            .set_absolute_in(uow.as_mut(), product_id, target, reason)
            .await;
        let movement = finish(uow, result).await?;
        info!(
            movement_id = %movement.id_typed(),
            delta = movement.delta(),
            qty_after = movement.qty_after(),
            "stock adjusted"
        );
        Ok(movement)
    }

    /// `apply_delta` inside a caller-owned unit of work (caller commits).
    pub async fn apply_delta_in(
        &self,
        uow: &mut dyn UnitOfWork,
        product_id: ProductId,
        delta: i64,
        reason: Option<String>,
        kind: MovementKind,
    ) -> Result<StockMovement, LedgerError> {
        let mut product = lock_product(uow, product_id).await?;
        let movement = plan_movement(
            &product,
            delta,
            reason,
            kind,
            self.settings.negative_stock,
            Utc::now(),
        )?;
        record(uow, &mut product, movement).await
    }

    /// `set_absolute` inside a caller-owned unit of work (caller commits).
    pub async fn set_absolute_in(
        &self,
        uow: &mut dyn UnitOfWork,
        product_id: ProductId,
        target: i64,
        reason: Option<String>,
    ) -> Result<StockMovement, LedgerError> {
        let mut product = lock_product(uow, product_id).await?;
        let movement = plan_adjustment(
            &product,
            target,
            reason,
            self.settings.negative_stock,
            Utc::now(),
        )?;
        record(uow, &mut product, movement).await
    }

    // -------------------------
    // Reads
    // -------------------------

    /// Movements newest first, optionally for one product; the limit is clamped
    /// to `max_history_limit`.
    #[instrument(
        skip(self, query),
        fields(product_id = ?query.product_id, limit = query.limit),
        err
    )]
    pub async fn list_history(
        &self,
        query: HistoryQuery,
    ) -> Result<Vec<StockMovement>, LedgerError> {
        let query = query.clamped(self.settings.max_history_limit);
        Ok(self.store.list_movements(query).await?)
    }

    /// Check that the product's quantity is fully explained by its ledger.
    ///
    /// Runs inside a unit of work holding the product lock so no writer can slip
    /// between reading the product and reading its movements.
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn verify_ledger(&self, product_id: ProductId) -> Result<LedgerAudit, LedgerError> {
        let mut uow = self.store.begin().await?;
        let result = audit_locked(uow.as_mut(), product_id).await;

        // Read-only: release the lock without writing anything.
        let audit = match result {
            Ok(audit) => {
                uow.rollback().await?;
                audit
            }
            Err(e) => return abort(uow, e).await,
        };

        if !audit.is_consistent() {
            warn!(discrepancies = ?audit.discrepancies, "ledger audit found discrepancies");
        }
        Ok(audit)
    }
}

async fn lock_product(uow: &mut dyn UnitOfWork, id: ProductId) -> Result<Product, LedgerError> {
    uow.find_product_for_update(id)
        .await?
        .ok_or(LedgerError::NotFound)
}

async fn audit_locked(
    uow: &mut dyn UnitOfWork,
    product_id: ProductId,
) -> Result<LedgerAudit, LedgerError> {
    let product = lock_product(uow, product_id).await?;
    let ledger = uow.ledger_for(product_id).await?;
    Ok(audit_ledger(&product, &ledger))
}

async fn record(
    uow: &mut dyn UnitOfWork,
    product: &mut Product,
    movement: StockMovement,
) -> Result<StockMovement, LedgerError> {
    product.apply(&movement)?;
    uow.save_quantity(product).await?;
    uow.insert_movement(&movement).await?;
    Ok(movement)
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    uow: Box<dyn UnitOfWork>,
    result: Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => abort(uow, e).await,
    }
}

async fn abort<T>(uow: Box<dyn UnitOfWork>, err: LedgerError) -> Result<T, LedgerError> {
    if let Err(rollback_err) = uow.rollback().await {
        // The original error wins; the session is discarded either way.
        warn!(error = %rollback_err, "rollback failed");
    }
    Err(err)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use stockledger_core::DomainError;

    use super::*;
    use crate::error::StoreError;
    use crate::store::InMemoryLedgerStore;

    fn engine() -> LedgerEngine<InMemoryLedgerStore> {
        LedgerEngine::new(InMemoryLedgerStore::new(), EngineSettings::default())
    }

    async fn tester(engine: &LedgerEngine<impl LedgerStore>, quantity: i64) -> Product {
        let new = NewProduct::parse("SKU-XYZ", "1234567899999", "Tester", quantity).unwrap();
        engine.create_product(new).await.unwrap()
    }

    #[tokio::test]
    async fn scenario_a_apply_delta_updates_product_and_movement() {
        let engine = engine();
        let product = tester(&engine, 10).await;

        let m = engine
            .apply_delta(product.id_typed(), 5, None, MovementKind::In)
            .await
            .unwrap();

        assert_eq!(m.qty_before(), 10);
        assert_eq!(m.qty_after(), 15);
        assert_eq!(m.kind(), MovementKind::In);
        assert_eq!(engine.get_product(product.id_typed()).await.unwrap().quantity(), 15);
    }

    #[tokio::test]
    async fn scenario_b_and_c_set_absolute_then_history_newest_first() {
        let engine = engine();
        let product = tester(&engine, 10).await;
        let pid = product.id_typed();

        let incoming = engine.apply_delta(pid, 5, None, MovementKind::In).await.unwrap();
        let adjust = engine
            .set_absolute(pid, 7, Some("Inventario".to_string()))
            .await
            .unwrap();

        assert_eq!(adjust.delta(), -8);
        assert_eq!(adjust.kind(), MovementKind::Adjust);
        assert_eq!(adjust.qty_after(), 7);
        assert_eq!(adjust.reason(), Some("Inventario"));

        let history = engine.list_history(HistoryQuery::for_product(pid)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id_typed(), adjust.id_typed());
        assert_eq!(history[1].id_typed(), incoming.id_typed());
    }

    #[tokio::test]
    async fn scenario_d_unknown_product_is_not_found_without_side_effects() {
        let engine = engine();
        tester(&engine, 3).await;

        let err = engine
            .apply_delta(ProductId::new(), 1, None, MovementKind::In)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::NotFound);

        let err = engine.set_absolute(ProductId::new(), 1, None).await.unwrap_err();
        assert_eq!(err, LedgerError::NotFound);

        assert!(engine.list_history(HistoryQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scenario_e_concurrent_deltas_do_not_lose_updates() {
        let engine = Arc::new(engine());
        let product = tester(&*engine, 0).await;
        let pid = product.id_typed();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.apply_delta(pid, 1, None, MovementKind::In).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(engine.get_product(pid).await.unwrap().quantity(), 2);
        let history = engine.list_history(HistoryQuery::for_product(pid)).await.unwrap();
        assert_eq!(history.len(), 2);
        let mut befores: Vec<i64> = history.iter().map(|m| m.qty_before()).collect();
        befores.sort();
        assert_eq!(befores, vec![0, 1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_concurrent_writers_keep_the_ledger_consistent() {
        let engine = Arc::new(engine());
        let product = tester(&*engine, 50).await;
        let pid = product.id_typed();

        let mut handles = Vec::new();
        for i in 0..40i64 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let delta = if i % 2 == 0 { 3 } else { -1 };
                engine
                    .apply_delta(pid, delta, None, MovementKind::for_delta(delta))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let audit = engine.verify_ledger(pid).await.unwrap();
        assert!(audit.is_consistent(), "{:?}", audit.discrepancies);
        assert_eq!(audit.movement_count, 40);
        assert_eq!(audit.product_quantity, 50 + 20 * 3 - 20);
    }

    #[tokio::test]
    async fn zero_delta_adjustment_is_recorded() {
        let engine = engine();
        let product = tester(&engine, 4).await;

        let m = engine.set_absolute(product.id_typed(), 4, None).await.unwrap();
        assert_eq!(m.delta(), 0);

        let history = engine
            .list_history(HistoryQuery::for_product(product.id_typed()))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn invariants_hold_after_mixed_operations() {
        let engine = engine();
        let product = tester(&engine, 10).await;
        let pid = product.id_typed();

        engine.apply_delta(pid, 5, None, MovementKind::In).await.unwrap();
        engine.apply_delta(pid, -12, None, MovementKind::Out).await.unwrap();
        engine.set_absolute(pid, 0, Some("recount".into())).await.unwrap();
        engine.set_absolute(pid, 0, None).await.unwrap();
        engine.apply_delta(pid, 9, None, MovementKind::Adjust).await.unwrap();

        let current = engine.get_product(pid).await.unwrap();
        let history = engine.list_history(HistoryQuery::for_product(pid)).await.unwrap();

        // Quantity equals the newest qty_after.
        assert_eq!(current.quantity(), history[0].qty_after());
        // Baseline plus all deltas equals the quantity.
        let baseline = history.last().unwrap().qty_before();
        let total: i64 = history.iter().map(StockMovement::delta).sum();
        assert_eq!(baseline, 10);
        assert_eq!(baseline + total, current.quantity());
        // Ordering: non-increasing by creation time.
        assert!(history.windows(2).all(|w| w[0].created_at() >= w[1].created_at()));
    }

    #[tokio::test]
    async fn history_reads_are_repeatable_and_limited() {
        let engine = engine();
        let product = tester(&engine, 0).await;
        for _ in 0..5 {
            engine
                .apply_delta(product.id_typed(), 1, None, MovementKind::In)
                .await
                .unwrap();
        }

        let q = HistoryQuery::default().with_limit(3);
        let first = engine.list_history(q).await.unwrap();
        let second = engine.list_history(q).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(first[0].qty_after(), 5);
    }

    #[tokio::test]
    async fn history_limit_is_clamped_to_configured_max() {
        let settings = EngineSettings {
            max_history_limit: 2,
            ..EngineSettings::default()
        };
        let engine = LedgerEngine::new(InMemoryLedgerStore::new(), settings);
        let product = tester(&engine, 0).await;
        for _ in 0..4 {
            engine
                .apply_delta(product.id_typed(), 1, None, MovementKind::In)
                .await
                .unwrap();
        }

        let history = engine
            .list_history(HistoryQuery::default().with_limit(500))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn history_is_filtered_by_product() {
        let engine = engine();
        let a = tester(&engine, 0).await;
        let b = engine
            .create_product(NewProduct::parse("SKU-B", "2222222222222", "B", 0).unwrap())
            .await
            .unwrap();

        engine.apply_delta(a.id_typed(), 1, None, MovementKind::In).await.unwrap();
        engine.apply_delta(b.id_typed(), 2, None, MovementKind::In).await.unwrap();

        let only_b = engine
            .list_history(HistoryQuery::for_product(b.id_typed()))
            .await
            .unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].product_id(), b.id_typed());
        assert_eq!(engine.list_history(HistoryQuery::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reject_policy_refuses_negative_stock_and_writes_nothing() {
        let settings = EngineSettings {
            negative_stock: NegativeStockPolicy::Reject,
            ..EngineSettings::default()
        };
        let engine = LedgerEngine::new(InMemoryLedgerStore::new(), settings);
        let product = tester(&engine, 2).await;

        let err = engine
            .apply_delta(product.id_typed(), -3, None, MovementKind::Out)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::InsufficientStock { on_hand: 2, delta: -3 });
        assert_eq!(engine.get_product(product.id_typed()).await.unwrap().quantity(), 2);
        assert!(engine.list_history(HistoryQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_sku_is_a_constraint_violation() {
        let engine = engine();
        tester(&engine, 0).await;
        let err = engine
            .create_product(NewProduct::parse("SKU-XYZ", "9999999999999", "Other", 0).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn lookup_by_sku_and_delete_cascade() {
        let engine = engine();
        let product = tester(&engine, 1).await;
        engine
            .apply_delta(product.id_typed(), 1, None, MovementKind::In)
            .await
            .unwrap();

        let found = engine.get_product_by_sku(" SKU-XYZ ").await.unwrap();
        assert_eq!(found.id_typed(), product.id_typed());
        assert_eq!(
            engine.get_product_by_sku("SKU-NOPE").await.unwrap_err(),
            LedgerError::NotFound
        );

        engine.delete_product(product.id_typed()).await.unwrap();
        assert_eq!(
            engine.get_product(product.id_typed()).await.unwrap_err(),
            LedgerError::NotFound
        );
        assert!(engine.list_history(HistoryQuery::default()).await.unwrap().is_empty());
        assert_eq!(
            engine.delete_product(product.id_typed()).await.unwrap_err(),
            LedgerError::NotFound
        );
    }

    #[tokio::test]
    async fn caller_owned_unit_of_work_commits_several_operations_together() {
        let engine = engine();
        let product = tester(&engine, 0).await;
        let pid = product.id_typed();

        let mut uow = engine.store().begin().await.unwrap();
        engine
            .apply_delta_in(uow.as_mut(), pid, 4, None, MovementKind::In)
            .await
            .unwrap();
        let m = engine
            .set_absolute_in(uow.as_mut(), pid, 1, None)
            .await
            .unwrap();
        assert_eq!(m.qty_before(), 4);
        uow.rollback().await.unwrap();

        // Rolled back as a whole.
        assert_eq!(engine.get_product(pid).await.unwrap().quantity(), 0);
        assert!(engine.list_history(HistoryQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overflow_is_a_validation_error() {
        let engine = engine();
        let product = tester(&engine, 1).await;
        let err = engine
            .apply_delta(product.id_typed(), i64::MAX, None, MovementKind::In)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn domain_not_found_matches_ledger_not_found() {
        assert_eq!(LedgerError::from(DomainError::NotFound), LedgerError::NotFound);
    }

    /// Store whose units of work fail on the movement insert, after the quantity
    /// write has already been staged.
    struct FailingInsertStore {
        inner: InMemoryLedgerStore,
        fail: Arc<AtomicBool>,
    }

    struct FailingInsertUnitOfWork {
        inner: Box<dyn UnitOfWork>,
        fail: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl UnitOfWork for FailingInsertUnitOfWork {
        async fn find_product_for_update(
            &mut self,
            id: ProductId,
        ) -> Result<Option<Product>, StoreError> {
            self.inner.find_product_for_update(id).await
        }

        async fn save_quantity(&mut self, product: &Product) -> Result<(), StoreError> {
            self.inner.save_quantity(product).await
        }

        async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Transient("connection reset".into()));
            }
            self.inner.insert_movement(movement).await
        }

        async fn ledger_for(&mut self, id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
            self.inner.ledger_for(id).await
        }

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.commit().await
        }

        async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
            self.inner.rollback().await
        }
    }

    #[async_trait::async_trait]
    impl LedgerStore for FailingInsertStore {
        async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
            Ok(Box::new(FailingInsertUnitOfWork {
                inner: self.inner.begin().await?,
                fail: self.fail.clone(),
            }))
        }

        async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
            self.inner.insert_product(product).await
        }

        async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.get_product(id).await
        }

        async fn get_product_by_sku(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
            self.inner.get_product_by_sku(sku).await
        }

        async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.list_products().await
        }

        async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
            self.inner.delete_product(id).await
        }

        async fn list_movements(
            &self,
            query: HistoryQuery,
        ) -> Result<Vec<StockMovement>, StoreError> {
            self.inner.list_movements(query).await
        }
    }

    #[tokio::test]
    async fn transient_failure_rolls_back_the_quantity_write() {
        let fail = Arc::new(AtomicBool::new(false));
        let engine = LedgerEngine::new(
            FailingInsertStore {
                inner: InMemoryLedgerStore::new(),
                fail: fail.clone(),
            },
            EngineSettings::default(),
        );
        let product = tester(&engine, 10).await;
        let pid = product.id_typed();

        fail.store(true, Ordering::SeqCst);
        let err = engine
            .apply_delta(pid, 5, None, MovementKind::In)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::TransientStoreFailure(_)));
        assert_eq!(engine.get_product(pid).await.unwrap().quantity(), 10);
        assert!(engine.list_history(HistoryQuery::default()).await.unwrap().is_empty());

        // The store recovers and the session was released.
        fail.store(false, Ordering::SeqCst);
        let m = engine.apply_delta(pid, 5, None, MovementKind::In).await.unwrap();
        assert_eq!(m.qty_after(), 15);
    }
}
