//! Inventory domain module: products and their stock ledger.
//!
//! This crate contains the business rules for stock movements as pure,
//! deterministic logic (no IO, no HTTP, no storage). The infra crate wraps these
//! rules in a unit of work so that quantity and ledger never drift apart.

pub mod audit;
pub mod history;
pub mod movement;
pub mod product;

pub use audit::{Discrepancy, LedgerAudit, audit_ledger};
pub use history::{DEFAULT_HISTORY_LIMIT, HistoryQuery};
pub use movement::{
    MovementKind, NegativeStockPolicy, StockMovement, normalize_reason, plan_adjustment,
    plan_movement, validate_target_quantity,
};
pub use product::{Ean13, NewProduct, Product, Sku, validate_name};
