//! Persistence boundary for products and their ledgers.
//!
//! The engine only talks to [`LedgerStore`] and [`UnitOfWork`]; which backend
//! sits behind them is a wiring decision made at startup.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, UnitOfWork};
