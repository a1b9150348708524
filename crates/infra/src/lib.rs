//! Infrastructure layer: stores, the ledger engine, config and seeding.

pub mod config;
pub mod engine;
pub mod error;
pub mod seed;
pub mod store;

pub use config::{ConfigError, LedgerConfig};
pub use engine::{EngineSettings, LedgerEngine};
pub use error::{LedgerError, StoreError};
