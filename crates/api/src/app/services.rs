//! Store and engine wiring.

use std::sync::Arc;

use anyhow::Context;

use stockledger_infra::LedgerConfig;
use stockledger_infra::engine::LedgerEngine;
use stockledger_infra::store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore};

/// Shared handle to whichever store backs this process.
pub type SharedStore = Arc<dyn LedgerStore>;

#[derive(Clone)]
pub struct AppServices {
    pub engine: LedgerEngine<SharedStore>,
    /// Limit applied to history listings that do not name one.
    pub history_default_limit: u32,
}

impl AppServices {
    pub fn new(store: SharedStore, config: &LedgerConfig) -> Self {
        Self {
            engine: LedgerEngine::new(store, config.engine_settings()),
            history_default_limit: config.history_default_limit,
        }
    }

    /// In-memory services with the given configuration (dev/test).
    pub fn in_memory(config: &LedgerConfig) -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), config)
    }
}

pub async fn build_services(config: &LedgerConfig) -> anyhow::Result<AppServices> {
    if config.use_persistent_stores {
        return build_persistent_services(config).await;
    }

    tracing::info!("using in-memory ledger store");
    Ok(AppServices::in_memory(config))
}

async fn build_persistent_services(config: &LedgerConfig) -> anyhow::Result<AppServices> {
    let store = PostgresLedgerStore::connect(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to Postgres")?;
    store.migrate().await.context("failed to apply schema")?;

    tracing::info!(max_connections = config.db_max_connections, "using Postgres ledger store");
    Ok(AppServices::new(Arc::new(store), config))
}
