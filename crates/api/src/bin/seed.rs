//! Populate an empty catalogue with the demo products.

use anyhow::Context;

use stockledger_api::app::services;
use stockledger_infra::{LedgerConfig, seed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let config = LedgerConfig::from_env().context("invalid configuration")?;
    if !config.use_persistent_stores {
        tracing::warn!("USE_PERSISTENT_STORES is not true; seeding a throwaway in-memory store");
    }

    let services = services::build_services(&config).await?;
    let created = seed::seed_catalog(&services.engine)
        .await
        .context("seeding failed")?;

    tracing::info!(created, "seed finished");
    Ok(())
}
