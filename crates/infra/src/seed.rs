//! Demo catalogue for local development.

use tracing::info;

use stockledger_inventory::NewProduct;

use crate::engine::LedgerEngine;
use crate::error::LedgerError;
use crate::store::LedgerStore;

/// `(sku, ean13, name, initial quantity)`
pub const DEMO_PRODUCTS: [(&str, &str, &str, i64); 3] = [
    ("SKU-001", "1234567890123", "Perfume A", 50),
    ("SKU-002", "1234567890124", "Perfume B", 20),
    ("SKU-003", "1234567890125", "Perfume C", 0),
];

/// Insert the demo products when the catalogue is empty.
///
/// Returns the number of products created (zero when anything already exists).
pub async fn seed_catalog<S: LedgerStore>(engine: &LedgerEngine<S>) -> Result<usize, LedgerError> {
    if !engine.list_products().await?.is_empty() {
        info!("catalogue not empty; skipping seed");
        return Ok(0);
    }

    for (sku, ean13, name, quantity) in DEMO_PRODUCTS {
        engine
            .create_product(NewProduct::parse(sku, ean13, name, quantity)?)
            .await?;
    }
    info!(count = DEMO_PRODUCTS.len(), "catalogue seeded");
    Ok(DEMO_PRODUCTS.len())
}
