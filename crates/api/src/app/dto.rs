use serde::Deserialize;

use stockledger_core::ProductId;
use stockledger_inventory::{Discrepancy, LedgerAudit, Product, StockMovement};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub ean13: String,
    pub name: String,
    #[serde(default)]
    pub stock_qty: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: Option<String>,
    /// `IN`, `OUT` or `ADJUST`; inferred from the sign of `delta` when absent.
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementsQuery {
    pub product_id: Option<ProductId>,
    pub limit: Option<u32>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn product_to_json(p: &Product) -> serde_json::Value {
    serde_json::json!({
        "id": p.id_typed().to_string(),
        "sku": p.sku().as_str(),
        "ean13": p.ean13().as_str(),
        "name": p.name(),
        "stock_qty": p.quantity(),
        "created_at": p.created_at().to_rfc3339(),
        "updated_at": p.updated_at().to_rfc3339(),
    })
}

pub fn movement_to_json(m: &StockMovement) -> serde_json::Value {
    serde_json::json!({
        "id": m.id_typed().to_string(),
        "product_id": m.product_id().to_string(),
        "delta": m.delta(),
        "qty_before": m.qty_before(),
        "qty_after": m.qty_after(),
        "reason": m.reason(),
        "type": m.kind().as_str(),
        "created_at": m.created_at().to_rfc3339(),
    })
}

pub fn audit_to_json(audit: &LedgerAudit) -> serde_json::Value {
    serde_json::json!({
        "product_id": audit.product_id.to_string(),
        "consistent": audit.is_consistent(),
        "movement_count": audit.movement_count,
        "baseline": audit.baseline,
        "reconstructed": audit.reconstructed,
        "stock_qty": audit.product_quantity,
        "discrepancies": audit.discrepancies.iter().map(discrepancy_to_json).collect::<Vec<_>>(),
    })
}

fn discrepancy_to_json(d: &Discrepancy) -> serde_json::Value {
    match d {
        Discrepancy::ForeignMovement { movement_id } => serde_json::json!({
            "kind": "foreign_movement",
            "movement_id": movement_id.to_string(),
        }),
        Discrepancy::Unbalanced { movement_id } => serde_json::json!({
            "kind": "unbalanced",
            "movement_id": movement_id.to_string(),
        }),
        Discrepancy::BrokenChain {
            movement_id,
            expected_before,
            actual_before,
        } => serde_json::json!({
            "kind": "broken_chain",
            "movement_id": movement_id.to_string(),
            "expected_before": expected_before,
            "actual_before": actual_before,
        }),
        Discrepancy::QuantityDrift { ledger, product } => serde_json::json!({
            "kind": "quantity_drift",
            "ledger": ledger,
            "stock_qty": product,
        }),
    }
}
