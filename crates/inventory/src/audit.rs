//! Ledger audit: checks that a product's quantity is explained by its movements.

use stockledger_core::{MovementId, ProductId};

use crate::movement::StockMovement;
use crate::product::Product;

/// A single way the ledger failed to explain the product quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discrepancy {
    /// The entry is attached to a different product.
    ForeignMovement { movement_id: MovementId },
    /// `qty_after != qty_before + delta`.
    Unbalanced { movement_id: MovementId },
    /// `qty_before` does not continue from the previous entry's `qty_after`.
    BrokenChain {
        movement_id: MovementId,
        expected_before: i64,
        actual_before: i64,
    },
    /// The product's quantity differs from the last `qty_after`.
    QuantityDrift { ledger: i64, product: i64 },
}

/// Result of auditing one product's ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAudit {
    pub product_id: ProductId,
    pub movement_count: usize,
    /// Quantity before the first recorded movement (the creation baseline).
    pub baseline: i64,
    /// Baseline plus every delta, in order.
    pub reconstructed: i64,
    pub product_quantity: i64,
    pub discrepancies: Vec<Discrepancy>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Audit `movements` (oldest first) against `product`.
///
/// With no movements the product quantity is its own baseline and the ledger is
/// trivially consistent.
pub fn audit_ledger(product: &Product, movements: &[StockMovement]) -> LedgerAudit {
    let product_id = product.id_typed();
    let baseline = movements
        .first()
        .map(StockMovement::qty_before)
        .unwrap_or(product.quantity());

    let mut discrepancies = Vec::new();
    let mut running = baseline;
    let mut last_after = baseline;

    for m in movements {
        if m.product_id() != product_id {
            discrepancies.push(Discrepancy::ForeignMovement {
                movement_id: m.id_typed(),
            });
        }
        if !m.is_balanced() {
            discrepancies.push(Discrepancy::Unbalanced {
                movement_id: m.id_typed(),
            });
        }
        if m.qty_before() != last_after {
            discrepancies.push(Discrepancy::BrokenChain {
                movement_id: m.id_typed(),
                expected_before: last_after,
                actual_before: m.qty_before(),
            });
        }
        running = running.saturating_add(m.delta());
        last_after = m.qty_after();
    }

    if last_after != product.quantity() {
        discrepancies.push(Discrepancy::QuantityDrift {
            ledger: last_after,
            product: product.quantity(),
        });
    }

    LedgerAudit {
        product_id,
        movement_count: movements.len(),
        baseline,
        reconstructed: running,
        product_quantity: product.quantity(),
        discrepancies,
    }
}
