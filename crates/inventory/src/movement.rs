use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, MovementId, ProductId};

use crate::product::Product;

const REASON_MAX_LEN: usize = 255;

/// Classification of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementKind {
    /// Receipt from outside (purchase, return).
    In,
    /// Consumption (sale, shrinkage).
    Out,
    /// Correction to a counted target quantity.
    Adjust,
}

impl MovementKind {
    pub const ALL: [MovementKind; 3] = [MovementKind::In, MovementKind::Out, MovementKind::Adjust];

    /// Persisted/wire representation (`IN`, `OUT`, `ADJUST`).
    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::In => "IN",
            MovementKind::Out => "OUT",
            MovementKind::Adjust => "ADJUST",
        }
    }

    /// Kind inferred for a raw delta when the caller does not name one.
    pub fn for_delta(delta: i64) -> Self {
        if delta >= 0 {
            MovementKind::In
        } else {
            MovementKind::Out
        }
    }
}

impl core::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(MovementKind::In),
            "OUT" => Ok(MovementKind::Out),
            "ADJUST" => Ok(MovementKind::Adjust),
            other => Err(DomainError::validation(format!(
                "movement kind must be one of IN, OUT, ADJUST (got '{other}')"
            ))),
        }
    }
}

/// What to do when a movement would leave the product below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeStockPolicy {
    /// Record the movement anyway (the ledger primitive has no floor).
    #[default]
    Allow,
    /// Refuse with `DomainError::InsufficientStock`.
    Reject,
}

impl FromStr for NegativeStockPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(NegativeStockPolicy::Allow),
            "reject" => Ok(NegativeStockPolicy::Reject),
            other => Err(DomainError::validation(format!(
                "negative stock policy must be 'allow' or 'reject' (got '{other}')"
            ))),
        }
    }
}

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    id: MovementId,
    product_id: ProductId,
    delta: i64,
    qty_before: i64,
    qty_after: i64,
    reason: Option<String>,
    kind: MovementKind,
    created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Rebuild a movement from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: MovementId,
        product_id: ProductId,
        delta: i64,
        qty_before: i64,
        qty_after: i64,
        reason: Option<String>,
        kind: MovementKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            delta,
            qty_before,
            qty_after,
            reason,
            kind,
            created_at,
        }
    }

    pub fn id_typed(&self) -> MovementId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn delta(&self) -> i64 {
        self.delta
    }

    pub fn qty_before(&self) -> i64 {
        self.qty_before
    }

    pub fn qty_after(&self) -> i64 {
        self.qty_after
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn kind(&self) -> MovementKind {
        self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `qty_after == qty_before + delta`.
    pub fn is_balanced(&self) -> bool {
        self.qty_before.checked_add(self.delta) == Some(self.qty_after)
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Trim a free-text reason; blank reasons are treated as absent.
pub fn normalize_reason(reason: Option<String>) -> DomainResult<Option<String>> {
    let Some(raw) = reason else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > REASON_MAX_LEN {
        return Err(DomainError::validation(format!(
            "reason cannot exceed {REASON_MAX_LEN} characters"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

/// Absolute stock targets are counts and cannot be negative.
pub fn validate_target_quantity(target: i64) -> DomainResult<i64> {
    if target < 0 {
        return Err(DomainError::validation("quantity must be greater than or equal to 0"));
    }
    Ok(target)
}

/// Decide the ledger entry for applying `delta` to `product`.
///
/// Pure: captures `qty_before` from the product as given and computes
/// `qty_after`. The caller must hold the product under a write lock and apply
/// the result with [`Product::apply`] in the same unit of work.
pub fn plan_movement(
    product: &Product,
    delta: i64,
    reason: Option<String>,
    kind: MovementKind,
    policy: NegativeStockPolicy,
    at: DateTime<Utc>,
) -> DomainResult<StockMovement> {
    let qty_before = product.quantity();
    let qty_after = qty_before
        .checked_add(delta)
        .ok_or_else(|| DomainError::validation("quantity overflow"))?;

    if policy == NegativeStockPolicy::Reject && qty_after < 0 {
        return Err(DomainError::InsufficientStock {
            on_hand: qty_before,
            delta,
        });
    }

    Ok(StockMovement {
        id: MovementId::new(),
        product_id: product.id_typed(),
        delta,
        qty_before,
        qty_after,
        reason: normalize_reason(reason)?,
        kind,
        created_at: at,
    })
}

/// Decide the `ADJUST` entry that brings `product` to exactly `target`.
///
/// A target equal to the current quantity still yields an entry with `delta == 0`.
pub fn plan_adjustment(
    product: &Product,
    target: i64,
    reason: Option<String>,
    policy: NegativeStockPolicy,
    at: DateTime<Utc>,
) -> DomainResult<StockMovement> {
    let target = validate_target_quantity(target)?;
    let delta = target
        .checked_sub(product.quantity())
        .ok_or_else(|| DomainError::validation("quantity overflow"))?;
    plan_movement(product, delta, reason, MovementKind::Adjust, policy, at)
}
