//! Ledger history query parameters.

use stockledger_core::{DomainError, DomainResult, ProductId};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

/// Filter + cap for a history listing. Results are always newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub product_id: Option<ProductId>,
    pub limit: u32,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            product_id: None,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl HistoryQuery {
    /// Build a query from raw request parameters. A limit of zero is rejected.
    pub fn new(product_id: Option<ProductId>, limit: Option<u32>) -> DomainResult<Self> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if limit == 0 {
            return Err(DomainError::validation("limit must be at least 1"));
        }
        Ok(Self { product_id, limit })
    }

    pub fn for_product(product_id: ProductId) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Cap the limit so a listing never becomes an unbounded scan.
    pub fn clamped(mut self, max: u32) -> Self {
        self.limit = self.limit.clamp(1, max.max(1));
        self
    }
}
