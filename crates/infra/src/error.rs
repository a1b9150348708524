//! Infrastructure and engine error types.
//!
//! `StoreError` is what a `LedgerStore` reports; `LedgerError` is what the
//! engine hands to its caller. Each ledger operation aborts its unit of work
//! before a `LedgerError` leaves the engine.

use thiserror::Error;

use stockledger_core::DomainError;

/// Store operation error.
///
/// ## Error Categories
///
/// - **NotFound**: a row the operation depends on disappeared
/// - **Constraint**: uniqueness, foreign-key or check constraint rejected the write
/// - **Transient**: connection, pool or transaction failure; the caller may retry
/// - **Corrupt**: a persisted row could not be turned back into a domain value
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store unavailable: {0}")]
    Transient(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Ledger engine error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The referenced product does not exist (or vanished before commit).
    #[error("product not found")]
    NotFound,

    /// Input rejected before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Rejected by `NegativeStockPolicy::Reject`.
    #[error("insufficient stock: on hand {on_hand}, delta {delta}")]
    InsufficientStock { on_hand: i64, delta: i64 },

    /// Persisted state contradicts the ledger invariants.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Uniqueness or check constraint failure at commit time.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Connection/transaction failure; nothing from the operation was kept.
    #[error("transient store failure: {0}")]
    TransientStoreFailure(String),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(_) => LedgerError::NotFound,
            StoreError::Constraint(msg) => LedgerError::ConstraintViolation(msg),
            StoreError::Transient(msg) => LedgerError::TransientStoreFailure(msg),
            StoreError::Corrupt(msg) => LedgerError::InvariantViolation(msg),
        }
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::InvalidId(msg) => LedgerError::Validation(msg),
            DomainError::InvariantViolation(msg) => LedgerError::InvariantViolation(msg),
            DomainError::NotFound => LedgerError::NotFound,
            DomainError::InsufficientStock { on_hand, delta } => {
                LedgerError::InsufficientStock { on_hand, delta }
            }
        }
    }
}
