//! Entity trait: records that keep their identity while their state changes.

/// Something with a stable surrogate identity.
///
/// A `Product` keeps its id while its quantity changes; a `StockMovement` is
/// immutable but still addressed by id in the ledger.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Two entities are the same record when their ids match, regardless of state.
    fn same_identity_as(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
