//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Ledger records (batches, movements) and aggregate rows (summaries) are all
/// entities: two records with the same id are the same record, whatever their
/// current figures.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
