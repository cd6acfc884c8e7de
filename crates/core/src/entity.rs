//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Unlike a value object, an entity is the same thing across edits: a
/// product that gets renamed is still that product, a ledger entry keeps
/// its id however it is displayed. Read model rows implement this so
/// joins (e.g. transaction → product name) have a typed key to go by.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
