//! Entity trait: identity + continuity across state changes.

use std::collections::HashMap;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Index a batch of entities by identifier.
///
/// Later entries win when the batch contains the same identifier twice.
pub fn index_by_id<E, I>(entities: I) -> HashMap<E::Id, E>
where
    E: Entity,
    I: IntoIterator<Item = E>,
{
    entities
        .into_iter()
        .map(|entity| (entity.id().clone(), entity))
        .collect()
}
