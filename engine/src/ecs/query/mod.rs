//! Queries: capability-set predicates over entities, kept incrementally
//! up to date.
//!
//! A query names a set of required component types. An entity matches when it
//! currently holds every one of them. Instead of rescanning the world, each
//! query's match list is updated in place on every attach, detach, and
//! despawn, so reading a query between mutations is O(matches) with no
//! predicate evaluation at all.
//!
//! # Architecture
//!
//! - [`Signature`]: the required set as a bitmask over registered component
//!   ids, plus the sorted id list used as a deduplication key.
//! - [`IntoSignature`]: builds a signature from a component type or a tuple
//!   of them. Referencing an unregistered type fails with
//!   [`Error::InvalidQuerySpec`].
//! - [`Query`]: one maintained match list. Order is the order entities
//!   started matching; removal splices rather than swaps so the relative
//!   order of the remaining matches is preserved.
//! - [`Registry`](registry::Registry): shares queries between systems with
//!   identical signatures and routes attach/detach notifications to exactly
//!   the queries that require the changed type.
//!
//! # Usage
//!
//! Systems obtain handles at bind time and read matches through their tick
//! context:
//!
//! ```ignore
//! fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), Error> {
//!     self.moving = binder.query::<(Position, Velocity)>()?;
//!     Ok(())
//! }
//!
//! fn run(&mut self, ctx: &mut Context<'_>, delta: f64, _time: f64) {
//!     for entity in ctx.entities(self.moving) {
//!         // ...
//!     }
//! }
//! ```

mod registry;

use std::collections::HashMap;

use fixedbitset::FixedBitSet;

pub use registry::Registry;

use crate::ecs::{component, entity::Entity, error::Error};

/// A query identifier issued at bind time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Get the index of this query if it were to live in indexable storage (e.g. Vec)
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for Handle {
    #[inline]
    fn from(value: usize) -> Self {
        Self(value as u32)
    }
}

/// The required component set of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Bit per required component id.
    mask: FixedBitSet,

    /// The required ids, sorted. Doubles as the deduplication key.
    kinds: Vec<component::Id>,
}

impl Signature {
    /// An empty signature sized for `universe` registered component types.
    pub fn empty(universe: usize) -> Self {
        Self {
            mask: FixedBitSet::with_capacity(universe),
            kinds: Vec::new(),
        }
    }

    /// Add a required component id.
    pub fn require(&mut self, id: component::Id) {
        if !self.kinds.contains(&id) {
            self.mask.grow(id.index() + 1);
            self.mask.insert(id.index());
            self.kinds.push(id);
            self.kinds.sort_unstable();
        }
    }

    /// Merge another signature's requirements into this one.
    pub fn merge(&mut self, other: Signature) {
        for id in other.kinds {
            self.require(id);
        }
    }

    /// The required ids, sorted.
    #[inline]
    pub fn kinds(&self) -> &[component::Id] {
        &self.kinds
    }

    /// Whether the signature requires the given component id.
    #[inline]
    pub fn requires(&self, id: component::Id) -> bool {
        self.mask.contains(id.index())
    }

    /// Whether an entity's component mask satisfies this signature.
    #[inline]
    pub fn matches(&self, mask: &FixedBitSet) -> bool {
        self.mask.is_subset(mask)
    }
}

/// A type (or tuple of types) convertible into a query [`Signature`].
pub trait IntoSignature {
    /// Build the signature against the world's component registry.
    fn signature(components: &component::Registry) -> Result<Signature, Error>;
}

impl<C: component::Component> IntoSignature for C {
    fn signature(components: &component::Registry) -> Result<Signature, Error> {
        let id = components
            .get::<C>()
            .ok_or(Error::InvalidQuerySpec(std::any::type_name::<C>()))?;
        let mut signature = Signature::empty(components.len());
        signature.require(id);
        Ok(signature)
    }
}

/// Implement IntoSignature for tuples of component types.
macro_rules! tuple_signature {
    ($($name:ident),+) => {
        impl<$($name: IntoSignature),+> IntoSignature for ($($name,)+) {
            fn signature(components: &component::Registry) -> Result<Signature, Error> {
                let mut signature = Signature::empty(components.len());
                $(signature.merge(<$name as IntoSignature>::signature(components)?);)+
                Ok(signature)
            }
        }
    };
}

tuple_signature!(A);
tuple_signature!(A, B);
tuple_signature!(A, B, C);
tuple_signature!(A, B, C, D);
tuple_signature!(A, B, C, D, E);
tuple_signature!(A, B, C, D, E, F);
tuple_signature!(A, B, C, D, E, F, G);
tuple_signature!(A, B, C, D, E, F, G, H);

/// One maintained match list.
#[derive(Debug)]
pub struct Query {
    /// The required component set.
    signature: Signature,

    /// Current matches, in the order they started matching.
    entities: Vec<Entity>,

    /// Position of each match in `entities`, for O(1) membership checks.
    positions: HashMap<Entity, usize>,

    /// Number of systems currently bound to this query.
    subscribers: usize,
}

impl Query {
    /// Create an empty query for a signature.
    pub(crate) fn new(signature: Signature) -> Self {
        Self {
            signature,
            entities: Vec::new(),
            positions: HashMap::new(),
            subscribers: 0,
        }
    }

    /// The required component set.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The current matches, in the order they started matching.
    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Whether the entity currently matches.
    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.positions.contains_key(&entity)
    }

    /// Number of systems bound to this query.
    #[inline]
    pub(crate) fn subscribers(&self) -> usize {
        self.subscribers
    }

    pub(crate) fn subscribe(&mut self) {
        self.subscribers += 1;
    }

    pub(crate) fn unsubscribe(&mut self) {
        self.subscribers = self.subscribers.saturating_sub(1);
        if self.subscribers == 0 {
            self.entities.clear();
            self.positions.clear();
        }
    }

    /// Add an entity to the match list if absent.
    pub(crate) fn insert(&mut self, entity: Entity) {
        if !self.positions.contains_key(&entity) {
            self.positions.insert(entity, self.entities.len());
            self.entities.push(entity);
        }
    }

    /// Remove an entity from the match list if present.
    ///
    /// Splices rather than swap-removes: the relative order of the remaining
    /// matches stays the order they started matching.
    pub(crate) fn remove(&mut self, entity: Entity) {
        if let Some(position) = self.positions.remove(&entity) {
            self.entities.remove(position);
            for shifted in &self.entities[position..] {
                if let Some(p) = self.positions.get_mut(shifted) {
                    *p -= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_of(bits: &[usize]) -> FixedBitSet {
        let mut mask = FixedBitSet::with_capacity(8);
        for bit in bits {
            mask.insert(*bit);
        }
        mask
    }

    #[test]
    fn signature_matches_superset_masks() {
        // Given
        let mut signature = Signature::empty(8);
        signature.require(component::Id::new(1));
        signature.require(component::Id::new(3));

        // Then
        assert!(signature.matches(&mask_of(&[1, 3])));
        assert!(signature.matches(&mask_of(&[0, 1, 3, 5])));
        assert!(!signature.matches(&mask_of(&[1])));
        assert!(!signature.matches(&mask_of(&[])));
    }

    #[test]
    fn signature_kinds_sorted_and_deduped() {
        // Given
        let mut signature = Signature::empty(8);
        signature.require(component::Id::new(5));
        signature.require(component::Id::new(2));
        signature.require(component::Id::new(5));

        // Then
        assert_eq!(
            signature.kinds(),
            &[component::Id::new(2), component::Id::new(5)]
        );
    }

    #[test]
    fn query_insert_is_idempotent() {
        // Given
        let mut query = Query::new(Signature::empty(4));
        let entity = Entity::new(1);

        // When
        query.insert(entity);
        query.insert(entity);

        // Then
        assert_eq!(query.entities(), &[entity]);
    }

    #[test]
    fn query_remove_preserves_match_order() {
        // Given
        let mut query = Query::new(Signature::empty(4));
        let (a, b, c) = (Entity::new(1), Entity::new(2), Entity::new(3));
        query.insert(a);
        query.insert(b);
        query.insert(c);

        // When
        query.remove(b);

        // Then - Order of the survivors is untouched
        assert_eq!(query.entities(), &[a, c]);
        assert!(query.contains(a));
        assert!(!query.contains(b));
        assert!(query.contains(c));

        // And positions stay consistent for further removals
        query.remove(c);
        assert_eq!(query.entities(), &[a]);
    }

    #[test]
    fn query_remove_absent_is_noop() {
        // Given
        let mut query = Query::new(Signature::empty(4));
        query.insert(Entity::new(1));

        // When
        query.remove(Entity::new(9));

        // Then
        assert_eq!(query.entities().len(), 1);
    }
}
