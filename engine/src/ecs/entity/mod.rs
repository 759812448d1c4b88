//! Entity handles and their pooled backing records.
//!
//! An [`Entity`] is a lightweight copyable handle: a world-scoped integer id
//! that is issued once and never reused. The data behind a handle lives in a
//! [`Record`] inside the world's [`Registry`](registry::Registry) slab, and
//! record slots *are* reused across despawn/spawn cycles, so churning
//! entities at frame rate does not grow the slab past its peak working set.
//!
//! # Id stability vs. slot reuse
//!
//! Reusing slots while never reusing ids is what makes stale handles safe:
//! a handle to a despawned entity simply stops resolving, because the id is
//! gone from the index even though the slot under it has moved on. Nothing
//! needs a generation counter; the id itself is the generation.
//!
//! # Deferred removal
//!
//! Despawning marks the record as pending removal. Pending records are
//! invisible to lookups and queries immediately, but their component
//! attachments stay intact until the world's end-of-tick flush, so a system
//! that captured the entity earlier in the tick can still read its values.

mod registry;

use fixedbitset::FixedBitSet;

pub use registry::Registry;

use crate::ecs::component;

/// An entity in the ECS: a unique handle to one simulated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    /// The world-scoped identifier. Issued once, never reused.
    id: u64,
}

impl Entity {
    /// Construct a handle from a raw id value.
    #[inline]
    pub(crate) const fn new(id: u64) -> Self {
        Self { id }
    }

    /// Get the id of this entity.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::new(0)
    }
}

/// The backing record for one entity slot.
///
/// Holds the optional unique name, the bitmask of attached component kinds,
/// and the pool handle for each attachment. Slots are recycled: `recycle`
/// rewinds a record to the just-created state for its next occupant.
#[derive(Debug, Default)]
pub(crate) struct Record {
    /// The handle of the current occupant.
    entity: Entity,

    /// The entity's unique name, if any.
    name: Option<String>,

    /// Bit per registered component type, set while attached.
    mask: FixedBitSet,

    /// Pool handle per component type, indexed by component id.
    attachments: Vec<Option<component::Handle>>,

    /// Whether the slot currently backs a live entity.
    alive: bool,

    /// Set when despawned mid-tick; cleared by the end-of-tick flush.
    pending_removal: bool,
}

impl Record {
    /// Rewind this slot for a new occupant.
    pub(crate) fn recycle(&mut self, entity: Entity, name: Option<&str>) {
        self.entity = entity;
        self.name = name.map(str::to_owned);
        self.mask.clear();
        self.attachments.clear();
        self.alive = true;
        self.pending_removal = false;
    }

    /// The handle of the current occupant.
    #[inline]
    pub(crate) fn entity(&self) -> Entity {
        self.entity
    }

    /// The entity's unique name, if any.
    #[inline]
    pub(crate) fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The bitmask of attached component kinds.
    #[inline]
    pub(crate) fn mask(&self) -> &FixedBitSet {
        &self.mask
    }

    /// Whether this record was despawned and awaits the end-of-tick flush.
    #[inline]
    pub(crate) fn is_pending_removal(&self) -> bool {
        self.pending_removal
    }

    /// Whether the entity holds the given component kind.
    #[inline]
    pub(crate) fn has(&self, id: component::Id) -> bool {
        self.mask.contains(id.index())
    }

    /// The pool handle attached for the given kind, if any.
    #[inline]
    pub(crate) fn attachment(&self, id: component::Id) -> Option<component::Handle> {
        self.attachments.get(id.index()).copied().flatten()
    }

    /// All current attachments as (kind, handle) pairs.
    pub(crate) fn attachments(&self) -> Vec<(component::Id, component::Handle)> {
        self.mask
            .ones()
            .filter_map(|index| {
                self.attachments[index].map(|handle| (component::Id::from(index), handle))
            })
            .collect()
    }

    /// Attach a pool handle for a kind the entity does not yet hold.
    pub(crate) fn attach(&mut self, id: component::Id, handle: component::Handle) {
        let index = id.index();
        if self.attachments.len() <= index {
            self.attachments.resize(index + 1, None);
        }
        self.mask.grow(index + 1);
        self.mask.insert(index);
        self.attachments[index] = Some(handle);
    }

    /// Detach the handle for a kind, if held.
    pub(crate) fn detach(&mut self, id: component::Id) -> Option<component::Handle> {
        let index = id.index();
        if !self.mask.contains(index) {
            return None;
        }
        self.mask.set(index, false);
        self.attachments[index].take()
    }

    /// Mark the record despawned: invisible to lookups, data intact.
    pub(crate) fn mark_pending_removal(&mut self) -> Option<String> {
        self.pending_removal = true;
        self.name.take()
    }

    /// Fully clear the slot after the flush, readying it for reuse.
    pub(crate) fn clear(&mut self) {
        self.name = None;
        self.mask.clear();
        self.attachments.clear();
        self.alive = false;
        self.pending_removal = false;
    }
}
