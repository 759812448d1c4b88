//! Structural work queued during a tick and applied at its end.
//!
//! Detach and despawn update the query indexes and lookup tables the moment
//! they happen, but handing the underlying slots back to their pools is
//! postponed while a tick is running. Any reference a system captured earlier
//! in the tick keeps reading valid (if stale) values; the slots are reset and
//! recycled only once every system has finished.

use crate::ecs::{component, entity::Entity};

/// Releases and despawns accumulated during the current tick.
#[derive(Default)]
pub(crate) struct Deferred {
    /// Component slots detached mid-tick, awaiting release to their pools.
    pub(crate) releases: Vec<(component::Id, component::Handle)>,

    /// Entities despawned mid-tick, awaiting record cleanup.
    pub(crate) despawned: Vec<Entity>,
}

impl Deferred {
    /// Whether nothing is queued.
    pub(crate) fn is_empty(&self) -> bool {
        self.releases.is_empty() && self.despawned.is_empty()
    }
}
