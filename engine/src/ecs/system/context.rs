//! The per-tick view a system works through.
//!
//! [`Context`] wraps the world for the duration of one system's `run` call.
//! It forwards entity and component operations, and hands out query
//! [`Snapshot`]s: owned, pooled copies of a query's current match list.
//!
//! Snapshots are what make mutation-during-iteration safe. The snapshot is
//! taken at call time and is independent of the world, so the system may
//! despawn entities or add/remove components freely while walking it; the
//! query indexes update immediately for whoever reads them next, and the
//! snapshot the system already holds stays put. Snapshot buffers come from a
//! lock-free recycling queue, so steady-state ticks do not allocate.

use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::ecs::{
    component::Component,
    entity::Entity,
    error::Error,
    query,
    world::World,
};

/// A system's window onto the world during one tick.
pub struct Context<'w> {
    world: &'w mut World,
}

impl<'w> Context<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        Self { world }
    }

    /// Snapshot the current matches of a bound query.
    pub fn entities(&self, handle: query::Handle) -> Snapshot {
        self.world.snapshot(handle)
    }

    /// Read a component of an entity. Absent kinds and dead entities read
    /// as `None`; entities despawned earlier this tick still resolve.
    pub fn get<C: Component>(&self, entity: Entity) -> Option<&C> {
        self.world.component::<C>(entity)
    }

    /// Mutably access a component of an entity, marking the entity changed.
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        self.world.component_mut::<C>(entity)
    }

    /// Whether the entity holds the component kind.
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        self.world.has_component::<C>(entity)
    }

    /// Attach a default-valued component to an entity.
    pub fn add_component<C: Component>(&mut self, entity: Entity) -> Result<(), Error> {
        self.world.add_component::<C>(entity)
    }

    /// Attach a component, overlaying caller values on the defaults.
    pub fn add_component_with<C: Component>(
        &mut self,
        entity: Entity,
        overlay: impl FnOnce(&mut C),
    ) -> Result<(), Error> {
        self.world.add_component_with::<C>(entity, overlay)
    }

    /// Detach a component from an entity.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Result<(), Error> {
        self.world.remove_component::<C>(entity)
    }

    /// Spawn a new anonymous entity.
    pub fn spawn(&mut self) -> Entity {
        self.world.spawn()
    }

    /// Spawn a new named entity.
    pub fn spawn_named(&mut self, name: &str) -> Result<Entity, Error> {
        self.world.spawn_named(name)
    }

    /// Despawn an entity. Takes effect in lookups and queries immediately;
    /// its data stays readable until the end of the tick.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), Error> {
        self.world.despawn(entity)
    }

    /// Whether the entity is alive.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    /// Look up a live entity by name.
    pub fn entity_by_name(&self, name: &str) -> Option<Entity> {
        self.world.entity_by_name(name)
    }

    /// Look up a live entity by id.
    pub fn entity_by_id(&self, id: u64) -> Option<Entity> {
        self.world.entity_by_id(id)
    }
}

/// An owned snapshot of a query's matches at one point in time.
///
/// Independent of the world: holding one does not borrow anything, and the
/// underlying buffer returns to the recycling queue on drop.
pub struct Snapshot {
    entities: Vec<Entity>,
    recycle: Arc<SegQueue<Vec<Entity>>>,
}

impl Snapshot {
    pub(crate) fn new(entities: Vec<Entity>, recycle: Arc<SegQueue<Vec<Entity>>>) -> Self {
        Self { entities, recycle }
    }

    /// The snapshotted entities, in match order.
    #[inline]
    pub fn as_slice(&self) -> &[Entity] {
        &self.entities
    }

    /// Iterate the snapshotted entities.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().copied()
    }

    /// Number of snapshotted entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the snapshot is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl std::ops::Deref for Snapshot {
    type Target = [Entity];

    fn deref(&self) -> &Self::Target {
        &self.entities
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        let mut buffer = std::mem::take(&mut self.entities);
        buffer.clear();
        self.recycle.push(buffer);
    }
}

impl IntoIterator for Snapshot {
    type Item = Entity;
    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            snapshot: self,
            next: 0,
        }
    }
}

/// Owning iterator over a [`Snapshot`].
pub struct IntoIter {
    snapshot: Snapshot,
    next: usize,
}

impl Iterator for IntoIter {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        let entity = self.snapshot.entities.get(self.next).copied();
        self.next += 1;
        entity
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.snapshot.entities.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_buffer_is_recycled_on_drop() {
        // Given
        let recycle = Arc::new(SegQueue::new());
        let snapshot = Snapshot::new(vec![Entity::new(1), Entity::new(2)], Arc::clone(&recycle));

        // When
        drop(snapshot);

        // Then - The buffer came back empty, capacity retained
        let buffer = recycle.pop().unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 2);
    }

    #[test]
    fn snapshot_iteration_orders_match() {
        // Given
        let recycle = Arc::new(SegQueue::new());
        let entities = vec![Entity::new(3), Entity::new(1), Entity::new(2)];
        let snapshot = Snapshot::new(entities.clone(), Arc::clone(&recycle));

        // Then
        assert_eq!(snapshot.as_slice(), &entities[..]);
        assert_eq!(snapshot.iter().collect::<Vec<_>>(), entities);
        assert_eq!(snapshot.into_iter().collect::<Vec<_>>(), entities);
    }
}
