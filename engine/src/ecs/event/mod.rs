//! Change notification for entity mutations.
//!
//! The world records every entity that changes during a tick — component
//! attach/detach, mutable component access, despawn — and delivers the batch
//! to its registered listeners at one fixed point: the end of the tick, after
//! deferred releases have flushed. Mutations made outside a tick accumulate
//! and ride along with the next executed tick's batch.
//!
//! Listeners are an ordered list of callbacks invoked synchronously, in
//! registration order, each receiving the same batch slice. The batch holds
//! each changed entity once, in first-change order. Delivering at a fixed
//! point (rather than per mutation) is what keeps observable ordering
//! deterministic regardless of how systems interleave their mutations.

use std::collections::HashSet;

use crate::ecs::entity::Entity;

/// A registered change listener.
pub type ChangeListener = Box<dyn FnMut(&[Entity])>;

/// The per-tick record of changed entities.
#[derive(Default)]
pub(crate) struct ChangeLog {
    /// Changed entities, each once, in first-change order.
    changed: Vec<Entity>,

    /// Membership set backing the dedup.
    seen: HashSet<Entity>,
}

impl ChangeLog {
    /// Record a change to an entity. Repeat marks are absorbed.
    pub(crate) fn mark(&mut self, entity: Entity) {
        if self.seen.insert(entity) {
            self.changed.push(entity);
        }
    }

    /// Whether no changes are pending.
    pub(crate) fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Take the pending batch, resetting the log.
    pub(crate) fn take_batch(&mut self) -> Vec<Entity> {
        self.seen.clear();
        std::mem::take(&mut self.changed)
    }

    /// Hand a delivered batch's buffer back for reuse.
    pub(crate) fn recycle(&mut self, mut batch: Vec<Entity>) {
        batch.clear();
        if self.changed.is_empty() {
            self.changed = batch;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marks_dedup_in_first_change_order() {
        // Given
        let mut log = ChangeLog::default();
        let (a, b) = (Entity::new(1), Entity::new(2));

        // When
        log.mark(b);
        log.mark(a);
        log.mark(b);
        log.mark(a);

        // Then
        assert_eq!(log.take_batch(), vec![b, a]);
    }

    #[test]
    fn take_batch_resets_the_log() {
        // Given
        let mut log = ChangeLog::default();
        log.mark(Entity::new(1));

        // When
        let batch = log.take_batch();

        // Then - Log empty, same entity markable again
        assert_eq!(batch.len(), 1);
        assert!(log.is_empty());
        log.mark(Entity::new(1));
        assert_eq!(log.take_batch().len(), 1);
    }

    #[test]
    fn recycle_reuses_the_buffer() {
        // Given
        let mut log = ChangeLog::default();
        log.mark(Entity::new(1));
        let batch = log.take_batch();
        let capacity = batch.capacity();

        // When
        log.recycle(batch);
        log.mark(Entity::new(2));

        // Then
        assert!(log.changed.capacity() >= capacity);
    }
}
