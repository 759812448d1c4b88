use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use crate::ecs::{
    entity::{Entity, Record},
    error::Error,
};

/// The entity registry: a pooled slab of [`Record`]s plus the id and name
/// indexes.
///
/// Spawning claims a free slot (or grows the slab) and issues a fresh id;
/// despawning eventually returns the slot to the free list. Ids come from a
/// monotonic counter and are never issued twice, even when the caller
/// supplies an explicit id: the counter is bumped past it.
pub struct Registry {
    /// Record slots, reused across despawn/spawn cycles.
    records: Vec<Record>,

    /// Indices of slots available for the next spawn.
    free: Vec<u32>,

    /// Live and pending-removal entities by id.
    by_id: HashMap<u64, u32>,

    /// Live entities by unique name.
    by_name: HashMap<String, u64>,

    /// Next id to issue.
    next_id: u64,
}

impl Registry {
    /// Create a registry with `capacity` record slots pre-allocated.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut records = Vec::new();
        records.resize_with(capacity, Record::default);
        Self {
            records,
            free: (0..capacity as u32).rev().collect(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
            next_id: 0,
        }
    }

    /// Spawn a new entity, optionally with a unique name and/or explicit id.
    ///
    /// Fails with [`Error::DuplicateName`] if the name belongs to a live
    /// entity, or [`Error::DuplicateId`] if the id does. An accepted explicit
    /// id also reserves everything up to it, so the counter can never issue
    /// it again.
    pub fn spawn(&mut self, name: Option<&str>, id: Option<u64>) -> Result<Entity, Error> {
        if let Some(name) = name {
            if self.by_name.contains_key(name) {
                return Err(Error::DuplicateName(name.to_owned()));
            }
        }

        let id = match id {
            Some(requested) => {
                if self.by_id.contains_key(&requested) {
                    return Err(Error::DuplicateId(requested));
                }
                self.next_id = self.next_id.max(requested + 1);
                requested
            }
            None => {
                let issued = self.next_id;
                self.next_id += 1;
                issued
            }
        };

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.records.push(Record::default());
                (self.records.len() - 1) as u32
            }
        };

        let entity = Entity::new(id);
        self.records[slot as usize].recycle(entity, name);
        self.by_id.insert(id, slot);
        if let Some(name) = name {
            self.by_name.insert(name.to_owned(), id);
        }

        Ok(entity)
    }

    /// Get the record behind a handle, including pending-removal records.
    ///
    /// Component reads go through here so references captured before a
    /// mid-tick despawn keep resolving until the flush.
    pub fn record(&self, entity: Entity) -> Option<&Record> {
        let slot = *self.by_id.get(&entity.id())?;
        Some(&self.records[slot as usize])
    }

    /// Get the record behind a handle only if the entity is live (not
    /// pending removal). Structural mutations go through here.
    pub fn record_live_mut(&mut self, entity: Entity) -> Option<&mut Record> {
        let slot = *self.by_id.get(&entity.id())?;
        let record = &mut self.records[slot as usize];
        (!record.is_pending_removal()).then_some(record)
    }

    /// Whether the entity is live (spawned and not pending removal).
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.record(entity)
            .is_some_and(|record| !record.is_pending_removal())
    }

    /// Look up a live entity by name.
    pub fn by_name(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).map(|id| Entity::new(*id))
    }

    /// Look up a live entity by id.
    pub fn by_id(&self, id: u64) -> Option<Entity> {
        let slot = *self.by_id.get(&id)?;
        let record = &self.records[slot as usize];
        (!record.is_pending_removal()).then(|| record.entity())
    }

    /// Mark an entity despawned: removed from lookups now, record kept until
    /// [`free`](Self::free). Returns `false` if it was not live.
    pub fn mark_despawned(&mut self, entity: Entity) -> bool {
        let Some(record) = self.record_live_mut(entity) else {
            return false;
        };
        if let Some(name) = record.mark_pending_removal() {
            self.by_name.remove(&name);
        }
        true
    }

    /// Release a despawned entity's slot for reuse and drop its id mapping.
    pub fn free(&mut self, entity: Entity) {
        if let Some(slot) = self.by_id.remove(&entity.id()) {
            self.records[slot as usize].clear();
            self.free.push(slot);
        }
    }

    /// Iterate live entities with their component masks, in slab order.
    pub fn live(&self) -> impl Iterator<Item = (Entity, &FixedBitSet)> {
        self.by_id.values().filter_map(|slot| {
            let record = &self.records[*slot as usize];
            (!record.is_pending_removal()).then(|| (record.entity(), record.mask()))
        })
    }

    /// All live entity handles.
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.live().map(|(entity, _)| entity).collect();
        entities.sort();
        entities
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live().count()
    }

    /// Whether no live entities exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_issues_unique_ids() {
        // Given
        let mut registry = Registry::default();

        // When
        let mut ids: Vec<u64> = (0..200)
            .map(|_| registry.spawn(None, None).unwrap().id())
            .collect();

        // Then - No dupes issued
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(before, ids.len());
    }

    #[test]
    fn slots_reused_ids_not() {
        // Given
        let mut registry = Registry::default();
        let first = registry.spawn(None, None).unwrap();

        // When
        registry.mark_despawned(first);
        registry.free(first);
        let second = registry.spawn(None, None).unwrap();

        // Then - Fresh id on a recycled slot, stale handle stops resolving
        assert_ne!(first.id(), second.id());
        assert!(!registry.is_alive(first));
        assert!(registry.is_alive(second));
        assert_eq!(registry.records.len(), 1);
    }

    #[test]
    fn duplicate_name_rejected() {
        // Given
        let mut registry = Registry::default();
        registry.spawn(Some("player"), None).unwrap();

        // When
        let result = registry.spawn(Some("player"), None);

        // Then
        assert_eq!(result, Err(Error::DuplicateName("player".into())));
    }

    #[test]
    fn name_freed_on_despawn() {
        // Given
        let mut registry = Registry::default();
        let player = registry.spawn(Some("player"), None).unwrap();

        // When
        registry.mark_despawned(player);

        // Then - Lookup misses and the name is reusable immediately
        assert_eq!(registry.by_name("player"), None);
        assert!(registry.spawn(Some("player"), None).is_ok());
    }

    #[test]
    fn explicit_id_reserves_counter() {
        // Given
        let mut registry = Registry::default();

        // When
        let explicit = registry.spawn(None, Some(100)).unwrap();
        let next = registry.spawn(None, None).unwrap();

        // Then
        assert_eq!(explicit.id(), 100);
        assert_eq!(next.id(), 101);
    }

    #[test]
    fn duplicate_explicit_id_rejected() {
        // Given
        let mut registry = Registry::default();
        registry.spawn(None, Some(7)).unwrap();

        // When
        let result = registry.spawn(None, Some(7));

        // Then
        assert_eq!(result, Err(Error::DuplicateId(7)));
    }

    #[test]
    fn pending_removal_excluded_from_lookups_but_readable() {
        // Given
        let mut registry = Registry::default();
        let entity = registry.spawn(Some("ghost"), Some(3)).unwrap();

        // When
        registry.mark_despawned(entity);

        // Then - Invisible to lookups and live iteration
        assert_eq!(registry.by_id(3), None);
        assert_eq!(registry.by_name("ghost"), None);
        assert_eq!(registry.len(), 0);

        // But the record still resolves for captured readers
        assert!(registry.record(entity).is_some());
    }

    #[test]
    fn with_capacity_preallocates_slots() {
        // Given
        let mut registry = Registry::with_capacity(8);
        assert_eq!(registry.records.len(), 8);

        // When - Spawning within capacity reuses pre-allocated slots
        for _ in 0..8 {
            registry.spawn(None, None).unwrap();
        }

        // Then
        assert_eq!(registry.records.len(), 8);
    }
}
