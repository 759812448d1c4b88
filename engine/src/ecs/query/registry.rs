use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use crate::ecs::{
    component,
    entity::Entity,
    query::{Handle, Query, Signature},
};

/// The query registry: owns every bound query and keeps them consistent.
///
/// Queries are shared: two systems binding the same required set get the same
/// [`Handle`], and the query lives as long as at least one subscriber
/// remains. A per-component reverse index routes each attach/detach to
/// exactly the queries that require the changed type, which is what keeps
/// structural mutation O(affected queries) instead of O(all queries).
#[derive(Default)]
pub struct Registry {
    /// All queries ever bound. Slots are stable; unsubscribed queries stay
    /// in place (emptied) so handles never dangle.
    queries: Vec<Query>,

    /// Signature key -> query handle, for sharing.
    by_kinds: HashMap<Vec<component::Id>, Handle>,

    /// Component index -> handles of queries requiring that component.
    by_component: Vec<Vec<Handle>>,
}

impl Registry {
    /// Create an empty query registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a query for `signature`, sharing an existing one when possible.
    ///
    /// A newly created (or re-activated) query is seeded from `live`, the
    /// world's current live entities and their component masks.
    pub fn bind<'a>(
        &mut self,
        signature: Signature,
        live: impl Iterator<Item = (Entity, &'a FixedBitSet)>,
    ) -> Handle {
        let handle = match self.by_kinds.get(signature.kinds()) {
            Some(handle) => *handle,
            None => {
                let handle = Handle::from(self.queries.len());
                self.index_kinds(&signature, handle);
                self.by_kinds.insert(signature.kinds().to_vec(), handle);
                self.queries.push(Query::new(signature));
                handle
            }
        };

        let needs_seed = self.queries[handle.index()].subscribers() == 0;
        self.queries[handle.index()].subscribe();

        if needs_seed {
            // Deterministic seed order: live iteration order is unspecified.
            let mut matching: Vec<Entity> = live
                .filter(|(_, mask)| self.queries[handle.index()].signature().matches(mask))
                .map(|(entity, _)| entity)
                .collect();
            matching.sort();
            for entity in matching {
                self.queries[handle.index()].insert(entity);
            }
        }

        handle
    }

    /// Drop one subscription from a query. The last unsubscribe empties the
    /// match list; the slot remains for possible re-binding.
    pub fn release(&mut self, handle: Handle) {
        if let Some(query) = self.queries.get_mut(handle.index()) {
            query.unsubscribe();
        }
    }

    /// Re-evaluate the entity against every query requiring `changed` after
    /// its component mask gained or lost that type.
    pub fn on_mask_changed(
        &mut self,
        entity: Entity,
        mask: &FixedBitSet,
        changed: component::Id,
    ) {
        let Some(handles) = self.by_component.get(changed.index()) else {
            return;
        };
        for handle in handles {
            let query = &mut self.queries[handle.index()];
            if query.subscribers() == 0 {
                continue;
            }
            if query.signature().matches(mask) {
                query.insert(entity);
            } else {
                query.remove(entity);
            }
        }
    }

    /// Drop a despawned entity from every query it matched.
    pub fn on_despawned(&mut self, entity: Entity) {
        for query in &mut self.queries {
            query.remove(entity);
        }
    }

    /// The current matches of a query.
    pub fn entities(&self, handle: Handle) -> &[Entity] {
        self.queries
            .get(handle.index())
            .map(Query::entities)
            .unwrap_or(&[])
    }

    /// Get a query by handle.
    pub fn get(&self, handle: Handle) -> Option<&Query> {
        self.queries.get(handle.index())
    }

    /// Record `handle` in the reverse index of each required component.
    fn index_kinds(&mut self, signature: &Signature, handle: Handle) {
        for id in signature.kinds() {
            if self.by_component.len() <= id.index() {
                self.by_component.resize_with(id.index() + 1, Vec::new);
            }
            self.by_component[id.index()].push(handle);
        }
    }
}
