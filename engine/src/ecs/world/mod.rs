//! The World is the root of the ECS.
//!
//! A `World` owns everything: the component registry and its pools, the
//! entity slab with its name/id indexes, the query registry, the ordered
//! system list, and the change log. It drives the whole simulation through
//! [`World::execute`], one synchronous tick at a time.
//!
//! # Architecture
//!
//! The world coordinates several subsystems:
//! - **Component registry + pools**: schema table per registered type, one
//!   slab pool per type for instance reuse
//! - **Entity registry**: pooled entity records, O(1) name and id lookups
//! - **Query registry**: shared, incrementally maintained match lists
//! - **System registry**: deterministic execution order
//! - **Change log**: batch of mutated entities, delivered to listeners at
//!   the end of each tick
//!
//! # Tick shape
//!
//! `execute(delta, time)` does, in order:
//! 1. nothing, if the world is stopped;
//! 2. run every enabled system, in priority/registration order — structural
//!    changes made by one system are visible to the queries of the next;
//! 3. flush deferred work: release detached component slots, free despawned
//!    entity records;
//! 4. deliver the changed-entity batch to the `on_entity_changed` listeners.
//!
//! # Example
//!
//! ```ignore
//! let mut world = World::new();
//! world
//!     .register_component::<Position>()?
//!     .register_component::<Velocity>()?;
//! world.register_system(Movement::default())?;
//!
//! let player = world.spawn_named("player")?;
//! world.add_component_with::<Position>(player, |p| p.x = 5.0)?;
//!
//! loop {
//!     world.execute(1.0 / 60.0, elapsed);
//! }
//! ```

mod deferred;

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crossbeam::queue::SegQueue;

use crate::ecs::{
    component::{self, AnyPool, Component, Pool},
    entity::{self, Entity},
    error::Error,
    event::{ChangeListener, ChangeLog},
    query,
    system::{self, Attributes, Binder, Context, Snapshot, System},
    world::deferred::Deferred,
};

/// Construction options for a [`World`].
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Entity record slots to pre-allocate.
    pub entity_pool_size: usize,

    /// Default growth batch for component pools created by
    /// [`World::register_component`].
    pub pool_batch_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            entity_pool_size: 0,
            pool_batch_size: component::DEFAULT_BATCH,
        }
    }
}

/// Pool accounting for one registered component type.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    /// The component type's name.
    pub component: &'static str,

    /// Slots allocated in the type's pool.
    pub capacity: usize,

    /// Slots currently attached to entities.
    pub live: usize,
}

/// A point-in-time summary of the world's contents.
#[derive(Debug, Clone)]
pub struct Stats {
    /// Live entities.
    pub entities: usize,

    /// Registered systems.
    pub systems: usize,

    /// Per-component pool accounting.
    pub pools: Vec<PoolStats>,
}

/// The World is the central container for all entities, components, and
/// systems, and the only owner of their backing storage.
pub struct World {
    /// Whether `execute` runs ticks. Toggled by `play`/`stop`.
    enabled: bool,

    /// Construction options, consulted when creating default pools.
    options: Options,

    /// The component schema table.
    components: component::Registry,

    /// One slab pool per registered component type, indexed by component id.
    pools: Vec<Box<dyn AnyPool>>,

    /// The entity slab and its name/id indexes.
    entities: entity::Registry,

    /// The shared, incrementally maintained queries.
    queries: query::Registry,

    /// The ordered system list.
    systems: system::Registry,

    /// Entities mutated since the last delivery.
    changes: ChangeLog,

    /// Change listeners, invoked in registration order at end of tick.
    listeners: Vec<ChangeListener>,

    /// Work queued during the current tick.
    deferred: Deferred,

    /// True while a tick is running.
    ticking: bool,

    /// Recycled query snapshot buffers.
    snapshot_buffers: Arc<SegQueue<Vec<Entity>>>,

    /// Marker to make World !Send. A world stays on the thread that made it.
    _not_send: PhantomData<*mut ()>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Create a world with default options.
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    /// Create a world, pre-allocating per the given options.
    pub fn with_options(options: Options) -> Self {
        log::info!(
            "creating world (entity_pool_size: {}, pool_batch_size: {})",
            options.entity_pool_size,
            options.pool_batch_size
        );
        Self {
            enabled: true,
            options,
            components: component::Registry::new(),
            pools: Vec::new(),
            entities: entity::Registry::with_capacity(options.entity_pool_size),
            queries: query::Registry::new(),
            systems: system::Registry::new(),
            changes: ChangeLog::default(),
            listeners: Vec::new(),
            deferred: Deferred::default(),
            ticking: false,
            snapshot_buffers: Arc::new(SegQueue::new()),
            _not_send: PhantomData,
        }
    }

    // ==================== Components ====================

    /// Register a component type with a default pool.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the type is already
    /// registered; the original registration and pool stay intact.
    pub fn register_component<C: Component>(&mut self) -> Result<&mut Self, Error> {
        let batch = self.options.pool_batch_size;
        self.register_component_with_pool(Pool::<C>::with_batch(batch))
    }

    /// Register a component type, adopting a caller-tuned pool.
    pub fn register_component_with_pool<C: Component>(
        &mut self,
        pool: Pool<C>,
    ) -> Result<&mut Self, Error> {
        let id = self.components.register::<C>()?;
        debug_assert_eq!(id.index(), self.pools.len());
        self.pools.push(Box::new(pool));
        Ok(self)
    }

    /// Whether a component type has been registered in this world.
    pub fn has_registered_component<C: Component>(&self) -> bool {
        self.components.contains::<C>()
    }

    /// Attach a default-valued component to an entity.
    pub fn add_component<C: Component>(&mut self, entity: Entity) -> Result<(), Error> {
        self.add_component_with::<C>(entity, |_| {})
    }

    /// Attach a component to an entity, overlaying caller values on the
    /// type's defaults.
    ///
    /// The slot starts at `C::default()`; `overlay` mutates whichever fields
    /// the caller wants to differ. Errors: [`Error::UnregisteredComponent`],
    /// [`Error::NoSuchEntity`], [`Error::DuplicateComponent`].
    pub fn add_component_with<C: Component>(
        &mut self,
        entity: Entity,
        overlay: impl FnOnce(&mut C),
    ) -> Result<(), Error> {
        let id = self.components.lookup::<C>()?;

        // Validate the entity before touching the pool.
        let record = self
            .entities
            .record_live_mut(entity)
            .ok_or(Error::NoSuchEntity(entity))?;
        if record.has(id) {
            return Err(Error::DuplicateComponent(std::any::type_name::<C>()));
        }

        let handle = {
            let pool = self.typed_pool_mut::<C>(id);
            let handle = pool.acquire();
            if let Some(value) = pool.get_mut(handle) {
                overlay(value);
            }
            handle
        };

        let Some(record) = self.entities.record_live_mut(entity) else {
            // Validated above; hand the slot back rather than leak it.
            let _ = self.pools[id.index()].release(handle);
            return Err(Error::NoSuchEntity(entity));
        };
        record.attach(id, handle);
        self.queries.on_mask_changed(entity, record.mask(), id);
        self.changes.mark(entity);
        Ok(())
    }

    /// Detach a component from an entity.
    ///
    /// Queries and the change log update immediately; the slot's release to
    /// its pool is deferred to end of tick when called mid-tick, so already
    /// captured references stay readable for the rest of the tick.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> Result<(), Error> {
        let id = self.components.lookup::<C>()?;
        let record = self
            .entities
            .record_live_mut(entity)
            .ok_or(Error::NoSuchEntity(entity))?;
        let handle = record
            .detach(id)
            .ok_or(Error::ComponentNotPresent(std::any::type_name::<C>()))?;
        self.queries.on_mask_changed(entity, record.mask(), id);
        self.changes.mark(entity);
        self.release_or_defer(id, handle)
    }

    /// Read a component of an entity.
    ///
    /// `None` for absent kinds, unregistered types, and unknown entities.
    /// Entities despawned earlier in the current tick still resolve.
    pub fn component<C: Component>(&self, entity: Entity) -> Option<&C> {
        let id = self.components.get::<C>()?;
        let handle = self.entities.record(entity)?.attachment(id)?;
        self.typed_pool::<C>(id).get(handle)
    }

    /// Mutably access a component of an entity, marking the entity changed.
    pub fn component_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        let id = self.components.get::<C>()?;
        let handle = self.entities.record(entity)?.attachment(id)?;
        self.changes.mark(entity);
        self.typed_pool_mut::<C>(id).get_mut(handle)
    }

    /// Whether the entity currently holds the component kind.
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.components
            .get::<C>()
            .and_then(|id| self.entities.record(entity).map(|record| record.has(id)))
            .unwrap_or(false)
    }

    // ==================== Entities ====================

    /// Spawn a new anonymous entity.
    pub fn spawn(&mut self) -> Entity {
        self.entities
            .spawn(None, None)
            .expect("anonymous spawn cannot collide")
    }

    /// Spawn a new entity with a unique name.
    pub fn spawn_named(&mut self, name: &str) -> Result<Entity, Error> {
        self.entities.spawn(Some(name), None)
    }

    /// Spawn a new entity with an optional name and/or explicit id.
    pub fn spawn_with(&mut self, name: Option<&str>, id: Option<u64>) -> Result<Entity, Error> {
        self.entities.spawn(name, id)
    }

    /// Replace `target`'s component set with value-copies of `source`'s.
    ///
    /// Kinds held by both get `source`'s values copied over; kinds only in
    /// `source` are acquired and copied; kinds only in `target` are removed.
    pub fn copy_entity(&mut self, target: Entity, source: Entity) -> Result<(), Error> {
        if target == source {
            return Ok(());
        }

        let (source_attachments, source_mask) = {
            let record = self
                .entities
                .record(source)
                .filter(|record| !record.is_pending_removal())
                .ok_or(Error::NoSuchEntity(source))?;
            (record.attachments(), record.mask().clone())
        };
        let target_attachments = self
            .entities
            .record_live_mut(target)
            .ok_or(Error::NoSuchEntity(target))?
            .attachments();

        // Copy every kind the source holds.
        let target_has: HashMap<component::Id, component::Handle> =
            target_attachments.iter().copied().collect();
        for (id, source_handle) in &source_attachments {
            match target_has.get(id) {
                Some(target_handle) => {
                    self.pools[id.index()].copy_value(*source_handle, *target_handle);
                }
                None => {
                    let handle = self.pools[id.index()].acquire_copy(*source_handle);
                    let Some(record) = self.entities.record_live_mut(target) else {
                        let _ = self.pools[id.index()].release(handle);
                        return Err(Error::NoSuchEntity(target));
                    };
                    record.attach(*id, handle);
                    self.queries.on_mask_changed(target, record.mask(), *id);
                }
            }
        }

        // Drop every kind the source does not.
        for (id, handle) in target_attachments {
            if source_mask.contains(id.index()) {
                continue;
            }
            if let Some(record) = self.entities.record_live_mut(target) {
                record.detach(id);
                self.queries.on_mask_changed(target, record.mask(), id);
            }
            self.release_or_defer(id, handle)?;
        }

        self.changes.mark(target);
        Ok(())
    }

    /// Spawn a new entity carrying value-copies of `source`'s components.
    pub fn clone_entity(&mut self, source: Entity) -> Result<Entity, Error> {
        if !self.entities.is_alive(source) {
            return Err(Error::NoSuchEntity(source));
        }
        let clone = self.spawn();
        self.copy_entity(clone, source)?;
        Ok(clone)
    }

    /// Remove and release all of an entity's components, keeping its id and
    /// name: back to the just-spawned state.
    pub fn reset_entity(&mut self, entity: Entity) -> Result<(), Error> {
        let attachments = self
            .entities
            .record_live_mut(entity)
            .ok_or(Error::NoSuchEntity(entity))?
            .attachments();
        for (id, handle) in attachments {
            if let Some(record) = self.entities.record_live_mut(entity) {
                record.detach(id);
                self.queries.on_mask_changed(entity, record.mask(), id);
            }
            self.release_or_defer(id, handle)?;
        }
        self.changes.mark(entity);
        Ok(())
    }

    /// Despawn an entity.
    ///
    /// Logically immediate: gone from name/id lookups and every query before
    /// this returns. Physical cleanup — component release and record reuse —
    /// happens at end of tick when called mid-tick, so values captured
    /// earlier in the tick remain readable.
    pub fn despawn(&mut self, entity: Entity) -> Result<(), Error> {
        if !self.entities.mark_despawned(entity) {
            return Err(Error::NoSuchEntity(entity));
        }
        self.queries.on_despawned(entity);
        self.changes.mark(entity);
        if self.ticking {
            self.deferred.despawned.push(entity);
        } else {
            self.finalize_despawn(entity);
        }
        Ok(())
    }

    /// Despawn every live entity.
    pub fn despawn_all(&mut self) {
        for entity in self.entities.entities() {
            if let Err(error) = self.despawn(entity) {
                log::warn!("despawn_all skipped entity {}: {}", entity.id(), error);
            }
        }
    }

    /// Whether the entity is alive (spawned, not despawned).
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// All live entities, ordered by id.
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.entities()
    }

    /// Look up a live entity by its unique name.
    pub fn entity_by_name(&self, name: &str) -> Option<Entity> {
        self.entities.by_name(name)
    }

    /// Look up a live entity by id.
    pub fn entity_by_id(&self, id: u64) -> Option<Entity> {
        self.entities.by_id(id)
    }

    // ==================== Systems ====================

    /// Register a system with default attributes.
    pub fn register_system<S: System>(&mut self, system: S) -> Result<&mut Self, Error> {
        self.register_system_with(system, Attributes::default())
    }

    /// Register a system with explicit attributes.
    ///
    /// Binds the system's declared queries first; a failed bind (for
    /// instance [`Error::InvalidQuerySpec`]) rolls the registration back
    /// completely.
    pub fn register_system_with<S: System>(
        &mut self,
        mut system: S,
        attributes: Attributes,
    ) -> Result<&mut Self, Error> {
        let type_id = TypeId::of::<S>();
        let name = std::any::type_name::<S>();
        if self.systems.contains(type_id) {
            return Err(Error::DuplicateRegistration(name));
        }

        let mut binder = Binder::new(&self.components, &mut self.queries, &self.entities);
        match system.bind(&mut binder) {
            Ok(()) => {
                let bound = binder.into_bound();
                self.systems
                    .insert(Box::new(system), type_id, name, attributes, bound);
                log::debug!("registered system {name}");
                Ok(self)
            }
            Err(error) => {
                for handle in binder.into_bound() {
                    self.queries.release(handle);
                }
                Err(error)
            }
        }
    }

    /// Unregister a system, dropping its query subscriptions. A no-op (with
    /// a warning) if the type was never registered.
    pub fn unregister_system<S: System>(&mut self) -> &mut Self {
        match self.systems.remove(TypeId::of::<S>()) {
            Some(entry) => {
                for handle in entry.queries {
                    self.queries.release(handle);
                }
                log::debug!("unregistered system {}", entry.name);
            }
            None => {
                log::warn!(
                    "unregister of unknown system {}",
                    std::any::type_name::<S>()
                );
            }
        }
        self
    }

    /// Get a registered system by type.
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.get::<S>()
    }

    /// Get a registered system mutably by type.
    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.get_mut::<S>()
    }

    /// The registered systems' names, in execution order.
    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.names()
    }

    /// Resume executing a stopped system. Returns `false` if unregistered.
    pub fn play_system<S: System>(&mut self) -> bool {
        self.systems.set_enabled(TypeId::of::<S>(), true)
    }

    /// Skip a system on future ticks. Returns `false` if unregistered.
    pub fn stop_system<S: System>(&mut self) -> bool {
        self.systems.set_enabled(TypeId::of::<S>(), false)
    }

    // ==================== Ticking ====================

    /// Run one tick: every enabled system in order, then the deferred flush,
    /// then change delivery. Inert while the world is stopped.
    pub fn execute(&mut self, delta: f64, time: f64) {
        if !self.enabled {
            return;
        }

        self.ticking = true;
        let mut entries = self.systems.take();
        for entry in entries.iter_mut() {
            if !entry.enabled {
                continue;
            }
            let mut ctx = Context::new(self);
            entry.system.run(&mut ctx, delta, time);
        }
        self.systems.restore(entries);
        self.ticking = false;

        self.flush_deferred();
        self.dispatch_changes();
    }

    /// Resume execution of this world.
    pub fn play(&mut self) {
        self.enabled = true;
    }

    /// Stop execution of this world. `execute` becomes an inert no-op.
    pub fn stop(&mut self) {
        self.enabled = false;
    }

    /// Whether the world tick executes.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    // ==================== Observation ====================

    /// Register a change listener, appended to the ordered listener list.
    ///
    /// Listeners run at the end of each executed tick, each receiving the
    /// batch of entities mutated since the previous delivery, dedup'd, in
    /// first-change order.
    pub fn add_change_listener(&mut self, listener: impl FnMut(&[Entity]) + 'static) -> &mut Self {
        self.listeners.push(Box::new(listener));
        self
    }

    /// One-shot scan for entities currently holding every component in `S`.
    ///
    /// Unlike a system's bound query this rescans the live set on each call;
    /// it exists for callers outside the tick (tools, tests, setup code).
    pub fn matching<S: query::IntoSignature>(&self) -> Result<Vec<Entity>, Error> {
        let signature = S::signature(&self.components)?;
        let mut matches: Vec<Entity> = self
            .entities
            .live()
            .filter(|(_, mask)| signature.matches(mask))
            .map(|(entity, _)| entity)
            .collect();
        matches.sort();
        Ok(matches)
    }

    /// A point-in-time summary of the world's contents.
    pub fn stats(&self) -> Stats {
        let pools = self
            .pools
            .iter()
            .enumerate()
            .map(|(index, pool)| PoolStats {
                component: self
                    .components
                    .info(component::Id::from(index))
                    .map(|info| info.name())
                    .unwrap_or("<unknown>"),
                capacity: pool.capacity(),
                live: pool.live_count(),
            })
            .collect();
        Stats {
            entities: self.entities.len(),
            systems: self.systems.len(),
            pools,
        }
    }

    // ==================== Internals ====================

    /// Snapshot a query's current matches into a pooled buffer.
    pub(crate) fn snapshot(&self, handle: query::Handle) -> Snapshot {
        let mut buffer = self.snapshot_buffers.pop().unwrap_or_default();
        buffer.clear();
        buffer.extend_from_slice(self.queries.entities(handle));
        Snapshot::new(buffer, Arc::clone(&self.snapshot_buffers))
    }

    /// Release a detached slot now, or queue it for the end-of-tick flush.
    fn release_or_defer(
        &mut self,
        id: component::Id,
        handle: component::Handle,
    ) -> Result<(), Error> {
        if self.ticking {
            self.deferred.releases.push((id, handle));
            Ok(())
        } else {
            self.pools[id.index()].release(handle)
        }
    }

    /// Apply everything queued during the tick.
    fn flush_deferred(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        while let Some((id, handle)) = self.deferred.releases.pop() {
            if let Err(error) = self.pools[id.index()].release(handle) {
                log::warn!("deferred release failed: {error}");
            }
        }
        while let Some(entity) = self.deferred.despawned.pop() {
            self.finalize_despawn(entity);
        }
    }

    /// Release a despawned entity's components and recycle its record.
    fn finalize_despawn(&mut self, entity: Entity) {
        let attachments = self
            .entities
            .record(entity)
            .map(|record| record.attachments())
            .unwrap_or_default();
        for (id, handle) in attachments {
            if let Err(error) = self.pools[id.index()].release(handle) {
                log::warn!(
                    "leaked component slot despawning entity {}: {error}",
                    entity.id()
                );
            }
        }
        self.entities.free(entity);
    }

    /// Deliver the pending change batch to the listeners.
    fn dispatch_changes(&mut self) {
        if self.changes.is_empty() {
            return;
        }
        let batch = self.changes.take_batch();
        let mut listeners = std::mem::take(&mut self.listeners);
        for listener in listeners.iter_mut() {
            listener(&batch);
        }
        self.listeners = listeners;
        self.changes.recycle(batch);
    }

    /// Typed view of a registered component's pool.
    fn typed_pool<C: Component>(&self, id: component::Id) -> &Pool<C> {
        self.pools[id.index()]
            .as_any()
            .downcast_ref::<Pool<C>>()
            .expect("pool type mismatch for registered component")
    }

    /// Typed mutable view of a registered component's pool.
    fn typed_pool_mut<C: Component>(&mut self, id: component::Id) -> &mut Pool<C> {
        self.pools[id.index()]
            .as_any_mut()
            .downcast_mut::<Pool<C>>()
            .expect("pool type mismatch for registered component")
    }
}

// World is intentionally !Send and !Sync: it is the single owner of every
// pool and index, and the tick is a single logical thread of control.
