use std::{
    any::TypeId,
    sync::RwLock,
    sync::atomic::{AtomicU32, Ordering},
};

use dashmap::DashMap;

use crate::ecs::{
    component::{Component, Id, Info},
    error::Error,
};

/// The component type registry: the world's schema table.
///
/// Maps each registered component type to its world-scoped [`Id`] and
/// [`Info`]. Lookups are lock-free via `DashMap` and take `&self`, so the
/// read paths of the engine (component access, query matching) never need
/// the registry mutably.
///
/// Registration is explicit and happens once per type per world: a second
/// registration of the same type is rejected rather than silently ignored,
/// so a conflicting pool argument can never be dropped on the floor.
pub struct Registry {
    /// Map from TypeId to component Id. Lock-free reads via sharded concurrent hashmap.
    type_map: DashMap<TypeId, Id>,

    /// Registered type metadata, indexed by component id.
    infos: RwLock<Vec<Info>>,

    /// Next available component identifier.
    next_id: AtomicU32,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a new component registry.
    #[inline]
    pub fn new() -> Self {
        Self {
            type_map: DashMap::new(),
            infos: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(0),
        }
    }

    /// Register a component type and get its identifier.
    ///
    /// Fails with [`Error::DuplicateRegistration`] if the type is already
    /// registered in this registry; the original registration stays intact.
    pub fn register<C: Component>(&self) -> Result<Id, Error> {
        let type_id = TypeId::of::<C>();

        if self.type_map.contains_key(&type_id) {
            return Err(Error::DuplicateRegistration(std::any::type_name::<C>()));
        }

        let id = Id::new(self.next_id.fetch_add(1, Ordering::Relaxed));

        let mut infos = self.infos.write().unwrap();
        debug_assert_eq!(infos.len(), id.index());
        infos.push(Info::new::<C>(id));
        drop(infos);

        self.type_map.insert(type_id, id);

        log::debug!("registered component type {}", std::any::type_name::<C>());

        Ok(id)
    }

    /// Get the id for a component type, if registered.
    #[inline]
    pub fn get<C: Component>(&self) -> Option<Id> {
        self.type_map
            .get(&TypeId::of::<C>())
            .map(|entry| *entry.value())
    }

    /// Get the id for a component type, or the unregistered-type error.
    #[inline]
    pub fn lookup<C: Component>(&self) -> Result<Id, Error> {
        self.get::<C>()
            .ok_or(Error::UnregisteredComponent(std::any::type_name::<C>()))
    }

    /// Whether a component type has been registered.
    #[inline]
    pub fn contains<C: Component>(&self) -> bool {
        self.type_map.contains_key(&TypeId::of::<C>())
    }

    /// Get the metadata for a registered component id.
    #[inline]
    pub fn info(&self, id: Id) -> Option<Info> {
        self.infos.read().unwrap().get(id.index()).copied()
    }

    /// Number of registered component types.
    #[inline]
    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::Relaxed) as usize
    }

    /// Whether no component types are registered yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Position {
        _x: f32,
        _y: f32,
    }
    impl Component for Position {}

    #[derive(Clone, Default)]
    struct Velocity {
        _dx: f32,
        _dy: f32,
    }
    impl Component for Velocity {}

    #[test]
    fn register_assigns_sequential_ids() {
        // Given
        let registry = Registry::new();

        // When
        let pos = registry.register::<Position>().unwrap();
        let vel = registry.register::<Velocity>().unwrap();

        // Then
        assert_eq!(pos.index(), 0);
        assert_eq!(vel.index(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_original() {
        // Given
        let registry = Registry::new();
        let original = registry.register::<Position>().unwrap();

        // When
        let result = registry.register::<Position>();

        // Then
        assert!(matches!(result, Err(Error::DuplicateRegistration(_))));
        assert_eq!(registry.get::<Position>(), Some(original));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_unregistered_type_errors() {
        // Given
        let registry = Registry::new();

        // Then
        assert_eq!(registry.get::<Position>(), None);
        assert!(matches!(
            registry.lookup::<Position>(),
            Err(Error::UnregisteredComponent(_))
        ));
        assert!(!registry.contains::<Position>());
    }

    #[test]
    fn info_carries_name_and_id() {
        // Given
        let registry = Registry::new();
        let id = registry.register::<Position>().unwrap();

        // When
        let info = registry.info(id).unwrap();

        // Then
        assert_eq!(info.id(), id);
        assert!(info.name().contains("Position"));
    }
}
