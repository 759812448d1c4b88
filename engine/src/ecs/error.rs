//! Error taxonomy for the ECS.
//!
//! Every fallible operation in the engine reports one of these variants
//! synchronously to its caller. Lookup misses (`entity_by_name`,
//! `entity_by_id`, `component`) are expected outcomes and return `Option`
//! instead of an error. Nothing here aborts an in-progress tick for other
//! systems.

use thiserror::Error;

use crate::ecs::entity::Entity;

/// Failures reported by world, entity, pool, and query operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// An operation referenced a component type never registered in this world.
    #[error("component type `{0}` is not registered in this world")]
    UnregisteredComponent(&'static str),

    /// A component or system type was registered a second time.
    #[error("`{0}` is already registered in this world")]
    DuplicateRegistration(&'static str),

    /// The entity already holds an instance of the component type.
    #[error("entity already holds a `{0}` component")]
    DuplicateComponent(&'static str),

    /// Another live entity already carries the requested name.
    #[error("an entity named `{0}` is already alive")]
    DuplicateName(String),

    /// Another live entity already carries the requested id.
    #[error("an entity with id {0} is already alive")]
    DuplicateId(u64),

    /// A removal referenced a component the entity does not hold.
    #[error("entity does not hold a `{0}` component")]
    ComponentNotPresent(&'static str),

    /// A system declared a query over a component type that was never registered.
    #[error("query references unregistered component type `{0}`")]
    InvalidQuerySpec(&'static str),

    /// A pool slot was released a second time without an intervening acquire.
    #[error("pool slot {0} was released twice")]
    DoubleRelease(u32),

    /// A structural mutation referenced an entity that is not alive.
    #[error("entity {} is not alive in this world", .0.id())]
    NoSuchEntity(Entity),
}
