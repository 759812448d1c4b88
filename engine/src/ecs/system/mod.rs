//! Systems: the ordered processing units of the ECS.
//!
//! A system declares the component sets it operates on at bind time, then
//! processes the matching entities once per tick through its [`Context`].
//! Systems run strictly sequentially in a deterministic order: ascending
//! [`Attributes::priority`], registration order within equal priority.
//!
//! # Lifecycle
//!
//! 1. **Bind** — at registration the world calls [`System::bind`] with a
//!    [`Binder`]. The system declares each required-component set and stores
//!    the returned [`query::Handle`]s in its own fields. Binding against a
//!    component type the world has never seen fails with
//!    [`Error::InvalidQuerySpec`] and the registration is rolled back.
//! 2. **Run** — every `World::execute(delta, time)` calls [`System::run`]
//!    on each enabled system in order. The context exposes query snapshots
//!    and entity/component mutation; it deliberately does not expose
//!    `execute`, so a system cannot re-enter the tick.
//!
//! # Example
//!
//! ```ignore
//! #[derive(Default)]
//! struct Movement {
//!     moving: query::Handle,
//! }
//!
//! impl System for Movement {
//!     fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), Error> {
//!         self.moving = binder.query::<(Position, Velocity)>()?;
//!         Ok(())
//!     }
//!
//!     fn run(&mut self, ctx: &mut Context<'_>, delta: f64, _time: f64) {
//!         for entity in ctx.entities(self.moving) {
//!             let (dx, dy) = {
//!                 let vel = ctx.get::<Velocity>(entity).unwrap();
//!                 (vel.dx, vel.dy)
//!             };
//!             let pos = ctx.get_mut::<Position>(entity).unwrap();
//!             pos.x += dx * delta as f32;
//!             pos.y += dy * delta as f32;
//!         }
//!     }
//! }
//! ```

mod context;
mod registry;

use std::any::Any;

pub use context::{Context, Snapshot};
pub use registry::Registry;

use crate::ecs::{component, entity, error::Error, query};

/// Registration attributes for a system.
#[derive(Debug, Default, Clone, Copy)]
pub struct Attributes {
    /// Execution priority. Lower runs earlier; equal priorities keep
    /// registration order.
    pub priority: i32,
}

impl Attributes {
    /// Attributes with the given priority.
    pub fn priority(priority: i32) -> Self {
        Self { priority }
    }
}

/// A processing unit run once per world tick.
pub trait System: Any {
    /// Declare query bindings. Called once, at registration.
    ///
    /// The default binds nothing, for systems that operate without queries.
    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), Error> {
        let _ = binder;
        Ok(())
    }

    /// Process one tick. `delta` is the time since the previous tick,
    /// `time` the total elapsed time; both are whatever units the caller
    /// feeds `World::execute`.
    fn run(&mut self, ctx: &mut Context<'_>, delta: f64, time: f64);
}

/// Declares a system's query bindings against the world's registries.
pub struct Binder<'a> {
    components: &'a component::Registry,
    queries: &'a mut query::Registry,
    entities: &'a entity::Registry,
    bound: Vec<query::Handle>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(
        components: &'a component::Registry,
        queries: &'a mut query::Registry,
        entities: &'a entity::Registry,
    ) -> Self {
        Self {
            components,
            queries,
            entities,
            bound: Vec::new(),
        }
    }

    /// Bind a query over the given required component set.
    ///
    /// `S` is a component type or a tuple of them. Fails with
    /// [`Error::InvalidQuerySpec`] if any referenced type is unregistered.
    pub fn query<S: query::IntoSignature>(&mut self) -> Result<query::Handle, Error> {
        let signature = S::signature(self.components)?;
        let handle = self.queries.bind(signature, self.entities.live());
        self.bound.push(handle);
        Ok(handle)
    }

    /// The handles bound so far, for subscription bookkeeping.
    pub(crate) fn into_bound(self) -> Vec<query::Handle> {
        self.bound
    }
}

/// Internal object-safe view over a boxed system, adding downcast access the
/// same way the type-erased pools do.
pub(crate) trait AnySystem {
    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), Error>;

    fn run(&mut self, ctx: &mut Context<'_>, delta: f64, time: f64);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> AnySystem for S {
    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), Error> {
        System::bind(self, binder)
    }

    fn run(&mut self, ctx: &mut Context<'_>, delta: f64, time: f64) {
        System::run(self, ctx, delta, time)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
