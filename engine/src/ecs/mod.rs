pub mod component;
pub mod entity;
pub mod error;
pub mod event;
pub mod query;
pub mod system;
pub mod world;

pub use component::Component;
pub use entity::Entity;
pub use error::Error;
pub use event::ChangeListener;
pub use system::{Attributes, Binder, Context, Snapshot, System};
pub use world::{Options, World};
