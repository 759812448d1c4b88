// Let the derive macro refer to `::pulse_engine::...` from inside this crate
// as well as from dependents.
extern crate self as pulse_engine;

pub mod ecs;
