//! Shared component types for benchmarks.

use pulse_macros::Component;

#[derive(Component, Clone, Default, Debug)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Component, Clone, Default, Debug)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
}

#[derive(Component, Clone, Default, Debug)]
pub struct Rotation {
    pub angle: f32,
}

#[derive(Component, Clone, Debug)]
pub struct Health {
    pub hp: u32,
    pub max_hp: u32,
}

impl Default for Health {
    fn default() -> Self {
        Self { hp: 100, max_hp: 100 }
    }
}
