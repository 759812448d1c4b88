// Minimal world: two component types, one movement system, a few ticks.

use pulse_engine::ecs::{Binder, Context, Error, System, World};
use pulse_engine::ecs::query;
use pulse_macros::Component;

#[derive(Component, Clone, Default, Debug)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component, Clone, Default, Debug)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Default)]
struct Movement {
    moving: query::Handle,
}

impl System for Movement {
    fn bind(&mut self, binder: &mut Binder<'_>) -> Result<(), Error> {
        self.moving = binder.query::<(Position, Velocity)>()?;
        Ok(())
    }

    fn run(&mut self, ctx: &mut Context<'_>, delta: f64, _time: f64) {
        for entity in ctx.entities(self.moving) {
            let (dx, dy) = {
                let velocity = ctx.get::<Velocity>(entity).unwrap();
                (velocity.dx, velocity.dy)
            };
            let position = ctx.get_mut::<Position>(entity).unwrap();
            position.x += dx * delta as f32;
            position.y += dy * delta as f32;
        }
    }
}

fn main() -> Result<(), Error> {
    let mut world = World::new();
    world
        .register_component::<Position>()?
        .register_component::<Velocity>()?;
    world.register_system(Movement::default())?;

    world.add_change_listener(|changed| {
        println!("changed this tick: {} entities", changed.len());
    });

    let player = world.spawn_named("player")?;
    world.add_component_with::<Position>(player, |p| {
        p.x = 5.0;
        p.y = 5.0;
    })?;
    world.add_component_with::<Velocity>(player, |v| v.dx = 1.0)?;

    // A bystander with no velocity; the movement system never touches it.
    let rock = world.spawn_named("rock")?;
    world.add_component::<Position>(rock)?;

    let delta = 1.0 / 60.0;
    let mut time = 0.0;
    for _ in 0..60 {
        time += delta;
        world.execute(delta, time);
    }

    let position = world.component::<Position>(player).unwrap();
    println!("player after 1s: ({:.2}, {:.2})", position.x, position.y);
    println!(
        "rock after 1s:   ({:.2}, {:.2})",
        world.component::<Position>(rock).unwrap().x,
        world.component::<Position>(rock).unwrap().y
    );

    Ok(())
}
