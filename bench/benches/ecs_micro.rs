//! ECS microbenchmarks using Criterion.
//!
//! These benchmarks measure the engine's hot paths in isolation:
//! - Entity spawn/despawn churn (pooled record reuse)
//! - Component attach/detach (pooled slot reuse, query maintenance)
//! - Full ticks with a movement system over pre-built worlds

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::{Rng, SeedableRng, rngs::StdRng};

use pulse_bench::components::*;
use pulse_engine::ecs::{Binder, Context, Error, System, World, query};

fn component_world() -> World {
    let mut world = World::new();
    world
        .register_component::<Position>()
        .unwrap()
        .register_component::<Velocity>()
        .unwrap()
        .register_component::<Rotation>()
        .unwrap()
        .register_component::<Health>()
        .unwrap();
    world
}

// =============================================================================
// Spawn / despawn churn
// =============================================================================

fn bench_entity_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_churn");

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("spawn_only", count), &count, |b, &n| {
            b.iter(|| {
                let mut world = component_world();
                for _ in 0..n {
                    black_box(world.spawn());
                }
            });
        });

        // Spawn, attach two components, despawn, repeatedly. Pools and the
        // entity slab should reach steady state after the first cycle.
        group.bench_with_input(
            BenchmarkId::new("spawn_attach_despawn", count),
            &count,
            |b, &n| {
                let mut world = component_world();
                b.iter(|| {
                    for _ in 0..n {
                        let entity = world.spawn();
                        world.add_component::<Position>(entity).unwrap();
                        world.add_component::<Velocity>(entity).unwrap();
                        world.despawn(entity).unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Attach / detach on live entities
// =============================================================================

fn bench_attach_detach(c: &mut Criterion) {
    let mut group = c.benchmark_group("attach_detach");

    for count in [100, 1_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("toggle_one_kind", count), &count, |b, &n| {
            let mut world = component_world();
            let entities: Vec<_> = (0..n)
                .map(|_| {
                    let entity = world.spawn();
                    world.add_component::<Position>(entity).unwrap();
                    entity
                })
                .collect();

            b.iter(|| {
                for entity in &entities {
                    world.add_component::<Rotation>(*entity).unwrap();
                    world.remove_component::<Rotation>(*entity).unwrap();
                }
            });
        });
    }

    group.finish();
}

// =============================================================================
// Tick execution
// =============================================================================

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
            let (dx, dy, dz) = {
                let velocity = ctx.get::<Velocity>(entity).unwrap();
                (velocity.dx, velocity.dy, velocity.dz)
            };
            let position = ctx.get_mut::<Position>(entity).unwrap();
            position.x += dx * delta as f32;
            position.y += dy * delta as f32;
            position.z += dz * delta as f32;
        }
    }
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("movement", count), &count, |b, &n| {
            let mut rng = StdRng::seed_from_u64(42);
            let mut world = component_world();
            world.register_system(Movement::default()).unwrap();

            // Half the entities move, half are scenery.
            for index in 0..n {
                let entity = world.spawn();
                world.add_component::<Position>(entity).unwrap();
                if index % 2 == 0 {
                    let (dx, dy): (f32, f32) = (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
                    world
                        .add_component_with::<Velocity>(entity, |v| {
                            v.dx = dx;
                            v.dy = dy;
                        })
                        .unwrap();
                }
            }

            let mut time = 0.0;
            b.iter(|| {
                time += 1.0 / 60.0;
                world.execute(1.0 / 60.0, time);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_entity_churn, bench_attach_detach, bench_tick);
criterion_main!(benches);
