use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use impulse2d::{BodyDef, BodyType, FixtureDef, Shape, World};
use std::hint::black_box;

fn build_pyramid(base: usize) -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let ground = world.create_body(&BodyDef::new(BodyType::Static).at(Vec2::new(0.0, -0.5)));
    world.create_fixture(ground, &FixtureDef::new(Shape::rect(100.0, 0.5)));

    for row in 0..base {
        let count = base - row;
        let y = 0.55 + row as f32 * 1.1;
        let x0 = -(count as f32 - 1.0) * 0.55;
        for i in 0..count {
            let body = world.create_body(
                &BodyDef::new(BodyType::Dynamic).at(Vec2::new(x0 + i as f32 * 1.1, y)),
            );
            world.create_fixture(
                body,
                &FixtureDef::new(Shape::rect(0.5, 0.5))
                    .with_density(1.0)
                    .with_friction(0.5),
            );
        }
    }

    world
}

fn bench_pyramid_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("pyramid_step");
    for base in [5usize, 10, 20] {
        group.bench_with_input(BenchmarkId::from_parameter(base), &base, |b, &base| {
            let mut world = build_pyramid(base);
            // Warm the broad-phase and contact graph.
            for _ in 0..10 {
                world.step(1.0 / 60.0, 8, 3);
            }
            b.iter(|| {
                black_box(world.step(1.0 / 60.0, 8, 3));
            });
        });
    }
    group.finish();
}

fn bench_bullet_shower(c: &mut Criterion) {
    c.bench_function("bullet_shower_step", |b| {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let ground = world.create_body(&BodyDef::new(BodyType::Static));
        world.create_fixture(ground, &FixtureDef::new(Shape::rect(50.0, 0.05)));

        for i in 0..50 {
            let bullet = world.create_body(
                &BodyDef::new(BodyType::Dynamic)
                    .at(Vec2::new(-25.0 + i as f32, 30.0 + (i % 7) as f32))
                    .with_linear_velocity(Vec2::new(0.0, -80.0))
                    .as_bullet(),
            );
            world.create_fixture(
                bullet,
                &FixtureDef::new(Shape::circle(0.1)).with_density(1.0),
            );
        }

        b.iter(|| {
            black_box(world.step(1.0 / 60.0, 8, 3));
        });
    });
}

criterion_group!(benches, bench_pyramid_step, bench_bullet_shower);
criterion_main!(benches);
