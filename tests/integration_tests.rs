use glam::Vec2;
use impulse2d::{BodyDef, BodyType, FixtureDef, Shape, World};

const DT: f32 = 1.0 / 60.0;

fn make_world() -> World {
    World::new(Vec2::new(0.0, -10.0))
}

fn add_ground(world: &mut World) -> impulse2d::BodyHandle {
    let ground = world.create_body(&BodyDef::new(BodyType::Static).at(Vec2::new(0.0, -0.5)));
    world.create_fixture(ground, &FixtureDef::new(Shape::rect(50.0, 0.5)));
    ground
}

fn add_box(world: &mut World, position: Vec2) -> impulse2d::BodyHandle {
    let body = world.create_body(&BodyDef::new(BodyType::Dynamic).at(position));
    world.create_fixture(
        body,
        &FixtureDef::new(Shape::rect(0.5, 0.5))
            .with_density(1.0)
            .with_friction(0.3),
    );
    body
}

#[test]
fn bodies_fall_under_gravity() {
    let mut world = make_world();
    let body = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 10.0)));
    world.create_fixture(body, &FixtureDef::new(Shape::circle(0.5)).with_density(1.0));

    world.step(DT, 8, 3);

    let y = world.body(body).expect("body exists").position().y;
    assert!(y < 10.0, "body should start falling, y = {y}");
}

#[test]
fn static_bodies_do_not_move() {
    let mut world = make_world();
    let ground = add_ground(&mut world);
    for _ in 0..60 {
        world.step(DT, 8, 3);
    }
    let p = world.body(ground).expect("ground exists").position();
    assert_eq!(p, Vec2::new(0.0, -0.5));
}

#[test]
fn five_box_stack_rests_without_sinking_or_exploding() {
    let mut world = make_world();
    add_ground(&mut world);

    // Stack boxes resting on their skins.
    let gap = 2.0 * impulse2d::config::POLYGON_RADIUS - impulse2d::config::LINEAR_SLOP;
    let mut boxes = Vec::new();
    let mut initial = Vec::new();
    for i in 0..5 {
        let y = 0.5 + gap + i as f32 * (1.0 + gap);
        boxes.push(add_box(&mut world, Vec2::new(0.0, y)));
        initial.push(y);
    }

    for _ in 0..300 {
        world.step(DT, 8, 3);
    }

    for (body, y0) in boxes.iter().zip(initial.iter()) {
        let y = world.body(*body).expect("box exists").position().y;
        assert!(
            (y - y0).abs() < 1e-2,
            "box drifted from {y0} to {y} after 300 steps"
        );
    }
}

#[test]
fn islands_sleep_atomically() {
    let mut world = make_world();
    add_ground(&mut world);
    let bottom = add_box(&mut world, Vec2::new(0.0, 0.51));
    let top = add_box(&mut world, Vec2::new(0.0, 1.53));

    // Two seconds of rest puts the whole island to sleep.
    for _ in 0..150 {
        world.step(DT, 8, 3);
    }
    assert!(!world.body(bottom).unwrap().is_awake());
    assert!(!world.body(top).unwrap().is_awake());

    // Kicking the top wakes the island; while it moves fast, nobody in the
    // island may fall asleep.
    world
        .body_mut(top)
        .unwrap()
        .apply_impulse(Vec2::new(3.0, 0.0), Vec2::new(0.0, 1.53));

    for _ in 0..30 {
        world.step(DT, 8, 3);
        let top_speed = world.body(top).unwrap().velocity.linear.length();
        if top_speed > impulse2d::config::LINEAR_SLEEP_TOLERANCE {
            assert!(
                world.body(bottom).unwrap().is_awake(),
                "bottom slept while its island neighbor was moving"
            );
        }
    }
}

#[test]
fn deferred_destruction_materializes_at_next_step() {
    let mut world = make_world();
    let body = add_box(&mut world, Vec2::new(0.0, 5.0));

    world.defer_destroy_body(body);
    assert!(world.body(body).is_some());

    world.step(DT, 8, 3);
    assert!(world.body(body).is_none());
}

#[test]
fn group_filter_overrides_category_masks() {
    use impulse2d::Filter;

    let mut world = make_world();
    add_ground(&mut world);

    // Two overlapping circles whose masks reject each other but whose shared
    // positive group forces collision.
    let filter = Filter {
        category: 0x0002,
        mask: 0x0004,
        group: 7,
    };
    let a = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 0.5)));
    world.create_fixture(
        a,
        &FixtureDef::new(Shape::circle(0.5))
            .with_density(1.0)
            .with_filter(filter),
    );
    let b = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 1.4)));
    world.create_fixture(
        b,
        &FixtureDef::new(Shape::circle(0.5))
            .with_density(1.0)
            .with_filter(filter),
    );

    for _ in 0..90 {
        world.step(DT, 8, 3);
    }

    // The upper circle rests on the lower one instead of merging into it.
    let ya = world.body(a).unwrap().position().y;
    let yb = world.body(b).unwrap().position().y;
    assert!(yb - ya > 0.8, "circles interpenetrated: {ya} vs {yb}");

    // Equal negative group: never collide, the top circle falls through.
    let filter = Filter {
        category: 0x0002,
        mask: 0xFFFF,
        group: -7,
    };
    let c = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(10.0, 0.5)));
    world.create_fixture(
        c,
        &FixtureDef::new(Shape::circle(0.5))
            .with_density(1.0)
            .with_filter(filter),
    );
    let d = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(10.0, 1.4)));
    world.create_fixture(
        d,
        &FixtureDef::new(Shape::circle(0.5))
            .with_density(1.0)
            .with_filter(filter),
    );

    for _ in 0..60 {
        world.step(DT, 8, 3);
    }

    let yc = world.body(c).unwrap().position().y;
    let yd = world.body(d).unwrap().position().y;
    assert!(
        (yc - yd).abs() < 0.6,
        "negative-group circles failed to overlap: {yc} vs {yd}"
    );
}

#[test]
fn query_aabb_visits_only_overlapping_fixtures() {
    let mut world = make_world();
    let a = add_box(&mut world, Vec2::new(0.0, 5.0));
    let b = add_box(&mut world, Vec2::new(30.0, 5.0));
    world.step(DT, 8, 3);

    let mut hits = Vec::new();
    world.query_aabb(
        &impulse2d::Aabb::new(Vec2::new(-2.0, 3.0), Vec2::new(2.0, 7.0)),
        |fixture| {
            hits.push(world.fixture(fixture).unwrap().body);
            true
        },
    );

    assert!(hits.contains(&a));
    assert!(!hits.contains(&b));
}

#[test]
fn ray_cast_reports_closest_hit_with_clipping() {
    let mut world = make_world();
    let near = add_box(&mut world, Vec2::new(5.0, 0.0));
    let far = add_box(&mut world, Vec2::new(15.0, 0.0));
    world.step(0.0, 1, 1);

    let mut closest: Option<(impulse2d::BodyHandle, f32)> = None;
    world.ray_cast(
        Vec2::new(0.0, 0.0),
        Vec2::new(20.0, 0.0),
        |fixture, _point, _normal, fraction| {
            closest = Some((world.fixture(fixture).unwrap().body, fraction));
            // Clip the ray at each hit so only nearer fixtures remain.
            fraction
        },
    );

    let (body, fraction) = closest.expect("ray should hit");
    assert_eq!(body, near);
    assert!((fraction - 4.5 / 20.0).abs() < 0.01, "fraction {fraction}");
    let _ = far;
}

#[test]
fn ray_cast_zero_return_stops_at_first_fixture() {
    let mut world = make_world();
    add_box(&mut world, Vec2::new(5.0, 0.0));
    add_box(&mut world, Vec2::new(15.0, 0.0));
    world.step(0.0, 1, 1);

    let mut count = 0;
    world.ray_cast(Vec2::ZERO, Vec2::new(20.0, 0.0), |_, _, _, _| {
        count += 1;
        0.0
    });
    assert_eq!(count, 1);
}

#[test]
fn profile_reports_counts() {
    let mut world = make_world();
    add_ground(&mut world);
    add_box(&mut world, Vec2::new(0.0, 0.51));

    let profile = world.step(DT, 8, 3);
    // Ground body, hidden ground, and the box.
    assert_eq!(profile.body_count, world.body_count());
    assert!(profile.island_count >= 1);
}
