use glam::Vec2;
use impulse2d::{
    BodyDef, BodyType, DistanceJoint, FixtureDef, FrictionJoint, JointKind, PrismaticJoint,
    PulleyJoint, RevoluteJoint, RopeJoint, Shape, WeldJoint, World,
};

const DT: f32 = 1.0 / 60.0;

fn world_with_gravity() -> World {
    World::new(Vec2::new(0.0, -10.0))
}

fn world_without_gravity() -> World {
    World::new(Vec2::ZERO)
}

fn add_circle(world: &mut World, position: Vec2, radius: f32) -> impulse2d::BodyHandle {
    let body = world.create_body(&BodyDef::new(BodyType::Dynamic).at(position));
    world.create_fixture(
        body,
        &FixtureDef::new(Shape::circle(radius)).with_density(1.0),
    );
    body
}

fn add_box(world: &mut World, position: Vec2, hx: f32, hy: f32) -> impulse2d::BodyHandle {
    let body = world.create_body(&BodyDef::new(BodyType::Dynamic).at(position));
    world.create_fixture(
        body,
        &FixtureDef::new(Shape::rect(hx, hy)).with_density(1.0),
    );
    body
}

/// World-space gap between the two anchors of a joint.
fn anchor_gap(world: &World, joint: impulse2d::JointHandle) -> f32 {
    let j = world.joint(joint).unwrap();
    let a = j.anchor_a(world.body(j.body_a).unwrap());
    let b = j.anchor_b(world.body(j.body_b).unwrap());
    (b - a).length()
}

#[test]
fn revolute_anchors_stay_coincident_under_motor_torque() {
    let mut world = world_with_gravity();

    let base = world.ground_body();
    let rod = add_box(&mut world, Vec2::new(1.0, 0.0), 1.0, 0.1);

    let joint = world.create_revolute_joint(base, rod, Vec2::ZERO);
    if let Some(j) = world.joint_mut(joint) {
        if let JointKind::Revolute(r) = &mut j.kind {
            r.enable_motor = true;
            r.motor_speed = 3.0;
            r.max_motor_torque = 50.0;
        }
    }

    for _ in 0..180 {
        world.step(DT, 8, 3);
        let gap = anchor_gap(&world, joint);
        assert!(gap < 0.02, "revolute anchors drifted apart: {gap}");
    }
}

#[test]
fn revolute_motor_torque_is_clamped_at_its_budget() {
    let mut world = world_without_gravity();

    let base = world.ground_body();
    // Wheel concentric with the pivot: the motor spins it in place.
    let wheel = add_circle(&mut world, Vec2::ZERO, 1.0);

    let joint = world.create_joint(
        base,
        wheel,
        false,
        JointKind::Revolute(
            RevoluteJoint::new(Vec2::ZERO, Vec2::ZERO, 0.0).with_motor(10.0, 5.0),
        ),
    );

    // Disc: m = pi, I = m r^2 / 2. Torque 5 gives a finite spin-up rate.
    let inertia = std::f32::consts::PI * 0.5;
    let max_accel = 5.0 / inertia;

    let mut previous_omega = 0.0;
    for _ in 0..600 {
        world.step(DT, 8, 3);
        let omega = world.body(wheel).unwrap().velocity.angular;

        assert!(omega <= 10.0 + 1e-3, "motor overshot target speed: {omega}");
        let accel = (omega - previous_omega) / DT;
        assert!(
            accel <= max_accel * 1.05 + 1e-3,
            "motor exceeded its torque budget: accel {accel}"
        );
        previous_omega = omega;
    }

    // The motor eventually reaches its target speed.
    assert!(
        (previous_omega - 10.0).abs() < 0.1,
        "motor never reached target: {previous_omega}"
    );
    let _ = joint;
}

#[test]
fn distance_joint_holds_its_length() {
    let mut world = world_with_gravity();

    let anchor = world.ground_body();
    let ball = add_circle(&mut world, Vec2::new(0.0, -2.0), 0.3);
    // Swing it sideways to load the constraint.
    world.body_mut(ball).unwrap().velocity.linear = Vec2::new(4.0, 0.0);

    let joint = world.create_distance_joint(anchor, ball, Vec2::ZERO, Vec2::new(0.0, -2.0));

    for _ in 0..240 {
        world.step(DT, 8, 3);
    }
    let gap = anchor_gap(&world, joint);
    assert!((gap - 2.0).abs() < 0.05, "pendulum length drifted to {gap}");
}

#[test]
fn prismatic_joint_slides_to_its_lower_limit() {
    let mut world = world_with_gravity();

    let base = world.ground_body();
    let slider = add_box(&mut world, Vec2::new(0.0, 2.0), 0.5, 0.5);

    let joint = world.create_joint(
        base,
        slider,
        false,
        JointKind::Prismatic(
            PrismaticJoint::new(Vec2::new(0.0, 2.0), Vec2::ZERO, Vec2::Y, 0.0)
                .with_limits(-1.0, 0.5),
        ),
    );

    for _ in 0..240 {
        world.step(DT, 8, 3);
    }

    let p = world.body(slider).unwrap().position();
    // Slid down one unit to the lower stop, no sideways drift.
    assert!((p.y - 1.0).abs() < 0.03, "slider rests at y = {}", p.y);
    assert!(p.x.abs() < 0.01, "slider drifted sideways to x = {}", p.x);
    let _ = joint;
}

#[test]
fn rope_joint_caps_the_anchor_distance() {
    let mut world = world_with_gravity();

    let anchor = world.ground_body();
    let ball = add_circle(&mut world, Vec2::new(0.0, -1.0), 0.3);

    let joint = world.create_joint(
        anchor,
        ball,
        false,
        JointKind::Rope(RopeJoint::new(Vec2::ZERO, Vec2::ZERO, 2.0)),
    );

    for _ in 0..240 {
        world.step(DT, 8, 3);
        let gap = anchor_gap(&world, joint);
        assert!(gap < 2.05, "rope stretched to {gap}");
    }

    // It hangs taut at the cap.
    let gap = anchor_gap(&world, joint);
    assert!((gap - 2.0).abs() < 0.05, "rope settled at {gap}");
}

#[test]
fn pulley_preserves_the_rope_budget() {
    let mut world = world_with_gravity();

    // Unequal masses: the heavy side sinks, the light side rises.
    let heavy = add_circle(&mut world, Vec2::new(-1.0, 0.0), 0.5);
    let light = add_circle(&mut world, Vec2::new(1.0, 0.0), 0.3);

    let kind = PulleyJoint::new(
        Vec2::new(-1.0, 2.0),
        Vec2::new(1.0, 2.0),
        Vec2::ZERO,
        Vec2::ZERO,
        2.0,
        2.0,
        1.0,
    );
    world.create_joint(heavy, light, true, JointKind::Pulley(kind));

    for _ in 0..30 {
        world.step(DT, 8, 3);
    }

    let la = (world.body(heavy).unwrap().position() - Vec2::new(-1.0, 2.0)).length();
    let lb = (world.body(light).unwrap().position() - Vec2::new(1.0, 2.0)).length();
    assert!(
        ((la + lb) - 4.0).abs() < 0.1,
        "rope budget drifted: {la} + {lb}"
    );
    // The imbalance actually moved the pair.
    assert!(la > 2.05, "pulley never moved: {la}");
}

#[test]
fn gear_joint_couples_two_revolute_coordinates() {
    let mut world = world_without_gravity();

    let base = world.ground_body();
    let wheel_a = add_circle(&mut world, Vec2::new(-2.0, 0.0), 0.5);
    let wheel_b = add_circle(&mut world, Vec2::new(2.0, 0.0), 0.5);

    let j1 = world.create_revolute_joint(base, wheel_a, Vec2::new(-2.0, 0.0));
    let j2 = world.create_revolute_joint(base, wheel_b, Vec2::new(2.0, 0.0));
    world.create_gear_joint(j1, j2, 2.0);

    world.body_mut(wheel_a).unwrap().apply_angular_impulse(0.5);

    for _ in 0..120 {
        world.step(DT, 8, 3);
        let angle_a = world.body(wheel_a).unwrap().angle();
        let angle_b = world.body(wheel_b).unwrap().angle();
        assert!(
            (angle_a + 2.0 * angle_b).abs() < 0.05,
            "gear constraint drifted: {angle_a} + 2 * {angle_b}"
        );
    }

    // The coupling transferred motion to the second wheel.
    assert!(world.body(wheel_b).unwrap().angle().abs() > 0.01);
}

#[test]
fn weld_joint_locks_relative_pose() {
    let mut world = world_without_gravity();

    let a = add_box(&mut world, Vec2::new(0.0, 0.0), 0.5, 0.5);
    let b = add_box(&mut world, Vec2::new(1.2, 0.0), 0.5, 0.5);

    world.create_joint(
        a,
        b,
        false,
        JointKind::Weld(WeldJoint::new(
            Vec2::new(0.6, 0.0),
            Vec2::new(-0.6, 0.0),
            0.0,
        )),
    );

    // Torque the assembly.
    world
        .body_mut(b)
        .unwrap()
        .apply_impulse(Vec2::new(0.0, 2.0), Vec2::new(1.2, 0.0));

    for _ in 0..120 {
        world.step(DT, 8, 3);
    }

    let angle_a = world.body(a).unwrap().angle();
    let angle_b = world.body(b).unwrap().angle();
    assert!(
        (angle_b - angle_a).abs() < 0.05,
        "welded bodies rotated apart: {angle_a} vs {angle_b}"
    );
}

#[test]
fn friction_joint_brings_a_sliding_body_to_rest() {
    let mut world = world_without_gravity();

    let ground = world.ground_body();
    let puck = add_circle(&mut world, Vec2::ZERO, 0.5);
    world.body_mut(puck).unwrap().velocity.linear = Vec2::new(5.0, 0.0);

    world.create_joint(
        ground,
        puck,
        true,
        JointKind::Friction(FrictionJoint::new(Vec2::ZERO, Vec2::ZERO, 10.0, 5.0)),
    );

    for _ in 0..240 {
        world.step(DT, 8, 3);
    }

    let speed = world.body(puck).unwrap().velocity.linear.length();
    assert!(speed < 0.1, "friction joint left residual speed {speed}");
}

#[test]
fn wheel_joint_constrains_motion_to_its_axis() {
    let mut world = world_with_gravity();

    let base = world.ground_body();
    let wheel = add_circle(&mut world, Vec2::new(0.0, -1.0), 0.4);

    world.create_joint(
        base,
        wheel,
        false,
        JointKind::Wheel(
            impulse2d::WheelJoint::new(Vec2::new(0.0, -1.0), Vec2::ZERO, Vec2::Y)
                .with_spring(2.0, 0.7),
        ),
    );

    // Knock it sideways; the perpendicular constraint must hold the line.
    world
        .body_mut(wheel)
        .unwrap()
        .apply_impulse(Vec2::new(2.0, 0.0), Vec2::new(0.0, -1.0));

    for _ in 0..240 {
        world.step(DT, 8, 3);
    }

    let p = world.body(wheel).unwrap().position();
    assert!(p.x.abs() < 0.02, "wheel left its axis: x = {}", p.x);
    assert!(
        p.y > -2.0 && p.y < -0.5,
        "wheel spring settled badly: y = {}",
        p.y
    );
}

#[test]
fn destroying_a_body_unlinks_and_logs_its_joints() {
    let mut world = world_with_gravity();

    let anchor = world.ground_body();
    let ball = add_circle(&mut world, Vec2::new(0.0, -2.0), 0.3);
    let joint = world.create_joint(
        anchor,
        ball,
        false,
        JointKind::Distance(DistanceJoint::new(Vec2::ZERO, Vec2::ZERO, 2.0)),
    );

    world.destroy_body(ball);

    assert!(world.joint(joint).is_none());
    assert_eq!(world.drain_destroyed_joints(), vec![joint]);
    assert!(world
        .body(anchor)
        .unwrap()
        .joints
        .is_empty());
}

#[test]
fn jointed_bodies_skip_mutual_contacts_unless_requested() {
    let mut world = world_with_gravity();

    // Overlapping circles held by a revolute joint with collide_connected
    // off never push each other apart.
    let a = add_circle(&mut world, Vec2::ZERO, 0.5);
    let b = add_circle(&mut world, Vec2::new(0.2, 0.0), 0.5);
    world.create_revolute_joint(a, b, Vec2::new(0.1, 0.0));

    for _ in 0..30 {
        world.step(DT, 8, 3);
    }

    let pa = world.body(a).unwrap().position();
    let pb = world.body(b).unwrap().position();
    assert!(
        (pb - pa).length() < 0.4,
        "collide_connected=false pair separated anyway"
    );
}
