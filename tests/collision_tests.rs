use glam::Vec2;
use impulse2d::{
    BodyDef, BodyType, Contact, ContactHandle, ContactImpulse, ContactListener, FixtureDef,
    Manifold, Shape, World,
};

const DT: f32 = 1.0 / 60.0;

#[derive(Default)]
struct EventCounter {
    begins: usize,
    ends: usize,
    pre_solves: usize,
    max_normal_impulse: f32,
    disable_contacts: bool,
}

impl ContactListener for EventCounter {
    fn begin_contact(&mut self, _handle: ContactHandle, _contact: &mut Contact) {
        self.begins += 1;
    }

    fn end_contact(&mut self, _handle: ContactHandle, _contact: &mut Contact) {
        self.ends += 1;
    }

    fn pre_solve(&mut self, _handle: ContactHandle, contact: &mut Contact, _old: &Manifold) {
        self.pre_solves += 1;
        if self.disable_contacts {
            contact.enabled = false;
        }
    }

    fn post_solve(&mut self, _handle: ContactHandle, _contact: &Contact, impulse: &ContactImpulse) {
        for i in 0..impulse.count {
            self.max_normal_impulse = self.max_normal_impulse.max(impulse.normal_impulses[i]);
        }
    }
}

fn world_with_ground() -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::new(BodyType::Static).at(Vec2::new(0.0, -0.5)));
    world.create_fixture(ground, &FixtureDef::new(Shape::rect(50.0, 0.5)));
    world
}

#[test]
fn begin_and_end_fire_exactly_once_per_transition() {
    let mut world = world_with_ground();
    let ball = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 2.0)));
    world.create_fixture(ball, &FixtureDef::new(Shape::circle(0.5)).with_density(1.0));

    let mut events = EventCounter::default();
    for _ in 0..120 {
        world.step_with(DT, 8, 3, &mut events);
    }
    assert_eq!(events.begins, 1, "begin fired {} times", events.begins);
    assert_eq!(events.ends, 0);

    // Teleport far away: the pair separates and ends exactly once.
    world.set_transform(ball, Vec2::new(100.0, 100.0), 0.0);
    world.body_mut(ball).unwrap().set_awake(true);
    for _ in 0..10 {
        world.step_with(DT, 8, 3, &mut events);
    }
    assert_eq!(events.begins, 1);
    assert_eq!(events.ends, 1, "end fired {} times", events.ends);
}

#[test]
fn pre_solve_can_veto_collision_response() {
    let mut world = world_with_ground();
    let ball = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 2.0)));
    world.create_fixture(ball, &FixtureDef::new(Shape::circle(0.5)).with_density(1.0));

    let mut events = EventCounter {
        disable_contacts: true,
        ..Default::default()
    };
    for _ in 0..120 {
        world.step_with(DT, 8, 3, &mut events);
    }

    assert!(events.pre_solves > 0);
    // With every contact vetoed the ball falls straight through the ground.
    let y = world.body(ball).unwrap().position().y;
    assert!(y < -2.0, "vetoed contact still stopped the ball at y = {y}");
}

#[test]
fn post_solve_reports_resting_impulses() {
    let mut world = world_with_ground();
    let ball = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 0.51)));
    world.create_fixture(ball, &FixtureDef::new(Shape::circle(0.5)).with_density(1.0));

    let mut events = EventCounter::default();
    for _ in 0..30 {
        world.step_with(DT, 8, 3, &mut events);
    }

    // A resting body's contact carries roughly m*g*dt of normal impulse.
    let expected = std::f32::consts::PI * 0.25 * 10.0 * DT;
    assert!(
        events.max_normal_impulse > 0.5 * expected,
        "impulse {} vs expected {}",
        events.max_normal_impulse,
        expected
    );
}

#[test]
fn sensors_report_touch_without_response() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let region = world.create_body(&BodyDef::new(BodyType::Static).at(Vec2::new(0.0, 0.0)));
    world.create_fixture(region, &FixtureDef::new(Shape::rect(1.0, 1.0)).sensor());

    let ball = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 5.0)));
    world.create_fixture(ball, &FixtureDef::new(Shape::circle(0.3)).with_density(1.0));

    let mut events = EventCounter::default();
    for _ in 0..180 {
        world.step_with(DT, 8, 3, &mut events);
    }

    // The ball passed through the sensor: one begin, one end, no pre-solve.
    assert_eq!(events.begins, 1);
    assert_eq!(events.ends, 1);
    assert_eq!(events.pre_solves, 0);
    assert!(world.body(ball).unwrap().position().y < -2.0);
}

#[test]
fn restitution_bounces_a_dropped_ball() {
    let mut world = world_with_ground();
    let ball = world.create_body(&BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 3.0)));
    world.create_fixture(
        ball,
        &FixtureDef::new(Shape::circle(0.5))
            .with_density(1.0)
            .with_restitution(0.8),
    );

    let mut peak_after_bounce = f32::MIN;
    let mut bounced = false;
    for _ in 0..300 {
        world.step(DT, 8, 3);
        let body = world.body(ball).unwrap();
        if body.velocity.linear.y > 0.1 {
            bounced = true;
        }
        if bounced {
            peak_after_bounce = peak_after_bounce.max(body.position().y);
        }
    }

    assert!(bounced, "ball never bounced");
    // Restitution 0.8 returns roughly 0.64 of the drop height.
    assert!(
        peak_after_bounce > 1.0,
        "bounce peak was only {peak_after_bounce}"
    );
}

#[test]
fn warm_started_stack_converges_to_low_speeds() {
    let mut world = world_with_ground();
    for i in 0..3 {
        let body = world.create_body(
            &BodyDef::new(BodyType::Dynamic).at(Vec2::new(0.0, 0.52 + 1.02 * i as f32)),
        );
        world.create_fixture(
            body,
            &FixtureDef::new(Shape::rect(0.5, 0.5)).with_density(1.0),
        );
    }

    for _ in 0..120 {
        world.step(DT, 8, 3);
    }

    // Every dynamic body in a warm-started resting stack is nearly still.
    for handle in world.body_handles() {
        let body = world.body(handle).unwrap();
        if body.body_type == BodyType::Dynamic {
            assert!(
                body.velocity.linear.length() < 0.05,
                "stacked body still moving at {:?}",
                body.velocity.linear
            );
        }
    }
}
