use glam::Vec2;
use impulse2d::{
    BodyDef, BodyType, Contact, ContactHandle, ContactListener, FixtureDef, Shape, World,
};

const DT: f32 = 1.0 / 60.0;

#[derive(Default)]
struct TouchRecorder {
    begins: usize,
    first_contact_y: Option<f32>,
}

struct RecorderWithBody<'a> {
    recorder: &'a mut TouchRecorder,
    bullet_y: f32,
}

impl ContactListener for RecorderWithBody<'_> {
    fn begin_contact(&mut self, _handle: ContactHandle, _contact: &mut Contact) {
        self.recorder.begins += 1;
        if self.recorder.first_contact_y.is_none() {
            self.recorder.first_contact_y = Some(self.bullet_y);
        }
    }
}

fn thin_wall_world() -> (World, impulse2d::BodyHandle) {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    // Thin static wall at y = 0.
    let wall = world.create_body(&BodyDef::new(BodyType::Static));
    world.create_fixture(wall, &FixtureDef::new(Shape::rect(10.0, 0.05)));

    // Fast bullet circle far above, moving straight down. Without continuous
    // collision it would cross the wall inside a single step.
    let bullet = world.create_body(
        &BodyDef::new(BodyType::Dynamic)
            .at(Vec2::new(0.0, 20.0))
            .with_linear_velocity(Vec2::new(0.0, -100.0))
            .as_bullet(),
    );
    world.create_fixture(
        bullet,
        &FixtureDef::new(Shape::circle(0.1)).with_density(1.0),
    );

    (world, bullet)
}

#[test]
fn bullet_never_tunnels_through_thin_wall() {
    let (mut world, bullet) = thin_wall_world();

    let mut recorder = TouchRecorder::default();
    for _ in 0..30 {
        let y = world.body(bullet).unwrap().position().y;
        let mut listener = RecorderWithBody {
            recorder: &mut recorder,
            bullet_y: y,
        };
        world.step_with(DT, 8, 3, &mut listener);
    }

    assert!(recorder.begins > 0, "bullet never reported a contact");

    // The contact fired before the bullet's center crossed the wall plane.
    let y_at_contact = recorder.first_contact_y.expect("contact recorded");
    assert!(
        y_at_contact > 0.0,
        "contact was first seen at y = {y_at_contact}, after crossing"
    );

    // And the bullet never passed through the wall.
    let final_y = world.body(bullet).unwrap().position().y;
    assert!(
        final_y > 0.0,
        "bullet tunneled: final y = {final_y}"
    );
}

#[test]
fn non_bullet_fast_body_still_stops_at_static_geometry() {
    // Non-bullet dynamic bodies still sweep against static geometry.
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let wall = world.create_body(&BodyDef::new(BodyType::Static));
    world.create_fixture(wall, &FixtureDef::new(Shape::rect(10.0, 0.05)));

    let ball = world.create_body(
        &BodyDef::new(BodyType::Dynamic)
            .at(Vec2::new(0.0, 10.0))
            .with_linear_velocity(Vec2::new(0.0, -90.0)),
    );
    world.create_fixture(ball, &FixtureDef::new(Shape::circle(0.1)).with_density(1.0));

    for _ in 0..30 {
        world.step(DT, 8, 3);
    }

    let y = world.body(ball).unwrap().position().y;
    assert!(y > -0.5, "fast body tunneled through static wall: y = {y}");
}

#[test]
fn toi_overflow_counter_stays_zero_for_easy_impacts() {
    let (mut world, _bullet) = thin_wall_world();

    let mut overflows = 0;
    for _ in 0..30 {
        let profile = world.step(DT, 8, 3);
        overflows += profile.toi_overflows;
    }
    assert_eq!(overflows, 0, "simple head-on impact overran the TOI budget");
}

#[test]
fn sensors_do_not_participate_in_continuous_collision() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let wall = world.create_body(&BodyDef::new(BodyType::Static));
    world.create_fixture(wall, &FixtureDef::new(Shape::rect(10.0, 0.05)).sensor());

    let bullet = world.create_body(
        &BodyDef::new(BodyType::Dynamic)
            .at(Vec2::new(0.0, 10.0))
            .with_linear_velocity(Vec2::new(0.0, -100.0))
            .as_bullet(),
    );
    world.create_fixture(
        bullet,
        &FixtureDef::new(Shape::circle(0.1)).with_density(1.0),
    );

    for _ in 0..30 {
        world.step(DT, 8, 3);
    }

    // The sensor never blocks motion.
    let y = world.body(bullet).unwrap().position().y;
    assert!(y < -5.0, "sensor stopped the bullet at y = {y}");
}
