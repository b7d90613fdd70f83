//! Force controllers applied during the step's controller phase, before
//! collision and solving.

use glam::Vec2;

use crate::{
    core::{fixture::Fixture, rigidbody::RigidBody, types::BodyType},
    utils::allocator::Arena,
};

/// An external force generator applied to every dynamic body each step.
pub trait ForceGenerator: Send + Sync {
    fn apply(&self, body: &mut RigidBody, fixtures: &Arena<Fixture>, gravity: Vec2, dt: f32);
}

/// Constant world-space force (wind, conveyor fields).
pub struct ConstantForce {
    pub force: Vec2,
}

impl ConstantForce {
    pub fn new(force: Vec2) -> Self {
        Self { force }
    }
}

impl ForceGenerator for ConstantForce {
    fn apply(&self, body: &mut RigidBody, _fixtures: &Arena<Fixture>, _gravity: Vec2, _dt: f32) {
        body.apply_force_to_center(self.force);
    }
}

/// Quadratic drag resisting the direction of motion.
pub struct DragForce {
    pub drag_coefficient: f32,
}

impl DragForce {
    pub fn new(drag_coefficient: f32) -> Self {
        Self { drag_coefficient }
    }
}

impl ForceGenerator for DragForce {
    fn apply(&self, body: &mut RigidBody, _fixtures: &Arena<Fixture>, _gravity: Vec2, _dt: f32) {
        let speed_sq = body.velocity.linear.length_squared();
        if speed_sq < 1e-12 {
            return;
        }
        let speed = speed_sq.sqrt();
        let drag = -(body.velocity.linear / speed) * speed_sq * self.drag_coefficient;
        body.apply_force_to_center(drag);
    }
}

/// Half-plane fluid: bodies whose fixture centroids fall below the surface
/// receive displacement-proportional lift plus linear drag. Submersion is
/// judged per fixture centroid, not by exact area clipping.
pub struct BuoyancyForce {
    /// Unit normal pointing out of the fluid.
    pub surface_normal: Vec2,
    /// Signed offset of the surface plane along the normal.
    pub surface_offset: f32,
    pub fluid_density: f32,
    pub linear_drag: f32,
}

impl BuoyancyForce {
    pub fn new(surface_offset: f32, fluid_density: f32) -> Self {
        Self {
            surface_normal: Vec2::Y,
            surface_offset,
            fluid_density,
            linear_drag: 1.0,
        }
    }
}

impl ForceGenerator for BuoyancyForce {
    fn apply(&self, body: &mut RigidBody, fixtures: &Arena<Fixture>, gravity: Vec2, _dt: f32) {
        let xf = *body.transform();

        let mut displaced_area = 0.0;
        let mut center = Vec2::ZERO;
        for handle in body.fixtures.clone() {
            let fixture = match fixtures.get(handle) {
                Some(f) => f,
                None => continue,
            };
            // Unit-density mass equals the shape area.
            let mass_data = fixture.shape.compute_mass(1.0);
            let world_centroid = xf.apply(mass_data.center);
            if self.surface_normal.dot(world_centroid) - self.surface_offset < 0.0 {
                displaced_area += mass_data.mass;
                center += mass_data.mass * world_centroid;
            }
        }

        if displaced_area <= 0.0 {
            return;
        }
        center /= displaced_area;

        let lift = -self.fluid_density * displaced_area * gravity;
        body.apply_force(lift, center);

        let drag = -self.linear_drag * self.fluid_density * displaced_area * body.velocity.linear;
        body.apply_force(drag, center);
    }
}

/// Collection of force generators applied each step.
#[derive(Default)]
pub struct ForceRegistry {
    forces: Vec<Box<dyn ForceGenerator>>,
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: ForceGenerator + 'static>(&mut self, force: F) {
        self.forces.push(Box::new(force));
    }

    pub fn clear(&mut self) {
        self.forces.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub(crate) fn apply_all(
        &self,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        gravity: Vec2,
        dt: f32,
    ) {
        if self.forces.is_empty() {
            return;
        }
        for body in bodies.iter_mut() {
            if body.body_type != BodyType::Dynamic || !body.is_awake() {
                continue;
            }
            for force in &self.forces {
                force.apply(body, fixtures, gravity, dt);
            }
        }
    }
}
