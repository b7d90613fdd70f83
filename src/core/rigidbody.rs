use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    collision::contact::ContactHandle,
    core::{
        fixture::{Fixture, FixtureHandle},
        joints::{Joint, JointHandle},
        types::{BodyType, MassData, Sweep, Transform, Velocity},
    },
    utils::{
        allocator::{Arena, Handle},
        math::cross_sv,
    },
};

pub type BodyHandle = Handle<RigidBody>;

/// Construction parameters for a rigid body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub linear_velocity: Vec2,
    pub angular_velocity: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub allow_sleep: bool,
    pub awake: bool,
    pub fixed_rotation: bool,
    /// Continuous collision participant: never tunnels through static or
    /// kinematic geometry.
    pub bullet: bool,
    pub enabled: bool,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
        }
    }
}

impl BodyDef {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Self::default()
        }
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec2) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, omega: f32) -> Self {
        self.angular_velocity = omega;
        self
    }

    pub fn as_bullet(mut self) -> Self {
        self.bullet = true;
        self
    }

    pub fn with_fixed_rotation(mut self) -> Self {
        self.fixed_rotation = true;
        self
    }
}

/// Rigid-body state record. Owns its fixture list; joints and contacts are
/// adjacency handles maintained by the world.
#[derive(Debug, Clone)]
pub struct RigidBody {
    pub body_type: BodyType,
    transform: Transform,
    pub sweep: Sweep,
    pub velocity: Velocity,

    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    mass: f32,
    inv_mass: f32,
    /// Rotational inertia about the center of mass.
    inertia: f32,
    inv_inertia: f32,

    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,

    pub(crate) sleep_time: f32,
    awake: bool,
    pub allow_sleep: bool,
    bullet: bool,
    fixed_rotation: bool,
    enabled: bool,

    pub fixtures: Vec<FixtureHandle>,
    pub joints: Vec<JointHandle>,
    pub contacts: Vec<ContactHandle>,

    /// Scratch: position in the island currently being solved.
    pub(crate) island_index: usize,
    /// Scratch: claimed by an island this step.
    pub(crate) island: bool,
}

impl RigidBody {
    pub fn new(def: &BodyDef) -> Self {
        let transform = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: def.position,
            c: def.position,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        Self {
            body_type: def.body_type,
            transform,
            sweep,
            velocity: Velocity {
                linear: def.linear_velocity,
                angular: def.angular_velocity,
            },
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            awake: def.awake,
            allow_sleep: def.allow_sleep,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            enabled: def.enabled,
            fixtures: Vec::new(),
            joints: Vec::new(),
            contacts: Vec::new(),
            island_index: 0,
            island: false,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn position(&self) -> Vec2 {
        self.transform.p
    }

    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Rotational inertia about the body origin.
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.length_squared()
    }

    pub fn inv_inertia(&self) -> f32 {
        self.inv_inertia
    }

    pub fn is_awake(&self) -> bool {
        self.awake
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    pub fn set_bullet(&mut self, bullet: bool) {
        self.bullet = bullet;
    }

    pub(crate) fn set_enabled_flag(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Wakes or sleeps the body. Static bodies never accumulate sleep state.
    pub fn set_awake(&mut self, awake: bool) {
        if awake {
            if !self.awake {
                self.awake = true;
                self.sleep_time = 0.0;
            }
        } else {
            self.awake = false;
            self.sleep_time = 0.0;
            self.velocity = Velocity::default();
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    /// Places the body. The caller (world) is responsible for resynchronizing
    /// broad-phase proxies afterwards.
    pub(crate) fn set_transform_internal(&mut self, position: Vec2, angle: f32) {
        self.transform = Transform::new(position, angle);
        self.sweep.c = self.transform.apply(self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    pub fn apply_force(&mut self, force: Vec2, point: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.set_awake(true);
        self.force += force;
        self.torque += crate::utils::math::cross(point - self.sweep.c, force);
    }

    pub fn apply_force_to_center(&mut self, force: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.set_awake(true);
        self.force += force;
    }

    pub fn apply_torque(&mut self, torque: f32) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.set_awake(true);
        self.torque += torque;
    }

    pub fn apply_impulse(&mut self, impulse: Vec2, point: Vec2) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.set_awake(true);
        self.velocity.linear += self.inv_mass * impulse;
        self.velocity.angular +=
            self.inv_inertia * crate::utils::math::cross(point - self.sweep.c, impulse);
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        self.set_awake(true);
        self.velocity.angular += self.inv_inertia * impulse;
    }

    /// World-space velocity of a world-space point on the body.
    pub fn velocity_at(&self, world_point: Vec2) -> Vec2 {
        self.velocity.linear + cross_sv(self.velocity.angular, world_point - self.sweep.c)
    }

    /// Recomputes mass, center, and inertia as the density-weighted sum of
    /// the attached fixtures' shape mass data.
    pub fn reset_mass_data(&mut self, fixtures: &Arena<Fixture>) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vec2::ZERO;

        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.transform.p;
            self.sweep.c = self.transform.p;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        let mut local_center = Vec2::ZERO;
        for handle in &self.fixtures {
            let fixture = match fixtures.get(*handle) {
                Some(f) => f,
                None => continue,
            };
            if fixture.material.density == 0.0 {
                continue;
            }
            let mass_data: MassData = fixture.shape.compute_mass(fixture.material.density);
            self.mass += mass_data.mass;
            local_center += mass_data.mass * mass_data.center;
            self.inertia += mass_data.inertia;
        }

        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // A dynamic body with no mass cannot integrate; force unit mass.
            log::warn!("dynamic body has zero mass, forcing mass = 1");
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if self.inertia > 0.0 && !self.fixed_rotation {
            self.inertia -= self.mass * local_center.length_squared();
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        // Re-anchor the sweep at the new center of mass, preserving the
        // center's world velocity.
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = self.transform.apply(local_center);
        self.sweep.c0 = self.sweep.c;
        self.velocity.linear += cross_sv(self.velocity.angular, self.sweep.c - old_center);
    }

    /// Overrides the aggregated mass data. Zero or negative mass is clamped
    /// to one, matching the aggregation path.
    pub fn set_mass_data(&mut self, mass_data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_inertia = 0.0;
        self.inertia = 0.0;

        self.mass = if mass_data.mass <= 0.0 { 1.0 } else { mass_data.mass };
        self.inv_mass = 1.0 / self.mass;

        if mass_data.inertia > 0.0 && !self.fixed_rotation {
            self.inertia = mass_data.inertia - self.mass * mass_data.center.length_squared();
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        }

        let old_center = self.sweep.c;
        self.sweep.local_center = mass_data.center;
        self.sweep.c = self.transform.apply(mass_data.center);
        self.sweep.c0 = self.sweep.c;
        self.velocity.linear += cross_sv(self.velocity.angular, self.sweep.c - old_center);
    }

    /// Whether contacts between this body and `other` are allowed: at least
    /// one must be dynamic, and no joint with `collide_connected == false`
    /// may link the two.
    pub fn should_collide(
        &self,
        other: &RigidBody,
        other_handle: BodyHandle,
        joints: &Arena<Joint>,
    ) -> bool {
        if self.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
            return false;
        }

        for handle in &self.joints {
            if let Some(joint) = joints.get(*handle) {
                if (joint.body_a == other_handle || joint.body_b == other_handle)
                    && !joint.collide_connected
                {
                    return false;
                }
            }
        }
        true
    }

    /// Rebuilds the transform from the current sweep sample.
    pub(crate) fn synchronize_transform(&mut self) {
        self.transform = Transform::new(Vec2::ZERO, self.sweep.a);
        self.transform.p = self.sweep.c - self.transform.q.apply(self.sweep.local_center);
    }

    /// Advances the sweep origin to `alpha` and rebuilds the transform there
    /// (continuous collision positioning, no integration).
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixture::FixtureDef;
    use crate::core::types::Material;
    use approx::assert_relative_eq;

    fn dynamic_body() -> RigidBody {
        RigidBody::new(&BodyDef::new(BodyType::Dynamic))
    }

    #[test]
    fn static_bodies_have_zero_inverse_mass() {
        let body = RigidBody::new(&BodyDef::new(BodyType::Static));
        assert_eq!(body.inv_mass(), 0.0);
        assert_eq!(body.inv_inertia(), 0.0);
    }

    #[test]
    fn mass_aggregates_over_fixtures_and_ignores_zero_density() {
        let mut fixtures = Arena::new();
        let mut body = dynamic_body();
        let body_handle = Handle::new(0, 0);

        let f1 = fixtures.insert(Fixture::new(
            body_handle,
            &FixtureDef::new(crate::collision::shapes::Shape::rect(1.0, 1.0)).with_density(2.0),
        ));
        body.fixtures.push(f1);
        body.reset_mass_data(&fixtures);
        let base_mass = body.mass();
        assert_relative_eq!(base_mass, 8.0, epsilon = 1e-4);

        // A zero-density fixture leaves the mass unchanged.
        let f2 = fixtures.insert(Fixture::new(
            body_handle,
            &FixtureDef::new(crate::collision::shapes::Shape::circle(1.0)).with_material(
                Material {
                    density: 0.0,
                    ..Default::default()
                },
            ),
        ));
        body.fixtures.push(f2);
        body.reset_mass_data(&fixtures);
        assert_relative_eq!(body.mass(), base_mass, epsilon = 1e-5);
    }

    #[test]
    fn zero_mass_dynamic_body_is_forced_to_unit_mass() {
        let fixtures = Arena::new();
        let mut body = dynamic_body();
        body.reset_mass_data(&fixtures);
        assert_eq!(body.mass(), 1.0);
        assert_eq!(body.inv_mass(), 1.0);
    }

    #[test]
    fn impulses_do_not_move_non_dynamic_bodies() {
        let mut body = RigidBody::new(&BodyDef::new(BodyType::Kinematic));
        body.apply_impulse(Vec2::new(10.0, 0.0), Vec2::ZERO);
        assert_eq!(body.velocity.linear, Vec2::ZERO);
    }

    #[test]
    fn sleeping_zeroes_velocity() {
        let mut body = dynamic_body();
        body.velocity.linear = Vec2::new(1.0, 2.0);
        body.set_awake(false);
        assert!(!body.is_awake());
        assert_eq!(body.velocity.linear, Vec2::ZERO);
    }
}
