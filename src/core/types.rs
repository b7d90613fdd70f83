use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::utils::math::Rot;

/// Position and orientation of a body or shape frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            p: position,
            q: Rot::new(angle),
        }
    }

    /// Maps a local point into the parent frame.
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.q.apply(v) + self.p
    }

    /// Maps a parent-frame point into local coordinates.
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        self.q.apply_inverse(v - self.p)
    }

    /// Relative transform `self^-1 * other`, mapping `other`-local points
    /// into `self`-local coordinates.
    pub fn mul_inverse(&self, other: Transform) -> Transform {
        Transform {
            p: self.q.apply_inverse(other.p - self.p),
            q: self.q.mul_inverse(other.q),
        }
    }
}

/// Interpolated motion of a body's center of mass across a step. Continuous
/// collision sweeps between the `0` and current samples; fixture
/// synchronization fattens proxies across both.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Sweep {
    /// Center of mass in body-local coordinates.
    pub local_center: Vec2,
    /// World center of mass at the start of the interval.
    pub c0: Vec2,
    /// Current world center of mass.
    pub c: Vec2,
    /// Angle at the start of the interval.
    pub a0: f32,
    /// Current angle.
    pub a: f32,
    /// Fraction of the step already consumed by continuous advancement.
    pub alpha0: f32,
}

impl Sweep {
    /// Body transform at interpolation factor `beta` within [alpha0, 1].
    pub fn transform_at(&self, beta: f32) -> Transform {
        let c = (1.0 - beta) * self.c0 + beta * self.c;
        let a = (1.0 - beta) * self.a0 + beta * self.a;
        let q = Rot::new(a);
        Transform {
            p: c - q.apply(self.local_center),
            q,
        }
    }

    /// Moves the start of the interval forward to `alpha`.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wraps the angle samples to keep them near zero; large accumulated
    /// angles lose interpolation precision.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec2,
    pub angular: f32,
}

/// Mass, center of mass, and rotational inertia computed from a shape.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MassData {
    pub mass: f32,
    /// Center of mass in shape-local coordinates.
    pub center: Vec2,
    /// Rotational inertia about the shape origin.
    pub inertia: f32,
}

/// Motion regime of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never moves; zero inverse mass.
    Static,
    /// Moves under its own velocity, unaffected by forces or impulses.
    Kinematic,
    /// Full simulation.
    #[default]
    Dynamic,
}

/// Collision filtering data carried by each fixture.
///
/// A non-zero equal group index overrides the category/mask test: positive
/// always collides, negative never collides. Otherwise both masks must accept
/// the other side's category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Filter {
    pub category: u16,
    pub mask: u16,
    pub group: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category: 0x0001,
            mask: 0xFFFF,
            group: 0,
        }
    }
}

impl Filter {
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group == other.group && self.group != 0 {
            return self.group > 0;
        }
        (self.mask & other.category) != 0 && (other.mask & self.category) != 0
    }
}

/// Material coefficients that affect contact response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Material {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
        }
    }
}

impl Material {
    /// Friction mixes as a geometric mean so one slippery surface dominates.
    pub fn mix_friction(a: f32, b: f32) -> f32 {
        (a * b).sqrt()
    }

    /// Restitution mixes as the max so a bouncy ball bounces off anything.
    pub fn mix_restitution(a: f32, b: f32) -> f32 {
        a.max(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sweep_transform_interpolates_between_samples() {
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::new(0.0, 0.0),
            c: Vec2::new(2.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };

        let xf = sweep.transform_at(0.5);
        assert_relative_eq!(xf.p.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(xf.q.angle(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn sweep_advance_rebases_interval_start() {
        let mut sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::ZERO,
            c: Vec2::new(4.0, 0.0),
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        };
        sweep.advance(0.25);
        assert_relative_eq!(sweep.c0.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(sweep.alpha0, 0.25, epsilon = 1e-6);
    }

    #[test]
    fn group_index_overrides_category_mask() {
        let mut a = Filter::default();
        let mut b = Filter::default();
        a.category = 0x0002;
        a.mask = 0x0004; // does not accept b
        b.category = 0x0002;
        b.mask = 0x0004;
        assert!(!a.should_collide(&b));

        a.group = 3;
        b.group = 3;
        assert!(a.should_collide(&b));

        a.group = -3;
        b.group = -3;
        a.mask = 0xFFFF;
        b.mask = 0xFFFF;
        assert!(!a.should_collide(&b));
    }
}
