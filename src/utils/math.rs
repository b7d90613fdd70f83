//! Additional 2D math helpers layered on top of `glam`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// 2D rotation stored as sine/cosine so applying it is two multiplies per
/// component instead of trigonometry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Rot = Rot { s: 0.0, c: 1.0 };

    pub fn new(angle: f32) -> Self {
        Self {
            s: angle.sin(),
            c: angle.cos(),
        }
    }

    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Unit vector along the rotated local X axis.
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// Unit vector along the rotated local Y axis.
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Applies the inverse rotation.
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Composition `self * other`.
    pub fn mul(&self, other: Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }

    /// Composition `self^-1 * other`.
    pub fn mul_inverse(&self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

/// 2D cross product of two vectors, returning the scalar z component.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Cross product of a scalar (z-axis angular quantity) with a vector.
#[inline]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    Vec2::new(-s * v.y, s * v.x)
}

/// Cross product of a vector with a scalar (z-axis angular quantity).
#[inline]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

/// Solves `K x = b` for a symmetric 2x2 effective-mass matrix given by its
/// columns, returning zero when the matrix is singular.
#[inline]
pub fn solve22(ex: Vec2, ey: Vec2, b: Vec2) -> Vec2 {
    let det = ex.x * ey.y - ey.x * ex.y;
    if det.abs() <= f32::EPSILON {
        return Vec2::ZERO;
    }
    let inv_det = 1.0 / det;
    Vec2::new(
        inv_det * (ey.y * b.x - ey.x * b.y),
        inv_det * (ex.x * b.y - ex.y * b.x),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rot_round_trips_vectors() {
        let q = Rot::new(0.7);
        let v = Vec2::new(1.5, -2.0);
        let back = q.apply_inverse(q.apply(v));
        assert_relative_eq!(back.x, v.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, v.y, epsilon = 1e-6);
    }

    #[test]
    fn rot_composition_matches_angle_sum() {
        let a = Rot::new(0.3);
        let b = Rot::new(0.4);
        assert_relative_eq!(a.mul(b).angle(), 0.7, epsilon = 1e-6);
        assert_relative_eq!(a.mul_inverse(b).angle(), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn solve22_inverts_well_conditioned_systems() {
        let ex = Vec2::new(4.0, 1.0);
        let ey = Vec2::new(1.0, 3.0);
        let b = Vec2::new(1.0, 2.0);
        let x = solve22(ex, ey, b);
        let rx = ex * x.x + ey * x.y;
        assert_relative_eq!(rx.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(rx.y, b.y, epsilon = 1e-5);
    }
}
