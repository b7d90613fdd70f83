use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    pub fn extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    /// Perimeter, used as the cost metric for tree insertion.
    pub fn perimeter(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x + d.y)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        other.min.x <= self.max.x
            && other.min.y <= self.max.y
            && self.min.x <= other.max.x
            && self.min.y <= other.max.y
    }

    pub fn extend(&self, margin: f32) -> Aabb {
        let r = Vec2::splat(margin);
        Aabb {
            min: self.min - r,
            max: self.max + r,
        }
    }
}

/// Ray segment from `p1` toward `p2`, clipped at `max_fraction`.
#[derive(Debug, Clone, Copy)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f32,
}

/// A ray hit: the fraction along the input segment and the surface normal at
/// the hit point.
#[derive(Debug, Clone, Copy)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_boxes() {
        let a = Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(0.5, 0.5));
        let b = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 3.0));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert_eq!(u.perimeter(), 2.0 * (3.0 + 4.0));
    }

    #[test]
    fn overlap_is_inclusive_at_edges() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let b = Aabb::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));
        let c = Aabb::new(Vec2::new(1.1, 0.0), Vec2::new(2.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
