use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{
    collision::queries::{Aabb, RayCastInput, RayCastOutput},
    config::{MAX_POLYGON_VERTICES, POLYGON_RADIUS},
    core::types::{MassData, Transform},
    utils::math::cross,
};

/// Errors reported synchronously when a shape is built from caller geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeError {
    /// Fewer than 3 or more than [`MAX_POLYGON_VERTICES`] vertices.
    VertexCount(usize),
    /// Two input vertices are closer than the linear slop.
    CoincidentVertices,
    /// The vertex loop is not convex or not counter-clockwise.
    NotConvex,
    /// The polygon has (near) zero area.
    DegenerateArea,
}

impl std::fmt::Display for ShapeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShapeError::VertexCount(n) => write!(f, "polygon needs 3..=8 vertices, got {n}"),
            ShapeError::CoincidentVertices => write!(f, "polygon vertices are nearly coincident"),
            ShapeError::NotConvex => write!(f, "polygon is not a convex counter-clockwise loop"),
            ShapeError::DegenerateArea => write!(f, "polygon area is degenerate"),
        }
    }
}

impl std::error::Error for ShapeError {}

/// Solid circle, offset from the body origin by `center`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircleShape {
    pub center: Vec2,
    pub radius: f32,
}

impl CircleShape {
    pub fn new(radius: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            radius,
        }
    }

    pub fn with_center(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Convex polygon with up to [`MAX_POLYGON_VERTICES`] counter-clockwise
/// vertices. Carries the standard skin radius for the continuous-collision
/// margin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolygonShape {
    pub vertices: [Vec2; MAX_POLYGON_VERTICES],
    pub normals: [Vec2; MAX_POLYGON_VERTICES],
    pub centroid: Vec2,
    pub count: usize,
    pub radius: f32,
}

impl PolygonShape {
    /// Builds a polygon from a counter-clockwise convex loop. Convexity,
    /// winding, and vertex separation are caller contracts checked here,
    /// never during simulation.
    pub fn new(points: &[Vec2]) -> Result<Self, ShapeError> {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return Err(ShapeError::VertexCount(points.len()));
        }

        let count = points.len();
        for i in 0..count {
            for j in (i + 1)..count {
                let min_separation = 0.5 * crate::config::LINEAR_SLOP;
                if points[i].distance_squared(points[j]) < min_separation * min_separation {
                    return Err(ShapeError::CoincidentVertices);
                }
            }
        }

        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(points);

        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        for i in 0..count {
            let i2 = (i + 1) % count;
            let edge = vertices[i2] - vertices[i];
            if edge.length_squared() <= f32::EPSILON {
                return Err(ShapeError::CoincidentVertices);
            }
            normals[i] = Vec2::new(edge.y, -edge.x).normalize();
        }

        // Convex CCW loop: every vertex lies on the inner side of every edge.
        for i in 0..count {
            for j in 0..count {
                if j == i || j == (i + 1) % count {
                    continue;
                }
                let d = vertices[j] - vertices[i];
                if normals[i].dot(d) > -f32::EPSILON {
                    return Err(ShapeError::NotConvex);
                }
            }
        }

        let centroid = Self::compute_centroid(&vertices[..count])?;

        Ok(Self {
            vertices,
            normals,
            centroid,
            count,
            radius: POLYGON_RADIUS,
        })
    }

    /// Axis-aligned box centered on the body origin.
    pub fn new_box(half_width: f32, half_height: f32) -> Self {
        let hx = half_width;
        let hy = half_height;
        let mut shape = Self {
            vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            centroid: Vec2::ZERO,
            count: 4,
            radius: POLYGON_RADIUS,
        };
        shape.vertices[0] = Vec2::new(-hx, -hy);
        shape.vertices[1] = Vec2::new(hx, -hy);
        shape.vertices[2] = Vec2::new(hx, hy);
        shape.vertices[3] = Vec2::new(-hx, hy);
        shape.normals[0] = Vec2::new(0.0, -1.0);
        shape.normals[1] = Vec2::new(1.0, 0.0);
        shape.normals[2] = Vec2::new(0.0, 1.0);
        shape.normals[3] = Vec2::new(-1.0, 0.0);
        shape
    }

    /// Oriented box offset from the body origin.
    pub fn new_box_at(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let mut shape = Self::new_box(half_width, half_height);
        let xf = Transform::new(center, angle);
        for i in 0..4 {
            shape.vertices[i] = xf.apply(shape.vertices[i]);
            shape.normals[i] = xf.q.apply(shape.normals[i]);
        }
        shape.centroid = center;
        shape
    }

    fn compute_centroid(vertices: &[Vec2]) -> Result<Vec2, ShapeError> {
        let mut c = Vec2::ZERO;
        let mut area = 0.0;
        let reference = vertices[0];

        for i in 1..vertices.len() - 1 {
            let e1 = vertices[i] - reference;
            let e2 = vertices[i + 1] - reference;
            let triangle_area = 0.5 * cross(e1, e2);
            area += triangle_area;
            c += triangle_area * (e1 + e2) / 3.0;
        }

        if area <= f32::EPSILON {
            return Err(ShapeError::DegenerateArea);
        }
        Ok(reference + c / area)
    }
}

/// Immutable convex collision geometry attached to a fixture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Shape {
    Circle(CircleShape),
    Polygon(PolygonShape),
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        Shape::Circle(CircleShape::new(radius))
    }

    pub fn polygon(points: &[Vec2]) -> Result<Self, ShapeError> {
        PolygonShape::new(points).map(Shape::Polygon)
    }

    pub fn rect(half_width: f32, half_height: f32) -> Self {
        Shape::Polygon(PolygonShape::new_box(half_width, half_height))
    }

    /// Skin radius of the shape boundary.
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Polygon(p) => p.radius,
        }
    }

    /// Number of broad-phase proxies the shape needs. Both current variants
    /// are single-child; chain-style shapes plug in here.
    pub fn child_count(&self) -> usize {
        1
    }

    pub fn compute_aabb(&self, xf: &Transform) -> Aabb {
        match self {
            Shape::Circle(c) => {
                let p = xf.apply(c.center);
                Aabb {
                    min: p - Vec2::splat(c.radius),
                    max: p + Vec2::splat(c.radius),
                }
            }
            Shape::Polygon(p) => {
                let mut min = xf.apply(p.vertices[0]);
                let mut max = min;
                for v in &p.vertices[1..p.count] {
                    let w = xf.apply(*v);
                    min = min.min(w);
                    max = max.max(w);
                }
                let r = Vec2::splat(p.radius);
                Aabb {
                    min: min - r,
                    max: max + r,
                }
            }
        }
    }

    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(c) => {
                let mass = density * std::f32::consts::PI * c.radius * c.radius;
                MassData {
                    mass,
                    center: c.center,
                    // Disc inertia about its center, shifted to the shape
                    // origin by the parallel-axis theorem.
                    inertia: mass * (0.5 * c.radius * c.radius + c.center.length_squared()),
                }
            }
            Shape::Polygon(p) => {
                // Triangle fan from a reference vertex; inertia is integrated
                // about the reference, then shifted to the shape origin via
                // the parallel-axis theorem.
                let reference = p.vertices[0];
                let inv3 = 1.0 / 3.0;

                let mut relative_center = Vec2::ZERO;
                let mut area = 0.0;
                let mut inertia = 0.0;

                for i in 0..p.count {
                    let e1 = p.vertices[i] - reference;
                    let e2 = p.vertices[(i + 1) % p.count] - reference;
                    let d = cross(e1, e2);
                    let triangle_area = 0.5 * d;
                    area += triangle_area;
                    relative_center += triangle_area * inv3 * (e1 + e2);

                    let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
                    let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
                    inertia += (0.25 * inv3 * d) * (intx2 + inty2);
                }

                let mass = density * area;
                relative_center /= area;
                let center = reference + relative_center;
                let inertia = density * inertia
                    + mass * (center.length_squared() - relative_center.length_squared());

                MassData {
                    mass,
                    center,
                    inertia,
                }
            }
        }
    }

    pub fn test_point(&self, xf: &Transform, point: Vec2) -> bool {
        match self {
            Shape::Circle(c) => {
                let center = xf.apply(c.center);
                (point - center).length_squared() <= c.radius * c.radius
            }
            Shape::Polygon(p) => {
                let local = xf.apply_inverse(point);
                for i in 0..p.count {
                    if p.normals[i].dot(local - p.vertices[i]) > 0.0 {
                        return false;
                    }
                }
                true
            }
        }
    }

    /// Casts a ray against the shape in world space. Returns `None` on a
    /// miss; starting inside the shape is a miss.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(c) => {
                let center = xf.apply(c.center);
                let s = input.p1 - center;
                let b = s.length_squared() - c.radius * c.radius;

                let r = input.p2 - input.p1;
                let cc = s.dot(r);
                let rr = r.length_squared();
                let sigma = cc * cc - rr * b;

                if sigma < 0.0 || rr < f32::EPSILON {
                    return None;
                }

                let t = -(cc + sigma.sqrt());
                if t >= 0.0 && t <= input.max_fraction * rr {
                    let fraction = t / rr;
                    return Some(RayCastOutput {
                        fraction,
                        normal: (s + fraction * r).normalize(),
                    });
                }
                None
            }
            Shape::Polygon(p) => {
                // Cast in local space against the half-plane slab of each edge.
                let p1 = xf.apply_inverse(input.p1);
                let p2 = xf.apply_inverse(input.p2);
                let d = p2 - p1;

                let mut lower = 0.0;
                let mut upper = input.max_fraction;
                let mut index = None;

                for i in 0..p.count {
                    let numerator = p.normals[i].dot(p.vertices[i] - p1);
                    let denominator = p.normals[i].dot(d);

                    if denominator == 0.0 {
                        if numerator < 0.0 {
                            return None;
                        }
                    } else {
                        if denominator < 0.0 && numerator < lower * denominator {
                            lower = numerator / denominator;
                            index = Some(i);
                        } else if denominator > 0.0 && numerator < upper * denominator {
                            upper = numerator / denominator;
                        }
                    }

                    if upper < lower {
                        return None;
                    }
                }

                index.map(|i| RayCastOutput {
                    fraction: lower,
                    normal: xf.q.apply(p.normals[i]),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn polygon_rejects_degenerate_input() {
        assert_eq!(
            PolygonShape::new(&[Vec2::ZERO, Vec2::X]).unwrap_err(),
            ShapeError::VertexCount(2)
        );

        // Clockwise winding is not accepted.
        let cw = [Vec2::ZERO, Vec2::new(0.0, 1.0), Vec2::new(1.0, 0.0)];
        assert!(PolygonShape::new(&cw).is_err());

        // Concave quad.
        let concave = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.2, 0.2),
            Vec2::new(0.0, 2.0),
        ];
        assert_eq!(PolygonShape::new(&concave).unwrap_err(), ShapeError::NotConvex);
    }

    #[test]
    fn polygon_accepts_ccw_convex_loop() {
        let square = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let p = PolygonShape::new(&square).unwrap();
        assert_eq!(p.count, 4);
        assert_relative_eq!(p.centroid.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.normals[1].x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn box_mass_matches_closed_form() {
        let shape = Shape::rect(1.0, 2.0);
        let data = shape.compute_mass(3.0);

        // 2x4 box at density 3: m = 24, I = m(w^2+h^2)/12 about the center.
        assert_relative_eq!(data.mass, 24.0, epsilon = 1e-4);
        assert_relative_eq!(data.center.x, 0.0, epsilon = 1e-5);
        let expected = 24.0 * (4.0 + 16.0) / 12.0;
        assert_relative_eq!(data.inertia, expected, epsilon = 1e-2);
    }

    #[test]
    fn circle_mass_includes_offset_center() {
        let shape = Shape::Circle(CircleShape::with_center(Vec2::new(2.0, 0.0), 1.0));
        let data = shape.compute_mass(1.0);
        let m = std::f32::consts::PI;
        assert_relative_eq!(data.mass, m, epsilon = 1e-5);
        assert_relative_eq!(data.center.x, 2.0, epsilon = 1e-6);
        assert_relative_eq!(data.inertia, m * (0.5 + 4.0), epsilon = 1e-4);
    }

    #[test]
    fn ray_hits_circle_from_outside() {
        let shape = Shape::circle(1.0);
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&input, &xf).unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn ray_hits_polygon_face() {
        let shape = Shape::rect(1.0, 1.0);
        let xf = Transform::IDENTITY;
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 0.5),
            p2: Vec2::new(5.0, 0.5),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&input, &xf).unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_point_respects_rotation() {
        let shape = Shape::rect(2.0, 0.5);
        let xf = Transform::new(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
        assert!(shape.test_point(&xf, Vec2::new(0.0, 1.5)));
        assert!(!shape.test_point(&xf, Vec2::new(1.5, 0.0)));
    }
}
