//! GJK distance between convex shape proxies.
//!
//! The simplex cache lets repeated queries over the same pair (as in the
//! conservative-advancement loop) start from the previous frame's simplex,
//! which usually converges in one or two iterations.

use glam::Vec2;

use crate::{
    collision::shapes::Shape,
    config::{GJK_MAX_ITERATIONS, MAX_POLYGON_VERTICES},
    core::types::Transform,
    utils::math::cross,
};

/// Point cloud + radius view of a convex shape, the only geometry the
/// distance and time-of-impact queries need.
#[derive(Debug, Clone, Copy)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    pub radius: f32,
}

impl DistanceProxy {
    pub fn new(shape: &Shape) -> Self {
        match shape {
            Shape::Circle(c) => {
                let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
                vertices[0] = c.center;
                Self {
                    vertices,
                    count: 1,
                    radius: c.radius,
                }
            }
            Shape::Polygon(p) => Self {
                vertices: p.vertices,
                count: p.count,
                radius: p.radius,
            },
        }
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        debug_assert!(index < self.count);
        self.vertices[index]
    }

    /// Index of the support vertex in direction `d` (local space).
    pub fn support(&self, d: Vec2) -> usize {
        let mut best = 0;
        let mut best_dot = self.vertices[0].dot(d);
        for i in 1..self.count {
            let dot = self.vertices[i].dot(d);
            if dot > best_dot {
                best_dot = dot;
                best = i;
            }
        }
        best
    }
}

/// Simplex persisted across distance calls for warm starting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplexCache {
    pub metric: f32,
    pub count: usize,
    pub index_a: [u8; 3],
    pub index_b: [u8; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Subtract the shape radii so the distance is between skins, not cores.
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceOutput {
    pub point_a: Vec2,
    pub point_b: Vec2,
    pub distance: f32,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point on proxy A in world space.
    w_a: Vec2,
    /// Support point on proxy B in world space.
    w_b: Vec2,
    /// `w_b - w_a`.
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        let mut simplex = Simplex::default();
        simplex.count = cache.count;

        for i in 0..simplex.count {
            let v = &mut simplex.v[i];
            v.index_a = cache.index_a[i] as usize;
            v.index_b = cache.index_b[i] as usize;
            v.w_a = xf_a.apply(proxy_a.vertex(v.index_a));
            v.w_b = xf_b.apply(proxy_b.vertex(v.index_b));
            v.w = v.w_b - v.w_a;
            v.a = 0.0;
        }

        // Discard a stale cache whose metric changed too much.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.apply(proxy_a.vertex(0));
            v.w_b = xf_b.apply(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = 1.0;
            simplex.count = 1;
        }

        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a as u8;
            cache.index_b[i] = self.v[i].index_b as u8;
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => (self.v[0].w - self.v[1].w).length(),
            3 => cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::new(-e12.y, e12.x)
                } else {
                    Vec2::new(e12.y, -e12.x)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].a * self.v[0].w + self.v[1].a * self.v[1].w,
            3 => Vec2::ZERO,
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].a * self.v[0].w_a + self.v[1].a * self.v[1].w_a,
                self.v[0].a * self.v[0].w_b + self.v[1].a * self.v[1].w_b,
            ),
            3 => {
                let p = self.v[0].a * self.v[0].w_a
                    + self.v[1].a * self.v[1].w_a
                    + self.v[2].a * self.v[2].w_a;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    /// Closest point on segment [w1, w2] to the origin, in barycentric form.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest feature of triangle [w1, w2, w3] to the origin.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let w1e12 = w1.dot(e12);
        let w2e12 = w2.dot(e12);
        let d12_1 = w2e12;
        let d12_2 = -w1e12;

        let e13 = w3 - w1;
        let w1e13 = w1.dot(e13);
        let w3e13 = w3.dot(e13);
        let d13_1 = w3e13;
        let d13_2 = -w1e13;

        let e23 = w3 - w2;
        let w2e23 = w2.dot(e23);
        let w3e23 = w3.dot(e23);
        let d23_1 = w3e23;
        let d23_2 = -w2e23;

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        // Vertex regions.
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[0] = self.v[2];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // Edge regions.
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.v[1] = self.v[2];
            self.count = 2;
            return;
        }
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.v[0] = self.v[1];
            self.v[1] = self.v[2];
            self.count = 2;
            return;
        }

        // Interior: the origin is enclosed.
        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

/// Computes the closest points between two convex proxies.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    let mut iterations = 0;
    // Support indices from the previous iteration, to detect cycling.
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    while iterations < GJK_MAX_ITERATIONS {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // Triangle containing the origin: overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin sits on a simplex feature. Touching, not
            // penetrating; the witness points below are still valid.
            break;
        }

        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = proxy_a.support(xf_a.q.apply_inverse(-d));
        vertex.w_a = xf_a.apply(proxy_a.vertex(vertex.index_a));
        vertex.index_b = proxy_b.support(xf_b.q.apply_inverse(d));
        vertex.w_b = xf_b.apply(proxy_b.vertex(vertex.index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        iterations += 1;

        // Main termination: the new support is not new.
        let mut duplicate = false;
        for i in 0..save_count {
            if vertex.index_a == save_a[i] && vertex.index_b == save_b[i] {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            break;
        }

        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = simplex.closest_point().length();
    if simplex.count == 3 {
        dist = 0.0;
    }
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;

        if dist > r_a + r_b && dist > f32::EPSILON {
            // Shapes are separated; move the witness points to the skins.
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // Skins overlap: report the midpoint as both witnesses.
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::Shape;
    use approx::assert_relative_eq;

    fn query(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform) -> DistanceOutput {
        let mut cache = SimplexCache::default();
        distance(
            &mut cache,
            &DistanceInput {
                proxy_a: DistanceProxy::new(shape_a),
                proxy_b: DistanceProxy::new(shape_b),
                transform_a: xf_a,
                transform_b: xf_b,
                use_radii: true,
            },
        )
    }

    #[test]
    fn separated_circles_report_gap() {
        let a = Shape::circle(1.0);
        let b = Shape::circle(1.0);
        let out = query(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(glam::Vec2::new(5.0, 0.0), 0.0),
        );
        assert_relative_eq!(out.distance, 3.0, epsilon = 1e-5);
        assert_relative_eq!(out.point_a.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(out.point_b.x, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn separated_boxes_report_face_gap() {
        let a = Shape::rect(1.0, 1.0);
        let b = Shape::rect(1.0, 1.0);
        let out = query(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(glam::Vec2::new(3.0, 0.0), 0.0),
        );
        // Gap of 1.0 between cores, minus both polygon skins.
        assert_relative_eq!(
            out.distance,
            1.0 - 2.0 * crate::config::POLYGON_RADIUS,
            epsilon = 1e-4
        );
    }

    #[test]
    fn overlapping_shapes_report_zero() {
        let a = Shape::rect(1.0, 1.0);
        let b = Shape::circle(1.0);
        let out = query(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(glam::Vec2::new(0.5, 0.0), 0.0),
        );
        assert_eq!(out.distance, 0.0);
    }
}
