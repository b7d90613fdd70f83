//! Narrow-phase manifold generation between convex shapes.
//!
//! All functions here are stateless: given two shapes and their transforms
//! they produce a [`Manifold`] in local coordinates. [`WorldManifold`] maps a
//! manifold into world space for the solver. Contact points carry stable
//! feature ids so cached impulses can follow them between steps.

use glam::Vec2;

use crate::{
    collision::{
        clipping::{clip_segment_to_line, ClipVertex},
        shapes::{CircleShape, PolygonShape},
    },
    config::{LINEAR_SLOP, MAX_MANIFOLD_POINTS},
    core::types::Transform,
};

/// The shape feature (face or vertex) a contact point was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FeatureKind {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// Identifies the pair of features that produced a contact point. Two points
/// with equal features are the "same" contact across frames, so the solver
/// may reuse the accumulated impulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContactFeature {
    pub index_a: u8,
    pub index_b: u8,
    pub kind_a: FeatureKind,
    pub kind_b: FeatureKind,
}

impl ContactFeature {
    /// Swaps the A/B roles, used when the shape order is flipped.
    pub fn swapped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            kind_a: self.kind_b,
            kind_b: self.kind_a,
        }
    }
}

/// How the manifold's local data is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifoldType {
    /// `local_point` is the center of circle A; points hold circle B's center.
    #[default]
    Circles,
    /// `local_normal`/`local_point` live on face A; points live in B's frame.
    FaceA,
    /// `local_normal`/`local_point` live on face B; points live in A's frame.
    FaceB,
}

/// A single contact point with its accumulated solver impulses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifoldPoint {
    /// Anchor point, in the frame indicated by the manifold type.
    pub local_point: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub feature: ContactFeature,
}

/// Up to two contact points sharing one normal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    pub point_count: usize,
}

/// World-space view of a manifold: unit normal from A to B, world contact
/// points, and per-point separations (negative inside the combined skin).
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldManifold {
    pub normal: Vec2,
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    pub fn initialize(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = WorldManifold::default();
        if manifold.point_count == 0 {
            return out;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                out.normal = Vec2::X;
                let point_a = xf_a.apply(manifold.local_point);
                let point_b = xf_b.apply(manifold.points[0].local_point);
                if point_a.distance_squared(point_b) > f32::EPSILON * f32::EPSILON {
                    out.normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + radius_a * out.normal;
                let c_b = point_b - radius_b * out.normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(out.normal);
            }
            ManifoldType::FaceA => {
                out.normal = xf_a.q.apply(manifold.local_normal);
                let plane_point = xf_a.apply(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_b.apply(manifold.points[i].local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_b = clip_point - radius_b * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(out.normal);
                }
            }
            ManifoldType::FaceB => {
                out.normal = xf_b.q.apply(manifold.local_normal);
                let plane_point = xf_b.apply(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_a.apply(manifold.points[i].local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_a = clip_point - radius_a * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(out.normal);
                }

                // Ensure the normal points from A to B.
                out.normal = -out.normal;
            }
        }

        out
    }
}

/// Circle–circle manifold: at most one point.
pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.center);
    let p_b = xf_b.apply(circle_b.center);
    let d = p_b - p_a;
    let r = circle_a.radius + circle_b.radius;
    if d.length_squared() > r * r {
        return manifold;
    }

    manifold.manifold_type = ManifoldType::Circles;
    manifold.local_point = circle_a.center;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.center;
    manifold.points[0].feature = ContactFeature::default();
    manifold
}

/// Polygon–circle manifold via the circle center's closest feature.
pub fn collide_polygon_and_circle(
    polygon: &PolygonShape,
    xf_a: &Transform,
    circle: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the polygon's frame.
    let c = xf_b.apply(circle.center);
    let c_local = xf_a.apply_inverse(c);

    let total_radius = polygon.radius + circle.radius;

    // Face of maximum separation.
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for i in 0..polygon.count {
        let s = polygon.normals[i].dot(c_local - polygon.vertices[i]);
        if s > total_radius {
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let i1 = normal_index;
    let i2 = (i1 + 1) % polygon.count;
    let v1 = polygon.vertices[i1];
    let v2 = polygon.vertices[i2];

    // Center inside the polygon: the face normal is the best direction.
    if separation < f32::EPSILON {
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = polygon.normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        manifold.points[0].local_point = circle.center;
        manifold.points[0].feature = ContactFeature::default();
        return manifold;
    }

    // Voronoi regions of the reference edge.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > total_radius * total_radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = (c_local - v1).normalize();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > total_radius * total_radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = (c_local - v2).normalize();
        manifold.local_point = v2;
    } else {
        let face_center = 0.5 * (v1 + v2);
        if (c_local - face_center).dot(polygon.normals[i1]) > total_radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = polygon.normals[i1];
        manifold.local_point = face_center;
    }

    manifold.points[0].local_point = circle.center;
    manifold.points[0].feature = ContactFeature::default();
    manifold
}

/// Maximum separation of `poly2`'s hull from `poly1`'s faces, and the face
/// index achieving it.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (f32, usize) {
    // Work entirely in poly2's frame.
    let xf = xf2.mul_inverse(*xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for i in 0..poly1.count {
        let n = xf.q.apply(poly1.normals[i]);
        let v1 = xf.apply(poly1.vertices[i]);

        let mut si = f32::MAX;
        for j in 0..poly2.count {
            let sij = n.dot(poly2.vertices[j] - v1);
            si = si.min(sij);
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (max_separation, best_index)
}

/// The incident edge on `poly2` most anti-parallel to `poly1`'s reference
/// face normal.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    debug_assert!(edge1 < poly1.count);

    let normal1 = xf2.q.apply_inverse(xf1.q.apply(poly1.normals[edge1]));

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..poly2.count {
        let dot = normal1.dot(poly2.normals[i]);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (i1 + 1) % poly2.count;

    [
        ClipVertex {
            v: xf2.apply(poly2.vertices[i1]),
            feature: ContactFeature {
                index_a: edge1 as u8,
                index_b: i1 as u8,
                kind_a: FeatureKind::Face,
                kind_b: FeatureKind::Vertex,
            },
        },
        ClipVertex {
            v: xf2.apply(poly2.vertices[i2]),
            feature: ContactFeature {
                index_a: edge1 as u8,
                index_b: i2 as u8,
                kind_a: FeatureKind::Face,
                kind_b: FeatureKind::Vertex,
            },
        },
    ]
}

/// Polygon–polygon manifold: SAT over both polygons' face normals, then the
/// incident edge is clipped against the reference edge's side planes.
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (separation_a, edge_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (separation_b, edge_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    // Hysteresis on the reference-face choice keeps the manifold from
    // flip-flopping (and losing warm-start ids) under jitter.
    const RELATIVE_TOL: f32 = 0.98;
    const ABSOLUTE_TOL: f32 = 0.1 * LINEAR_SLOP;

    let (poly1, poly2, xf1, xf2, edge1, flip) =
        if separation_b > RELATIVE_TOL * separation_a + ABSOLUTE_TOL {
            (poly_b, poly_a, xf_b, xf_a, edge_b, true)
        } else {
            (poly_a, poly_b, xf_a, xf_b, edge_a, false)
        };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let iv1 = edge1;
    let iv2 = (edge1 + 1) % poly1.count;
    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = Vec2::new(local_tangent.y, -local_tangent.x);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.apply(local_tangent);
    let normal = Vec2::new(tangent.y, -tangent.x);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    let front_offset = normal.dot(v11);
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    if clip_segment_to_line(&mut clip_points1, &incident_edge, -tangent, side_offset1, iv1) < 2 {
        return manifold;
    }
    if clip_segment_to_line(&mut clip_points2, &clip_points1, tangent, side_offset2, iv2) < 2 {
        return manifold;
    }

    manifold.manifold_type = if flip {
        ManifoldType::FaceB
    } else {
        ManifoldType::FaceA
    };
    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for clip in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_inverse(clip.v);
            cp.feature = if flip {
                clip.feature.swapped()
            } else {
                clip.feature
            };
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::{CircleShape, PolygonShape};
    use approx::assert_relative_eq;
    use glam::Vec2;

    #[test]
    fn overlapping_circles_make_one_point() {
        let a = CircleShape::new(1.0);
        let b = CircleShape::new(1.0);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);

        let m = collide_circles(&a, &xf_a, &b, &xf_b);
        assert_eq!(m.point_count, 1);

        let wm = WorldManifold::initialize(&m, &xf_a, a.radius, &xf_b, b.radius);
        assert_relative_eq!(wm.normal.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(wm.separations[0], -0.5, epsilon = 1e-6);
    }

    #[test]
    fn separated_circles_make_no_points() {
        let a = CircleShape::new(1.0);
        let b = CircleShape::new(1.0);
        let m = collide_circles(
            &a,
            &Transform::IDENTITY,
            &b,
            &Transform::new(Vec2::new(3.0, 0.0), 0.0),
        );
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn stacked_boxes_make_two_points() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(1.0, 1.0);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, 1.98), 0.0);

        let m = collide_polygons(&a, &xf_a, &b, &xf_b);
        assert_eq!(m.point_count, 2);

        let wm = WorldManifold::initialize(&m, &xf_a, a.radius, &xf_b, b.radius);
        assert_relative_eq!(wm.normal.y.abs(), 1.0, epsilon = 1e-5);
        for i in 0..2 {
            assert!(wm.separations[i] < 0.0);
        }
    }

    #[test]
    fn manifold_is_symmetric_in_argument_order() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(0.5, 0.5);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.3, 0.2), 0.1);

        let m_ab = collide_polygons(&a, &xf_a, &b, &xf_b);
        let m_ba = collide_polygons(&b, &xf_b, &a, &xf_a);
        assert_eq!(m_ab.point_count, m_ba.point_count);
        assert!(m_ab.point_count > 0);

        let wm_ab = WorldManifold::initialize(&m_ab, &xf_a, a.radius, &xf_b, b.radius);
        let wm_ba = WorldManifold::initialize(&m_ba, &xf_b, b.radius, &xf_a, a.radius);

        // Same penetration depths, mirrored normals.
        assert_relative_eq!(wm_ab.normal.x, -wm_ba.normal.x, epsilon = 1e-4);
        assert_relative_eq!(wm_ab.normal.y, -wm_ba.normal.y, epsilon = 1e-4);
        let mut sep_ab: Vec<f32> = wm_ab.separations[..m_ab.point_count].to_vec();
        let mut sep_ba: Vec<f32> = wm_ba.separations[..m_ba.point_count].to_vec();
        sep_ab.sort_by(|x, y| x.partial_cmp(y).unwrap());
        sep_ba.sort_by(|x, y| x.partial_cmp(y).unwrap());
        for (sa, sb) in sep_ab.iter().zip(sep_ba.iter()) {
            assert_relative_eq!(*sa, *sb, epsilon = 1e-4);
        }
    }

    #[test]
    fn circle_against_polygon_face() {
        let poly = PolygonShape::new_box(2.0, 0.5);
        let circle = CircleShape::new(0.5);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(0.0, 0.9), 0.0);

        let m = collide_polygon_and_circle(&poly, &xf_a, &circle, &xf_b);
        assert_eq!(m.point_count, 1);

        let wm = WorldManifold::initialize(&m, &xf_a, poly.radius, &xf_b, circle.radius);
        assert_relative_eq!(wm.normal.y, 1.0, epsilon = 1e-5);
        assert!(wm.separations[0] < 0.0);
    }

    #[test]
    fn circle_against_polygon_corner_region() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(0.5);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.3, 1.3), 0.0);

        let m = collide_polygon_and_circle(&poly, &xf_a, &circle, &xf_b);
        assert_eq!(m.point_count, 1);

        let wm = WorldManifold::initialize(&m, &xf_a, poly.radius, &xf_b, circle.radius);
        // Corner contact: normal points along the diagonal.
        assert_relative_eq!(wm.normal.x, wm.normal.y, epsilon = 1e-5);
    }
}
