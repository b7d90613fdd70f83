use crate::{
    collision::{
        distance::{distance, DistanceInput, DistanceProxy, SimplexCache},
        narrowphase::{
            collide_circles, collide_polygon_and_circle, collide_polygons, Manifold,
        },
        shapes::Shape,
    },
    core::{
        fixture::{Fixture, FixtureHandle},
        rigidbody::{BodyHandle, RigidBody},
        types::{Material, Transform},
    },
    utils::allocator::{Arena, Handle},
    world::ContactListener,
};

pub type ContactHandle = Handle<Contact>;

/// Persistent pairing of two fixtures whose fattened AABBs overlap in the
/// broad-phase. Exists regardless of whether the shapes currently touch;
/// `touching` tracks the narrow-phase state.
#[derive(Debug, Clone)]
pub struct Contact {
    pub fixture_a: FixtureHandle,
    pub fixture_b: FixtureHandle,
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub child_a: usize,
    pub child_b: usize,
    pub manifold: Manifold,

    /// Mixed from the two fixtures' materials.
    pub friction: f32,
    pub restitution: f32,

    pub touching: bool,
    /// Cleared by `pre_solve` listeners to skip the solver this step.
    pub enabled: bool,
    /// Set when a fixture's filter changed; re-checked by the manager.
    pub filter_dirty: bool,
    /// Island traversal scratch flag.
    pub island: bool,

    /// Cached time-of-impact fraction for this step.
    pub toi: f32,
    pub toi_valid: bool,
    /// Continuous sub-steps consumed by this contact in the current step.
    pub toi_count: u32,
}

impl Contact {
    pub fn new(
        fixture_a: FixtureHandle,
        fixture_b: FixtureHandle,
        child_a: usize,
        child_b: usize,
        fixtures: &Arena<Fixture>,
    ) -> Self {
        let mat_a = fixtures.get(fixture_a).map(|f| f.material).unwrap_or_default();
        let mat_b = fixtures.get(fixture_b).map(|f| f.material).unwrap_or_default();
        let body_a = fixtures.get(fixture_a).map(|f| f.body).expect("fixture A is live");
        let body_b = fixtures.get(fixture_b).map(|f| f.body).expect("fixture B is live");

        Self {
            fixture_a,
            fixture_b,
            body_a,
            body_b,
            child_a,
            child_b,
            manifold: Manifold::default(),
            friction: Material::mix_friction(mat_a.friction, mat_b.friction),
            restitution: Material::mix_restitution(mat_a.restitution, mat_b.restitution),
            touching: false,
            enabled: true,
            filter_dirty: false,
            island: false,
            toi: 0.0,
            toi_valid: false,
            toi_count: 0,
        }
    }

    pub fn other_body(&self, body: BodyHandle) -> BodyHandle {
        if self.body_a == body {
            self.body_b
        } else {
            self.body_a
        }
    }

    /// Computes the manifold for the current shape transforms. Pure dispatch
    /// on the shape-kind pair; circle–polygon is evaluated with the polygon
    /// as A and the result carries the flip in its feature ids.
    pub fn evaluate(&self, shape_a: &Shape, xf_a: &Transform, shape_b: &Shape, xf_b: &Transform) -> Manifold {
        match (shape_a, shape_b) {
            (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
            (Shape::Circle(_), Shape::Polygon(_)) => {
                // The manager orders fixtures so this pairing does not occur;
                // evaluate defensively by swapping and mirroring.
                let mut m = self.evaluate(shape_b, xf_b, shape_a, xf_a);
                for p in m.points.iter_mut().take(m.point_count) {
                    p.feature = p.feature.swapped();
                }
                m.manifold_type = match m.manifold_type {
                    crate::collision::narrowphase::ManifoldType::FaceA => {
                        crate::collision::narrowphase::ManifoldType::FaceB
                    }
                    other => other,
                };
                m
            }
            (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        }
    }

    /// Recomputes the manifold, merges cached impulses across matching
    /// feature ids, updates the touching state, and raises begin/end and
    /// pre-solve notifications.
    pub fn update(
        &mut self,
        handle: ContactHandle,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        listener: &mut dyn ContactListener,
    ) {
        let old_manifold = self.manifold;
        let was_touching = self.touching;

        // Re-enable: a pre-solve veto only lasts one step.
        self.enabled = true;

        let (fixture_a, fixture_b) = match (fixtures.get(self.fixture_a), fixtures.get(self.fixture_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };
        let sensor = fixture_a.is_sensor || fixture_b.is_sensor;

        let (xf_a, xf_b) = {
            let body_a = bodies.get(fixture_a.body);
            let body_b = bodies.get(fixture_b.body);
            match (body_a, body_b) {
                (Some(a), Some(b)) => (*a.transform(), *b.transform()),
                _ => return,
            }
        };

        let touching;
        if sensor {
            // Sensors report overlap but never generate solver manifolds.
            let mut cache = SimplexCache::default();
            let output = distance(
                &mut cache,
                &DistanceInput {
                    proxy_a: DistanceProxy::new(&fixture_a.shape),
                    proxy_b: DistanceProxy::new(&fixture_b.shape),
                    transform_a: xf_a,
                    transform_b: xf_b,
                    use_radii: true,
                },
            );
            touching = output.distance < 10.0 * f32::EPSILON;
            self.manifold.point_count = 0;
        } else {
            let mut manifold = self.evaluate(&fixture_a.shape, &xf_a, &fixture_b.shape, &xf_b);
            touching = manifold.point_count > 0;

            // Warm starting: carry impulses to points with matching features.
            for point in manifold.points.iter_mut().take(manifold.point_count) {
                for old_point in old_manifold.points.iter().take(old_manifold.point_count) {
                    if old_point.feature == point.feature {
                        point.normal_impulse = old_point.normal_impulse;
                        point.tangent_impulse = old_point.tangent_impulse;
                        break;
                    }
                }
            }

            self.manifold = manifold;

            if touching != was_touching {
                if let Some(body) = bodies.get_mut(fixture_a.body) {
                    body.set_awake(true);
                }
                if let Some(body) = bodies.get_mut(fixture_b.body) {
                    body.set_awake(true);
                }
            }
        }

        self.touching = touching;

        if !was_touching && touching {
            listener.begin_contact(handle, self);
        }
        if was_touching && !touching {
            listener.end_contact(handle, self);
        }
        if !sensor && touching {
            listener.pre_solve(handle, self, &old_manifold);
        }
    }
}
