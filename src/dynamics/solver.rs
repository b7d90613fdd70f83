//! Sequential-impulse contact solver.
//!
//! Velocity constraints apply accumulated, clamped impulses per contact
//! point (normal ≥ 0, friction bounded by μ × normal). The position solver
//! is a separate Baumgarte-style pass over the manifolds that removes
//! residual penetration without injecting energy into velocities.

use glam::Vec2;

use crate::{
    collision::{
        contact::ContactHandle,
        narrowphase::{Manifold, ManifoldType, WorldManifold},
    },
    config::{
        CONTACT_BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
        VELOCITY_THRESHOLD,
    },
    core::types::Transform,
    dynamics::integrator::{PositionState, TimeStep, VelocityState},
    utils::math::{cross, cross_sv},
};

/// Solver impulses applied at a contact during one step, reported through
/// `post_solve` so consumers can meter impact strength (e.g. breakage).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Snapshot of one contact taken when its island is extracted. The solver
/// works on this copy; impulses are written back to the live contact after
/// the island completes.
#[derive(Debug, Clone)]
pub struct IslandContact {
    pub handle: ContactHandle,
    pub manifold: Manifold,
    pub friction: f32,
    pub restitution: f32,
    pub index_a: usize,
    pub index_b: usize,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub radius_a: f32,
    pub radius_b: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct VelocityConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
}

#[derive(Debug, Clone)]
struct ContactVelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    friction: f32,
    restitution: f32,
    point_count: usize,
    contact_index: usize,
}

#[derive(Debug, Clone)]
struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    manifold_type: ManifoldType,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

/// Contact constraint batch for one island.
pub struct ContactSolver {
    velocity_constraints: Vec<ContactVelocityConstraint>,
    position_constraints: Vec<ContactPositionConstraint>,
}

impl ContactSolver {
    /// Builds constraints from the island's contact snapshots. Warm-start
    /// impulses are carried over from the manifolds, scaled by the timestep
    /// ratio.
    pub fn new(step: &TimeStep, contacts: &[IslandContact]) -> Self {
        let mut velocity_constraints = Vec::with_capacity(contacts.len());
        let mut position_constraints = Vec::with_capacity(contacts.len());

        for (contact_index, contact) in contacts.iter().enumerate() {
            let manifold = &contact.manifold;
            debug_assert!(manifold.point_count > 0);

            let mut vc = ContactVelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::ZERO,
                index_a: contact.index_a,
                index_b: contact.index_b,
                inv_mass_a: contact.inv_mass_a,
                inv_mass_b: contact.inv_mass_b,
                inv_i_a: contact.inv_i_a,
                inv_i_b: contact.inv_i_b,
                friction: contact.friction,
                restitution: contact.restitution,
                point_count: manifold.point_count,
                contact_index,
            };
            let mut pc = ContactPositionConstraint {
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                index_a: contact.index_a,
                index_b: contact.index_b,
                inv_mass_a: contact.inv_mass_a,
                inv_mass_b: contact.inv_mass_b,
                inv_i_a: contact.inv_i_a,
                inv_i_b: contact.inv_i_b,
                local_center_a: contact.local_center_a,
                local_center_b: contact.local_center_b,
                manifold_type: manifold.manifold_type,
                radius_a: contact.radius_a,
                radius_b: contact.radius_b,
                point_count: manifold.point_count,
            };

            for i in 0..manifold.point_count {
                let mp = &manifold.points[i];
                if step.warm_starting {
                    vc.points[i].normal_impulse = step.dt_ratio * mp.normal_impulse;
                    vc.points[i].tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
                pc.local_points[i] = mp.local_point;
            }

            velocity_constraints.push(vc);
            position_constraints.push(pc);
        }

        Self {
            velocity_constraints,
            position_constraints,
        }
    }

    /// Computes the position-dependent parts of the velocity constraints:
    /// world manifold, contact arms, effective masses, restitution bias.
    pub fn initialize_velocity_constraints(
        &mut self,
        contacts: &[IslandContact],
        positions: &[PositionState],
        velocities: &[VelocityState],
    ) {
        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(self.position_constraints.iter())
        {
            let manifold = &contacts[vc.contact_index].manifold;

            let xf_a = solver_transform(&positions[vc.index_a], pc.local_center_a);
            let xf_b = solver_transform(&positions[vc.index_b], pc.local_center_b);

            let world_manifold =
                WorldManifold::initialize(manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);
            vc.normal = world_manifold.normal;
            let tangent = cross_vs_unit(vc.normal);

            let c_a = positions[vc.index_a].c;
            let c_b = positions[vc.index_b].c;
            let v_a = velocities[vc.index_a];
            let v_b = velocities[vc.index_b];

            for i in 0..vc.point_count {
                let vcp = &mut vc.points[i];

                vcp.r_a = world_manifold.points[i] - c_a;
                vcp.r_b = world_manifold.points[i] - c_b;

                let rn_a = cross(vcp.r_a, vc.normal);
                let rn_b = cross(vcp.r_b, vc.normal);
                let k_normal = vc.inv_mass_a
                    + vc.inv_mass_b
                    + vc.inv_i_a * rn_a * rn_a
                    + vc.inv_i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross(vcp.r_a, tangent);
                let rt_b = cross(vcp.r_b, tangent);
                let k_tangent = vc.inv_mass_a
                    + vc.inv_mass_b
                    + vc.inv_i_a * rt_a * rt_a
                    + vc.inv_i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Restitution bias below the threshold is dropped so resting
                // contact does not jitter.
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b.v + cross_sv(v_b.w, vcp.r_b) - v_a.v - cross_sv(v_a.w, vcp.r_a),
                );
                if v_rel < -VELOCITY_THRESHOLD {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }
        }
    }

    /// Applies the cached impulses before the first iteration.
    pub fn warm_start(&mut self, velocities: &mut [VelocityState]) {
        for vc in &self.velocity_constraints {
            let tangent = cross_vs_unit(vc.normal);

            for vcp in vc.points.iter().take(vc.point_count) {
                let p = vcp.normal_impulse * vc.normal + vcp.tangent_impulse * tangent;
                velocities[vc.index_a].v -= vc.inv_mass_a * p;
                velocities[vc.index_a].w -= vc.inv_i_a * cross(vcp.r_a, p);
                velocities[vc.index_b].v += vc.inv_mass_b * p;
                velocities[vc.index_b].w += vc.inv_i_b * cross(vcp.r_b, p);
            }
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [VelocityState]) {
        for vc in &mut self.velocity_constraints {
            let mut v_a = velocities[vc.index_a];
            let mut v_b = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = cross_vs_unit(normal);
            let friction = vc.friction;

            // Tangent first: non-penetration is more important, so the
            // normal solve gets the last word.
            for vcp in vc.points.iter_mut().take(vc.point_count) {
                let dv = v_b.v + cross_sv(v_b.w, vcp.r_b) - v_a.v - cross_sv(v_a.w, vcp.r_a);

                let vt = dv.dot(tangent);
                let mut lambda = vcp.tangent_mass * (-vt);

                // Coulomb friction bounded by the accumulated normal impulse.
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                let p = lambda * tangent;
                v_a.v -= vc.inv_mass_a * p;
                v_a.w -= vc.inv_i_a * cross(vcp.r_a, p);
                v_b.v += vc.inv_mass_b * p;
                v_b.w += vc.inv_i_b * cross(vcp.r_b, p);
            }

            for vcp in vc.points.iter_mut().take(vc.point_count) {
                let dv = v_b.v + cross_sv(v_b.w, vcp.r_b) - v_a.v - cross_sv(v_a.w, vcp.r_a);

                let vn = dv.dot(normal);
                let mut lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                // Accumulated impulse clamped at zero: contacts only push.
                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;

                let p = lambda * normal;
                v_a.v -= vc.inv_mass_a * p;
                v_a.w -= vc.inv_i_a * cross(vcp.r_a, p);
                v_b.v += vc.inv_mass_b * p;
                v_b.w += vc.inv_i_b * cross(vcp.r_b, p);
            }

            velocities[vc.index_a] = v_a;
            velocities[vc.index_b] = v_b;
        }
    }

    /// Writes accumulated impulses back into the manifolds for next-step
    /// warm starting.
    pub fn store_impulses(&self, contacts: &mut [IslandContact]) {
        for vc in &self.velocity_constraints {
            let manifold = &mut contacts[vc.contact_index].manifold;
            for i in 0..vc.point_count {
                manifold.points[i].normal_impulse = vc.points[i].normal_impulse;
                manifold.points[i].tangent_impulse = vc.points[i].tangent_impulse;
            }
        }
    }

    /// Impulse summary for `post_solve` reporting.
    pub fn impulse_for(&self, contact_index: usize) -> ContactImpulse {
        let mut impulse = ContactImpulse::default();
        if let Some(vc) = self
            .velocity_constraints
            .iter()
            .find(|vc| vc.contact_index == contact_index)
        {
            impulse.count = vc.point_count;
            for i in 0..vc.point_count {
                impulse.normal_impulses[i] = vc.points[i].normal_impulse;
                impulse.tangent_impulses[i] = vc.points[i].tangent_impulse;
            }
        }
        impulse
    }

    /// Discrete position correction. Returns true when every tracked
    /// separation is within tolerance of the slop.
    pub fn solve_position_constraints(&mut self, positions: &mut [PositionState]) -> bool {
        self.solve_positions(positions, None)
    }

    /// TOI position correction: only the two sub-step bodies receive mass;
    /// everything else in the sub-island acts as infinite-mass scenery.
    pub fn solve_toi_position_constraints(
        &mut self,
        positions: &mut [PositionState],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        self.solve_positions(positions, Some((toi_index_a, toi_index_b)))
    }

    fn solve_positions(
        &mut self,
        positions: &mut [PositionState],
        toi_indices: Option<(usize, usize)>,
    ) -> bool {
        let baumgarte = if toi_indices.is_some() {
            TOI_BAUMGARTE
        } else {
            CONTACT_BAUMGARTE
        };

        let mut min_separation = 0.0_f32;

        for pc in &self.position_constraints {
            let (m_a, i_a, m_b, i_b) = match toi_indices {
                None => (pc.inv_mass_a, pc.inv_i_a, pc.inv_mass_b, pc.inv_i_b),
                Some((toi_a, toi_b)) => {
                    let active_a = pc.index_a == toi_a || pc.index_a == toi_b;
                    let active_b = pc.index_b == toi_a || pc.index_b == toi_b;
                    (
                        if active_a { pc.inv_mass_a } else { 0.0 },
                        if active_a { pc.inv_i_a } else { 0.0 },
                        if active_b { pc.inv_mass_b } else { 0.0 },
                        if active_b { pc.inv_i_b } else { 0.0 },
                    )
                }
            };

            let mut c_a = positions[pc.index_a].c;
            let mut a_a = positions[pc.index_a].a;
            let mut c_b = positions[pc.index_b].c;
            let mut a_b = positions[pc.index_b].a;

            for point_index in 0..pc.point_count {
                let xf_a = solver_transform(
                    &PositionState { c: c_a, a: a_a },
                    pc.local_center_a,
                );
                let xf_b = solver_transform(
                    &PositionState { c: c_b, a: a_b },
                    pc.local_center_b,
                );

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, point_index);
                let normal = psm.normal;
                let point = psm.point;
                let separation = psm.separation;

                let r_a = point - c_a;
                let r_b = point - c_b;

                min_separation = min_separation.min(separation);

                // Clamp the correction: allow slop, prevent overshoot.
                let c = (baumgarte * (separation + LINEAR_SLOP))
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let rn_a = cross(r_a, normal);
                let rn_b = cross(r_b, normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = impulse * normal;

                c_a -= m_a * p;
                a_a -= i_a * cross(r_a, p);
                c_b += m_b * p;
                a_b += i_b * cross(r_b, p);
            }

            positions[pc.index_a] = PositionState { c: c_a, a: a_a };
            positions[pc.index_b] = PositionState { c: c_b, a: a_b };
        }

        // Separation is not pushed all the way to the slop, so accept 3x.
        min_separation >= -3.0 * LINEAR_SLOP
    }
}

/// Body transform reconstructed from a solver position state.
fn solver_transform(position: &PositionState, local_center: Vec2) -> Transform {
    let mut xf = Transform::new(Vec2::ZERO, position.a);
    xf.p = position.c - xf.q.apply(local_center);
    xf
}

/// Tangent = cross(normal, 1).
#[inline]
fn cross_vs_unit(normal: Vec2) -> Vec2 {
    Vec2::new(normal.y, -normal.x)
}

/// World normal/point/separation for one manifold point during position
/// solving, re-derived from the local manifold at the current transforms.
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(
        pc: &ContactPositionConstraint,
        xf_a: &Transform,
        xf_b: &Transform,
        index: usize,
    ) -> Self {
        debug_assert!(pc.point_count > 0);

        match pc.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(pc.local_point);
                let point_b = xf_b.apply(pc.local_points[0]);
                let normal = (point_b - point_a).normalize_or_zero();
                Self {
                    normal,
                    point: 0.5 * (point_a + point_b),
                    separation: (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q.apply(pc.local_normal);
                let plane_point = xf_a.apply(pc.local_point);
                let clip_point = xf_b.apply(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal)
                        - pc.radius_a
                        - pc.radius_b,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q.apply(pc.local_normal);
                let plane_point = xf_b.apply(pc.local_point);
                let clip_point = xf_a.apply(pc.local_points[index]);
                Self {
                    // Flip so the normal points from A to B.
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal)
                        - pc.radius_a
                        - pc.radius_b,
                }
            }
        }
    }
}
