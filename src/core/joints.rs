//! Joint constraints. A closed set of joint kinds dispatched by `match`;
//! every kind contributes velocity-constraint rows to the island solver the
//! same way contacts do, plus a positional correction pass.
//!
//! Joints never fail: motors and limits clamp their impulses against a
//! per-step budget (`max force × dt`) instead of erroring.

use glam::Vec2;

use crate::{
    config::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION, MAX_LINEAR_CORRECTION},
    core::rigidbody::{BodyHandle, RigidBody},
    dynamics::integrator::{PositionState, TimeStep, VelocityState},
    utils::{
        allocator::Handle,
        math::{cross, cross_sv, solve22, Rot},
    },
};

pub type JointHandle = Handle<Joint>;

/// Limit activation state for joints with lower/upper bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    Equal,
}

/// Per-body constants bound into the joint when its island is extracted.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SolverBodies {
    pub index_a: usize,
    pub index_b: usize,
    pub local_center_a: Vec2,
    pub local_center_b: Vec2,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_i_a: f32,
    pub inv_i_b: f32,
}

/// A constraint between two bodies. "Fixed" variants anchored to the world
/// are expressed by using the world's ground body as `body_b`.
#[derive(Debug, Clone)]
pub struct Joint {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub collide_connected: bool,
    pub kind: JointKind,
    /// Island traversal scratch flag.
    pub(crate) island: bool,
    pub(crate) solver: SolverBodies,
}

#[derive(Debug, Clone)]
pub enum JointKind {
    Distance(DistanceJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Weld(WeldJoint),
    Pulley(PulleyJoint),
    Gear(GearJoint),
    Friction(FrictionJoint),
    Wheel(WheelJoint),
    Rope(RopeJoint),
}

impl Joint {
    pub(crate) fn new(
        body_a: BodyHandle,
        body_b: BodyHandle,
        collide_connected: bool,
        kind: JointKind,
    ) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected,
            kind,
            island: false,
            solver: SolverBodies::default(),
        }
    }

    /// Binds island-local indices and mass constants before solving.
    pub(crate) fn bind(&mut self, body_a: &RigidBody, body_b: &RigidBody) {
        self.solver = SolverBodies {
            index_a: body_a.island_index,
            index_b: body_b.island_index,
            local_center_a: body_a.local_center(),
            local_center_b: body_b.local_center(),
            inv_mass_a: body_a.inv_mass(),
            inv_mass_b: body_b.inv_mass(),
            inv_i_a: body_a.inv_inertia(),
            inv_i_b: body_b.inv_inertia(),
        };
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let sb = self.solver;
        match &mut self.kind {
            JointKind::Distance(j) => j.init(&sb, step, positions, velocities),
            JointKind::Revolute(j) => j.init(&sb, step, positions, velocities),
            JointKind::Prismatic(j) => j.init(&sb, step, positions, velocities),
            JointKind::Weld(j) => j.init(&sb, step, positions, velocities),
            JointKind::Pulley(j) => j.init(&sb, step, positions, velocities),
            JointKind::Gear(j) => j.init(&sb, step, positions, velocities),
            JointKind::Friction(j) => j.init(&sb, step, positions, velocities),
            JointKind::Wheel(j) => j.init(&sb, step, positions, velocities),
            JointKind::Rope(j) => j.init(&sb, step, positions, velocities),
        }
    }

    pub(crate) fn solve_velocity_constraints(
        &mut self,
        step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let sb = self.solver;
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Revolute(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Prismatic(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Weld(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Pulley(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Gear(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Friction(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Wheel(j) => j.solve_velocity(&sb, step, velocities),
            JointKind::Rope(j) => j.solve_velocity(&sb, step, velocities),
        }
    }

    /// Returns true when the positional error is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, positions: &mut [PositionState]) -> bool {
        let sb = self.solver;
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_position(&sb, positions),
            JointKind::Revolute(j) => j.solve_position(&sb, positions),
            JointKind::Prismatic(j) => j.solve_position(&sb, positions),
            JointKind::Weld(j) => j.solve_position(&sb, positions),
            JointKind::Pulley(j) => j.solve_position(&sb, positions),
            JointKind::Gear(j) => j.solve_position(&sb, positions),
            JointKind::Friction(j) => j.solve_position(&sb, positions),
            JointKind::Wheel(j) => j.solve_position(&sb, positions),
            JointKind::Rope(j) => j.solve_position(&sb, positions),
        }
    }

    /// World-space anchor on body A, given that body's current state.
    pub fn anchor_a(&self, body_a: &RigidBody) -> Vec2 {
        body_a.transform().apply(self.local_anchor_a())
    }

    pub fn anchor_b(&self, body_b: &RigidBody) -> Vec2 {
        body_b.transform().apply(self.local_anchor_b())
    }

    fn local_anchor_a(&self) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.local_anchor_a,
            JointKind::Revolute(j) => j.local_anchor_a,
            JointKind::Prismatic(j) => j.local_anchor_a,
            JointKind::Weld(j) => j.local_anchor_a,
            JointKind::Pulley(j) => j.local_anchor_a,
            JointKind::Gear(_) => Vec2::ZERO,
            JointKind::Friction(j) => j.local_anchor_a,
            JointKind::Wheel(j) => j.local_anchor_a,
            JointKind::Rope(j) => j.local_anchor_a,
        }
    }

    fn local_anchor_b(&self) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.local_anchor_b,
            JointKind::Revolute(j) => j.local_anchor_b,
            JointKind::Prismatic(j) => j.local_anchor_b,
            JointKind::Weld(j) => j.local_anchor_b,
            JointKind::Pulley(j) => j.local_anchor_b,
            JointKind::Gear(_) => Vec2::ZERO,
            JointKind::Friction(j) => j.local_anchor_b,
            JointKind::Wheel(j) => j.local_anchor_b,
            JointKind::Rope(j) => j.local_anchor_b,
        }
    }
}

// ---------------------------------------------------------------------------
// Distance
// ---------------------------------------------------------------------------

/// Keeps two anchor points at a fixed distance. A non-zero frequency turns
/// the constraint into a damped spring.
#[derive(Debug, Clone)]
pub struct DistanceJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length: f32,
    pub frequency_hz: f32,
    pub damping_ratio: f32,

    impulse: f32,
    gamma: f32,
    bias: f32,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl DistanceJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, length: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            length: length.max(LINEAR_SLOP),
            frequency_hz: 0.0,
            damping_ratio: 0.0,
            impulse: 0.0,
            gamma: 0.0,
            bias: 0.0,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
        }
    }

    pub fn with_spring(mut self, frequency_hz: f32, damping_ratio: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        self.u = pb.c + self.r_b - pa.c - self.r_a;

        let length = self.u.length();
        if length > LINEAR_SLOP {
            self.u /= length;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr_a = cross(self.r_a, self.u);
        let cr_b = cross(self.r_b, self.u);
        let mut inv_mass =
            sb.inv_mass_a + sb.inv_i_a * cr_a * cr_a + sb.inv_mass_b + sb.inv_i_b * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency_hz > 0.0 {
            let c = length - self.length;
            let omega = 2.0 * std::f32::consts::PI * self.frequency_hz;
            let damp = 2.0 * self.mass * self.damping_ratio * omega;
            let stiff = self.mass * omega * omega;

            let dt = step.dt;
            self.gamma = dt * (damp + dt * stiff);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * dt * stiff * self.gamma;

            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            let p = self.impulse * self.u;
            velocities[sb.index_a].v -= sb.inv_mass_a * p;
            velocities[sb.index_a].w -= sb.inv_i_a * cross(self.r_a, p);
            velocities[sb.index_b].v += sb.inv_mass_b * p;
            velocities[sb.index_b].w += sb.inv_i_b * cross(self.r_b, p);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        _step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
        let vp_a = va.v + cross_sv(va.w, self.r_a);
        let vp_b = vb.v + cross_sv(vb.w, self.r_b);
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        velocities[sb.index_a].v -= sb.inv_mass_a * p;
        velocities[sb.index_a].w -= sb.inv_i_a * cross(self.r_a, p);
        velocities[sb.index_b].v += sb.inv_mass_b * p;
        velocities[sb.index_b].w += sb.inv_i_b * cross(self.r_b, p);
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        if self.frequency_hz > 0.0 {
            // Springs have no rigid position constraint to enforce.
            return true;
        }

        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let mut u = pb.c + r_b - pa.c - r_a;

        let length = u.length();
        if length > f32::EPSILON {
            u /= length;
        }
        let c = (length - self.length).clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = impulse * u;

        positions[sb.index_a].c -= sb.inv_mass_a * p;
        positions[sb.index_a].a -= sb.inv_i_a * cross(r_a, p);
        positions[sb.index_b].c += sb.inv_mass_b * p;
        positions[sb.index_b].a += sb.inv_i_b * cross(r_b, p);

        c.abs() < LINEAR_SLOP
    }
}

// ---------------------------------------------------------------------------
// Revolute
// ---------------------------------------------------------------------------

/// Pin joint: the two anchors coincide; relative rotation is free unless
/// limited or motorized.
#[derive(Debug, Clone)]
pub struct RevoluteJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,

    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,

    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,

    impulse: Vec2,
    motor_impulse: f32,
    limit_impulse: f32,
    limit_state: LimitState,

    r_a: Vec2,
    r_b: Vec2,
    k_ex: Vec2,
    k_ey: Vec2,
    motor_mass: f32,
}

impl RevoluteJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            limit_impulse: 0.0,
            limit_state: LimitState::Inactive,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k_ex: Vec2::ZERO,
            k_ey: Vec2::ZERO,
            motor_mass: 0.0,
        }
    }

    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_angle = lower;
        self.upper_angle = upper;
        self
    }

    pub fn with_motor(mut self, motor_speed: f32, max_motor_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = motor_speed;
        self.max_motor_torque = max_motor_torque;
        self
    }

    /// Applied motor torque for the last step, for consumers metering energy.
    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        self.motor_impulse * inv_dt
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        self.k_ex = Vec2::new(
            m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
            -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
        );
        self.k_ey = Vec2::new(
            self.k_ex.y,
            m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
        );

        let motor_inv_mass = i_a + i_b;
        self.motor_mass = if motor_inv_mass > 0.0 {
            1.0 / motor_inv_mass
        } else {
            0.0
        };

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if self.enable_limit {
            let angle = pb.a - pa.a - self.reference_angle;
            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.limit_impulse = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_impulse = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.limit_impulse = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.limit_impulse *= step.dt_ratio;

            let p = self.impulse;
            let l = self.motor_impulse + self.limit_impulse;

            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * (cross(self.r_a, p) + l);
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * (cross(self.r_b, p) + l);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.limit_impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        // Motor: drive relative angular velocity toward the target, bounded
        // by the torque budget for this step.
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = velocities[sb.index_b].w - velocities[sb.index_a].w - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_torque * step.dt;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            velocities[sb.index_a].w -= i_a * impulse;
            velocities[sb.index_b].w += i_b * impulse;
        }

        // Limit: one-sided angular constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let cdot = velocities[sb.index_b].w - velocities[sb.index_a].w;
            let mut impulse = -self.motor_mass * cdot;

            match self.limit_state {
                LimitState::Equal => {
                    self.limit_impulse += impulse;
                }
                LimitState::AtLower => {
                    let new_impulse = self.limit_impulse + impulse;
                    if new_impulse < 0.0 {
                        impulse = -self.limit_impulse;
                        self.limit_impulse = 0.0;
                    } else {
                        self.limit_impulse = new_impulse;
                    }
                }
                LimitState::AtUpper => {
                    let new_impulse = self.limit_impulse + impulse;
                    if new_impulse > 0.0 {
                        impulse = -self.limit_impulse;
                        self.limit_impulse = 0.0;
                    } else {
                        self.limit_impulse = new_impulse;
                    }
                }
                LimitState::Inactive => {}
            }

            velocities[sb.index_a].w -= i_a * impulse;
            velocities[sb.index_b].w += i_b * impulse;
        }

        // Point-to-point.
        let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
        let cdot = vb.v + cross_sv(vb.w, self.r_b) - va.v - cross_sv(va.w, self.r_a);
        let impulse = solve22(self.k_ex, self.k_ey, -cdot);
        self.impulse += impulse;

        velocities[sb.index_a].v -= m_a * impulse;
        velocities[sb.index_a].w -= i_a * cross(self.r_a, impulse);
        velocities[sb.index_b].v += m_b * impulse;
        velocities[sb.index_b].w += i_b * cross(self.r_b, impulse);
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        let mut angular_error = 0.0;

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let angle = positions[sb.index_b].a - positions[sb.index_a].a - self.reference_angle;
            let mut c = 0.0;

            match self.limit_state {
                LimitState::Equal => {
                    c = (angle - self.lower_angle)
                        .clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
                }
                LimitState::AtLower => {
                    c = (angle - self.lower_angle + ANGULAR_SLOP)
                        .clamp(-MAX_ANGULAR_CORRECTION, 0.0);
                }
                LimitState::AtUpper => {
                    c = (angle - self.upper_angle - ANGULAR_SLOP)
                        .clamp(0.0, MAX_ANGULAR_CORRECTION);
                }
                LimitState::Inactive => {}
            }
            angular_error = c.abs();

            let impulse = -self.motor_mass * c;
            positions[sb.index_a].a -= i_a * impulse;
            positions[sb.index_b].a += i_b * impulse;
        }

        // Point-to-point.
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));
        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let c = pb.c + r_b - pa.c - r_a;
        let position_error = c.length();

        let k_ex = Vec2::new(
            m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
            -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
        );
        let k_ey = Vec2::new(
            k_ex.y,
            m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
        );
        let impulse = -solve22(k_ex, k_ey, c);

        positions[sb.index_a].c -= m_a * impulse;
        positions[sb.index_a].a -= i_a * cross(r_a, impulse);
        positions[sb.index_b].c += m_b * impulse;
        positions[sb.index_b].a += i_b * cross(r_b, impulse);

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}

// ---------------------------------------------------------------------------
// Prismatic
// ---------------------------------------------------------------------------

/// Slider joint: relative motion restricted to a body-A-fixed axis; relative
/// rotation locked. Supports a translation limit and a linear motor.
#[derive(Debug, Clone)]
pub struct PrismaticJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub local_axis_a: Vec2,
    pub reference_angle: f32,

    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,

    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_force: f32,

    perp_impulse: f32,
    angular_impulse: f32,
    motor_impulse: f32,
    limit_impulse: f32,
    limit_state: LimitState,

    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    perp_mass: f32,
    angular_mass: f32,
    axis_mass: f32,
}

impl PrismaticJoint {
    pub fn new(
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        local_axis_a: Vec2,
        reference_angle: f32,
    ) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            local_axis_a: local_axis_a.normalize_or_zero(),
            reference_angle,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
            perp_impulse: 0.0,
            angular_impulse: 0.0,
            motor_impulse: 0.0,
            limit_impulse: 0.0,
            limit_state: LimitState::Inactive,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            perp_mass: 0.0,
            angular_mass: 0.0,
            axis_mass: 0.0,
        }
    }

    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    pub fn with_motor(mut self, motor_speed: f32, max_motor_force: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = motor_speed;
        self.max_motor_force = max_motor_force;
        self
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let d = pb.c + r_b - pa.c - r_a;

        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        self.axis = qa.apply(self.local_axis_a);
        self.a1 = cross(d + r_a, self.axis);
        self.a2 = cross(r_b, self.axis);
        let axis_inv_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        self.axis_mass = if axis_inv_mass > 0.0 {
            1.0 / axis_inv_mass
        } else {
            0.0
        };

        self.perp = Vec2::new(-self.axis.y, self.axis.x);
        self.s1 = cross(d + r_a, self.perp);
        self.s2 = cross(r_b, self.perp);
        let perp_inv_mass = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        self.perp_mass = if perp_inv_mass > 0.0 {
            1.0 / perp_inv_mass
        } else {
            0.0
        };

        let angular_inv_mass = i_a + i_b;
        self.angular_mass = if angular_inv_mass > 0.0 {
            1.0 / angular_inv_mass
        } else {
            0.0
        };

        if self.enable_limit {
            let translation = self.axis.dot(d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if translation <= self.lower_translation {
                if self.limit_state != LimitState::AtLower {
                    self.limit_impulse = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if translation >= self.upper_translation {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_impulse = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.limit_impulse = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.limit_impulse = 0.0;
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if step.warm_starting {
            self.perp_impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.limit_impulse *= step.dt_ratio;

            let axial = self.motor_impulse + self.limit_impulse;
            let p = self.perp_impulse * self.perp + axial * self.axis;
            let l_a = self.perp_impulse * self.s1 + axial * self.a1 + self.angular_impulse;
            let l_b = self.perp_impulse * self.s2 + axial * self.a2 + self.angular_impulse;

            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * l_a;
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * l_b;
        } else {
            self.perp_impulse = 0.0;
            self.angular_impulse = 0.0;
            self.motor_impulse = 0.0;
            self.limit_impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        // Motor along the axis.
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
            let cdot = self.axis.dot(vb.v - va.v) + self.a2 * vb.w - self.a1 * va.w;
            let mut impulse = self.axis_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_force * step.dt;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            let p = impulse * self.axis;
            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * impulse * self.a1;
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * impulse * self.a2;
        }

        // Limit along the axis.
        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
            let cdot = self.axis.dot(vb.v - va.v) + self.a2 * vb.w - self.a1 * va.w;
            let mut impulse = -self.axis_mass * cdot;

            match self.limit_state {
                LimitState::Equal => self.limit_impulse += impulse,
                LimitState::AtLower => {
                    let new_impulse = self.limit_impulse + impulse;
                    if new_impulse < 0.0 {
                        impulse = -self.limit_impulse;
                        self.limit_impulse = 0.0;
                    } else {
                        self.limit_impulse = new_impulse;
                    }
                }
                LimitState::AtUpper => {
                    let new_impulse = self.limit_impulse + impulse;
                    if new_impulse > 0.0 {
                        impulse = -self.limit_impulse;
                        self.limit_impulse = 0.0;
                    } else {
                        self.limit_impulse = new_impulse;
                    }
                }
                LimitState::Inactive => {}
            }

            let p = impulse * self.axis;
            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * impulse * self.a1;
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * impulse * self.a2;
        }

        // Perpendicular translation lock.
        {
            let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
            let cdot = self.perp.dot(vb.v - va.v) + self.s2 * vb.w - self.s1 * va.w;
            let impulse = -self.perp_mass * cdot;
            self.perp_impulse += impulse;

            let p = impulse * self.perp;
            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * impulse * self.s1;
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * impulse * self.s2;
        }

        // Relative rotation lock.
        {
            let cdot = velocities[sb.index_b].w - velocities[sb.index_a].w;
            let impulse = -self.angular_mass * cdot;
            self.angular_impulse += impulse;

            velocities[sb.index_a].w -= i_a * impulse;
            velocities[sb.index_b].w += i_b * impulse;
        }
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        // Angular lock.
        let angular_c = positions[sb.index_b].a - positions[sb.index_a].a - self.reference_angle;
        {
            let c = angular_c.clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
            let impulse = -self.angular_mass * c;
            positions[sb.index_a].a -= i_a * impulse;
            positions[sb.index_b].a += i_b * impulse;
        }

        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));
        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let d = pb.c + r_b - pa.c - r_a;

        let axis = qa.apply(self.local_axis_a);
        let perp = Vec2::new(-axis.y, axis.x);

        // Perpendicular drift.
        let perp_c = perp.dot(d);
        {
            let s1 = cross(d + r_a, perp);
            let s2 = cross(r_b, perp);
            let k = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
            let impulse = if k > 0.0 { -perp_c / k } else { 0.0 };

            let p = impulse * perp;
            positions[sb.index_a].c -= m_a * p;
            positions[sb.index_a].a -= i_a * impulse * s1;
            positions[sb.index_b].c += m_b * p;
            positions[sb.index_b].a += i_b * impulse * s2;
        }

        // Limit overshoot.
        let mut limit_c = 0.0;
        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let translation = axis.dot(d);
            limit_c = match self.limit_state {
                LimitState::Equal => (translation - self.lower_translation)
                    .clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION),
                LimitState::AtLower => (translation - self.lower_translation + LINEAR_SLOP)
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0),
                LimitState::AtUpper => (translation - self.upper_translation - LINEAR_SLOP)
                    .clamp(0.0, MAX_LINEAR_CORRECTION),
                LimitState::Inactive => 0.0,
            };

            let a1 = cross(d + r_a, axis);
            let a2 = cross(r_b, axis);
            let k = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
            let impulse = if k > 0.0 { -limit_c / k } else { 0.0 };

            let p = impulse * axis;
            positions[sb.index_a].c -= m_a * p;
            positions[sb.index_a].a -= i_a * impulse * a1;
            positions[sb.index_b].c += m_b * p;
            positions[sb.index_b].a += i_b * impulse * a2;
        }

        perp_c.abs() <= LINEAR_SLOP
            && angular_c.abs() <= ANGULAR_SLOP
            && limit_c.abs() <= MAX_LINEAR_CORRECTION
    }
}

// ---------------------------------------------------------------------------
// Weld
// ---------------------------------------------------------------------------

/// Rigidly locks relative translation and rotation.
#[derive(Debug, Clone)]
pub struct WeldJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,

    impulse: Vec2,
    angular_impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    k_ex: Vec2,
    k_ey: Vec2,
    angular_mass: f32,
}

impl WeldJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, reference_angle: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            reference_angle,
            impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k_ex: Vec2::ZERO,
            k_ey: Vec2::ZERO,
            angular_mass: 0.0,
        }
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        self.k_ex = Vec2::new(
            m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
            -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
        );
        self.k_ey = Vec2::new(
            self.k_ex.y,
            m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
        );

        let angular_inv_mass = i_a + i_b;
        self.angular_mass = if angular_inv_mass > 0.0 {
            1.0 / angular_inv_mass
        } else {
            0.0
        };

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;

            let p = self.impulse;
            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * (cross(self.r_a, p) + self.angular_impulse);
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * (cross(self.r_b, p) + self.angular_impulse);
        } else {
            self.impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        _step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        // Angular lock.
        {
            let cdot = velocities[sb.index_b].w - velocities[sb.index_a].w;
            let impulse = -self.angular_mass * cdot;
            self.angular_impulse += impulse;

            velocities[sb.index_a].w -= i_a * impulse;
            velocities[sb.index_b].w += i_b * impulse;
        }

        // Point lock.
        {
            let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
            let cdot = vb.v + cross_sv(vb.w, self.r_b) - va.v - cross_sv(va.w, self.r_a);
            let impulse = solve22(self.k_ex, self.k_ey, -cdot);
            self.impulse += impulse;

            velocities[sb.index_a].v -= m_a * impulse;
            velocities[sb.index_a].w -= i_a * cross(self.r_a, impulse);
            velocities[sb.index_b].v += m_b * impulse;
            velocities[sb.index_b].w += i_b * cross(self.r_b, impulse);
        }
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        let angular_c = positions[sb.index_b].a - positions[sb.index_a].a - self.reference_angle;
        {
            let c = angular_c.clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
            let impulse = -self.angular_mass * c;
            positions[sb.index_a].a -= i_a * impulse;
            positions[sb.index_b].a += i_b * impulse;
        }

        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));
        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let c = pb.c + r_b - pa.c - r_a;
        let position_error = c.length();

        let k_ex = Vec2::new(
            m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
            -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
        );
        let k_ey = Vec2::new(
            k_ex.y,
            m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
        );
        let impulse = -solve22(k_ex, k_ey, c);

        positions[sb.index_a].c -= m_a * impulse;
        positions[sb.index_a].a -= i_a * cross(r_a, impulse);
        positions[sb.index_b].c += m_b * impulse;
        positions[sb.index_b].a += i_b * cross(r_b, impulse);

        position_error <= LINEAR_SLOP && angular_c.abs() <= ANGULAR_SLOP
    }
}

// ---------------------------------------------------------------------------
// Pulley
// ---------------------------------------------------------------------------

/// Idealized rope over two ground pulleys: `length_a + ratio * length_b` is
/// held constant.
#[derive(Debug, Clone)]
pub struct PulleyJoint {
    pub ground_anchor_a: Vec2,
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length_a: f32,
    pub length_b: f32,
    pub ratio: f32,
    constant: f32,

    impulse: f32,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
}

impl PulleyJoint {
    pub fn new(
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        length_a: f32,
        length_b: f32,
        ratio: f32,
    ) -> Self {
        debug_assert!(ratio > f32::EPSILON);
        Self {
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a,
            local_anchor_b,
            length_a,
            length_b,
            ratio,
            constant: length_a + ratio * length_b,
            impulse: 0.0,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
        }
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        self.u_a = pa.c + self.r_a - self.ground_anchor_a;
        self.u_b = pb.c + self.r_b - self.ground_anchor_b;

        let length_a = self.u_a.length();
        let length_b = self.u_b.length();

        self.u_a = if length_a > 10.0 * LINEAR_SLOP {
            self.u_a / length_a
        } else {
            Vec2::ZERO
        };
        self.u_b = if length_b > 10.0 * LINEAR_SLOP {
            self.u_b / length_b
        } else {
            Vec2::ZERO
        };

        let cr_a = cross(self.r_a, self.u_a);
        let cr_b = cross(self.r_b, self.u_b);

        let m_a = sb.inv_mass_a + sb.inv_i_a * cr_a * cr_a;
        let m_b = sb.inv_mass_b + sb.inv_i_b * cr_b * cr_b;
        let inv_mass = m_a + self.ratio * self.ratio * m_b;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        if step.warm_starting {
            self.impulse *= step.dt_ratio;

            let p_a = -self.impulse * self.u_a;
            let p_b = -self.ratio * self.impulse * self.u_b;

            velocities[sb.index_a].v += sb.inv_mass_a * p_a;
            velocities[sb.index_a].w += sb.inv_i_a * cross(self.r_a, p_a);
            velocities[sb.index_b].v += sb.inv_mass_b * p_b;
            velocities[sb.index_b].w += sb.inv_i_b * cross(self.r_b, p_b);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        _step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
        let vp_a = va.v + cross_sv(va.w, self.r_a);
        let vp_b = vb.v + cross_sv(vb.w, self.r_b);

        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = -impulse * self.u_a;
        let p_b = -self.ratio * impulse * self.u_b;
        velocities[sb.index_a].v += sb.inv_mass_a * p_a;
        velocities[sb.index_a].w += sb.inv_i_a * cross(self.r_a, p_a);
        velocities[sb.index_b].v += sb.inv_mass_b * p_b;
        velocities[sb.index_b].w += sb.inv_i_b * cross(self.r_b, p_b);
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let mut u_a = pa.c + r_a - self.ground_anchor_a;
        let mut u_b = pb.c + r_b - self.ground_anchor_b;

        let length_a = u_a.length();
        let length_b = u_b.length();

        u_a = if length_a > 10.0 * LINEAR_SLOP {
            u_a / length_a
        } else {
            Vec2::ZERO
        };
        u_b = if length_b > 10.0 * LINEAR_SLOP {
            u_b / length_b
        } else {
            Vec2::ZERO
        };

        let cr_a = cross(r_a, u_a);
        let cr_b = cross(r_b, u_b);

        let m_a = sb.inv_mass_a + sb.inv_i_a * cr_a * cr_a;
        let m_b = sb.inv_mass_b + sb.inv_i_b * cr_b * cr_b;
        let inv_mass = m_a + self.ratio * self.ratio * m_b;
        let mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;

        let p_a = -impulse * u_a;
        let p_b = -self.ratio * impulse * u_b;

        positions[sb.index_a].c += sb.inv_mass_a * p_a;
        positions[sb.index_a].a += sb.inv_i_a * cross(r_a, p_a);
        positions[sb.index_b].c += sb.inv_mass_b * p_b;
        positions[sb.index_b].a += sb.inv_i_b * cross(r_b, p_b);

        linear_error < LINEAR_SLOP
    }
}

// ---------------------------------------------------------------------------
// Gear
// ---------------------------------------------------------------------------

/// One side of a gear constraint: the 1-DOF coordinate contributed by a
/// revolute or prismatic joint whose other body is static ground. The ground
/// frame is captured at creation.
#[derive(Debug, Clone, Copy)]
pub enum GearSide {
    Revolute {
        /// Ground angle plus the source joint's reference angle.
        reference_angle: f32,
    },
    Prismatic {
        ground_anchor: Vec2,
        ground_axis: Vec2,
        local_anchor: Vec2,
    },
}

impl GearSide {
    fn coordinate(&self, p: &PositionState, local_center: Vec2) -> f32 {
        match self {
            GearSide::Revolute { reference_angle } => p.a - reference_angle,
            GearSide::Prismatic {
                ground_anchor,
                ground_axis,
                local_anchor,
            } => {
                let q = Rot::new(p.a);
                let anchor = p.c + q.apply(*local_anchor - local_center);
                (anchor - *ground_anchor).dot(*ground_axis)
            }
        }
    }

    /// Jacobian (linear, angular) of the coordinate with respect to the
    /// body's velocity.
    fn jacobian(&self, p: &PositionState, local_center: Vec2) -> (Vec2, f32) {
        match self {
            GearSide::Revolute { .. } => (Vec2::ZERO, 1.0),
            GearSide::Prismatic {
                ground_axis,
                local_anchor,
                ..
            } => {
                let q = Rot::new(p.a);
                let r = q.apply(*local_anchor - local_center);
                (*ground_axis, cross(r, *ground_axis))
            }
        }
    }
}

/// Couples the coordinates of two ground-anchored joints:
/// `coordinate_a + ratio * coordinate_b == constant`.
#[derive(Debug, Clone)]
pub struct GearJoint {
    pub ratio: f32,
    pub(crate) side_a: GearSide,
    pub(crate) side_b: GearSide,
    pub(crate) constant: f32,

    impulse: f32,
    j_va: Vec2,
    j_wa: f32,
    j_vb: Vec2,
    j_wb: f32,
    mass: f32,
}

impl GearJoint {
    pub(crate) fn new(side_a: GearSide, side_b: GearSide, ratio: f32, constant: f32) -> Self {
        debug_assert!(ratio != 0.0);
        Self {
            ratio,
            side_a,
            side_b,
            constant,
            impulse: 0.0,
            j_va: Vec2::ZERO,
            j_wa: 0.0,
            j_vb: Vec2::ZERO,
            j_wb: 0.0,
            mass: 0.0,
        }
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);

        let (j_va, j_wa) = self.side_a.jacobian(&pa, sb.local_center_a);
        let (j_vb, j_wb) = self.side_b.jacobian(&pb, sb.local_center_b);
        self.j_va = j_va;
        self.j_wa = j_wa;
        self.j_vb = j_vb;
        self.j_wb = j_wb;

        let inv_mass = sb.inv_mass_a * j_va.length_squared()
            + sb.inv_i_a * j_wa * j_wa
            + self.ratio
                * self.ratio
                * (sb.inv_mass_b * j_vb.length_squared() + sb.inv_i_b * j_wb * j_wb);
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            velocities[sb.index_a].v += sb.inv_mass_a * self.impulse * self.j_va;
            velocities[sb.index_a].w += sb.inv_i_a * self.impulse * self.j_wa;
            velocities[sb.index_b].v += sb.inv_mass_b * (self.ratio * self.impulse) * self.j_vb;
            velocities[sb.index_b].w += sb.inv_i_b * (self.ratio * self.impulse) * self.j_wb;
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        _step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);

        let cdot = self.j_va.dot(va.v)
            + self.j_wa * va.w
            + self.ratio * (self.j_vb.dot(vb.v) + self.j_wb * vb.w);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        velocities[sb.index_a].v += sb.inv_mass_a * impulse * self.j_va;
        velocities[sb.index_a].w += sb.inv_i_a * impulse * self.j_wa;
        velocities[sb.index_b].v += sb.inv_mass_b * (self.ratio * impulse) * self.j_vb;
        velocities[sb.index_b].w += sb.inv_i_b * (self.ratio * impulse) * self.j_wb;
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);

        let coordinate_a = self.side_a.coordinate(&pa, sb.local_center_a);
        let coordinate_b = self.side_b.coordinate(&pb, sb.local_center_b);
        let c = (coordinate_a + self.ratio * coordinate_b) - self.constant;

        let (j_va, j_wa) = self.side_a.jacobian(&pa, sb.local_center_a);
        let (j_vb, j_wb) = self.side_b.jacobian(&pb, sb.local_center_b);

        let inv_mass = sb.inv_mass_a * j_va.length_squared()
            + sb.inv_i_a * j_wa * j_wa
            + self.ratio
                * self.ratio
                * (sb.inv_mass_b * j_vb.length_squared() + sb.inv_i_b * j_wb * j_wb);
        if inv_mass == 0.0 {
            return true;
        }

        let impulse = -c / inv_mass;

        positions[sb.index_a].c += sb.inv_mass_a * impulse * j_va;
        positions[sb.index_a].a += sb.inv_i_a * impulse * j_wa;
        positions[sb.index_b].c += sb.inv_mass_b * (self.ratio * impulse) * j_vb;
        positions[sb.index_b].a += sb.inv_i_b * (self.ratio * impulse) * j_wb;

        // The gear constraint is soft on position; report satisfied once the
        // correction is sub-slop.
        c.abs() < LINEAR_SLOP
    }
}

// ---------------------------------------------------------------------------
// Friction
// ---------------------------------------------------------------------------

/// Top-down friction: resists relative linear and angular velocity with
/// force/torque budgets, no positional effect.
#[derive(Debug, Clone)]
pub struct FrictionJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub max_force: f32,
    pub max_torque: f32,

    linear_impulse: Vec2,
    angular_impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    k_ex: Vec2,
    k_ey: Vec2,
    angular_mass: f32,
}

impl FrictionJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, max_force: f32, max_torque: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            max_force,
            max_torque,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k_ex: Vec2::ZERO,
            k_ey: Vec2::ZERO,
            angular_mass: 0.0,
        }
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);

        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        self.k_ex = Vec2::new(
            m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
            -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
        );
        self.k_ey = Vec2::new(
            self.k_ex.y,
            m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
        );

        let angular_inv_mass = i_a + i_b;
        self.angular_mass = if angular_inv_mass > 0.0 {
            1.0 / angular_inv_mass
        } else {
            0.0
        };

        if step.warm_starting {
            self.linear_impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;

            let p = self.linear_impulse;
            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * (cross(self.r_a, p) + self.angular_impulse);
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * (cross(self.r_b, p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        // Angular friction.
        {
            let cdot = velocities[sb.index_b].w - velocities[sb.index_a].w;
            let mut impulse = -self.angular_mass * cdot;

            let old_impulse = self.angular_impulse;
            let max_impulse = self.max_torque * step.dt;
            self.angular_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old_impulse;

            velocities[sb.index_a].w -= i_a * impulse;
            velocities[sb.index_b].w += i_b * impulse;
        }

        // Linear friction.
        {
            let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
            let cdot = vb.v + cross_sv(vb.w, self.r_b) - va.v - cross_sv(va.w, self.r_a);

            let mut impulse = solve22(self.k_ex, self.k_ey, -cdot);
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = self.max_force * step.dt;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize() * max_impulse;
            }
            impulse = self.linear_impulse - old_impulse;

            velocities[sb.index_a].v -= m_a * impulse;
            velocities[sb.index_a].w -= i_a * cross(self.r_a, impulse);
            velocities[sb.index_b].v += m_b * impulse;
            velocities[sb.index_b].w += i_b * cross(self.r_b, impulse);
        }
    }

    fn solve_position(&mut self, _sb: &SolverBodies, _positions: &mut [PositionState]) -> bool {
        // Friction has no position target.
        true
    }
}

// ---------------------------------------------------------------------------
// Wheel
// ---------------------------------------------------------------------------

/// Suspension joint: body B rides a body-A-fixed axis on a damped spring,
/// with an optional rotational motor on the wheel.
#[derive(Debug, Clone)]
pub struct WheelJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub local_axis_a: Vec2,
    pub frequency_hz: f32,
    pub damping_ratio: f32,

    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,

    impulse: f32,
    spring_impulse: f32,
    motor_impulse: f32,

    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    spring_mass: f32,
    motor_mass: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, local_axis_a: Vec2) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            local_axis_a: local_axis_a.normalize_or_zero(),
            frequency_hz: 2.0,
            damping_ratio: 0.7,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            impulse: 0.0,
            spring_impulse: 0.0,
            motor_impulse: 0.0,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            spring_mass: 0.0,
            motor_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    pub fn with_spring(mut self, frequency_hz: f32, damping_ratio: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }

    pub fn with_motor(mut self, motor_speed: f32, max_motor_torque: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = motor_speed;
        self.max_motor_torque = max_motor_torque;
        self
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let d = pb.c + r_b - pa.c - r_a;

        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        // Point constraint perpendicular to the axis.
        self.ay = qa.apply(Vec2::new(-self.local_axis_a.y, self.local_axis_a.x));
        self.s_ay = cross(d + r_a, self.ay);
        self.s_by = cross(r_b, self.ay);

        let inv_mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        // Spring along the axis.
        self.ax = qa.apply(self.local_axis_a);
        self.s_ax = cross(d + r_a, self.ax);
        self.s_bx = cross(r_b, self.ax);

        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;

        if self.frequency_hz > 0.0 {
            let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
            if inv_mass > 0.0 {
                self.spring_mass = 1.0 / inv_mass;

                let c = d.dot(self.ax);
                let omega = 2.0 * std::f32::consts::PI * self.frequency_hz;
                let damp = 2.0 * self.spring_mass * self.damping_ratio * omega;
                let stiff = self.spring_mass * omega * omega;

                let dt = step.dt;
                self.gamma = dt * (damp + dt * stiff);
                if self.gamma > 0.0 {
                    self.gamma = 1.0 / self.gamma;
                }
                self.bias = c * dt * stiff * self.gamma;

                self.spring_mass = inv_mass + self.gamma;
                if self.spring_mass > 0.0 {
                    self.spring_mass = 1.0 / self.spring_mass;
                }
            }
        } else {
            self.spring_impulse = 0.0;
        }

        let motor_inv_mass = i_a + i_b;
        self.motor_mass = if motor_inv_mass > 0.0 {
            1.0 / motor_inv_mass
        } else {
            0.0
        };
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            self.spring_impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;

            let p = self.impulse * self.ay + self.spring_impulse * self.ax;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx + self.motor_impulse;

            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * l_a;
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (m_a, m_b) = (sb.inv_mass_a, sb.inv_mass_b);
        let (i_a, i_b) = (sb.inv_i_a, sb.inv_i_b);

        // Spring.
        {
            let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
            let cdot = self.ax.dot(vb.v - va.v) + self.s_bx * vb.w - self.s_ax * va.w;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = impulse * self.ax;
            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * impulse * self.s_ax;
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * impulse * self.s_bx;
        }

        // Motor on the wheel's rotation.
        if self.enable_motor {
            let cdot = velocities[sb.index_b].w - velocities[sb.index_a].w - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;

            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_torque * step.dt;
            self.motor_impulse = (old_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            velocities[sb.index_a].w -= i_a * impulse;
            velocities[sb.index_b].w += i_b * impulse;
        }

        // Point constraint.
        {
            let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
            let cdot = self.ay.dot(vb.v - va.v) + self.s_by * vb.w - self.s_ay * va.w;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = impulse * self.ay;
            velocities[sb.index_a].v -= m_a * p;
            velocities[sb.index_a].w -= i_a * impulse * self.s_ay;
            velocities[sb.index_b].v += m_b * p;
            velocities[sb.index_b].w += i_b * impulse * self.s_by;
        }
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let d = pb.c + r_b - pa.c - r_a;

        let ay = qa.apply(Vec2::new(-self.local_axis_a.y, self.local_axis_a.x));
        let s_ay = cross(d + r_a, ay);
        let s_by = cross(r_b, ay);

        let c = d.dot(ay);
        let k = sb.inv_mass_a
            + sb.inv_mass_b
            + sb.inv_i_a * s_ay * s_ay
            + sb.inv_i_b * s_by * s_by;
        let impulse = if k != 0.0 { -c / k } else { 0.0 };

        let p = impulse * ay;
        positions[sb.index_a].c -= sb.inv_mass_a * p;
        positions[sb.index_a].a -= sb.inv_i_a * impulse * s_ay;
        positions[sb.index_b].c += sb.inv_mass_b * p;
        positions[sb.index_b].a += sb.inv_i_b * impulse * s_by;

        c.abs() <= LINEAR_SLOP
    }
}

// ---------------------------------------------------------------------------
// Rope
// ---------------------------------------------------------------------------

/// One-sided distance cap: the anchors may approach freely but never move
/// further apart than `max_length`.
#[derive(Debug, Clone)]
pub struct RopeJoint {
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub max_length: f32,

    impulse: f32,
    length: f32,
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
    state: LimitState,
}

impl RopeJoint {
    pub fn new(local_anchor_a: Vec2, local_anchor_b: Vec2, max_length: f32) -> Self {
        Self {
            local_anchor_a,
            local_anchor_b,
            max_length,
            impulse: 0.0,
            length: 0.0,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
            state: LimitState::Inactive,
        }
    }

    fn init(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        positions: &[PositionState],
        velocities: &mut [VelocityState],
    ) {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        self.r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        self.r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        self.u = pb.c + self.r_b - pa.c - self.r_a;

        self.length = self.u.length();
        self.state = if self.length - self.max_length > 0.0 {
            LimitState::AtUpper
        } else {
            LimitState::Inactive
        };

        if self.length > LINEAR_SLOP {
            self.u /= self.length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            return;
        }

        let cr_a = cross(self.r_a, self.u);
        let cr_b = cross(self.r_b, self.u);
        let inv_mass =
            sb.inv_mass_a + sb.inv_i_a * cr_a * cr_a + sb.inv_mass_b + sb.inv_i_b * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            let p = self.impulse * self.u;
            velocities[sb.index_a].v -= sb.inv_mass_a * p;
            velocities[sb.index_a].w -= sb.inv_i_a * cross(self.r_a, p);
            velocities[sb.index_b].v += sb.inv_mass_b * p;
            velocities[sb.index_b].w += sb.inv_i_b * cross(self.r_b, p);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity(
        &mut self,
        sb: &SolverBodies,
        step: &TimeStep,
        velocities: &mut [VelocityState],
    ) {
        let (va, vb) = (velocities[sb.index_a], velocities[sb.index_b]);
        let vp_a = va.v + cross_sv(va.w, self.r_a);
        let vp_b = vb.v + cross_sv(vb.w, self.r_b);

        // Predictive term keeps the rope from stretching in the first place.
        let c = self.length - self.max_length;
        let mut cdot = self.u.dot(vp_b - vp_a);
        if c < 0.0 {
            cdot += step.inv_dt * c;
        }

        let mut impulse = -self.mass * cdot;
        let old_impulse = self.impulse;
        self.impulse = (old_impulse + impulse).min(0.0);
        impulse = self.impulse - old_impulse;

        let p = impulse * self.u;
        velocities[sb.index_a].v -= sb.inv_mass_a * p;
        velocities[sb.index_a].w -= sb.inv_i_a * cross(self.r_a, p);
        velocities[sb.index_b].v += sb.inv_mass_b * p;
        velocities[sb.index_b].w += sb.inv_i_b * cross(self.r_b, p);
    }

    fn solve_position(&mut self, sb: &SolverBodies, positions: &mut [PositionState]) -> bool {
        let (pa, pb) = (positions[sb.index_a], positions[sb.index_b]);
        let (qa, qb) = (Rot::new(pa.a), Rot::new(pb.a));

        let r_a = qa.apply(self.local_anchor_a - sb.local_center_a);
        let r_b = qb.apply(self.local_anchor_b - sb.local_center_b);
        let mut u = pb.c + r_b - pa.c - r_a;

        let length = u.length();
        if length > f32::EPSILON {
            u /= length;
        }
        let c = (length - self.max_length).clamp(0.0, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = impulse * u;

        positions[sb.index_a].c -= sb.inv_mass_a * p;
        positions[sb.index_a].a -= sb.inv_i_a * cross(r_a, p);
        positions[sb.index_b].c += sb.inv_mass_b * p;
        positions[sb.index_b].a += sb.inv_i_b * cross(r_b, p);

        length - self.max_length < LINEAR_SLOP
    }
}
