//! Semi-implicit Euler integration over island-local solver states.

use glam::Vec2;

use crate::config::{MAX_ROTATION, MAX_ROTATION_SQUARED, MAX_TRANSLATION, MAX_TRANSLATION_SQUARED};

/// Fixed-step timing data threaded through the solvers.
#[derive(Debug, Clone, Copy)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt / previous dt`, used to scale warm-start impulses when the
    /// timestep changes between steps.
    pub dt_ratio: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

/// Island-local position state: world center of mass and angle.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionState {
    pub c: Vec2,
    pub a: f32,
}

/// Island-local velocity state.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityState {
    pub v: Vec2,
    pub w: f32,
}

/// Per-body constants the integrator needs besides the solver states.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationParams {
    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub gravity_scale: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

/// Advances a velocity under gravity, accumulated force/torque, and damping.
pub fn integrate_velocity(
    velocity: &mut VelocityState,
    params: &IntegrationParams,
    gravity: Vec2,
    force: Vec2,
    torque: f32,
    dt: f32,
) {
    velocity.v += dt * (params.gravity_scale * gravity + params.inv_mass * force);
    velocity.w += dt * params.inv_inertia * torque;

    // Implicit damping: v2 = v1 / (1 + dt * d), stable for any dt.
    velocity.v *= 1.0 / (1.0 + dt * params.linear_damping);
    velocity.w *= 1.0 / (1.0 + dt * params.angular_damping);
}

/// Advances a position by a velocity, clamping per-step translation and
/// rotation so a wild body cannot blow up the broad-phase.
pub fn integrate_position(position: &mut PositionState, velocity: &mut VelocityState, dt: f32) {
    let translation = dt * velocity.v;
    if translation.length_squared() > MAX_TRANSLATION_SQUARED {
        let ratio = MAX_TRANSLATION / translation.length();
        velocity.v *= ratio;
    }

    let rotation = dt * velocity.w;
    if rotation * rotation > MAX_ROTATION_SQUARED {
        let ratio = MAX_ROTATION / rotation.abs();
        velocity.w *= ratio;
    }

    position.c += dt * velocity.v;
    position.a += dt * velocity.w;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> IntegrationParams {
        IntegrationParams {
            inv_mass: 1.0,
            inv_inertia: 1.0,
            gravity_scale: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }

    #[test]
    fn gravity_accelerates_velocity() {
        let mut v = VelocityState::default();
        integrate_velocity(
            &mut v,
            &params(),
            Vec2::new(0.0, -10.0),
            Vec2::ZERO,
            0.0,
            0.1,
        );
        assert_relative_eq!(v.v.y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn damping_reduces_speed_stably() {
        let mut v = VelocityState {
            v: Vec2::new(10.0, 0.0),
            w: 5.0,
        };
        let p = IntegrationParams {
            linear_damping: 100.0,
            angular_damping: 100.0,
            ..params()
        };
        integrate_velocity(&mut v, &p, Vec2::ZERO, Vec2::ZERO, 0.0, 1.0);
        // Heavy damping converges toward zero without overshooting.
        assert!(v.v.x > 0.0 && v.v.x < 0.2);
        assert!(v.w > 0.0 && v.w < 0.1);
    }

    #[test]
    fn per_step_translation_is_clamped() {
        let mut p = PositionState::default();
        let mut v = VelocityState {
            v: Vec2::new(1000.0, 0.0),
            w: 0.0,
        };
        integrate_position(&mut p, &mut v, 1.0 / 60.0);
        assert!(p.c.x <= MAX_TRANSLATION + 1e-5);
    }
}
