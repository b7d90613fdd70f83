//! Global tuning constants for the Impulse2D engine.
//!
//! Lengths are in meters, angles in radians, time in seconds. The defaults
//! are tuned for objects in the 0.1 – 10 m range under standard gravity.

use std::f32::consts::PI;

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -10.0];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Default number of velocity-constraint iterations per step.
pub const DEFAULT_VELOCITY_ITERATIONS: usize = 8;

/// Default number of position-correction iterations per step.
pub const DEFAULT_POSITION_ITERATIONS: usize = 3;

/// Collision/constraint tolerance. Penetration up to the slop is accepted so
/// resting contacts do not jitter.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular analogue of [`LINEAR_SLOP`].
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * PI;

/// Skin radius carried by polygon shapes. Keeps polygons a small distance
/// apart so the continuous-collision margin never collapses to zero.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

/// Maximum vertex count for a convex polygon shape.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Maximum number of contact points in a manifold.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Margin added around proxies in the dynamic tree so small motions do not
/// trigger tree surgery.
pub const AABB_EXTENSION: f32 = 0.1;

/// Scale applied to a moving proxy's displacement when predicting its future
/// AABB.
pub const AABB_MULTIPLIER: f32 = 2.0;

/// Relative normal velocity below which restitution is ignored.
pub const VELOCITY_THRESHOLD: f32 = 1.0;

/// Maximum positional correction applied in a single solver pass.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Maximum angular correction applied in a single solver pass.
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * PI;

/// Maximum translation of a body per step; velocities are clamped so a body
/// cannot move further than this in one integration.
pub const MAX_TRANSLATION: f32 = 2.0;
pub const MAX_TRANSLATION_SQUARED: f32 = MAX_TRANSLATION * MAX_TRANSLATION;

/// Maximum rotation of a body per step.
pub const MAX_ROTATION: f32 = 0.5 * PI;
pub const MAX_ROTATION_SQUARED: f32 = MAX_ROTATION * MAX_ROTATION;

/// Baumgarte factor for the discrete position solver.
pub const CONTACT_BAUMGARTE: f32 = 0.2;

/// Baumgarte factor for the TOI position solver.
pub const TOI_BAUMGARTE: f32 = 0.75;

/// Time a body must stay below the sleep tolerances before its island may
/// sleep.
pub const TIME_TO_SLEEP: f32 = 0.5;

/// Linear speed below which a body is considered at rest.
pub const LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// Angular speed below which a body is considered at rest.
pub const ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * PI;

/// Iteration cap for the GJK distance loop.
pub const GJK_MAX_ITERATIONS: usize = 20;

/// Outer iteration cap for conservative advancement.
pub const TOI_MAX_ITERATIONS: usize = 20;

/// Iteration cap for the TOI root finder.
pub const TOI_MAX_ROOT_ITERATIONS: usize = 50;

/// Position iterations used by the TOI sub-island solver.
pub const TOI_POSITION_ITERATIONS: usize = 20;

/// Per-contact cap on continuous sub-steps within one world step. A contact
/// past the cap is treated as non-impacting for the rest of the step and the
/// overflow is counted on the step profile.
pub const MAX_TOI_SUB_STEPS: u32 = 8;
