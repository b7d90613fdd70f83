//! Simulation dynamics modules: integration, forces, the contact solver, and
//! islands.

pub mod forces;
pub mod integrator;
pub mod island;
pub mod solver;

pub use forces::{BuoyancyForce, ConstantForce, DragForce, ForceGenerator, ForceRegistry};
pub use integrator::{PositionState, TimeStep, VelocityState};
pub use solver::{ContactImpulse, ContactSolver};
