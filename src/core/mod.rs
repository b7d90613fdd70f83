//! Core types describing physics entities, components, and shared data.

pub mod fixture;
pub mod joints;
pub mod rigidbody;
pub mod types;

pub use fixture::{Fixture, FixtureDef, FixtureHandle};
pub use joints::{Joint, JointHandle, JointKind};
pub use rigidbody::{BodyDef, BodyHandle, RigidBody};
pub use types::{BodyType, Filter, MassData, Material, Sweep, Transform, Velocity};
