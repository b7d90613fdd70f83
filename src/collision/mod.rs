//! Collision detection modules: shapes, broad-phase, narrow-phase, contact
//! persistence, distance/TOI queries, and clipping helpers.

pub mod broadphase;
pub mod clipping;
pub mod contact;
pub mod distance;
pub mod narrowphase;
pub mod queries;
pub mod shapes;
pub mod toi;

pub use broadphase::{BroadPhase, DynamicTree, ProxyId};
pub use contact::{Contact, ContactHandle};
pub use distance::{distance, DistanceInput, DistanceOutput, DistanceProxy, SimplexCache};
pub use narrowphase::{Manifold, ManifoldPoint, ManifoldType, WorldManifold};
pub use queries::{Aabb, RayCastInput, RayCastOutput};
pub use shapes::{CircleShape, PolygonShape, Shape, ShapeError};
pub use toi::{time_of_impact, ToiInput, ToiOutput, ToiState};
