//! Impulse2D – a deterministic 2D rigid-body physics engine for Rust.
//!
//! This crate exposes a modular engine architecture: convex collision
//! shapes, a dynamic-tree broad-phase, persistent contacts with warm-started
//! sequential impulses, joint constraints, connected-component islands with
//! atomic sleeping, and continuous collision detection for fast bodies.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod utils;
pub mod world;

pub use glam::Vec2;

pub use collision::{
    Aabb, CircleShape, Contact, ContactHandle, Manifold, PolygonShape, RayCastInput,
    RayCastOutput, Shape, ShapeError, WorldManifold,
};
pub use crate::core::{
    joints::{
        DistanceJoint, FrictionJoint, Joint, JointHandle, JointKind, PrismaticJoint,
        PulleyJoint, RevoluteJoint, RopeJoint, WeldJoint, WheelJoint,
    },
    BodyDef, BodyHandle, BodyType, Filter, Fixture, FixtureDef, FixtureHandle, MassData,
    Material, RigidBody, Transform,
};
pub use dynamics::{
    BuoyancyForce, ConstantForce, ContactImpulse, DragForce, ForceGenerator, ForceRegistry,
};
pub use utils::{allocator::Handle, math::Rot, profiling::Profile};
pub use world::{ContactListener, PhysicsEngine, World};
