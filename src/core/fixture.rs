use serde::{Deserialize, Serialize};

use crate::{
    collision::{
        broadphase::ProxyId,
        shapes::Shape,
    },
    core::{
        rigidbody::BodyHandle,
        types::{Filter, Material},
    },
    utils::allocator::Handle,
};

pub type FixtureHandle = Handle<Fixture>;

/// Construction parameters for a fixture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixtureDef {
    pub shape: Shape,
    pub material: Material,
    pub filter: Filter,
    /// Sensors detect overlap but never generate collision response.
    pub is_sensor: bool,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            material: Material::default(),
            filter: Filter::default(),
            is_sensor: false,
        }
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.material.density = density;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.material.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.material.restitution = restitution;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// One broad-phase proxy owned by a fixture, one per shape child.
#[derive(Debug, Clone, Copy)]
pub struct FixtureProxy {
    pub proxy_id: ProxyId,
    pub child: usize,
}

/// Binds a shape to a body with material and filtering data. Owns one
/// broad-phase proxy per shape child.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub body: BodyHandle,
    pub shape: Shape,
    pub material: Material,
    pub filter: Filter,
    pub is_sensor: bool,
    pub proxies: Vec<FixtureProxy>,
}

impl Fixture {
    pub fn new(body: BodyHandle, def: &FixtureDef) -> Self {
        Self {
            body,
            shape: def.shape,
            material: def.material,
            filter: def.filter,
            is_sensor: def.is_sensor,
            proxies: Vec::new(),
        }
    }
}
