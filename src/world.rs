//! Central simulation container orchestrating all subsystems.
//!
//! `World::step` runs the whole pipeline on the calling thread: deferred
//! removals → new-contact discovery → controller forces → narrow phase →
//! island solve → continuous collision → force clearing. The world is locked
//! while stepping; creation and destruction assert against the lock, and the
//! listener callbacks receive no `&mut World`, so mid-step mutation of the
//! core collections is impossible by construction.

pub mod contact_manager;

use glam::Vec2;

use crate::{
    collision::{
        contact::{Contact, ContactHandle},
        distance::DistanceProxy,
        narrowphase::Manifold,
        queries::{Aabb, RayCastInput},
        toi::{time_of_impact, ToiInput, ToiState},
    },
    config::{
        DEFAULT_TIME_STEP, MAX_TOI_SUB_STEPS,
    },
    core::{
        fixture::{Fixture, FixtureDef, FixtureHandle, FixtureProxy},
        joints::{GearJoint, GearSide, Joint, JointHandle, JointKind},
        rigidbody::{BodyDef, BodyHandle, RigidBody},
        types::{BodyType, Sweep, Transform},
    },
    dynamics::{
        forces::{ForceGenerator, ForceRegistry},
        integrator::TimeStep,
        island::{Island, IslandBody},
        solver::{ContactImpulse, IslandContact},
    },
    utils::{allocator::Arena, logging::ScopedTimer, profiling::Profile},
    world::contact_manager::{ContactManager, ProxyData},
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Receives collision notifications during a step. All methods default to
/// no-ops; `()` is the silent listener.
pub trait ContactListener {
    /// Two fixtures started touching.
    fn begin_contact(&mut self, handle: ContactHandle, contact: &mut Contact) {
        let _ = (handle, contact);
    }

    /// Two fixtures stopped touching (also fired when a touching contact is
    /// destroyed).
    fn end_contact(&mut self, handle: ContactHandle, contact: &mut Contact) {
        let _ = (handle, contact);
    }

    /// Fired after the manifold update, before solving. Clearing
    /// `contact.enabled` skips the solver for this step.
    fn pre_solve(&mut self, handle: ContactHandle, contact: &mut Contact, old_manifold: &Manifold) {
        let _ = (handle, contact, old_manifold);
    }

    /// Fired after an island solve with the applied impulses.
    fn post_solve(&mut self, handle: ContactHandle, contact: &Contact, impulse: &ContactImpulse) {
        let _ = (handle, contact, impulse);
    }
}

impl ContactListener for () {}

/// The physics world: owns all bodies, fixtures, joints, and contacts.
pub struct World {
    pub(crate) bodies: Arena<RigidBody>,
    pub(crate) fixtures: Arena<Fixture>,
    pub(crate) joints: Arena<Joint>,
    contact_manager: ContactManager,
    force_registry: ForceRegistry,

    gravity: Vec2,
    ground_body: BodyHandle,

    locked: bool,
    new_contacts: bool,
    clear_forces_after_step: bool,
    allow_sleep: bool,
    warm_starting: bool,
    continuous_physics: bool,
    inv_dt0: f32,

    deferred_body_removals: Vec<BodyHandle>,
    deferred_joint_removals: Vec<JointHandle>,
    destroyed_joints: Vec<JointHandle>,

    island_pool: Vec<Island>,
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        let mut bodies = Arena::new();
        // Hidden static ground body; "fixed" joints anchor against it.
        let ground_body = bodies.insert(RigidBody::new(&BodyDef::new(BodyType::Static)));

        Self {
            bodies,
            fixtures: Arena::new(),
            joints: Arena::new(),
            contact_manager: ContactManager::new(),
            force_registry: ForceRegistry::new(),
            gravity,
            ground_body,
            locked: false,
            new_contacts: false,
            clear_forces_after_step: true,
            allow_sleep: true,
            warm_starting: true,
            continuous_physics: true,
            inv_dt0: 0.0,
            deferred_body_removals: Vec::new(),
            deferred_joint_removals: Vec::new(),
            destroyed_joints: Vec::new(),
            island_pool: Vec::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    /// The world's hidden static ground body.
    pub fn ground_body(&self) -> BodyHandle {
        self.ground_body
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_allow_sleeping(&mut self, allow: bool) {
        if !allow && self.allow_sleep {
            for body in self.bodies.iter_mut() {
                body.set_awake(true);
            }
        }
        self.allow_sleep = allow;
    }

    pub fn set_warm_starting(&mut self, enabled: bool) {
        self.warm_starting = enabled;
    }

    pub fn set_continuous_physics(&mut self, enabled: bool) {
        self.continuous_physics = enabled;
    }

    pub fn set_auto_clear_forces(&mut self, enabled: bool) {
        self.clear_forces_after_step = enabled;
    }

    pub fn add_force_generator<F: ForceGenerator + 'static>(&mut self, generator: F) {
        self.force_registry.add(generator);
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn fixture(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle)
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    pub fn joint_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle)
    }

    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contact_manager.contacts.get(handle)
    }

    pub fn body_handles(&self) -> Vec<BodyHandle> {
        self.bodies.handles().collect()
    }

    pub fn contact_handles(&self) -> Vec<ContactHandle> {
        self.contact_manager.contacts.handles().collect()
    }

    // -- creation / destruction ---------------------------------------------

    pub fn create_body(&mut self, def: &BodyDef) -> BodyHandle {
        assert!(!self.locked, "cannot create a body while stepping");
        self.bodies.insert(RigidBody::new(def))
    }

    /// Destroys a body and everything referencing it: fixtures, their
    /// broad-phase proxies and contacts, and attached joints (recorded in the
    /// destroyed-joint log).
    pub fn destroy_body(&mut self, handle: BodyHandle) {
        assert!(!self.locked, "cannot destroy a body while stepping");
        if !self.bodies.contains(handle) {
            return;
        }

        let joint_handles: Vec<JointHandle> =
            self.bodies.get(handle).map(|b| b.joints.clone()).unwrap_or_default();
        for joint in joint_handles {
            self.destroy_joint_internal(joint, true);
        }

        let contact_handles: Vec<ContactHandle> =
            self.bodies.get(handle).map(|b| b.contacts.clone()).unwrap_or_default();
        for contact in contact_handles {
            self.contact_manager
                .destroy(contact, &mut self.bodies, &mut ());
        }

        let fixture_handles: Vec<FixtureHandle> =
            self.bodies.get(handle).map(|b| b.fixtures.clone()).unwrap_or_default();
        for fixture in fixture_handles {
            self.destroy_fixture_proxies(fixture);
            self.fixtures.remove(fixture);
        }

        self.bodies.remove(handle);
    }

    /// Queues a body for destruction at the start of the next step, for
    /// callers that collect doomed bodies while inspecting step results.
    pub fn defer_destroy_body(&mut self, handle: BodyHandle) {
        if !self.deferred_body_removals.contains(&handle) {
            self.deferred_body_removals.push(handle);
        }
    }

    pub fn create_fixture(&mut self, body: BodyHandle, def: &FixtureDef) -> FixtureHandle {
        assert!(!self.locked, "cannot create a fixture while stepping");
        debug_assert!(self.bodies.contains(body));

        let handle = self.fixtures.insert(Fixture::new(body, def));

        let (enabled, xf) = {
            let b = self.bodies.get(body).expect("body is live");
            (b.is_enabled(), *b.transform())
        };
        if enabled {
            self.create_fixture_proxies(handle, &xf);
        }

        if let Some(b) = self.bodies.get_mut(body) {
            b.fixtures.push(handle);
        }
        if def.material.density > 0.0 {
            if let Some(b) = self.bodies.get_mut(body) {
                b.reset_mass_data(&self.fixtures);
            }
        }

        // New proxies need a pair pass at the next step.
        self.new_contacts = true;
        handle
    }

    /// Destroys a fixture: removes its proxies, destroys contacts that
    /// reference it, and recomputes the body's mass.
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) {
        assert!(!self.locked, "cannot destroy a fixture while stepping");
        let body = match self.fixtures.get(handle) {
            Some(f) => f.body,
            None => return,
        };

        let doomed: Vec<ContactHandle> = self
            .bodies
            .get(body)
            .map(|b| {
                b.contacts
                    .iter()
                    .copied()
                    .filter(|&c| {
                        self.contact_manager
                            .contacts
                            .get(c)
                            .map(|c| c.fixture_a == handle || c.fixture_b == handle)
                            .unwrap_or(false)
                    })
                    .collect()
            })
            .unwrap_or_default();
        for contact in doomed {
            self.contact_manager
                .destroy(contact, &mut self.bodies, &mut ());
        }

        self.destroy_fixture_proxies(handle);

        if let Some(b) = self.bodies.get_mut(body) {
            b.fixtures.retain(|&f| f != handle);
        }
        self.fixtures.remove(handle);

        if let Some(b) = self.bodies.get_mut(body) {
            b.reset_mass_data(&self.fixtures);
        }
    }

    /// Creates a joint from an already-configured kind. Contacts between the
    /// connected bodies are re-filtered when `collide_connected` is false.
    pub fn create_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        collide_connected: bool,
        kind: JointKind,
    ) -> JointHandle {
        assert!(!self.locked, "cannot create a joint while stepping");
        debug_assert!(self.bodies.contains(body_a) && self.bodies.contains(body_b));
        debug_assert!(body_a != body_b);

        let handle = self
            .joints
            .insert(Joint::new(body_a, body_b, collide_connected, kind));

        if let Some(b) = self.bodies.get_mut(body_a) {
            b.joints.push(handle);
        }
        if let Some(b) = self.bodies.get_mut(body_b) {
            b.joints.push(handle);
        }

        if !collide_connected {
            self.flag_contacts_for_filtering(body_a, body_b);
        }

        handle
    }

    pub fn destroy_joint(&mut self, handle: JointHandle) {
        assert!(!self.locked, "cannot destroy a joint while stepping");
        self.destroy_joint_internal(handle, false);
    }

    /// Queues a joint for destruction at the start of the next step.
    pub fn defer_destroy_joint(&mut self, handle: JointHandle) {
        if !self.deferred_joint_removals.contains(&handle) {
            self.deferred_joint_removals.push(handle);
        }
    }

    /// Joints destroyed implicitly by body destruction since the last drain.
    pub fn drain_destroyed_joints(&mut self) -> Vec<JointHandle> {
        std::mem::take(&mut self.destroyed_joints)
    }

    fn destroy_joint_internal(&mut self, handle: JointHandle, cascade: bool) {
        let (body_a, body_b, collide_connected) = match self.joints.get(handle) {
            Some(j) => (j.body_a, j.body_b, j.collide_connected),
            None => return,
        };

        for body in [body_a, body_b] {
            if let Some(b) = self.bodies.get_mut(body) {
                b.joints.retain(|&j| j != handle);
                b.set_awake(true);
            }
        }

        self.joints.remove(handle);
        if cascade {
            self.destroyed_joints.push(handle);
        }

        if !collide_connected {
            self.flag_contacts_for_filtering(body_a, body_b);
        }
    }

    fn flag_contacts_for_filtering(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        let contact_handles: Vec<ContactHandle> = self
            .bodies
            .get(body_a)
            .map(|b| b.contacts.clone())
            .unwrap_or_default();
        for handle in contact_handles {
            if let Some(contact) = self.contact_manager.contacts.get_mut(handle) {
                if contact.other_body(body_a) == body_b {
                    contact.filter_dirty = true;
                }
            }
        }
    }

    /// Re-runs the filter for every contact of a fixture, e.g. after its
    /// filter bits changed.
    pub fn refilter_fixture(&mut self, handle: FixtureHandle) {
        let body = match self.fixtures.get(handle) {
            Some(f) => f.body,
            None => return,
        };
        let contact_handles: Vec<ContactHandle> = self
            .bodies
            .get(body)
            .map(|b| b.contacts.clone())
            .unwrap_or_default();
        for ch in contact_handles {
            if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                if contact.fixture_a == handle || contact.fixture_b == handle {
                    contact.filter_dirty = true;
                }
            }
        }
        // Touch the proxies so the pair pass sees the fixture again.
        let proxies: Vec<FixtureProxy> = self
            .fixtures
            .get(handle)
            .map(|f| f.proxies.clone())
            .unwrap_or_default();
        for proxy in proxies {
            self.contact_manager.broad_phase.touch_proxy(proxy.proxy_id);
        }
        self.new_contacts = true;
    }

    /// Enables or disables a body. A disabled body keeps its state but owns
    /// no broad-phase proxies or contacts and is skipped by the solver.
    pub fn set_body_enabled(&mut self, handle: BodyHandle, enabled: bool) {
        assert!(!self.locked, "cannot toggle a body while stepping");
        let (current, xf) = match self.bodies.get(handle) {
            Some(b) => (b.is_enabled(), *b.transform()),
            None => return,
        };
        if current == enabled {
            return;
        }

        if let Some(b) = self.bodies.get_mut(handle) {
            b.set_enabled_flag(enabled);
        }

        let fixture_handles: Vec<FixtureHandle> = self
            .bodies
            .get(handle)
            .map(|b| b.fixtures.clone())
            .unwrap_or_default();

        if enabled {
            for fh in fixture_handles {
                self.create_fixture_proxies(fh, &xf);
            }
            self.new_contacts = true;
        } else {
            for fh in fixture_handles {
                self.destroy_fixture_proxies(fh);
            }
            let contact_handles: Vec<ContactHandle> = self
                .bodies
                .get(handle)
                .map(|b| b.contacts.clone())
                .unwrap_or_default();
            for ch in contact_handles {
                self.contact_manager.destroy(ch, &mut self.bodies, &mut ());
            }
        }
    }

    /// Moves a body to a new pose and resynchronizes its proxies.
    pub fn set_transform(&mut self, handle: BodyHandle, position: Vec2, angle: f32) {
        assert!(!self.locked, "cannot teleport a body while stepping");
        let xf = {
            let body = match self.bodies.get_mut(handle) {
                Some(b) => b,
                None => return,
            };
            body.set_transform_internal(position, angle);
            *body.transform()
        };

        let fixture_handles: Vec<FixtureHandle> = self
            .bodies
            .get(handle)
            .map(|b| b.fixtures.clone())
            .unwrap_or_default();
        for fh in fixture_handles {
            let (shape, proxies) = match self.fixtures.get(fh) {
                Some(f) => (f.shape, f.proxies.clone()),
                None => continue,
            };
            for proxy in proxies {
                let aabb = shape.compute_aabb(&xf);
                self.contact_manager
                    .broad_phase
                    .move_proxy(proxy.proxy_id, aabb, Vec2::ZERO);
            }
        }
        self.new_contacts = true;
    }

    // -- joint conveniences -------------------------------------------------

    /// Revolute joint pinned at a world-space anchor.
    pub fn create_revolute_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        world_anchor: Vec2,
    ) -> JointHandle {
        let (anchor_a, anchor_b, reference_angle) = self.local_frames(body_a, body_b, world_anchor);
        self.create_joint(
            body_a,
            body_b,
            false,
            JointKind::Revolute(crate::core::joints::RevoluteJoint::new(
                anchor_a,
                anchor_b,
                reference_angle,
            )),
        )
    }

    /// Distance joint between two world-space anchors at their current
    /// separation.
    pub fn create_distance_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        world_anchor_a: Vec2,
        world_anchor_b: Vec2,
    ) -> JointHandle {
        let anchor_a = self.local_point(body_a, world_anchor_a);
        let anchor_b = self.local_point(body_b, world_anchor_b);
        let length = (world_anchor_b - world_anchor_a).length();
        self.create_joint(
            body_a,
            body_b,
            false,
            JointKind::Distance(crate::core::joints::DistanceJoint::new(
                anchor_a, anchor_b, length,
            )),
        )
    }

    /// Prismatic joint along a world-space axis through a world anchor.
    pub fn create_prismatic_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        world_anchor: Vec2,
        world_axis: Vec2,
    ) -> JointHandle {
        let (anchor_a, anchor_b, reference_angle) = self.local_frames(body_a, body_b, world_anchor);
        let local_axis = self
            .bodies
            .get(body_a)
            .map(|b| b.transform().q.apply_inverse(world_axis))
            .unwrap_or(world_axis);
        self.create_joint(
            body_a,
            body_b,
            false,
            JointKind::Prismatic(crate::core::joints::PrismaticJoint::new(
                anchor_a,
                anchor_b,
                local_axis,
                reference_angle,
            )),
        )
    }

    /// Weld joint locking the bodies' current relative pose at a world
    /// anchor.
    pub fn create_weld_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        world_anchor: Vec2,
    ) -> JointHandle {
        let (anchor_a, anchor_b, reference_angle) = self.local_frames(body_a, body_b, world_anchor);
        self.create_joint(
            body_a,
            body_b,
            false,
            JointKind::Weld(crate::core::joints::WeldJoint::new(
                anchor_a,
                anchor_b,
                reference_angle,
            )),
        )
    }

    /// Gear joint coupling two existing revolute/prismatic joints, each of
    /// which must be anchored to a static body as its A side.
    pub fn create_gear_joint(
        &mut self,
        joint1: JointHandle,
        joint2: JointHandle,
        ratio: f32,
    ) -> JointHandle {
        assert!(!self.locked, "cannot create a joint while stepping");

        let (side_a, body_a, coordinate_a) = self.gear_side(joint1);
        let (side_b, body_b, coordinate_b) = self.gear_side(joint2);
        let constant = coordinate_a + ratio * coordinate_b;

        self.create_joint(
            body_a,
            body_b,
            false,
            JointKind::Gear(GearJoint::new(side_a, side_b, ratio, constant)),
        )
    }

    fn gear_side(&self, handle: JointHandle) -> (GearSide, BodyHandle, f32) {
        let joint = self.joints.get(handle).expect("gear source joint is live");
        let ground = self
            .bodies
            .get(joint.body_a)
            .expect("gear ground body is live");
        assert!(
            ground.body_type == BodyType::Static,
            "gear source joints must anchor body A to a static body"
        );
        let body_handle = joint.body_b;
        let body = self.bodies.get(body_handle).expect("gear body is live");

        match &joint.kind {
            JointKind::Revolute(r) => {
                let reference_angle = ground.angle() + r.reference_angle;
                let coordinate = body.angle() - reference_angle;
                (GearSide::Revolute { reference_angle }, body_handle, coordinate)
            }
            JointKind::Prismatic(p) => {
                let ground_xf = ground.transform();
                let ground_anchor = ground_xf.apply(p.local_anchor_a);
                let ground_axis = ground_xf.q.apply(p.local_axis_a);
                let local_anchor = p.local_anchor_b;
                let coordinate =
                    (body.transform().apply(local_anchor) - ground_anchor).dot(ground_axis);
                (
                    GearSide::Prismatic {
                        ground_anchor,
                        ground_axis,
                        local_anchor,
                    },
                    body_handle,
                    coordinate,
                )
            }
            _ => panic!("gear joints couple revolute or prismatic joints only"),
        }
    }

    fn local_point(&self, body: BodyHandle, world_point: Vec2) -> Vec2 {
        self.bodies
            .get(body)
            .map(|b| b.transform().apply_inverse(world_point))
            .unwrap_or(world_point)
    }

    fn local_frames(
        &self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        world_anchor: Vec2,
    ) -> (Vec2, Vec2, f32) {
        let anchor_a = self.local_point(body_a, world_anchor);
        let anchor_b = self.local_point(body_b, world_anchor);
        let angle_a = self.bodies.get(body_a).map(|b| b.angle()).unwrap_or(0.0);
        let angle_b = self.bodies.get(body_b).map(|b| b.angle()).unwrap_or(0.0);
        (anchor_a, anchor_b, angle_b - angle_a)
    }

    // -- queries ------------------------------------------------------------

    /// Visits every fixture whose fattened proxy AABB overlaps `aabb`. The
    /// callback returns false to stop the query.
    pub fn query_aabb(&self, aabb: &Aabb, mut callback: impl FnMut(FixtureHandle) -> bool) {
        self.contact_manager.broad_phase.query(aabb, |proxy| {
            let data = self.contact_manager.broad_phase.user_data(proxy);
            callback(data.fixture)
        });
    }

    /// Casts a ray from `p1` to `p2`. For each fixture hit, the callback
    /// receives (fixture, point, normal, fraction) and returns a new maximum
    /// fraction: 0 stops the cast, the passed fraction clips it, 1 continues
    /// unclipped, and a negative value filters the fixture out.
    pub fn ray_cast(
        &self,
        p1: Vec2,
        p2: Vec2,
        mut callback: impl FnMut(FixtureHandle, Vec2, Vec2, f32) -> f32,
    ) {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };
        self.contact_manager
            .broad_phase
            .ray_cast(&input, |sub_input, proxy| {
                let data = self.contact_manager.broad_phase.user_data(proxy);
                let fixture = match self.fixtures.get(data.fixture) {
                    Some(f) => f,
                    None => return sub_input.max_fraction,
                };
                let body = match self.bodies.get(fixture.body) {
                    Some(b) => b,
                    None => return sub_input.max_fraction,
                };

                match fixture.shape.ray_cast(sub_input, body.transform()) {
                    Some(output) => {
                        let point = sub_input.p1 + output.fraction * (sub_input.p2 - sub_input.p1);
                        callback(data.fixture, point, output.normal, output.fraction)
                    }
                    None => sub_input.max_fraction,
                }
            });
    }

    // -- stepping -----------------------------------------------------------

    /// Advances the simulation by `dt` with no listener.
    pub fn step(
        &mut self,
        dt: f32,
        velocity_iterations: usize,
        position_iterations: usize,
    ) -> Profile {
        self.step_with(dt, velocity_iterations, position_iterations, &mut ())
    }

    /// Advances the simulation by `dt`, notifying `listener` of contact
    /// events as they occur.
    pub fn step_with(
        &mut self,
        dt: f32,
        velocity_iterations: usize,
        position_iterations: usize,
        listener: &mut dyn ContactListener,
    ) -> Profile {
        let total_timer = ScopedTimer::new("world::step");
        let mut profile = Profile::default();

        // Deferred removals materialize before the world locks.
        let doomed_joints = std::mem::take(&mut self.deferred_joint_removals);
        for handle in doomed_joints {
            self.destroy_joint(handle);
        }
        let doomed_bodies = std::mem::take(&mut self.deferred_body_removals);
        for handle in doomed_bodies {
            self.destroy_body(handle);
        }

        if self.new_contacts {
            let _timer = ScopedTimer::new("broadphase::pairs");
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
            self.new_contacts = false;
        }

        self.locked = true;

        let step = TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.warm_starting,
        };

        // Controller phase.
        self.force_registry
            .apply_all(&mut self.bodies, &self.fixtures, self.gravity, dt);

        // Narrow phase: manifold updates, begin/end/pre-solve events.
        {
            let timer = ScopedTimer::new("contacts::collide");
            self.contact_manager
                .collide(&mut self.bodies, &self.fixtures, &self.joints, listener);
            profile.collide_time = timer.elapsed();
        }

        // Islands and constraint solving.
        if step.dt > 0.0 {
            let timer = ScopedTimer::new("islands::solve");
            self.solve(&step, listener, &mut profile);
            profile.solve_time = timer.elapsed();
        }

        // Continuous collision.
        if self.continuous_physics && step.dt > 0.0 {
            let timer = ScopedTimer::new("toi::solve");
            self.solve_toi(&step, listener, &mut profile);
            profile.solve_toi_time = timer.elapsed();
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.clear_forces_after_step {
            self.clear_forces();
        }

        self.locked = false;

        profile.body_count = self.bodies.len();
        profile.contact_count = self.contact_manager.contacts.len();
        profile.total_time = total_timer.elapsed();

        if profile.toi_overflows > 0 {
            log::warn!(
                "{} TOI candidates hit their iteration cap this step; impacts deferred",
                profile.toi_overflows
            );
        }

        profile
    }

    /// Zeroes all force/torque accumulators.
    pub fn clear_forces(&mut self) {
        for body in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    fn solve(&mut self, step: &TimeStep, listener: &mut dyn ContactListener, profile: &mut Profile) {
        // Clear island scratch flags.
        for body in self.bodies.iter_mut() {
            body.island = false;
        }
        for contact in self.contact_manager.contacts.iter_mut() {
            contact.island = false;
        }
        for joint in self.joints.iter_mut() {
            joint.island = false;
        }

        let seeds: Vec<BodyHandle> = self.bodies.handles().collect();
        let mut islands: Vec<Island> = Vec::new();
        let mut stack: Vec<BodyHandle> = Vec::new();

        for seed in seeds {
            {
                let body = self.bodies.get(seed).expect("seed body is live");
                if body.island
                    || !body.is_awake()
                    || !body.is_enabled()
                    || body.body_type == BodyType::Static
                {
                    continue;
                }
            }

            let mut island = self.island_pool.pop().unwrap_or_default();
            island.clear();

            let mut island_bodies: Vec<BodyHandle> = Vec::new();
            let mut island_contacts: Vec<ContactHandle> = Vec::new();
            let mut island_joints: Vec<JointHandle> = Vec::new();

            stack.clear();
            stack.push(seed);
            self.bodies.get_mut(seed).expect("seed body is live").island = true;

            while let Some(handle) = stack.pop() {
                let index = island_bodies.len();
                island_bodies.push(handle);

                let (body_type, contact_list, joint_list) = {
                    let body = self.bodies.get_mut(handle).expect("island body is live");
                    debug_assert!(body.is_enabled());
                    body.island_index = index;
                    body.set_awake(true);
                    (body.body_type, body.contacts.clone(), body.joints.clone())
                };

                // Static bodies join islands but never merge them.
                if body_type == BodyType::Static {
                    continue;
                }

                for ch in contact_list {
                    let (touching, enabled, already, fixture_a, fixture_b, other) =
                        match self.contact_manager.contacts.get(ch) {
                            Some(c) => (
                                c.touching,
                                c.enabled,
                                c.island,
                                c.fixture_a,
                                c.fixture_b,
                                c.other_body(handle),
                            ),
                            None => continue,
                        };
                    if already || !touching || !enabled {
                        continue;
                    }

                    // Sensor overlaps generate events, not constraints.
                    let sensor = self
                        .fixtures
                        .get(fixture_a)
                        .map(|f| f.is_sensor)
                        .unwrap_or(false)
                        || self
                            .fixtures
                            .get(fixture_b)
                            .map(|f| f.is_sensor)
                            .unwrap_or(false);
                    if sensor {
                        continue;
                    }

                    self.contact_manager
                        .contacts
                        .get_mut(ch)
                        .expect("contact is live")
                        .island = true;
                    island_contacts.push(ch);

                    let other_body = self.bodies.get_mut(other).expect("contact body is live");
                    if !other_body.island {
                        other_body.island = true;
                        stack.push(other);
                    }
                }

                for jh in joint_list {
                    let (already, other) = match self.joints.get(jh) {
                        Some(j) => (
                            j.island,
                            if j.body_a == handle { j.body_b } else { j.body_a },
                        ),
                        None => continue,
                    };
                    if already {
                        continue;
                    }
                    let other_enabled = self
                        .bodies
                        .get(other)
                        .map(|b| b.is_enabled())
                        .unwrap_or(false);
                    if !other_enabled {
                        continue;
                    }

                    self.joints.get_mut(jh).expect("joint is live").island = true;
                    island_joints.push(jh);

                    let other_body = self.bodies.get_mut(other).expect("joint body is live");
                    if !other_body.island {
                        other_body.island = true;
                        stack.push(other);
                    }
                }
            }

            // Snapshot phase: all island indices are assigned now.
            for handle in &island_bodies {
                let body = self.bodies.get(*handle).expect("island body is live");
                island.bodies.push(IslandBody::snapshot(*handle, body));
            }
            for ch in island_contacts {
                if let Some(snapshot) = self.make_island_contact(ch) {
                    island.contacts.push(snapshot);
                }
            }
            for jh in island_joints {
                let (body_a, body_b) = {
                    let joint = self.joints.get(jh).expect("joint is live");
                    (joint.body_a, joint.body_b)
                };
                let (ba, bb) = (
                    self.bodies.get(body_a).expect("joint body is live"),
                    self.bodies.get(body_b).expect("joint body is live"),
                );
                let joint = self.joints.get_mut(jh).expect("joint is live");
                joint.bind(ba, bb);
                island.joints.push((jh, joint.clone()));
            }

            // Allow static bodies to seed into other islands.
            for handle in &island_bodies {
                let body = self.bodies.get_mut(*handle).expect("island body is live");
                if body.body_type == BodyType::Static {
                    body.island = false;
                }
            }

            islands.push(island);
        }

        profile.island_count = islands.len();

        // Solve. Islands are disjoint over dynamic bodies, so the parallel
        // path produces the same per-island results as the sequential one.
        #[cfg(feature = "parallel")]
        {
            let gravity = self.gravity;
            let allow_sleep = self.allow_sleep;
            if islands.len() > 1 {
                islands
                    .par_iter_mut()
                    .for_each(|island| island.solve(step, gravity, allow_sleep));
            } else {
                for island in &mut islands {
                    island.solve(step, gravity, allow_sleep);
                }
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            let gravity = self.gravity;
            let allow_sleep = self.allow_sleep;
            for island in &mut islands {
                island.solve(step, gravity, allow_sleep);
            }
        }

        // Write results back in island order, then fire post-solve events.
        for island in &mut islands {
            for island_body in &island.bodies {
                if island_body.body_type == BodyType::Static {
                    continue;
                }
                let body = self
                    .bodies
                    .get_mut(island_body.handle)
                    .expect("island body is live");
                body.sweep = island_body.sweep;
                body.velocity = island_body.velocity;
                body.sleep_time = island_body.sleep_time;
                body.synchronize_transform();
                if island.slept {
                    body.set_awake(false);
                }
            }

            for snapshot in &island.contacts {
                if let Some(contact) = self.contact_manager.contacts.get_mut(snapshot.handle) {
                    for i in 0..snapshot.manifold.point_count {
                        contact.manifold.points[i].normal_impulse =
                            snapshot.manifold.points[i].normal_impulse;
                        contact.manifold.points[i].tangent_impulse =
                            snapshot.manifold.points[i].tangent_impulse;
                    }
                }
            }

            for (jh, joint) in island.joints.drain(..) {
                if let Some(slot) = self.joints.get_mut(jh) {
                    *slot = joint;
                }
            }

            for (ch, impulse) in &island.impulses {
                if let Some(contact) = self.contact_manager.contacts.get(*ch) {
                    listener.post_solve(*ch, contact, impulse);
                }
            }
        }

        // Return the buffers to the pool.
        for mut island in islands {
            island.clear();
            self.island_pool.push(island);
        }

        // Re-fatten proxies for everything that moved, then look for new
        // pairs created by the motion.
        {
            let timer = ScopedTimer::new("broadphase::sync");
            let moved: Vec<BodyHandle> = self.bodies.handles().collect();
            for handle in moved {
                let body = self.bodies.get(handle).expect("body is live");
                if body.body_type == BodyType::Static || !body.is_awake() {
                    continue;
                }
                self.synchronize_fixtures(handle);
            }
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
            profile.broad_phase_time = timer.elapsed();
        }
    }

    /// Continuous collision: advance the earliest impacting pair, correct it
    /// with a minimal positions-only sub-island, rescan, bounded per contact
    /// by the sub-step budget.
    fn solve_toi(
        &mut self,
        step: &TimeStep,
        listener: &mut dyn ContactListener,
        profile: &mut Profile,
    ) {
        for body in self.bodies.iter_mut() {
            body.island = false;
            body.sweep.alpha0 = 0.0;
        }
        for contact in self.contact_manager.contacts.iter_mut() {
            contact.island = false;
            contact.toi_valid = false;
            contact.toi_count = 0;
        }

        loop {
            // Find the globally earliest impact among eligible pairs.
            let mut min_contact: Option<ContactHandle> = None;
            let mut min_alpha = 1.0_f32;

            let contact_handles: Vec<ContactHandle> =
                self.contact_manager.contacts.handles().collect();
            for ch in contact_handles {
                let (enabled, toi_count, toi_valid, cached_toi, fixture_a, fixture_b) =
                    match self.contact_manager.contacts.get(ch) {
                        Some(c) => (
                            c.enabled,
                            c.toi_count,
                            c.toi_valid,
                            c.toi,
                            c.fixture_a,
                            c.fixture_b,
                        ),
                        None => continue,
                    };

                if !enabled {
                    continue;
                }
                if toi_count > MAX_TOI_SUB_STEPS {
                    continue;
                }

                let alpha = if toi_valid {
                    cached_toi
                } else {
                    let (fa, fb) = match (self.fixtures.get(fixture_a), self.fixtures.get(fixture_b))
                    {
                        (Some(a), Some(b)) => (a, b),
                        _ => continue,
                    };
                    if fa.is_sensor || fb.is_sensor {
                        continue;
                    }

                    let (body_a, body_b) = (fa.body, fb.body);
                    let (type_a, type_b, active_a, active_b, bullet_a, bullet_b) = {
                        let (ba, bb) = match (self.bodies.get(body_a), self.bodies.get(body_b)) {
                            (Some(a), Some(b)) => (a, b),
                            _ => continue,
                        };
                        (
                            ba.body_type,
                            bb.body_type,
                            ba.is_awake() && ba.body_type != BodyType::Static,
                            bb.is_awake() && bb.body_type != BodyType::Static,
                            ba.is_bullet(),
                            bb.is_bullet(),
                        )
                    };

                    // At least one body must be moving.
                    if !active_a && !active_b {
                        continue;
                    }

                    // Only bullets sweep against dynamic bodies; everything
                    // sweeps against static/kinematic geometry.
                    let collide_a = bullet_a || type_a != BodyType::Dynamic;
                    let collide_b = bullet_b || type_b != BodyType::Dynamic;
                    if !collide_a && !collide_b {
                        continue;
                    }

                    // Align both sweeps on the later of the two start times.
                    let (alpha0_a, alpha0_b) = {
                        let ba = self.bodies.get(body_a).expect("body is live");
                        let bb = self.bodies.get(body_b).expect("body is live");
                        (ba.sweep.alpha0, bb.sweep.alpha0)
                    };
                    let alpha0 = alpha0_a.max(alpha0_b);
                    debug_assert!(alpha0 < 1.0);
                    if alpha0_a < alpha0 {
                        self.bodies
                            .get_mut(body_a)
                            .expect("body is live")
                            .sweep
                            .advance(alpha0);
                    }
                    if alpha0_b < alpha0 {
                        self.bodies
                            .get_mut(body_b)
                            .expect("body is live")
                            .sweep
                            .advance(alpha0);
                    }

                    let (sweep_a, sweep_b) = {
                        let ba = self.bodies.get(body_a).expect("body is live");
                        let bb = self.bodies.get(body_b).expect("body is live");
                        (ba.sweep, bb.sweep)
                    };
                    let (shape_a, shape_b) = {
                        let fa = self.fixtures.get(fixture_a).expect("fixture is live");
                        let fb = self.fixtures.get(fixture_b).expect("fixture is live");
                        (fa.shape, fb.shape)
                    };

                    profile.toi_candidates += 1;
                    let output = time_of_impact(&ToiInput {
                        proxy_a: DistanceProxy::new(&shape_a),
                        proxy_b: DistanceProxy::new(&shape_b),
                        sweep_a,
                        sweep_b,
                        t_max: 1.0,
                    });

                    let alpha = if output.state == ToiState::Touching {
                        (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
                    } else {
                        if output.state == ToiState::Failed {
                            profile.toi_overflows += 1;
                        }
                        1.0
                    };

                    let contact = self
                        .contact_manager
                        .contacts
                        .get_mut(ch)
                        .expect("contact is live");
                    contact.toi = alpha;
                    contact.toi_valid = true;
                    alpha
                };

                if alpha < min_alpha {
                    min_alpha = alpha;
                    min_contact = Some(ch);
                }
            }

            let min_contact = match min_contact {
                Some(ch) if min_alpha < 1.0 - 10.0 * f32::EPSILON => ch,
                _ => break,
            };

            // Advance both bodies of the earliest impact to its time.
            let (fixture_a, fixture_b) = {
                let contact = self
                    .contact_manager
                    .contacts
                    .get(min_contact)
                    .expect("contact is live");
                (contact.fixture_a, contact.fixture_b)
            };
            let body_a = self.fixtures.get(fixture_a).expect("fixture is live").body;
            let body_b = self.fixtures.get(fixture_b).expect("fixture is live").body;

            let (backup_a, backup_b) = {
                let ba = self.bodies.get(body_a).expect("body is live");
                let bb = self.bodies.get(body_b).expect("body is live");
                (ba.sweep, bb.sweep)
            };

            self.bodies
                .get_mut(body_a)
                .expect("body is live")
                .advance(min_alpha);
            self.bodies
                .get_mut(body_b)
                .expect("body is live")
                .advance(min_alpha);

            // Recompute the manifold at the impact configuration.
            {
                let contact = self
                    .contact_manager
                    .contacts
                    .get_mut(min_contact)
                    .expect("contact is live");
                contact.update(min_contact, &mut self.bodies, &self.fixtures, listener);
                contact.toi_valid = false;
                contact.toi_count += 1;
                if contact.toi_count > MAX_TOI_SUB_STEPS {
                    // Sub-step budget exhausted; this pair accepts tunneling
                    // risk for the rest of the step.
                    profile.toi_overflows += 1;
                }
            }

            let (touching, enabled) = {
                let contact = self
                    .contact_manager
                    .contacts
                    .get(min_contact)
                    .expect("contact is live");
                (contact.touching, contact.enabled)
            };

            if !enabled || !touching {
                // Grazing pass: restore and look for the next candidate.
                if let Some(contact) = self.contact_manager.contacts.get_mut(min_contact) {
                    contact.enabled = false;
                }
                let ba = self.bodies.get_mut(body_a).expect("body is live");
                ba.sweep = backup_a;
                ba.synchronize_transform();
                let bb = self.bodies.get_mut(body_b).expect("body is live");
                bb.sweep = backup_b;
                bb.synchronize_transform();
                continue;
            }

            self.bodies
                .get_mut(body_a)
                .expect("body is live")
                .set_awake(true);
            self.bodies
                .get_mut(body_b)
                .expect("body is live")
                .set_awake(true);

            // Build the minimal sub-island: the impact pair plus immediate
            // neighbors, advanced to the impact time.
            let mut island = self.island_pool.pop().unwrap_or_default();
            island.clear();

            let mut island_bodies: Vec<BodyHandle> = vec![body_a, body_b];
            let mut island_contacts: Vec<ContactHandle> = vec![min_contact];

            for (i, handle) in island_bodies.iter().enumerate() {
                let body = self.bodies.get_mut(*handle).expect("body is live");
                body.island = true;
                body.island_index = i;
            }
            self.contact_manager
                .contacts
                .get_mut(min_contact)
                .expect("contact is live")
                .island = true;

            for seed in [body_a, body_b] {
                let seed_type = self.bodies.get(seed).expect("body is live").body_type;
                if seed_type != BodyType::Dynamic {
                    continue;
                }
                let seed_is_bullet = self.bodies.get(seed).expect("body is live").is_bullet();

                let contact_list = self
                    .bodies
                    .get(seed)
                    .expect("body is live")
                    .contacts
                    .clone();
                for ch in contact_list {
                    let (already, fixture_a, fixture_b, other) =
                        match self.contact_manager.contacts.get(ch) {
                            Some(c) => (c.island, c.fixture_a, c.fixture_b, c.other_body(seed)),
                            None => continue,
                        };
                    if already {
                        continue;
                    }

                    let (other_type, other_bullet) = {
                        let ob = match self.bodies.get(other) {
                            Some(b) => b,
                            None => continue,
                        };
                        (ob.body_type, ob.is_bullet())
                    };

                    // A non-bullet sub-step body ignores other dynamics; they
                    // get their own TOI events.
                    if other_type == BodyType::Dynamic && !seed_is_bullet && !other_bullet {
                        continue;
                    }

                    let sensor = self
                        .fixtures
                        .get(fixture_a)
                        .map(|f| f.is_sensor)
                        .unwrap_or(true)
                        || self
                            .fixtures
                            .get(fixture_b)
                            .map(|f| f.is_sensor)
                            .unwrap_or(true);
                    if sensor {
                        continue;
                    }

                    // Pull the neighbor to the impact time and re-evaluate.
                    let other_backup = self.bodies.get(other).expect("body is live").sweep;
                    let other_in_island = self.bodies.get(other).expect("body is live").island;
                    if !other_in_island {
                        self.bodies
                            .get_mut(other)
                            .expect("body is live")
                            .advance(min_alpha);
                    }

                    if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                        contact.update(ch, &mut self.bodies, &self.fixtures, listener);
                    }

                    let (touching, enabled) = {
                        let c = self.contact_manager.contacts.get(ch).expect("contact is live");
                        (c.touching, c.enabled)
                    };
                    if !enabled || !touching {
                        if !other_in_island {
                            let ob = self.bodies.get_mut(other).expect("body is live");
                            ob.sweep = other_backup;
                            ob.synchronize_transform();
                        }
                        continue;
                    }

                    self.contact_manager
                        .contacts
                        .get_mut(ch)
                        .expect("contact is live")
                        .island = true;
                    island_contacts.push(ch);

                    if !other_in_island {
                        let index = island_bodies.len();
                        let ob = self.bodies.get_mut(other).expect("body is live");
                        ob.island = true;
                        ob.island_index = index;
                        if other_type != BodyType::Static {
                            ob.set_awake(true);
                        }
                        island_bodies.push(other);
                    }
                }
            }

            for handle in &island_bodies {
                let body = self.bodies.get(*handle).expect("body is live");
                island.bodies.push(IslandBody::snapshot(*handle, body));
            }
            for ch in &island_contacts {
                if let Some(snapshot) = self.make_island_contact(*ch) {
                    island.contacts.push(snapshot);
                }
            }

            let sub_step = TimeStep {
                dt: (1.0 - min_alpha) * step.dt,
                inv_dt: if step.dt > 0.0 {
                    1.0 / ((1.0 - min_alpha) * step.dt)
                } else {
                    0.0
                },
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: crate::config::TOI_POSITION_ITERATIONS,
                warm_starting: false,
            };
            island.solve_toi(&sub_step, 0, 1);

            // Write back, resync proxies, and let the broad-phase surface
            // any contacts the correction created.
            for island_body in &island.bodies {
                let handle = island_body.handle;
                let is_static = {
                    let body = self.bodies.get_mut(handle).expect("body is live");
                    body.island = false;
                    if body.body_type != BodyType::Static {
                        body.sweep = island_body.sweep;
                        body.synchronize_transform();
                    }
                    body.body_type == BodyType::Static
                };

                // These bodies moved: every cached TOI involving them is
                // stale, not just the ones solved here.
                let contact_list = self
                    .bodies
                    .get(handle)
                    .expect("body is live")
                    .contacts
                    .clone();
                for ch in contact_list {
                    if let Some(contact) = self.contact_manager.contacts.get_mut(ch) {
                        contact.island = false;
                        contact.toi_valid = false;
                    }
                }

                if !is_static {
                    self.synchronize_fixtures(handle);
                }
            }

            island.clear();
            self.island_pool.push(island);

            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
        }
    }

    fn make_island_contact(&self, handle: ContactHandle) -> Option<IslandContact> {
        let contact = self.contact_manager.contacts.get(handle)?;
        let fa = self.fixtures.get(contact.fixture_a)?;
        let fb = self.fixtures.get(contact.fixture_b)?;
        let ba = self.bodies.get(fa.body)?;
        let bb = self.bodies.get(fb.body)?;

        if contact.manifold.point_count == 0 {
            return None;
        }

        Some(IslandContact {
            handle,
            manifold: contact.manifold,
            friction: contact.friction,
            restitution: contact.restitution,
            index_a: ba.island_index,
            index_b: bb.island_index,
            inv_mass_a: ba.inv_mass(),
            inv_mass_b: bb.inv_mass(),
            inv_i_a: ba.inv_inertia(),
            inv_i_b: bb.inv_inertia(),
            local_center_a: ba.local_center(),
            local_center_b: bb.local_center(),
            radius_a: fa.shape.radius(),
            radius_b: fb.shape.radius(),
        })
    }

    fn create_fixture_proxies(&mut self, handle: FixtureHandle, xf: &Transform) {
        let shape = match self.fixtures.get(handle) {
            Some(f) => f.shape,
            None => return,
        };
        for child in 0..shape.child_count() {
            let aabb = shape.compute_aabb(xf);
            let proxy_id = self.contact_manager.broad_phase.create_proxy(
                aabb,
                ProxyData {
                    fixture: handle,
                    child,
                },
            );
            if let Some(f) = self.fixtures.get_mut(handle) {
                f.proxies.push(FixtureProxy { proxy_id, child });
            }
        }
    }

    fn destroy_fixture_proxies(&mut self, handle: FixtureHandle) {
        let proxies: Vec<FixtureProxy> = match self.fixtures.get_mut(handle) {
            Some(f) => f.proxies.drain(..).collect(),
            None => return,
        };
        for proxy in proxies {
            self.contact_manager.broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    /// Re-fattens a body's proxies across its sweep interval so both the
    /// previous and current poses stay covered.
    fn synchronize_fixtures(&mut self, handle: BodyHandle) {
        let (sweep, xf2) = match self.bodies.get(handle) {
            Some(b) => (b.sweep, *b.transform()),
            None => return,
        };
        let xf1 = transform_from_sweep_start(&sweep);

        let fixture_handles: Vec<FixtureHandle> = self
            .bodies
            .get(handle)
            .map(|b| b.fixtures.clone())
            .unwrap_or_default();
        for fh in fixture_handles {
            let (shape, proxies) = match self.fixtures.get(fh) {
                Some(f) => (f.shape, f.proxies.clone()),
                None => continue,
            };
            for proxy in proxies {
                let aabb1 = shape.compute_aabb(&xf1);
                let aabb2 = shape.compute_aabb(&xf2);
                let aabb = aabb1.union(&aabb2);
                let displacement = aabb2.center() - aabb1.center();
                self.contact_manager
                    .broad_phase
                    .move_proxy(proxy.proxy_id, aabb, displacement);
            }
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(Vec2::from(crate::config::DEFAULT_GRAVITY))
    }
}

fn transform_from_sweep_start(sweep: &Sweep) -> Transform {
    let mut xf = Transform::new(Vec2::ZERO, sweep.a0);
    xf.p = sweep.c0 - xf.q.apply(sweep.local_center);
    xf
}

/// High-level convenience wrapper that owns a [`World`] and accumulates
/// variable frame time into fixed steps.
pub struct PhysicsEngine {
    world: World,
    time_step: f32,
    time_accumulated: f32,
    velocity_iterations: usize,
    position_iterations: usize,
}

impl PhysicsEngine {
    /// Creates an engine with the provided fixed timestep.
    pub fn new(time_step: f32) -> Self {
        let ts = if time_step <= 0.0 {
            DEFAULT_TIME_STEP
        } else {
            time_step
        };
        Self {
            world: World::default(),
            time_step: ts,
            time_accumulated: 0.0,
            velocity_iterations: crate::config::DEFAULT_VELOCITY_ITERATIONS,
            position_iterations: crate::config::DEFAULT_POSITION_ITERATIONS,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Advances the simulation by a variable frame delta using fixed steps.
    /// Returns the profile of the last step taken, if any.
    pub fn update(&mut self, frame_dt: f32) -> Option<Profile> {
        self.time_accumulated += frame_dt;
        let mut last = None;
        while self.time_accumulated >= self.time_step {
            self.time_accumulated -= self.time_step;
            last = Some(self.world.step(
                self.time_step,
                self.velocity_iterations,
                self.position_iterations,
            ));
        }
        last
    }
}
