//! Islands: connected components of awake dynamic bodies joined by touching
//! contacts and joints, solved as independent units.
//!
//! An island owns snapshots of its bodies, contacts, and joints, so solving
//! touches no shared state. The world extracts islands sequentially (which
//! assigns island-local indices), solves them in body-list order — or in
//! parallel under the `parallel` feature, which is safe because islands share
//! no dynamic body — and writes the results back in deterministic order.

use glam::Vec2;

use crate::{
    collision::contact::ContactHandle,
    config::{ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, TIME_TO_SLEEP, TOI_POSITION_ITERATIONS},
    core::{
        joints::{Joint, JointHandle},
        rigidbody::{BodyHandle, RigidBody},
        types::{BodyType, Sweep, Velocity},
    },
    dynamics::{
        integrator::{
            integrate_position, integrate_velocity, IntegrationParams, PositionState, TimeStep,
            VelocityState,
        },
        solver::{ContactImpulse, ContactSolver, IslandContact},
    },
};

/// Snapshot of one body's solver-relevant state.
#[derive(Debug, Clone)]
pub(crate) struct IslandBody {
    pub handle: BodyHandle,
    pub body_type: BodyType,
    pub sweep: Sweep,
    pub velocity: Velocity,
    pub force: Vec2,
    pub torque: f32,
    pub inv_mass: f32,
    pub inv_inertia: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub sleep_time: f32,
    pub allow_sleep: bool,
}

impl IslandBody {
    pub fn snapshot(handle: BodyHandle, body: &RigidBody) -> Self {
        Self {
            handle,
            body_type: body.body_type,
            sweep: body.sweep,
            velocity: body.velocity,
            force: body.force,
            torque: body.torque,
            inv_mass: body.inv_mass(),
            inv_inertia: body.inv_inertia(),
            linear_damping: body.linear_damping,
            angular_damping: body.angular_damping,
            gravity_scale: body.gravity_scale,
            sleep_time: body.sleep_time,
            allow_sleep: body.allow_sleep,
        }
    }
}

/// One connected component, ready to solve.
#[derive(Default)]
pub(crate) struct Island {
    pub bodies: Vec<IslandBody>,
    pub contacts: Vec<IslandContact>,
    pub joints: Vec<(JointHandle, Joint)>,
    positions: Vec<PositionState>,
    velocities: Vec<VelocityState>,
    /// Per-contact applied impulses, reported through `post_solve`.
    pub impulses: Vec<(ContactHandle, ContactImpulse)>,
    /// The whole island went to sleep this step.
    pub slept: bool,
}

impl Island {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
        self.positions.clear();
        self.velocities.clear();
        self.impulses.clear();
        self.slept = false;
    }

    /// Full discrete solve: velocity integration, constraint solving,
    /// position integration and correction, and the atomic sleep decision.
    pub fn solve(&mut self, step: &TimeStep, gravity: Vec2, allow_sleep: bool) {
        let dt = step.dt;

        // Integrate velocities and load solver states.
        self.positions.clear();
        self.velocities.clear();
        for body in &mut self.bodies {
            let mut velocity = VelocityState {
                v: body.velocity.linear,
                w: body.velocity.angular,
            };

            if body.body_type == BodyType::Dynamic {
                integrate_velocity(
                    &mut velocity,
                    &IntegrationParams {
                        inv_mass: body.inv_mass,
                        inv_inertia: body.inv_inertia,
                        gravity_scale: body.gravity_scale,
                        linear_damping: body.linear_damping,
                        angular_damping: body.angular_damping,
                    },
                    gravity,
                    body.force,
                    body.torque,
                    dt,
                );
            }

            self.positions.push(PositionState {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(velocity);
        }

        // Initialize constraints; apply warm-start impulses.
        let mut contact_solver = ContactSolver::new(step, &self.contacts);
        contact_solver.initialize_velocity_constraints(
            &self.contacts,
            &self.positions,
            &self.velocities,
        );
        if step.warm_starting {
            contact_solver.warm_start(&mut self.velocities);
        }
        for (_, joint) in &mut self.joints {
            joint.init_velocity_constraints(step, &self.positions, &mut self.velocities);
        }

        // Velocity iterations.
        for _ in 0..step.velocity_iterations {
            for (_, joint) in &mut self.joints {
                joint.solve_velocity_constraints(step, &mut self.velocities);
            }
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }
        contact_solver.store_impulses(&mut self.contacts);

        // Integrate positions.
        for i in 0..self.bodies.len() {
            if self.bodies[i].body_type == BodyType::Static {
                continue;
            }
            integrate_position(&mut self.positions[i], &mut self.velocities[i], dt);
        }

        // Position correction, with early exit once both report satisfied.
        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_ok = contact_solver.solve_position_constraints(&mut self.positions);

            let mut joints_ok = true;
            for (_, joint) in &mut self.joints {
                joints_ok &= joint.solve_position_constraints(&mut self.positions);
            }

            if contacts_ok && joints_ok {
                position_solved = true;
                break;
            }
        }

        // Store solved state back into the snapshots.
        for (i, body) in self.bodies.iter_mut().enumerate() {
            if body.body_type == BodyType::Static {
                continue;
            }
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.velocity.linear = self.velocities[i].v;
            body.velocity.angular = self.velocities[i].w;
        }

        self.impulses.clear();
        for (i, contact) in self.contacts.iter().enumerate() {
            self.impulses
                .push((contact.handle, contact_solver.impulse_for(i)));
        }

        // Sleep is decided per island: one fast body keeps everyone awake.
        if allow_sleep {
            let mut min_sleep_time = f32::MAX;

            let lin_tol_sq = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
            let ang_tol_sq = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

            for body in &mut self.bodies {
                if body.body_type == BodyType::Static {
                    continue;
                }

                if !body.allow_sleep
                    || body.velocity.angular * body.velocity.angular > ang_tol_sq
                    || body.velocity.linear.length_squared() > lin_tol_sq
                {
                    body.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    body.sleep_time += dt;
                    min_sleep_time = min_sleep_time.min(body.sleep_time);
                }
            }

            if min_sleep_time >= TIME_TO_SLEEP && position_solved {
                self.slept = true;
            }
        }
    }

    /// Positions-only sub-step solve after a time-of-impact advancement.
    /// Only the two TOI bodies receive corrective mass; the velocity pass is
    /// intentionally absent — the next discrete step resolves approach
    /// velocity through the normal contact solver.
    pub fn solve_toi(&mut self, sub_step: &TimeStep, toi_index_a: usize, toi_index_b: usize) {
        self.positions.clear();
        self.velocities.clear();
        for body in &self.bodies {
            self.positions.push(PositionState {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(VelocityState {
                v: body.velocity.linear,
                w: body.velocity.angular,
            });
        }

        let mut contact_solver = ContactSolver::new(sub_step, &self.contacts);
        for _ in 0..TOI_POSITION_ITERATIONS {
            if contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            ) {
                break;
            }
        }

        for (i, body) in self.bodies.iter_mut().enumerate() {
            if body.body_type == BodyType::Static {
                continue;
            }
            // The corrected configuration becomes the new sweep origin, so a
            // later TOI advance in the same step interpolates from here.
            body.sweep.c0 = self.positions[i].c;
            body.sweep.a0 = self.positions[i].a;
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
        }
    }
}
