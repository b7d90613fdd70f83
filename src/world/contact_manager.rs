//! Contact lifecycle: broad-phase pair discovery, filter gating, manifold
//! updates, and begin/end-touch notification.

use crate::{
    collision::{
        broadphase::BroadPhase,
        contact::{Contact, ContactHandle},
    },
    core::{
        fixture::{Fixture, FixtureHandle},
        joints::Joint,
        rigidbody::RigidBody,
        types::BodyType,
    },
    utils::allocator::Arena,
    world::ContactListener,
};

/// Broad-phase user data: which fixture child a proxy belongs to.
#[derive(Debug, Clone, Copy)]
pub struct ProxyData {
    pub fixture: FixtureHandle,
    pub child: usize,
}

/// Owns the broad-phase and all contacts. Contacts exist exactly while the
/// paired fixtures' fattened AABBs overlap; touching is tracked separately.
pub struct ContactManager {
    pub broad_phase: BroadPhase<ProxyData>,
    pub contacts: Arena<Contact>,
}

impl Default for ContactManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactManager {
    pub fn new() -> Self {
        Self {
            broad_phase: BroadPhase::new(),
            contacts: Arena::new(),
        }
    }

    /// Turns new broad-phase overlaps into contacts, applying the collision
    /// filter and the bodies' own collision rules.
    pub fn find_new_contacts(
        &mut self,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
    ) {
        let ContactManager {
            broad_phase,
            contacts,
        } = self;

        broad_phase.update_pairs(|data_a, data_b| {
            Self::add_pair(contacts, bodies, fixtures, joints, data_a, data_b);
        });
    }

    fn add_pair(
        contacts: &mut Arena<Contact>,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
        data_a: ProxyData,
        data_b: ProxyData,
    ) {
        let (fixture_a, fixture_b) = (data_a.fixture, data_b.fixture);
        if fixture_a == fixture_b {
            return;
        }

        let (fa, fb) = match (fixtures.get(fixture_a), fixtures.get(fixture_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let (body_a, body_b) = (fa.body, fb.body);
        if body_a == body_b {
            return;
        }

        // Does a contact for this exact fixture/child pair already exist?
        // The second body's adjacency list is authoritative.
        if let Some(b) = bodies.get(body_b) {
            for handle in &b.contacts {
                if let Some(contact) = contacts.get(*handle) {
                    let same = contact.fixture_a == fixture_a
                        && contact.fixture_b == fixture_b
                        && contact.child_a == data_a.child
                        && contact.child_b == data_b.child;
                    let swapped = contact.fixture_a == fixture_b
                        && contact.fixture_b == fixture_a
                        && contact.child_a == data_b.child
                        && contact.child_b == data_a.child;
                    if same || swapped {
                        return;
                    }
                }
            }
        }

        {
            let (ba, bb) = match (bodies.get(body_a), bodies.get(body_b)) {
                (Some(a), Some(b)) => (a, b),
                _ => return,
            };
            if !bb.should_collide(ba, body_a, joints) {
                return;
            }
            if !fa.filter.should_collide(&fb.filter) {
                return;
            }
        }

        // Order the pair so polygon comes before circle; the narrow phase
        // dispatch then has one canonical form.
        use crate::collision::shapes::Shape;
        let flip = matches!((&fa.shape, &fb.shape), (Shape::Circle(_), Shape::Polygon(_)));
        let (fixture_a, fixture_b, child_a, child_b, body_a, body_b) = if flip {
            (fixture_b, fixture_a, data_b.child, data_a.child, body_b, body_a)
        } else {
            (fixture_a, fixture_b, data_a.child, data_b.child, body_a, body_b)
        };

        let contact = Contact::new(fixture_a, fixture_b, child_a, child_b, fixtures);
        let handle = contacts.insert(contact);

        if let Some(body) = bodies.get_mut(body_a) {
            body.contacts.push(handle);
        }
        if let Some(body) = bodies.get_mut(body_b) {
            body.contacts.push(handle);
        }
    }

    /// Per-step narrow-phase pass: destroys contacts whose proxies stopped
    /// overlapping or that fail a re-checked filter, updates the rest.
    pub fn collide(
        &mut self,
        bodies: &mut Arena<RigidBody>,
        fixtures: &Arena<Fixture>,
        joints: &Arena<Joint>,
        listener: &mut dyn ContactListener,
    ) {
        let handles: Vec<ContactHandle> = self.contacts.handles().collect();

        for handle in handles {
            let (fixture_a, fixture_b, child_a, child_b, filter_dirty) =
                match self.contacts.get(handle) {
                    Some(c) => (c.fixture_a, c.fixture_b, c.child_a, c.child_b, c.filter_dirty),
                    None => continue,
                };

            let (fa, fb) = match (fixtures.get(fixture_a), fixtures.get(fixture_b)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    self.destroy(handle, bodies, listener);
                    continue;
                }
            };
            let (body_a, body_b) = (fa.body, fb.body);

            if filter_dirty {
                if let Some(c) = self.contacts.get_mut(handle) {
                    c.filter_dirty = false;
                }
                let keep = match (bodies.get(body_a), bodies.get(body_b)) {
                    (Some(ba), Some(bb)) => {
                        bb.should_collide(ba, body_a, joints)
                            && fa.filter.should_collide(&fb.filter)
                    }
                    _ => false,
                };
                if !keep {
                    self.destroy(handle, bodies, listener);
                    continue;
                }
            }

            // Neither body active: the manifold cannot change.
            let active = |b: Option<&RigidBody>| {
                b.map(|b| b.is_awake() && b.body_type != BodyType::Static)
                    .unwrap_or(false)
            };
            if !active(bodies.get(body_a)) && !active(bodies.get(body_b)) {
                continue;
            }

            let proxy_a = fa.proxies[child_a].proxy_id;
            let proxy_b = fb.proxies[child_b].proxy_id;

            if !self.broad_phase.test_overlap(proxy_a, proxy_b) {
                // The fattened AABBs separated; the pairing is over.
                self.destroy(handle, bodies, listener);
                continue;
            }

            if let Some(contact) = self.contacts.get_mut(handle) {
                contact.update(handle, bodies, fixtures, listener);
            }
        }
    }

    /// Removes a contact, firing `end_contact` when it was touching, and
    /// unlinks it from both bodies' adjacency lists.
    pub fn destroy(
        &mut self,
        handle: ContactHandle,
        bodies: &mut Arena<RigidBody>,
        listener: &mut dyn ContactListener,
    ) {
        let (body_a, body_b, touching) = match self.contacts.get(handle) {
            Some(c) => (c.body_a, c.body_b, c.touching),
            None => return,
        };

        if touching {
            if let Some(contact) = self.contacts.get_mut(handle) {
                listener.end_contact(handle, contact);
            }
        }

        for body_handle in [body_a, body_b] {
            if let Some(body) = bodies.get_mut(body_handle) {
                body.contacts.retain(|&c| c != handle);
                if touching {
                    body.set_awake(true);
                }
            }
        }

        self.contacts.remove(handle);
    }
}
