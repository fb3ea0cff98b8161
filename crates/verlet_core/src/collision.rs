//! Collision detection and response for one step.
//!
//! # Per-step pipeline
//!
//! 1. Clear the processed-pair set and the response accumulator
//! 2. Rebuild the octree over every body
//! 3. For each pair sharing a crowded leaf, skip it if already resolved
//! 4. Run the narrow phase for the pair's shapes
//! 5. On overlap, mark the pair resolved and emit particle responses
//! 6. Average responses per particle and apply them
//! 7. Clear per-step state
//!
//! # Cuboid vs cuboid
//!
//! Each corner of one box that ended up inside the other is pushed back to
//! the surface. A ray is cast along the corner's motion (or toward the box
//! centre if the corner was already inside last step), starting far enough
//! behind its last position to be outside the box, and the nearest face it
//! enters through gives the surface point. The opposite displacement is
//! shared among the hit triangle's three corners by barycentric weight. Both
//! directions are tested, so corners of either box can be resolved.
//!
//! # Ball vs ball
//!
//! Both balls are moved apart along the centre line to exactly touching,
//! and their per-step velocities are reflected with an elastic,
//! mass-weighted exchange. The previous positions are rewritten so the new
//! velocities survive into the next step.

use std::collections::{HashMap, HashSet};

use bevy::log::{trace, warn_once};
use bevy::math::Vec3;

use crate::body::{BodyId, RigidBody, Shape};
use crate::narrow_phase::{obb_overlap, raycast_triangles, sphere_sphere};
use crate::octree::Octree;
use crate::response::{PairKey, ParticleKey, Response, ResponseSet};

/// Extra distance, beyond the box diagonal, that rays start behind a
/// corner's last position.
pub const RAY_BACKDATE_PADDING: f32 = 0.5;

/// Where the engine is inside [`CollisionEngine::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Rebuilding,
    Gathering,
    Resolving,
}

/// What happened during one [`CollisionEngine::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionReport {
    /// Octree leaves holding more than one body.
    pub candidate_leaves: usize,
    /// Narrow-phase tests actually run.
    pub narrow_phase_tests: usize,
    /// Distinct overlapping pairs that produced responses.
    pub resolved_pairs: usize,
    /// Particles moved after merging.
    pub responses_applied: usize,
    /// Surface points found by the rays, and ball contact points.
    pub contact_points: Vec<Vec3>,
}

/// Broad phase, narrow phase and response for a set of bodies.
#[derive(Debug, Clone)]
pub struct CollisionEngine {
    octree: Octree,
    processed_pairs: HashSet<PairKey>,
    responses: ResponseSet,
    phase: Phase,
}

impl CollisionEngine {
    pub fn new(world_size: f32, max_depth: u32) -> Self {
        Self {
            octree: Octree::new(world_size, max_depth),
            processed_pairs: HashSet::new(),
            responses: ResponseSet::new(),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    /// Drop all per-step state, including the octree.
    pub fn clear(&mut self) {
        self.octree.clear();
        self.processed_pairs.clear();
        self.responses.clear();
        self.phase = Phase::Idle;
    }

    /// Detect and resolve collisions between `bodies` for one step.
    pub fn update(&mut self, bodies: &mut [RigidBody]) -> CollisionReport {
        let mut report = CollisionReport::default();
        self.processed_pairs.clear();
        self.responses.clear();

        self.phase = Phase::Rebuilding;
        self.octree.rebuild(bodies);

        self.phase = Phase::Gathering;
        let mut candidates = Vec::new();
        for leaf in self.octree.leaves_with_multiple_bodies() {
            report.candidate_leaves += 1;
            for (n, &i) in leaf.bodies.iter().enumerate() {
                for &j in &leaf.bodies[n + 1..] {
                    candidates.push((i, j));
                }
            }
        }

        for (i, j) in candidates {
            let (a, b) = (&bodies[i], &bodies[j]);
            let key = PairKey::new(a.id(), b.id());
            if self.processed_pairs.contains(&key) {
                continue;
            }

            report.narrow_phase_tests += 1;
            let overlapping = match (a.shape(), b.shape()) {
                (Shape::Cuboid { .. }, Shape::Cuboid { .. }) => {
                    obb_overlap(&a.obb(), &b.obb()).is_some()
                }
                (Shape::Ball { radius: ra, .. }, Shape::Ball { radius: rb, .. }) => {
                    sphere_sphere(a.center(), ra, b.center(), rb)
                }
                _ => {
                    warn_once!("cuboid-ball collisions are not supported; such pairs never collide");
                    false
                }
            };
            if !overlapping {
                continue;
            }

            self.processed_pairs.insert(key);
            report.resolved_pairs += 1;
            match (a.shape(), b.shape()) {
                (Shape::Cuboid { .. }, Shape::Cuboid { .. }) => {
                    push_corner_responses(a, b, &mut self.responses, &mut report.contact_points);
                    push_corner_responses(b, a, &mut self.responses, &mut report.contact_points);
                }
                _ => push_ball_responses(a, b, &mut self.responses, &mut report.contact_points),
            }
        }

        if report.resolved_pairs > 0 {
            self.phase = Phase::Resolving;
            report.responses_applied = apply_responses(&self.responses, bodies);
        }

        trace!(
            "collision step: {} candidate leaves, {} tests, {} pairs, {} responses",
            report.candidate_leaves,
            report.narrow_phase_tests,
            report.resolved_pairs,
            report.responses_applied
        );

        self.processed_pairs.clear();
        self.responses.clear();
        self.octree.clear();
        self.phase = Phase::Idle;
        report
    }
}

/// Push every corner of `inner` that lies inside `outer` back to the face
/// it entered through.
fn push_corner_responses(
    inner: &RigidBody,
    outer: &RigidBody,
    responses: &mut ResponseSet,
    contacts: &mut Vec<Vec3>,
) {
    let obb = outer.obb();
    let triangles = outer.triangles();
    let backdate = 2.0 * obb.half_extents.length() + RAY_BACKDATE_PADDING;

    for particle in inner.particles() {
        let position = particle.position();
        if !obb.contains(position) {
            continue;
        }

        // Corners that entered this step go back along their motion; ones
        // already inside last step (resting contact) are pushed out radially.
        let last = particle.last_position();
        let motion = position - last;
        let radial = obb.center - position;
        let preferred = if obb.contains(last) {
            [radial, motion]
        } else {
            [motion, radial]
        };
        let Some(direction) = preferred.into_iter().find_map(Vec3::try_normalize) else {
            trace!(
                "corner {} of body {} sits on the centre of body {}; skipped",
                particle.index(),
                inner.id(),
                outer.id()
            );
            continue;
        };

        let origin = last - direction * backdate;
        let Some((hit, triangle)) = raycast_triangles(origin, direction, &triangles) else {
            continue;
        };

        let delta = hit.point - position;
        responses.push(Response {
            key: ParticleKey::new(inner.id(), particle.index()),
            position_delta: delta,
            last_position_delta: None,
        });
        for (corner, weight) in triangle.corners.iter().zip(hit.weights()) {
            responses.push(Response {
                key: ParticleKey::new(outer.id(), *corner),
                position_delta: -delta * weight,
                last_position_delta: None,
            });
        }
        contacts.push(hit.point);
    }
}

/// Separate two overlapping balls and exchange their normal velocities.
fn push_ball_responses(
    a: &RigidBody,
    b: &RigidBody,
    responses: &mut ResponseSet,
    contacts: &mut Vec<Vec3>,
) {
    let (Shape::Ball { radius: ra, .. }, Shape::Ball { radius: rb, .. }) = (a.shape(), b.shape())
    else {
        return;
    };
    let (pa, pb) = (&a.particles()[0], &b.particles()[0]);
    let (ca, cb) = (pa.position(), pb.position());

    let offset = cb - ca;
    let distance = offset.length();
    let Some(normal) = offset.try_normalize() else {
        trace!("balls {} and {} are concentric; skipped", a.id(), b.id());
        return;
    };

    // A kinematic ball has infinite mass: it keeps its place and the other
    // ball takes the whole separation and the whole reflection.
    let (contact, share_a, share_b) = match (a.is_kinematic(), b.is_kinematic()) {
        (true, true) => return,
        (true, false) => (ca + normal * ra, 0.0, 2.0),
        (false, true) => (cb - normal * rb, 2.0, 0.0),
        (false, false) => {
            let (ma, mb) = (pa.mass(), pb.mass());
            let total = ma + mb;
            (
                ca + normal * distance * ra / (ra + rb),
                2.0 * mb / total,
                2.0 * ma / total,
            )
        }
    };
    let valid_a = contact - normal * ra;
    let valid_b = contact + normal * rb;

    let mut va = ca - pa.last_position();
    let mut vb = cb - pb.last_position();
    let approach = (va - vb).dot(normal);
    if approach > 0.0 {
        va -= normal * (share_a * approach);
        vb += normal * (share_b * approach);
    }

    for (particle, body, current, valid, velocity) in [
        (pa, a, ca, valid_a, va),
        (pb, b, cb, valid_b, vb),
    ] {
        if body.is_kinematic() {
            continue;
        }
        let adjustment = (valid - current).length();
        let position = valid + velocity.normalize_or_zero() * adjustment;
        let last_position = position - velocity;
        responses.push(Response {
            key: ParticleKey::new(body.id(), particle.index()),
            position_delta: position - current,
            last_position_delta: Some(last_position - particle.last_position()),
        });
    }
    contacts.push(contact);
}

/// Apply the merged responses. Kinematic bodies are left alone. Returns the
/// number of particles moved.
fn apply_responses(responses: &ResponseSet, bodies: &mut [RigidBody]) -> usize {
    let slots: HashMap<BodyId, usize> = bodies
        .iter()
        .enumerate()
        .map(|(slot, body)| (body.id(), slot))
        .collect();

    let mut applied = 0;
    for response in responses.merged() {
        let Some(&slot) = slots.get(&response.key.body) else {
            continue;
        };
        let body = &mut bodies[slot];
        if body.is_kinematic() {
            continue;
        }
        let Some(particle) = body.particles_mut().get_mut(response.key.particle) else {
            continue;
        };

        particle.set_position(particle.position() + response.position_delta);
        if let Some(delta) = response.last_position_delta {
            particle.set_last_position(particle.last_position() + delta);
        }
        applied += 1;
    }
    applied
}
