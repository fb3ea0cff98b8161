//! Top-level simulation driver.
//!
//! One [`World::step`] runs:
//!
//! 1. Integrate every non-kinematic body, resetting balls that escaped the
//!    world entirely
//! 2. Detect and resolve collisions (when enabled)
//! 3. Relax every body's distance constraints

use bevy::log::{debug, info, warn};
use bevy::math::Vec3;

use crate::body::{BodyDesc, BodyId, BodyView, RigidBody};
use crate::collision::{CollisionEngine, CollisionReport};
use crate::config::EngineConfig;
use crate::error::PhysicsResult;
use crate::narrow_phase::Aabb;
use crate::octree::Octree;

/// Handle to a body in a [`World`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub BodyId);

/// Owns every body and advances them together.
#[derive(Debug, Clone)]
pub struct World {
    config: EngineConfig,
    bodies: Vec<RigidBody>,
    next_id: BodyId,
    engine: CollisionEngine,
    last_report: CollisionReport,
}

impl Default for World {
    fn default() -> Self {
        Self::from_valid_config(EngineConfig::default())
    }
}

impl World {
    /// Create an empty world. Fails if `config` does not validate.
    pub fn new(config: EngineConfig) -> PhysicsResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: EngineConfig) -> Self {
        Self {
            engine: CollisionEngine::new(config.world_size, config.octree_max_depth),
            config,
            bodies: Vec::new(),
            next_id: 0,
            last_report: CollisionReport::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a body and return its handle.
    pub fn add_body(&mut self, desc: BodyDesc) -> PhysicsResult<BodyHandle> {
        let id = self.next_id;
        let body = RigidBody::new(
            id,
            &desc,
            self.config.world_size,
            self.config.default_bounciness,
        )?;
        self.bodies.push(body);
        self.next_id += 1;
        Ok(BodyHandle(id))
    }

    /// Advance the simulation by exactly `dt` seconds.
    ///
    /// A non-positive or non-finite `dt` leaves the world untouched.
    pub fn step(&mut self, dt: f32) {
        if !(dt.is_finite() && dt > 0.0) {
            warn!("Ignoring physics step with dt = {}", dt);
            return;
        }

        let gravity = self.config.gravity;
        for body in &mut self.bodies {
            body.integrate(dt, gravity);
            if body.take_stopped() {
                debug!(
                    "Body {} left the world; resetting to {:?}",
                    body.id(),
                    body.start_position()
                );
                body.reset_to_start();
                body.integrate(dt, gravity);
                // A start outside the world gets mirrored in again; only
                // reset once per step.
                body.take_stopped();
            }
        }

        self.last_report = if self.config.collision_enabled {
            self.engine.update(&mut self.bodies)
        } else {
            CollisionReport::default()
        };

        for body in &mut self.bodies {
            body.relax();
        }
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.iter().find(|b| b.id() == handle.0)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Rendering snapshot of every body.
    pub fn body_views(&self) -> Vec<BodyView> {
        self.bodies.iter().map(RigidBody::view).collect()
    }

    /// Push a body with `force` during the next step. Returns `false` if the
    /// handle is unknown.
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec3) -> bool {
        match self.bodies.iter_mut().find(|b| b.id() == handle.0) {
            Some(body) => {
                body.apply_force(force);
                true
            }
            None => false,
        }
    }

    /// Remove every body and start numbering from zero again.
    pub fn clear(&mut self) {
        info!("Clearing physics world ({} bodies)", self.bodies.len());
        self.bodies.clear();
        self.next_id = 0;
        self.engine.clear();
        self.last_report = CollisionReport::default();
    }

    /// Summary of the collision pass of the last step.
    pub fn last_report(&self) -> &CollisionReport {
        &self.last_report
    }

    /// Surface triangles of every cuboid.
    pub fn debug_triangles(&self) -> Vec<[Vec3; 3]> {
        self.bodies
            .iter()
            .flat_map(|body| body.triangles())
            .map(|tri| tri.vertices)
            .collect()
    }

    /// Leaf cells of an octree built over the current bodies.
    ///
    /// Built on the side; the engine's own tree is not touched.
    pub fn octree_leaf_boxes(&self) -> Vec<Aabb> {
        let mut tree = Octree::new(self.config.world_size, self.config.octree_max_depth);
        tree.rebuild(&self.bodies);
        tree.leaves().map(|leaf| leaf.aabb()).collect()
    }
}
