//! Verlet-integrated point masses.
//!
//! A particle stores its current and previous position; velocity is implicit
//! in their difference. Every rigid body is built from particles: eight box
//! corners, or the single centre of a ball.
//!
//! # Integration (per step)
//!
//! ```text
//! a        = gravity? + force / mass
//! damping  = 1 - drag * dt
//! new      = (1 + damping) * pos - damping * last + a * dt²
//! ```
//!
//! followed by the particle's [`Boundary`] policy.

use bevy::math::Vec3;

use crate::error::{PhysicsError, PhysicsResult};

/// How a particle is kept inside the world cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary {
    /// Clamp each axis to `[-bound, bound]`. Used for box corners.
    Clamp,
    /// Bounce a sphere of `radius` off the walls, keeping `bounciness` of the
    /// normal velocity.
    Reflect { radius: f32, bounciness: f32 },
}

/// A Verlet point mass owned by a rigid body.
#[derive(Debug, Clone)]
pub struct Particle {
    position: Vec3,
    last_position: Vec3,
    force: Vec3,
    mass: f32,
    drag: f32,
    world_bound: f32,
    use_gravity: bool,
    boundary: Boundary,
    /// Length of the last step, zero until the first update.
    dt: f32,
    /// Set when a reflecting particle was found entirely outside the world.
    stopped: bool,
    body_id: u32,
    index: usize,
}

impl Particle {
    /// Create a particle at rest at `position`.
    ///
    /// Fails if `mass` is not finite and positive or `drag` is outside `[0, 1)`.
    pub fn new(
        body_id: u32,
        index: usize,
        position: Vec3,
        mass: f32,
        drag: f32,
        world_bound: f32,
    ) -> PhysicsResult<Self> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(PhysicsError::InvalidMass { mass });
        }
        if !(drag.is_finite() && (0.0..1.0).contains(&drag)) {
            return Err(PhysicsError::InvalidDrag { drag });
        }

        Ok(Self {
            position,
            last_position: position,
            force: Vec3::ZERO,
            mass,
            drag,
            world_bound,
            use_gravity: true,
            boundary: Boundary::Clamp,
            dt: 0.0,
            stopped: false,
            body_id,
            index,
        })
    }

    /// Builder: enable or disable gravity.
    pub fn with_gravity(mut self, use_gravity: bool) -> Self {
        self.use_gravity = use_gravity;
        self
    }

    /// Builder: replace the boundary policy.
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Advance one Verlet step of length `dt` under `gravity` (magnitude along -Y).
    pub fn update(&mut self, dt: f32, gravity: f32) {
        let gravity_acc = if self.use_gravity {
            Vec3::new(0.0, -gravity, 0.0)
        } else {
            Vec3::ZERO
        };
        let acceleration = gravity_acc + self.force / self.mass;
        let damping = 1.0 - self.drag * dt;

        let mut new_position = (1.0 + damping) * self.position - damping * self.last_position
            + acceleration * dt * dt;
        let mut old_position = self.position;

        match self.boundary {
            Boundary::Clamp => {
                new_position = new_position.clamp(
                    Vec3::splat(-self.world_bound),
                    Vec3::splat(self.world_bound),
                );
            }
            Boundary::Reflect { radius, bounciness } => {
                for axis in 0..3 {
                    let (new_axis, old_axis, deep) = reflect_axis(
                        new_position[axis],
                        old_position[axis],
                        radius,
                        bounciness,
                        self.world_bound,
                    );
                    new_position[axis] = new_axis;
                    old_position[axis] = old_axis;
                    self.stopped |= deep;
                }
            }
        }

        self.last_position = old_position;
        self.position = new_position;
        self.dt = dt;
        self.force = Vec3::ZERO;
    }

    /// Accumulate a force for the next update.
    pub fn apply_force(&mut self, force: Vec3) {
        self.force += force;
    }

    /// Current position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Position before the last update.
    pub fn last_position(&self) -> Vec3 {
        self.last_position
    }

    /// Velocity over the last step, zero before the first update.
    pub fn velocity(&self) -> Vec3 {
        if self.dt > 0.0 {
            (self.position - self.last_position) / self.dt
        } else {
            Vec3::ZERO
        }
    }

    /// Overwrite the current position, leaving the history untouched.
    ///
    /// The implied velocity changes accordingly on the next step.
    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Overwrite the previous position (and with it the implied velocity).
    pub fn set_last_position(&mut self, last_position: Vec3) {
        self.last_position = last_position;
    }

    /// Teleport to `position` at rest.
    pub fn reset(&mut self, position: Vec3) {
        self.position = position;
        self.last_position = position;
        self.force = Vec3::ZERO;
        self.stopped = false;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn drag(&self) -> f32 {
        self.drag
    }

    pub fn uses_gravity(&self) -> bool {
        self.use_gravity
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Length of the last step (zero before the first update).
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Id of the owning body.
    pub fn body_id(&self) -> u32 {
        self.body_id
    }

    /// Index of this particle inside its body.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the last update found this particle entirely outside the world.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Read and clear the stopped flag.
    pub fn take_stopped(&mut self) -> bool {
        std::mem::take(&mut self.stopped)
    }
}

/// Reflect a single axis of a sphere against the walls at `±bound`.
///
/// Returns `(new, old, deep)` where `deep` means the sphere was already
/// entirely outside the world and both positions were mirrored.
fn reflect_axis(new: f32, old: f32, radius: f32, bounciness: f32, bound: f32) -> (f32, f32, bool) {
    if new - radius > bound || new + radius < -bound {
        let limit = if new > 0.0 { bound - radius } else { -bound + radius };
        return (2.0 * limit - new, 2.0 * limit - old, true);
    }

    if new + radius > bound {
        let limit = bound - radius;
        return (limit, limit + (new - old) * bounciness, false);
    }

    if new - radius < -bound {
        let limit = -bound + radius;
        return (limit, limit + (new - old) * bounciness, false);
    }

    (new, old, false)
}
