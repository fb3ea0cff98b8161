//! Rigid bodies built from constrained particles.
//!
//! A cuboid is eight corner particles held together by the complete lattice
//! of 28 distance constraints (12 edges, 12 face diagonals, 4 body
//! diagonals). A ball is a single particle with a radius; its orientation is
//! always the world frame.
//!
//! Corner layout (local signs of `x, y, z`):
//!
//! ```text
//!        +Y face              -Y face
//!   p1(-,+,+)  p0(+,+,+)   p5(-,-,+)  p4(+,-,+)
//!   p2(-,+,-)  p3(+,+,-)   p6(-,-,-)  p7(+,-,-)
//! ```
//!
//! Orientation is not simulated: it is recovered every frame from the corner
//! positions, so a box rotates only because its corners were pushed.

use bevy::log::debug;
use bevy::math::{Mat3, Quat, Vec3};

use crate::constraint::{relax, Constraint};
use crate::error::{require_positive, PhysicsError, PhysicsResult};
use crate::narrow_phase::{Aabb, Obb, Triangle, CUBOID_TRIANGLES};
use crate::particle::{Boundary, Particle};

/// Identifier of a body, unique within a world until it is cleared.
pub type BodyId = u32;

/// Local corner signs, indexed like the particles of a cuboid.
const CORNER_SIGNS: [Vec3; 8] = [
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(1.0, -1.0, 1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
];

/// Shape of a body and the constants that go with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32, bounciness: f32 },
}

impl Shape {
    pub fn is_cuboid(&self) -> bool {
        matches!(self, Shape::Cuboid { .. })
    }

    pub fn is_ball(&self) -> bool {
        matches!(self, Shape::Ball { .. })
    }
}

/// Requested shape of a new body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyKind {
    Cuboid { half_extents: Vec3 },
    Ball { radius: f32 },
}

/// Everything needed to add a body to a world.
///
/// Start from [`BodyDesc::cuboid`] or [`BodyDesc::ball`] and override fields:
///
/// ```ignore
/// let crate_desc = BodyDesc {
///     rotation: Quat::from_rotation_y(0.4),
///     mass: 4.0,
///     ..BodyDesc::cuboid(Vec3::new(0.0, 3.0, 0.0), Vec3::splat(0.5))
/// };
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub position: Vec3,
    pub rotation: Quat,
    /// Total mass, split evenly between the body's particles.
    pub mass: f32,
    /// Linear drag in `[0, 1)`.
    pub drag: f32,
    /// Wall bounciness for balls. `None` uses the world's default.
    pub bounciness: Option<f32>,
    pub use_gravity: bool,
    /// Kinematic bodies are never integrated or pushed by collisions.
    pub is_kinematic: bool,
    /// Render colour, carried through untouched.
    pub color: [f32; 3],
}

impl BodyDesc {
    pub fn cuboid(position: Vec3, half_extents: Vec3) -> Self {
        Self::with_kind(BodyKind::Cuboid { half_extents }, position)
    }

    pub fn ball(position: Vec3, radius: f32) -> Self {
        Self::with_kind(BodyKind::Ball { radius }, position)
    }

    fn with_kind(kind: BodyKind, position: Vec3) -> Self {
        Self {
            kind,
            position,
            rotation: Quat::IDENTITY,
            mass: 1.0,
            drag: 0.0,
            bounciness: None,
            use_gravity: true,
            is_kinematic: false,
            color: [0.8, 0.8, 0.8],
        }
    }
}

/// Read-only snapshot of a body for rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyView {
    pub id: BodyId,
    pub shape: Shape,
    pub center: Vec3,
    pub axes: [Vec3; 3],
    pub rotation: Quat,
    pub color: [f32; 3],
}

/// A body owned by a `World`.
#[derive(Debug, Clone)]
pub struct RigidBody {
    id: BodyId,
    shape: Shape,
    particles: Vec<Particle>,
    constraints: Vec<Constraint>,
    is_kinematic: bool,
    color: [f32; 3],
    start_positions: Vec<Vec3>,
}

impl RigidBody {
    /// Build a body from `desc`. Particles are kept inside `[-world_bound,
    /// world_bound]`; balls without an explicit bounciness get
    /// `default_bounciness`.
    pub fn new(
        id: BodyId,
        desc: &BodyDesc,
        world_bound: f32,
        default_bounciness: f32,
    ) -> PhysicsResult<Self> {
        if !(desc.mass.is_finite() && desc.mass > 0.0) {
            return Err(PhysicsError::InvalidMass { mass: desc.mass });
        }
        let rotation = desc.rotation.normalize();

        let (shape, particles, constraints) = match desc.kind {
            BodyKind::Cuboid { half_extents } => {
                require_positive("half extent", half_extents.x)?;
                require_positive("half extent", half_extents.y)?;
                require_positive("half extent", half_extents.z)?;

                let particle_mass = desc.mass / CORNER_SIGNS.len() as f32;
                let particles = CORNER_SIGNS
                    .iter()
                    .enumerate()
                    .map(|(index, sign)| {
                        let corner = desc.position + rotation * (*sign * half_extents);
                        Particle::new(id, index, corner, particle_mass, desc.drag, world_bound)
                            .map(|p| p.with_gravity(desc.use_gravity))
                    })
                    .collect::<PhysicsResult<Vec<_>>>()?;

                let mut constraints = Vec::with_capacity(28);
                for a in 0..particles.len() {
                    for b in (a + 1)..particles.len() {
                        constraints.push(Constraint::new(&particles, a, b)?);
                    }
                }

                (Shape::Cuboid { half_extents }, particles, constraints)
            }
            BodyKind::Ball { radius } => {
                require_positive("radius", radius)?;
                let bounciness = desc.bounciness.unwrap_or(default_bounciness);
                if !(0.0..=1.0).contains(&bounciness) {
                    return Err(PhysicsError::InvalidConfiguration {
                        reason: format!("bounciness must be in [0, 1], got {}", bounciness),
                    });
                }

                let particle = Particle::new(id, 0, desc.position, desc.mass, desc.drag, world_bound)?
                    .with_gravity(desc.use_gravity)
                    .with_boundary(Boundary::Reflect { radius, bounciness });

                (Shape::Ball { radius, bounciness }, vec![particle], Vec::new())
            }
        };

        let start_positions = particles.iter().map(Particle::position).collect();
        debug!(
            "Created body {} ({:?}) at {:?} with {} particles, {} constraints",
            id,
            shape,
            desc.position,
            particles.len(),
            constraints.len()
        );

        Ok(Self {
            id,
            shape,
            particles,
            constraints,
            is_kinematic: desc.is_kinematic,
            color: desc.color,
            start_positions,
        })
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub(crate) fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_kinematic(&self) -> bool {
        self.is_kinematic
    }

    pub fn color(&self) -> [f32; 3] {
        self.color
    }

    /// Total mass of the body.
    pub fn mass(&self) -> f32 {
        self.particles.iter().map(Particle::mass).sum()
    }

    /// Centre of the body when it was created.
    pub fn start_position(&self) -> Vec3 {
        match self.shape {
            Shape::Cuboid { .. } => (self.start_positions[0] + self.start_positions[6]) * 0.5,
            Shape::Ball { .. } => self.start_positions[0],
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center_of(Particle::position)
    }

    pub fn last_center(&self) -> Vec3 {
        self.center_of(Particle::last_position)
    }

    fn center_of(&self, at: fn(&Particle) -> Vec3) -> Vec3 {
        match self.shape {
            // p0 and p6 are opposite corners.
            Shape::Cuboid { .. } => (at(&self.particles[0]) + at(&self.particles[6])) * 0.5,
            Shape::Ball { .. } => at(&self.particles[0]),
        }
    }

    /// Centre displacement over the last step, in world units per step.
    /// Divide by the step length for a velocity.
    pub fn step_displacement(&self) -> Vec3 {
        self.center() - self.last_center()
    }

    /// Orthonormal local axes. Falls back to the world axes when the corners
    /// have collapsed.
    pub fn axes(&self) -> [Vec3; 3] {
        match self.shape {
            Shape::Cuboid { .. } => {
                let p0 = self.particles[0].position();
                let p1 = self.particles[1].position();
                let p2 = self.particles[2].position();

                let axes = (p0 - p1).try_normalize().and_then(|x| {
                    let y = x.cross(p2 - p0).try_normalize()?;
                    Some([x, y, x.cross(y)])
                });
                axes.unwrap_or([Vec3::X, Vec3::Y, Vec3::Z])
            }
            Shape::Ball { .. } => [Vec3::X, Vec3::Y, Vec3::Z],
        }
    }

    /// Orientation derived from [`axes`](Self::axes).
    pub fn rotation(&self) -> Quat {
        let [x, y, z] = self.axes();
        Quat::from_mat3(&Mat3::from_cols(x, y, z))
    }

    /// Oriented bounding box. A ball is treated as the cube around it.
    pub fn obb(&self) -> Obb {
        match self.shape {
            Shape::Cuboid { half_extents } => Obb::new(self.center(), self.axes(), half_extents),
            Shape::Ball { radius, .. } => Obb::axis_aligned(self.center(), Vec3::splat(radius)),
        }
    }

    /// Centre and radius of a sphere enclosing the body.
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        match self.shape {
            Shape::Cuboid { half_extents } => (self.center(), half_extents.length()),
            Shape::Ball { radius, .. } => (self.center(), radius),
        }
    }

    /// World-space axis-aligned bounds.
    pub fn aabb(&self) -> Aabb {
        match self.shape {
            Shape::Cuboid { .. } => {
                let (min, max) = self.particles.iter().map(Particle::position).fold(
                    (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
                    |(min, max), p| (min.min(p), max.max(p)),
                );
                Aabb::new(min, max)
            }
            Shape::Ball { radius, .. } => {
                Aabb::from_center_half_extents(self.center(), Vec3::splat(radius))
            }
        }
    }

    /// Surface triangles at the current corner positions. Empty for balls.
    pub fn triangles(&self) -> Vec<Triangle> {
        match self.shape {
            Shape::Cuboid { .. } => CUBOID_TRIANGLES
                .iter()
                .map(|&corners| Triangle {
                    vertices: corners.map(|c| self.particles[c].position()),
                    corners,
                })
                .collect(),
            Shape::Ball { .. } => Vec::new(),
        }
    }

    pub fn view(&self) -> BodyView {
        let axes = self.axes();
        BodyView {
            id: self.id,
            shape: self.shape,
            center: self.center(),
            axes,
            rotation: Quat::from_mat3(&Mat3::from_cols(axes[0], axes[1], axes[2])),
            color: self.color,
        }
    }

    /// Spread `force` evenly over the particles for the next step.
    pub fn apply_force(&mut self, force: Vec3) {
        let share = force / self.particles.len() as f32;
        for particle in &mut self.particles {
            particle.apply_force(share);
        }
    }

    /// Integrate every particle. Kinematic bodies stay put.
    pub fn integrate(&mut self, dt: f32, gravity: f32) {
        if self.is_kinematic {
            return;
        }
        for particle in &mut self.particles {
            particle.update(dt, gravity);
        }
    }

    /// Pull the particles back toward the body's shape.
    pub fn relax(&mut self) {
        relax(&self.constraints, &mut self.particles);
    }

    /// Whether any particle left the world entirely during the last step.
    /// Clears the flags.
    pub fn take_stopped(&mut self) -> bool {
        self.particles
            .iter_mut()
            .fold(false, |stopped, p| p.take_stopped() | stopped)
    }

    /// Put every particle back where it started, at rest.
    pub fn reset_to_start(&mut self) {
        for (particle, start) in self.particles.iter_mut().zip(&self.start_positions) {
            particle.reset(*start);
        }
    }
}
