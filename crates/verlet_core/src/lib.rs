//! Particle-based rigid-body physics.
//!
//! This crate provides:
//! - Verlet-integrated particles with clamping or reflective world bounds
//! - Cuboid and ball bodies held together by distance constraints
//! - An octree broad phase rebuilt every step
//! - OBB separating-axis, sphere and ray/triangle narrow-phase tests
//! - Collision response with per-pair deduplication and per-particle averaging
//! - A [`World`] that drives all of the above with a fixed `dt`
//!
//! Everything here is plain Rust over `bevy::math` types; see `verlet_physics`
//! for the Bevy plugin.

pub mod body;
pub mod collision;
pub mod config;
pub mod constraint;
pub mod error;
pub mod narrow_phase;
pub mod octree;
pub mod particle;
pub mod response;
pub mod world;

pub use body::{BodyDesc, BodyId, BodyKind, BodyView, RigidBody, Shape};
pub use collision::{CollisionEngine, CollisionReport, Phase, RAY_BACKDATE_PADDING};
pub use config::{ConfigError, EngineConfig};
pub use constraint::{Constraint, CONSTRAINT_PASSES};
pub use error::{PhysicsError, PhysicsResult};
pub use narrow_phase::{
    obb_intersects_aabb, obb_overlap, ray_triangle, raycast_triangles, sphere_aabb,
    sphere_sphere, Aabb, Obb, RayHit, Triangle, CUBOID_TRIANGLES,
};
pub use octree::{Node, NodeIndex, Octree};
pub use particle::{Boundary, Particle};
pub use response::{PairKey, ParticleKey, Response, ResponseSet};
pub use world::{BodyHandle, World};
