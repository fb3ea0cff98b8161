//! Error types for body construction and engine configuration.
//!
//! Errors only surface when something is *built*: a particle with a bad mass,
//! a constraint between coincident points, an invalid [`EngineConfig`]. Once a
//! world is running, `World::step` never fails; numeric edge cases inside a
//! step are skipped locally instead of being reported.
//!
//! [`EngineConfig`]: crate::config::EngineConfig

use std::fmt;

/// Errors raised while constructing particles, constraints, bodies or worlds.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Particle or body mass is zero, negative or not finite.
    InvalidMass { mass: f32 },
    /// Drag must lie in `[0, 1)`.
    InvalidDrag { drag: f32 },
    /// A size (half extent, radius, world size) is not strictly positive.
    InvalidExtent { context: &'static str, value: f32 },
    /// Two constrained particles start at the same point, so the rest length
    /// would be zero.
    DegenerateConstraint { a: usize, b: usize },
    /// Engine configuration rejected by [`EngineConfig::validate`].
    ///
    /// [`EngineConfig::validate`]: crate::config::EngineConfig::validate
    InvalidConfiguration { reason: String },
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::InvalidMass { mass } => {
                write!(f, "invalid mass {} (must be finite and > 0)", mass)
            }
            PhysicsError::InvalidDrag { drag } => {
                write!(f, "invalid drag {} (must be in [0, 1))", drag)
            }
            PhysicsError::InvalidExtent { context, value } => {
                write!(f, "invalid {} {} (must be finite and > 0)", context, value)
            }
            PhysicsError::DegenerateConstraint { a, b } => {
                write!(f, "constraint {}-{} has zero rest length", a, b)
            }
            PhysicsError::InvalidConfiguration { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }
        }
    }
}

impl std::error::Error for PhysicsError {}

/// Result type for fallible construction.
pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Checks that `value` is finite and strictly positive.
pub(crate) fn require_positive(context: &'static str, value: f32) -> PhysicsResult<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PhysicsError::InvalidExtent { context, value })
    }
}
