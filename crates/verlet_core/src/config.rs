//! Engine configuration.
//!
//! One [`EngineConfig`] is handed to `World::new` and fixes the simulation
//! volume, gravity and broad-phase depth for the lifetime of the world.
//! Configs can be kept next to a scene as JSON:
//!
//! ```ignore
//! use verlet_core::{EngineConfig, World};
//!
//! let config = EngineConfig::load_json("scenes/stack.physics.json")?;
//! let mut world = World::new(config)?;
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Errors that can occur while loading or saving an [`EngineConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// File system error
    Io(std::io::Error),
    /// Malformed JSON
    Json(serde_json::Error),
    /// Parsed, but failed validation
    Invalid(PhysicsError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Json(e) => write!(f, "JSON error: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

impl From<PhysicsError> for ConfigError {
    fn from(e: PhysicsError) -> Self {
        ConfigError::Invalid(e)
    }
}

/// Physics engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Half extent of the simulation cube centred at the origin.
    /// Particles are kept inside `[-world_size, world_size]` on every axis and
    /// the octree root spans the same cube.
    pub world_size: f32,

    /// Gravity acceleration, applied along -Y to bodies that opt in.
    pub gravity: f32,

    /// Maximum subdivision depth of the broad-phase octree.
    pub octree_max_depth: u32,

    /// Run broad and narrow phase each step. With this off bodies only
    /// integrate and relax their shape.
    pub collision_enabled: bool,

    /// Bounciness given to balls created with `BodyDesc::ball`.
    pub default_bounciness: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            world_size: 10.0,
            gravity: 9.81,
            octree_max_depth: 5,
            collision_enabled: true,
            default_bounciness: 0.8,
        }
    }
}

impl EngineConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.world_size.is_finite() && self.world_size > 0.0) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: format!("world_size must be > 0, got {}", self.world_size),
            });
        }
        if !self.gravity.is_finite() {
            return Err(PhysicsError::InvalidConfiguration {
                reason: format!("gravity must be finite, got {}", self.gravity),
            });
        }
        // 8^16 leaves is already far beyond anything a frame can rebuild.
        if self.octree_max_depth > 16 {
            return Err(PhysicsError::InvalidConfiguration {
                reason: format!(
                    "octree_max_depth must be <= 16, got {}",
                    self.octree_max_depth
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.default_bounciness) {
            return Err(PhysicsError::InvalidConfiguration {
                reason: format!(
                    "default_bounciness must be in [0, 1], got {}",
                    self.default_bounciness
                ),
            });
        }
        Ok(())
    }

    /// Parse and validate a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        let config: EngineConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as pretty-printed JSON.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
