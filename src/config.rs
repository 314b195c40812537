//! Tower and physics configuration
//!
//! Every constant is fixed when a session is constructed. Changing them
//! re-tunes the feel of the simulation, not its structure.

use std::fmt;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Errors from loading or validating configuration files
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "i/o error: {e}"),
            ConfigError::Parse(e) => write!(f, "parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Tower layout, physics and scoring constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerConfig {
    // === Playfield ===
    pub screen_width: f32,
    pub screen_height: f32,
    /// Ground line (screen Y grows downward)
    pub ground_y: f32,
    pub tower_center_x: f32,

    // === Tower ===
    pub tower_layers: u32,
    pub blocks_per_layer: u32,
    pub block_width: f32,
    pub block_height: f32,
    pub drop_zone_height: f32,

    // === Physics ===
    pub gravity: f32,
    /// Per-frame velocity scale (< 1)
    pub friction: f32,
    /// Ground bounce (0 = dead stop)
    pub restitution: f32,
    pub block_mass: f32,
    pub stability_threshold: f32,
    pub collapse_threshold: f32,

    // === Scoring ===
    pub score_per_block: i64,
    pub collapse_penalty: i64,
}

impl Default for TowerConfig {
    fn default() -> Self {
        Self {
            screen_width: SCREEN_WIDTH,
            screen_height: SCREEN_HEIGHT,
            ground_y: GROUND_Y,
            tower_center_x: TOWER_CENTER_X,

            tower_layers: TOWER_LAYERS,
            blocks_per_layer: BLOCKS_PER_LAYER,
            block_width: BLOCK_WIDTH,
            block_height: BLOCK_HEIGHT,
            drop_zone_height: DROP_ZONE_HEIGHT,

            gravity: GRAVITY,
            friction: FRICTION,
            restitution: RESTITUTION,
            block_mass: BLOCK_MASS,
            stability_threshold: STABILITY_THRESHOLD,
            collapse_threshold: COLLAPSE_THRESHOLD,

            score_per_block: SCORE_PER_BLOCK,
            collapse_penalty: COLLAPSE_PENALTY,
        }
    }
}

impl TowerConfig {
    /// Y of the tower's base (the base layer rests on the ground)
    #[inline]
    pub fn tower_base_y(&self) -> f32 {
        self.ground_y
    }

    /// Half the playfield width, used to normalize tilt
    #[inline]
    pub fn half_width(&self) -> f32 {
        self.tower_center_x
    }

    /// Playfield size, used to normalize observations
    #[inline]
    pub fn screen(&self) -> Vec2 {
        Vec2::new(self.screen_width, self.screen_height)
    }

    /// Total number of blocks in a freshly built tower
    #[inline]
    pub fn block_count(&self) -> usize {
        (self.tower_layers * self.blocks_per_layer) as usize
    }

    /// Reject configurations the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.tower_layers == 0 || self.blocks_per_layer == 0 {
            return invalid("tower needs at least one layer and one block per layer");
        }
        if self.block_width <= 0.0 || self.block_height <= 0.0 {
            return invalid("block dimensions must be positive");
        }
        if self.screen_width <= 0.0 || self.screen_height <= 0.0 {
            return invalid("screen dimensions must be positive");
        }
        if self.tower_center_x <= 0.0 {
            return invalid("tower_center_x must be positive");
        }
        if !(0.0..=1.0).contains(&self.friction) || !(0.0..=1.0).contains(&self.restitution) {
            return invalid("friction and restitution must lie in [0, 1]");
        }
        if self.block_mass <= 0.0 {
            return invalid("block_mass must be positive");
        }
        if self.stability_threshold <= 0.0 || self.stability_threshold >= self.collapse_threshold {
            return invalid("stability_threshold must be positive and below collapse_threshold");
        }
        Ok(())
    }

    /// Parse and validate a JSON config (missing fields take defaults)
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: TowerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)
            .inspect_err(|e| log::warn!("Rejected config {}: {}", path.display(), e))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
