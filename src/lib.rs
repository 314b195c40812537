//! Tumble Tower - stacking-block physics for a Jenga-style tower game
//!
//! Core modules:
//! - `sim`: Block physics, tower structure and the game session
//! - `config`: Tunable constants, loadable from JSON
//! - `highscores`: Persistent leaderboard

pub mod config;
pub mod highscores;
pub mod sim;

pub use config::{ConfigError, TowerConfig};
pub use highscores::HighScores;

use glam::Vec2;

/// Game configuration constants (defaults for [`TowerConfig`])
pub mod consts {
    /// Timestep the friction/restitution constants were tuned for (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Playfield dimensions
    pub const SCREEN_WIDTH: f32 = 900.0;
    pub const SCREEN_HEIGHT: f32 = 700.0;

    /// Tower layout
    pub const TOWER_LAYERS: u32 = 18;
    pub const BLOCKS_PER_LAYER: u32 = 3;
    pub const BLOCK_WIDTH: f32 = 80.0;
    pub const BLOCK_HEIGHT: f32 = 25.0;

    /// Ground line (screen Y grows downward)
    pub const GROUND_Y: f32 = SCREEN_HEIGHT - 80.0;
    pub const TOWER_CENTER_X: f32 = SCREEN_WIDTH / 2.0;
    /// The base layer sits directly on the ground
    pub const TOWER_BASE_Y: f32 = GROUND_Y;

    /// Ticks between demo agent moves (lets the tower settle)
    pub const AGENT_INTERVAL_TICKS: u64 = 90;

    /// Physics
    pub const GRAVITY: f32 = 500.0;
    pub const FRICTION: f32 = 0.95;
    pub const RESTITUTION: f32 = 0.1; // Low bounce for wood
    pub const BLOCK_MASS: f32 = 1.0;

    /// Stability thresholds (normalized tilt)
    pub const STABILITY_THRESHOLD: f32 = 0.15;
    pub const COLLAPSE_THRESHOLD: f32 = 0.4;

    /// Drop zone above the nominal tower top
    pub const DROP_ZONE_HEIGHT: f32 = 80.0;

    /// Scoring
    pub const SCORE_PER_BLOCK: i64 = 10;
    pub const COLLAPSE_PENALTY: i64 = -100;

    /// Vertical speed under which a ground bounce is killed
    pub const BOUNCE_CUTOFF: f32 = 10.0;
    /// A non-base block this close to the ground means collapse
    pub const GROUND_MARGIN: f32 = 5.0;
    /// Support search range (multiples of block height)
    pub const SUPPORT_RANGE: f32 = 1.5;
    /// Direct contact range (multiples of block height)
    pub const CONTACT_RANGE: f32 = 1.2;
    /// Vertical damping applied to any block with supporters
    pub const SUPPORT_DAMPING: f32 = 0.9;
    /// Surface gap (pixels) still treated as touching
    pub const CONTACT_SLOP: f32 = 0.5;

    /// Post-collapse free fall
    pub const COLLAPSE_RESTITUTION: f32 = 0.3;
    pub const COLLAPSE_FRICTION: f32 = 0.8;
    pub const COLLAPSE_BOUNCE_CUTOFF: f32 = 5.0;
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Normalize a screen position to [0, 1] playfield coordinates
#[inline]
pub fn normalize_position(pos: Vec2, screen: Vec2) -> Vec2 {
    pos / screen
}
