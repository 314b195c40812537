//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by arena index)
//! - No rendering or platform dependencies

pub mod block;
pub mod physics;
pub mod rect;
pub mod state;
pub mod tick;
pub mod tower;

pub use block::Block;
pub use physics::{PhysicsEngine, TowerState};
pub use rect::Rect;
pub use state::{
    AiAction, GamePhase, GameState, Observation, ReleaseOutcome, RngState, StepResult,
    STABLE_REWARD, UNSTABLE_PENALTY,
};
pub use tick::{TickInput, tick};
pub use tower::{BlockObservation, TowerObservation, TowerStructure};
