//! Game session state
//!
//! `GameState` is the one explicit simulation context: it owns the tower
//! (and through it the block arena), the physics engine that views it,
//! the score and the player's drag state.

use glam::Vec2;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::physics::{PhysicsEngine, TowerState};
use super::tower::{TowerObservation, TowerStructure};
use crate::config::TowerConfig;
use crate::consts::SIM_DT;
use crate::normalize_position;

/// Reward for every frame the tower stays stable
pub const STABLE_REWARD: f32 = 0.1;
/// Penalty for every frame the tower is in the warning band
pub const UNSTABLE_PENALTY: f32 = -0.5;

/// Current phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Tower built, waiting for the player to start
    Ready,
    Playing,
    /// Tower collapsed
    GameOver,
}

/// What happened when a held block was let go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Placed on top of the tower
    Placed,
    /// Drop zone slot was taken; the block rejoins the structure where it is
    Rejected,
    /// Let go outside the drop zone; stays removed
    Dropped,
    /// No block was held
    Nothing,
}

/// RNG state wrapper for serialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngState {
    pub seed: u64,
    pub stream: u64,
}

impl RngState {
    pub fn new(seed: u64) -> Self {
        Self { seed, stream: 0 }
    }

    /// Generator for the next independent draw sequence
    pub fn next_rng(&mut self) -> Pcg32 {
        let rng = Pcg32::new(self.seed, self.stream);
        self.stream += 1;
        rng
    }
}

/// Agent action: pull a block and move it to a normalized target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiAction {
    pub block_index: usize,
    /// Target position in [0, 1] playfield coordinates
    pub target: Vec2,
}

/// Everything an external agent sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(flatten)]
    pub tower: TowerObservation,
    pub score: i64,
    pub phase: GamePhase,
    /// Normalized center of mass
    pub center_of_mass: Vec2,
    pub stability_score: f32,
}

/// Result of one agent step
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
}

/// Complete session state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    config: TowerConfig,
    pub tower: TowerStructure,
    pub physics: PhysicsEngine,
    pub phase: GamePhase,
    pub score: i64,
    /// Block currently held by the player
    pub selected: Option<usize>,
    /// Block center minus pointer position at grab time
    pub drag_offset: Vec2,
    /// Physics frames advanced while playing
    pub time_ticks: u64,
    pub rng_state: RngState,
}

impl GameState {
    pub fn new(config: &TowerConfig, seed: u64) -> Self {
        let tower = TowerStructure::new(config);
        let physics = Self::physics_for(config, &tower);
        Self {
            config: config.clone(),
            tower,
            physics,
            phase: GamePhase::Ready,
            score: 0,
            selected: None,
            drag_offset: Vec2::ZERO,
            time_ticks: 0,
            rng_state: RngState::new(seed),
        }
    }

    fn physics_for(config: &TowerConfig, tower: &TowerStructure) -> PhysicsEngine {
        let mut physics = PhysicsEngine::new(config);
        for index in 0..tower.blocks.len() {
            physics.add_block(index);
        }
        physics
    }

    pub fn config(&self) -> &TowerConfig {
        &self.config
    }

    /// Rebuild the tower and start over (the RNG keeps advancing)
    pub fn reset(&mut self) {
        self.tower.build_tower();
        self.physics = Self::physics_for(&self.config, &self.tower);
        self.phase = GamePhase::Ready;
        self.score = 0;
        self.selected = None;
        self.drag_offset = Vec2::ZERO;
        self.time_ticks = 0;
        log::info!("Session reset");
    }

    pub fn start(&mut self) {
        if self.phase == GamePhase::Ready {
            self.phase = GamePhase::Playing;
            log::info!("Session started");
        }
    }

    pub fn tower_state(&self) -> TowerState {
        self.physics.tower_state(&self.tower.blocks)
    }

    fn grab(&mut self, index: usize, pointer: Vec2) {
        let block = &mut self.tower.blocks[index];
        block.is_dragging = true;
        self.drag_offset = block.pos - pointer;
        self.physics.remove_block(&mut self.tower.blocks, index);
        self.selected = Some(index);
        log::debug!("Grabbed block {} from layer {}", index, self.tower.blocks[index].layer);
    }

    /// Pick up the block under the pointer, if it may be removed
    pub fn press(&mut self, pointer: Vec2) -> Option<usize> {
        if self.phase != GamePhase::Playing || self.selected.is_some() {
            return None;
        }
        let index = self.tower.get_block_at(pointer)?;
        if !self.tower.can_select_block(index) {
            log::debug!("Block {} is not selectable", index);
            return None;
        }
        self.grab(index, pointer);
        Some(index)
    }

    /// Move the held block with the pointer
    pub fn drag(&mut self, pointer: Vec2) {
        if let Some(index) = self.selected {
            self.tower.blocks[index].pos = pointer + self.drag_offset;
        }
    }

    /// Let go of the held block
    pub fn release(&mut self) -> ReleaseOutcome {
        let Some(index) = self.selected.take() else {
            return ReleaseOutcome::Nothing;
        };

        let pos = self.tower.blocks[index].pos;
        if !self.tower.is_in_drop_zone(pos) {
            self.tower.blocks[index].is_dragging = false;
            return ReleaseOutcome::Dropped;
        }

        if self.tower.place_block_on_top(index, pos.x) {
            self.score += self.config.score_per_block;
            ReleaseOutcome::Placed
        } else {
            let block = &mut self.tower.blocks[index];
            block.is_dragging = false;
            block.is_removed = false;
            ReleaseOutcome::Rejected
        }
    }

    /// Select, move and release in one go. Returns `None` if the block
    /// cannot be selected.
    pub fn apply_action(&mut self, action: &AiAction) -> Option<ReleaseOutcome> {
        if self.phase != GamePhase::Playing || self.selected.is_some() {
            return None;
        }
        if !self.tower.can_select_block(action.block_index) {
            return None;
        }

        let target = action.target * self.config.screen();
        let pos = self.tower.blocks[action.block_index].pos;
        self.grab(action.block_index, pos);
        self.drag(target);
        Some(self.release())
    }

    /// Run one physics frame while playing; collapse ends the game
    pub fn advance(&mut self, dt: f32) {
        if self.phase != GamePhase::Playing {
            return;
        }

        self.time_ticks += 1;
        self.physics.update(&mut self.tower.blocks, dt);

        if self.physics.check_collapse(&mut self.tower.blocks) {
            self.score += self.config.collapse_penalty;
            self.phase = GamePhase::GameOver;
            // A held block falls with the rest of the tower
            if let Some(index) = self.selected.take() {
                self.tower.blocks[index].is_dragging = false;
            }
            log::info!(
                "Game over after {} ticks: score {}, height {}",
                self.time_ticks,
                self.score,
                self.tower.get_tower_height()
            );
        }
    }

    /// One agent step: act, advance a frame, and score the result
    pub fn step_ai(&mut self, action: &AiAction) -> StepResult {
        if self.phase != GamePhase::Playing {
            return StepResult {
                observation: self.observation(),
                reward: 0.0,
                done: true,
            };
        }

        let mut reward = 0.0;
        if self.apply_action(action) == Some(ReleaseOutcome::Placed) {
            reward += self.config.score_per_block as f32;
        }

        self.advance(SIM_DT);

        let (is_stable, _) = self.physics.check_stability(&self.tower.blocks);
        reward += if is_stable { STABLE_REWARD } else { UNSTABLE_PENALTY };

        let done = self.physics.collapsed();
        if done {
            reward += self.config.collapse_penalty as f32;
        }

        StepResult {
            observation: self.observation(),
            reward,
            done,
        }
    }

    pub fn observation(&self) -> Observation {
        let com = self.physics.calculate_center_of_mass(&self.tower.blocks);
        Observation {
            tower: self.tower.get_observation_data(),
            score: self.score,
            phase: self.phase,
            center_of_mass: normalize_position(com, self.config.screen()),
            stability_score: self.physics.stability_score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> GameState {
        let mut state = GameState::new(&TowerConfig::default(), 7);
        state.start();
        state
    }

    /// Point just inside the bottom of the drop zone: targets layer 19
    fn zone_point(state: &GameState, x: f32) -> Vec2 {
        let zone = state.tower.get_drop_zone_rect();
        Vec2::new(x, zone.bottom() - 1.0)
    }

    #[test]
    fn test_new_session_is_ready() {
        let state = GameState::new(&TowerConfig::default(), 1);
        assert_eq!(state.phase, GamePhase::Ready);
        assert_eq!(state.physics.body_count(), 54);
        assert_eq!(state.tower_state(), TowerState::Stable);
    }

    #[test]
    fn test_press_ignored_until_started() {
        let mut state = GameState::new(&TowerConfig::default(), 1);
        let p = state.tower.blocks[4].pos;
        assert_eq!(state.press(p), None);
        state.start();
        assert_eq!(state.press(p), Some(4));
        assert!(state.tower.blocks[4].is_dragging);
        assert!(state.tower.blocks[4].is_removed);
    }

    #[test]
    fn test_press_rejects_top_layer() {
        let mut state = playing();
        let p = state.tower.blocks[52].pos;
        assert_eq!(state.press(p), None);
        assert_eq!(state.selected, None);
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let mut state = playing();
        let block_pos = state.tower.blocks[0].pos;
        let grab = block_pos + Vec2::new(10.0, 2.0);
        assert_eq!(state.press(grab), Some(0));
        state.drag(grab + Vec2::new(100.0, -50.0));
        assert_eq!(state.tower.blocks[0].pos, block_pos + Vec2::new(100.0, -50.0));
    }

    #[test]
    fn test_release_in_drop_zone_places_and_scores() {
        let mut state = playing();
        let p = state.tower.blocks[1].pos;
        state.press(p);
        state.drag(zone_point(&state, 450.0));
        assert_eq!(state.release(), ReleaseOutcome::Placed);
        assert_eq!(state.score, 10);
        assert_eq!(state.tower.top_layer, 19);
        assert!(!state.tower.blocks[1].is_dragging);
        assert!(!state.tower.blocks[1].is_removed);
    }

    #[test]
    fn test_release_on_taken_slot_is_rejected() {
        let mut state = playing();
        for (index, expected) in [(1, ReleaseOutcome::Placed), (4, ReleaseOutcome::Rejected)] {
            let p = state.tower.blocks[index].pos;
            assert_eq!(state.press(p), Some(index));
            state.drag(zone_point(&state, 450.0));
            assert_eq!(state.release(), expected);
        }
        assert_eq!(state.score, 10);
        let rejected = &state.tower.blocks[4];
        assert!(!rejected.is_removed && !rejected.is_dragging);
    }

    #[test]
    fn test_release_outside_zone_drops() {
        let mut state = playing();
        let p = state.tower.blocks[1].pos;
        state.press(p);
        state.drag(Vec2::new(100.0, 300.0));
        assert_eq!(state.release(), ReleaseOutcome::Dropped);
        let dropped = &state.tower.blocks[1];
        assert!(dropped.is_removed);
        assert!(!dropped.is_dragging);
        assert_eq!(state.release(), ReleaseOutcome::Nothing);
    }

    #[test]
    fn test_step_ai_places_block() {
        let mut state = playing();
        let target = zone_point(&state, 450.0) / state.config().screen();
        let result = state.step_ai(&AiAction {
            block_index: 4,
            target,
        });
        assert!(!result.done);
        assert!((result.reward - (10.0 + STABLE_REWARD)).abs() < 1e-5);
        assert_eq!(result.observation.tower.tower_height, 20);
        assert_eq!(result.observation.score, 10);
    }

    #[test]
    fn test_step_ai_invalid_selection_only_scores_stability() {
        let mut state = playing();
        let result = state.step_ai(&AiAction {
            block_index: 53,
            target: Vec2::new(0.5, 0.1),
        });
        assert!((result.reward - STABLE_REWARD).abs() < 1e-6);
        assert!(!state.tower.blocks[53].is_removed);
    }

    #[test]
    fn test_step_ai_when_not_playing() {
        let mut state = GameState::new(&TowerConfig::default(), 3);
        let result = state.step_ai(&AiAction {
            block_index: 0,
            target: Vec2::new(0.5, 0.5),
        });
        assert!(result.done);
        assert_eq!(result.reward, 0.0);
    }

    #[test]
    fn test_collapse_ends_game_with_penalty() {
        let mut state = playing();
        // Pull the whole base layer out: layer 1 falls to the ground
        for index in 0..3 {
            state.physics.remove_block(&mut state.tower.blocks, index);
        }
        for _ in 0..600 {
            state.advance(SIM_DT);
            if state.phase == GamePhase::GameOver {
                break;
            }
        }
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.score, -100);
        assert_eq!(state.tower_state(), TowerState::Collapsed);

        // Frozen after game over
        let ticks = state.time_ticks;
        state.advance(SIM_DT);
        assert_eq!(state.time_ticks, ticks);
    }

    #[test]
    fn test_collapse_lets_go_of_held_block() {
        let mut state = playing();
        let p = state.tower.blocks[1].pos;
        assert_eq!(state.press(p), Some(1));
        state.drag(Vec2::new(100.0, 100.0));
        let held = state.tower.blocks[1].pos;

        for index in [0, 2] {
            state.physics.remove_block(&mut state.tower.blocks, index);
        }
        for _ in 0..600 {
            state.advance(SIM_DT);
            if state.phase == GamePhase::GameOver {
                break;
            }
        }
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.selected, None);
        assert!(!state.tower.blocks[1].is_dragging);
        assert!(state.tower.blocks[1].is_removed);
        assert_eq!(state.release(), ReleaseOutcome::Nothing);

        for _ in 0..300 {
            state.physics.update(&mut state.tower.blocks, SIM_DT);
        }
        assert!(state.tower.blocks[1].pos.y > held.y + 100.0);
    }

    #[test]
    fn test_empty_tower_session_runs() {
        let config = TowerConfig {
            tower_layers: 0,
            ..TowerConfig::default()
        };
        let mut state = GameState::new(&config, 5);
        state.start();
        for _ in 0..10 {
            state.advance(SIM_DT);
        }
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.physics.body_count(), 0);
        assert_eq!(state.tower.get_tower_height(), 1);
    }

    #[test]
    fn test_reset() {
        let mut state = playing();
        let p = state.tower.blocks[1].pos;
        state.press(p);
        state.drag(zone_point(&state, 450.0));
        state.release();
        state.reset();
        assert_eq!(state.phase, GamePhase::Ready);
        assert_eq!(state.score, 0);
        assert_eq!(state.tower.top_layer, 17);
        assert!(!state.physics.collapsed());
    }

    #[test]
    fn test_observation_serializes_flat() {
        let state = playing();
        let json = serde_json::to_value(state.observation()).unwrap();
        assert_eq!(json["tower_height"], 18);
        assert_eq!(json["score"], 0);
        assert_eq!(json["phase"], "Playing");
        assert_eq!(json["blocks"].as_array().unwrap().len(), 54);
    }

    #[test]
    fn test_rng_streams_differ() {
        use rand::Rng;
        let mut rng_state = RngState::new(42);
        let a: u32 = rng_state.next_rng().random();
        let b: u32 = rng_state.next_rng().random();
        assert_ne!(a, b);
        assert_eq!(rng_state.stream, 2);
    }
}
