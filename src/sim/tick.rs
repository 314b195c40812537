//! Fixed timestep simulation tick
//!
//! Turns one frame of pointer input into session actions and advances the
//! physics. In idle mode a seeded agent plays instead of the pointer.

use glam::Vec2;
use rand::Rng;

use super::state::{AiAction, GamePhase, GameState, ReleaseOutcome};
use crate::consts::AGENT_INTERVAL_TICKS;
use crate::normalize_position;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Pointer position in playfield pixels
    pub pointer: Option<Vec2>,
    /// Pointer went down this tick
    pub press: bool,
    /// Pointer went up this tick
    pub release: bool,
    /// Start from Ready, or reset from GameOver
    pub start: bool,
    /// Idle/demo mode - the agent plays the game
    pub idle_mode: bool,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if input.start {
        match state.phase {
            GamePhase::Ready => state.start(),
            GamePhase::GameOver => state.reset(),
            GamePhase::Playing => {}
        }
    }

    // Auto-start in demo mode
    if input.idle_mode && state.phase == GamePhase::Ready {
        state.start();
    }

    if state.phase != GamePhase::Playing {
        return;
    }

    if let Some(pointer) = input.pointer {
        if input.press {
            state.press(pointer);
        }
        state.drag(pointer);
    }
    if input.release {
        let outcome = state.release();
        if outcome != ReleaseOutcome::Nothing {
            log::debug!("Release: {:?}", outcome);
        }
    }

    if input.idle_mode
        && state.selected.is_none()
        && state.time_ticks > 0
        && state.time_ticks % AGENT_INTERVAL_TICKS == 0
    {
        if let Some(action) = demo_action(state) {
            let outcome = state.apply_action(&action);
            log::debug!("Agent moved block {}: {:?}", action.block_index, outcome);
        }
    }

    state.advance(dt);
}

/// Pick a random selectable block and aim it at a random slot of the drop zone
fn demo_action(state: &mut GameState) -> Option<AiAction> {
    let candidates: Vec<usize> = (0..state.tower.blocks.len())
        .filter(|&i| state.tower.can_select_block(i))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let mut rng = state.rng_state.next_rng();
    let block_index = candidates[rng.random_range(0..candidates.len())];

    let config = state.config();
    let n = config.blocks_per_layer;
    let slot = rng.random_range(0..n) as f32;
    let offset = slot - n.saturating_sub(1) as f32 / 2.0;
    let x = config.tower_center_x + offset * config.block_width;
    // Just inside the zone's lower edge, so the block lands close to the top
    let zone = state.tower.get_drop_zone_rect();
    let target = Vec2::new(x, zone.bottom() - 1.0);

    Some(AiAction {
        block_index,
        target: normalize_position(target, config.screen()),
    })
}
