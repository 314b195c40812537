//! Tower construction and structural rules
//!
//! Owns the block arena. Indices into `blocks` stay valid for the whole
//! session: blocks are only ever created by [`TowerStructure::build_tower`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::block::Block;
use super::rect::Rect;
use crate::config::TowerConfig;

/// Snapshot of one block for external consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockObservation {
    /// Normalized by screen width
    pub x: f32,
    /// Normalized by screen height
    pub y: f32,
    pub rotation: f32,
    pub layer: u32,
    pub removed: bool,
}

/// Read-only projection of the tower for AI/telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerObservation {
    pub blocks: Vec<BlockObservation>,
    pub tower_height: u32,
    /// Normalized by screen height
    pub top_layer_y: f32,
}

/// The layered block stack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TowerStructure {
    config: TowerConfig,
    /// Block arena, bottom layer first
    pub blocks: Vec<Block>,
    /// Highest layer occupied by a placed block
    pub top_layer: u32,
}

impl TowerStructure {
    /// Create a tower and build the initial stack
    pub fn new(config: &TowerConfig) -> Self {
        let mut tower = Self {
            config: config.clone(),
            blocks: Vec::with_capacity(config.block_count()),
            top_layer: 0,
        };
        tower.build_tower();
        tower
    }

    pub fn config(&self) -> &TowerConfig {
        &self.config
    }

    /// Rebuild the initial stack from scratch
    pub fn build_tower(&mut self) {
        self.blocks.clear();

        for layer in 0..self.config.tower_layers {
            self.add_layer(layer);
        }

        self.top_layer = self.config.tower_layers.saturating_sub(1);
        log::info!(
            "Built tower: {} layers, {} blocks",
            self.config.tower_layers,
            self.blocks.len()
        );
    }

    fn add_layer(&mut self, layer: u32) {
        let horizontal = layer % 2 == 0;
        for slot in 0..self.config.blocks_per_layer {
            let pos = self.slot_position(layer, slot);
            let block = Block::new(pos, layer, slot, horizontal, &self.config);
            self.blocks.push(block);
        }
    }

    /// Center line Y of a layer
    pub fn layer_y(&self, layer: u32) -> f32 {
        self.config.tower_base_y() - (layer as f32 + 0.5) * self.config.block_height
    }

    /// Resting position of a slot.
    ///
    /// Even layers: blocks side by side across X. Odd layers: blocks span
    /// the layer at the tower's center, banded in Y with slot 0 at the
    /// bottom. Neighbours touch exactly, so a freshly built tower has no
    /// overlaps and every block rests on the one beneath it.
    pub fn slot_position(&self, layer: u32, slot: u32) -> Vec2 {
        let n = self.config.blocks_per_layer as f32;
        let offset = slot as f32 - (n - 1.0) / 2.0;
        let y = self.layer_y(layer);

        if layer % 2 == 0 {
            Vec2::new(self.config.tower_center_x + offset * self.config.block_width, y)
        } else {
            let band = self.config.block_height / n;
            Vec2::new(self.config.tower_center_x, y - offset * band)
        }
    }

    /// Nominal Y of the first layer above the built tower
    pub fn top_layer_y(&self) -> f32 {
        self.layer_y(self.config.tower_layers)
    }

    /// Fixed region above the nominal tower top where held blocks are placed
    pub fn get_drop_zone_rect(&self) -> Rect {
        let top_y = self.top_layer_y();
        Rect::new(
            self.config.tower_center_x - self.config.block_width * 2.0,
            top_y - self.config.drop_zone_height,
            self.config.block_width * 4.0,
            self.config.drop_zone_height,
        )
    }

    /// Topmost block under a point (latest inserted first), skipping removed
    pub fn get_block_at(&self, p: Vec2) -> Option<usize> {
        self.blocks
            .iter()
            .enumerate()
            .rev()
            .find(|(_, b)| !b.is_removed && b.contains_point(p))
            .map(|(i, _)| i)
    }

    /// Whether the player may pull this block out.
    ///
    /// The current top layer is never removable.
    pub fn can_select_block(&self, index: usize) -> bool {
        let Some(block) = self.blocks.get(index) else {
            return false;
        };
        if block.is_removed || block.is_collapsed {
            return false;
        }
        block.layer < self.top_layer
    }

    pub fn is_in_drop_zone(&self, p: Vec2) -> bool {
        self.get_drop_zone_rect().contains_point(p)
    }

    /// Highest layer implied by removed blocks lying in the drop zone, never
    /// below the built tower's top layer. A held block counts too, so the
    /// drop height of the block being placed sets its target layer.
    pub fn get_highest_layer_in_drop_zone(&self) -> u32 {
        let base_y = self.config.tower_base_y();
        let block_height = self.config.block_height;

        self.blocks
            .iter()
            .filter(|b| b.is_removed && self.is_in_drop_zone(b.pos))
            .map(|b| ((base_y - b.pos.y) / block_height).max(0.0) as u32)
            .fold(self.config.tower_layers.saturating_sub(1), u32::max)
    }

    /// Slot for a placement X on a layer of the given orientation
    fn placement_slot(&self, horizontal: bool, x: f32) -> u32 {
        if !horizontal {
            return 0;
        }
        let n = self.config.blocks_per_layer;
        let half_span = n as f32 * self.config.block_width / 2.0;
        let rel_x = x - self.config.tower_center_x;
        let slot = ((rel_x + half_span) / self.config.block_width).floor();
        (slot.max(0.0) as u32).min(n.saturating_sub(1))
    }

    /// Put a removed block on top of the tower.
    ///
    /// Fails without touching anything when the target slot of the new layer
    /// is already taken.
    pub fn place_block_on_top(&mut self, index: usize, x: f32) -> bool {
        if index >= self.blocks.len() {
            return false;
        }

        let new_layer = self.get_highest_layer_in_drop_zone() + 1;
        let horizontal = new_layer % 2 == 0;
        let slot = self.placement_slot(horizontal, x);
        let target = self.slot_position(new_layer, slot);

        let occupied = self.blocks.iter().enumerate().any(|(i, b)| {
            i != index
                && !b.is_removed
                && b.layer == new_layer
                && b.slot == slot
                && (b.pos.x - target.x).abs() < self.config.block_width / 2.0
        });
        if occupied {
            log::debug!("Placement rejected: layer {} slot {} is taken", new_layer, slot);
            return false;
        }

        let block = &mut self.blocks[index];
        block.layer = new_layer;
        block.slot = slot;
        block.set_orientation(horizontal, &self.config);
        block.pos = target;
        block.stop();
        block.is_removed = false;
        block.is_dragging = false;

        self.top_layer = new_layer;
        log::info!("Placed block {} on layer {} slot {}", index, new_layer, slot);
        true
    }

    pub fn get_tower_height(&self) -> u32 {
        self.top_layer + 1
    }

    /// Normalized snapshot of every block; no side effects
    pub fn get_observation_data(&self) -> TowerObservation {
        let screen = self.config.screen();
        let blocks = self
            .blocks
            .iter()
            .map(|b| {
                let pos = crate::normalize_position(b.pos, screen);
                BlockObservation {
                    x: pos.x,
                    y: pos.y,
                    rotation: b.rotation,
                    layer: b.layer,
                    removed: b.is_removed,
                }
            })
            .collect();

        TowerObservation {
            blocks,
            tower_height: self.get_tower_height(),
            top_layer_y: self.top_layer_y() / screen.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower() -> TowerStructure {
        TowerStructure::new(&TowerConfig::default())
    }

    #[test]
    fn test_build_tower_layout() {
        let tower = tower();
        assert_eq!(tower.blocks.len(), 54);
        assert_eq!(tower.top_layer, 17);
        assert_eq!(tower.get_tower_height(), 18);

        for (i, block) in tower.blocks.iter().enumerate() {
            assert_eq!(block.layer, i as u32 / 3);
            assert_eq!(block.slot, i as u32 % 3);
            assert_eq!(block.horizontal, block.layer % 2 == 0);
            assert!(!block.is_removed && !block.is_dragging && !block.is_collapsed);
        }

        let base: Vec<f32> = tower.blocks[..3].iter().map(|b| b.pos.x).collect();
        assert_eq!(base, vec![370.0, 450.0, 530.0]);
        assert_eq!(tower.blocks[0].bottom(), tower.config().ground_y);
    }

    #[test]
    fn test_perpendicular_layer_is_banded() {
        let tower = tower();
        let layer1 = &tower.blocks[3..6];
        for block in layer1 {
            assert_eq!(block.pos.x, 450.0);
            assert_eq!(block.width, 240.0);
        }
        // Slot 0 at the bottom, resting on the base layer
        assert!((layer1[0].bottom() - tower.blocks[0].top()).abs() < 1e-3);
        assert!(layer1[0].pos.y > layer1[1].pos.y);
        assert!(layer1[1].pos.y > layer1[2].pos.y);
    }

    #[test]
    fn test_built_tower_has_no_overlaps() {
        let tower = tower();
        for (i, a) in tower.blocks.iter().enumerate() {
            for b in &tower.blocks[i + 1..] {
                if let Some(overlap) = a.rect().overlap(&b.rect()) {
                    assert!(overlap.min_element() < 1e-3, "blocks overlap by {overlap:?}");
                }
            }
        }
    }

    #[test]
    fn test_build_tower_resets() {
        let mut tower = tower();
        tower.blocks[0].is_removed = true;
        tower.top_layer = 30;
        tower.build_tower();
        assert_eq!(tower.blocks.len(), 54);
        assert!(!tower.blocks[0].is_removed);
        assert_eq!(tower.top_layer, 17);
    }

    #[test]
    fn test_can_select_block() {
        let mut tower = tower();
        // Top layer (17) is never selectable
        assert!(!tower.can_select_block(17 * 3));
        assert!(!tower.can_select_block(53));
        assert!(tower.can_select_block(16 * 3));
        assert!(tower.can_select_block(0));

        tower.blocks[0].is_removed = true;
        assert!(!tower.can_select_block(0));
        tower.blocks[1].is_collapsed = true;
        assert!(!tower.can_select_block(1));
        assert!(!tower.can_select_block(999));
    }

    #[test]
    fn test_get_block_at_prefers_latest() {
        let mut tower = tower();
        let p = tower.blocks[4].pos;
        assert_eq!(tower.get_block_at(p), Some(4));

        // A later block moved over an earlier one is picked first
        tower.blocks[10].pos = p;
        assert_eq!(tower.get_block_at(p), Some(10));

        tower.blocks[10].is_removed = true;
        assert_eq!(tower.get_block_at(p), Some(4));
        assert_eq!(tower.get_block_at(Vec2::new(5.0, 5.0)), None);
    }

    #[test]
    fn test_drop_zone() {
        let tower = tower();
        let zone = tower.get_drop_zone_rect();
        assert_eq!(zone.width, 320.0);
        assert_eq!(zone.height, 80.0);
        assert_eq!(zone.bottom(), tower.top_layer_y());
        assert!(tower.is_in_drop_zone(Vec2::new(450.0, zone.y + 10.0)));
        assert!(!tower.is_in_drop_zone(Vec2::new(450.0, zone.bottom() + 1.0)));
        assert!(!tower.is_in_drop_zone(Vec2::new(zone.x - 1.0, zone.y + 10.0)));
    }

    #[test]
    fn test_highest_layer_in_drop_zone() {
        let mut tower = tower();
        assert_eq!(tower.get_highest_layer_in_drop_zone(), 17);

        // A removed block left lying in the zone, ~20 layers up
        let zone = tower.get_drop_zone_rect();
        tower.blocks[0].is_removed = true;
        tower.blocks[0].pos = Vec2::new(450.0, zone.y + 5.0);
        let expected = ((tower.config().tower_base_y() - (zone.y + 5.0)) / 25.0) as u32;
        assert_eq!(tower.get_highest_layer_in_drop_zone(), expected);

        // The held block counts as well
        tower.blocks[0].is_dragging = true;
        assert_eq!(tower.get_highest_layer_in_drop_zone(), expected);

        tower.blocks[0].is_removed = false;
        assert_eq!(tower.get_highest_layer_in_drop_zone(), 17);
    }

    #[test]
    fn test_place_held_block_uses_its_drop_height() {
        let mut tower = tower();
        let zone = tower.get_drop_zone_rect();
        let drop = Vec2::new(450.0, zone.y + 5.0);
        let expected = ((tower.config().tower_base_y() - drop.y) / 25.0) as u32 + 1;

        for index in [4, 7] {
            let block = &mut tower.blocks[index];
            block.is_removed = true;
            block.is_dragging = true;
            block.pos = drop;
        }

        assert!(tower.place_block_on_top(4, drop.x));
        assert_eq!(tower.blocks[4].layer, expected);
        assert_eq!(tower.top_layer, expected);
        assert!(!tower.blocks[4].is_dragging);

        // Same drop point, same target: the slot is taken
        let before = tower.blocks[7].clone();
        assert!(!tower.place_block_on_top(7, drop.x));
        assert_eq!(tower.blocks[7], before);
        assert_eq!(tower.top_layer, expected);
    }

    #[test]
    fn test_empty_config_does_not_underflow() {
        let config = TowerConfig {
            tower_layers: 0,
            blocks_per_layer: 0,
            ..TowerConfig::default()
        };
        let mut tower = TowerStructure::new(&config);
        assert!(tower.blocks.is_empty());
        assert_eq!(tower.top_layer, 0);
        assert_eq!(tower.get_highest_layer_in_drop_zone(), 0);
        assert!(!tower.place_block_on_top(0, 450.0));
        assert_eq!(tower.placement_slot(true, 450.0), 0);
    }

    #[test]
    fn test_place_block_on_top() {
        let mut tower = tower();
        tower.blocks[4].is_removed = true;
        assert!(tower.place_block_on_top(4, 460.0));

        let placed = &tower.blocks[4];
        assert_eq!(placed.layer, 18);
        assert_eq!(placed.slot, 1);
        assert!(placed.horizontal);
        assert_eq!(placed.width, 80.0);
        assert_eq!(placed.pos, Vec2::new(450.0, tower.layer_y(18)));
        assert!(!placed.is_removed);
        assert_eq!(tower.top_layer, 18);
        // Rests exactly on the old top layer
        assert!((placed.bottom() - tower.blocks[53].top()).abs() < 1e-3);
    }

    #[test]
    fn test_place_block_slots_from_x() {
        let mut tower = tower();
        for (index, x, slot) in [(3, 380.0, 0), (4, 450.0, 1), (5, 520.0, 2)] {
            tower.blocks[index].is_removed = true;
            assert!(tower.place_block_on_top(index, x));
            assert_eq!(tower.blocks[index].slot, slot);
        }
    }

    #[test]
    fn test_place_twice_same_slot_fails() {
        let mut tower = tower();
        tower.blocks[3].is_removed = true;
        tower.blocks[4].is_removed = true;
        assert!(tower.place_block_on_top(3, 450.0));
        assert_eq!(tower.top_layer, 18);

        let before = tower.blocks[4].clone();
        assert!(!tower.place_block_on_top(4, 450.0));
        assert_eq!(tower.top_layer, 18);
        assert_eq!(tower.blocks[4], before);
    }

    #[test]
    fn test_place_perpendicular_layer() {
        let mut tower = tower();
        // A leftover block in the zone at layer 18 pushes the target to 19
        tower.blocks[0].is_removed = true;
        tower.blocks[0].pos = Vec2::new(450.0, tower.layer_y(18) - 1.0);
        assert!(tower.is_in_drop_zone(tower.blocks[0].pos));

        tower.blocks[7].is_removed = true;
        assert!(tower.place_block_on_top(7, 300.0));
        let placed = &tower.blocks[7];
        assert_eq!(placed.layer, 19);
        assert!(!placed.horizontal);
        assert_eq!(placed.slot, 0);
        assert_eq!(placed.width, 240.0);
        assert_eq!(placed.pos.x, 450.0);
        assert_eq!(tower.top_layer, 19);
    }

    #[test]
    fn test_observation_data() {
        let mut tower = tower();
        tower.blocks[2].is_removed = true;
        let obs = tower.get_observation_data();
        assert_eq!(obs.blocks.len(), 54);
        assert_eq!(obs.tower_height, 18);
        assert!((obs.blocks[1].x - 0.5).abs() < 1e-6);
        assert!(obs.blocks[2].removed);
        assert!(!obs.blocks[1].removed);
        assert_eq!(obs.blocks[40].layer, 13);
        assert!((obs.top_layer_y - tower.top_layer_y() / 700.0).abs() < 1e-6);
    }
}
