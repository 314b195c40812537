//! Tower physics: support, integration, overlap resolution and collapse
//!
//! The engine owns no blocks. It keeps a list of arena indices into the
//! block collection owned by [`TowerStructure`](super::TowerStructure) and
//! every operation borrows that collection for the duration of the call.
//!
//! Frame order inside [`PhysicsEngine::update`] is fixed: support reads
//! pre-integration positions, overlap resolution reads post-integration
//! positions, and the collapse check runs last.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::block::Block;
use crate::config::TowerConfig;
use crate::consts::{CONTACT_RANGE, CONTACT_SLOP, GROUND_MARGIN, SUPPORT_DAMPING, SUPPORT_RANGE};

/// Structural state of the tower as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TowerState {
    /// Tilt under the stability threshold
    Stable,
    /// Tilt in the warning band below the collapse threshold
    Unstable,
    /// Terminal
    Collapsed,
}

/// Per-frame simulation over a shared block arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsEngine {
    config: TowerConfig,
    /// Arena indices of simulated blocks, in insertion order
    bodies: Vec<usize>,
    /// One-way: false -> true only
    collapsed: bool,
    /// Recomputed by every stability check
    stability_score: f32,
}

impl PhysicsEngine {
    pub fn new(config: &TowerConfig) -> Self {
        Self {
            config: config.clone(),
            bodies: Vec::new(),
            collapsed: false,
            stability_score: 1.0,
        }
    }

    /// Register a block (by arena index) with the simulation
    pub fn add_block(&mut self, index: usize) {
        if !self.bodies.contains(&index) {
            self.bodies.push(index);
        }
    }

    /// Pull a block out of the structure. Marks it removed; never deletes.
    pub fn remove_block(&self, blocks: &mut [Block], index: usize) {
        if self.bodies.contains(&index) {
            if let Some(block) = blocks.get_mut(index) {
                block.is_removed = true;
            }
        }
    }

    pub fn collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn stability_score(&self) -> f32 {
        self.stability_score
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Registered indices that exist in `blocks`
    fn members(&self, len: usize) -> impl Iterator<Item = usize> + '_ {
        self.bodies.iter().copied().filter(move |&i| i < len)
    }

    /// Mass-weighted mean position of all non-removed blocks.
    ///
    /// Falls back to the tower's base anchor when nothing is left standing.
    pub fn calculate_center_of_mass(&self, blocks: &[Block]) -> Vec2 {
        let mass = self.config.block_mass;
        let (weighted, total_mass) = self
            .members(blocks.len())
            .map(|i| &blocks[i])
            .filter(|b| !b.is_removed)
            .fold((Vec2::ZERO, 0.0), |(weighted, total), b| {
                (weighted + b.pos * mass, total + mass)
            });

        if total_mass == 0.0 {
            return Vec2::new(self.config.tower_center_x, self.config.tower_base_y());
        }
        weighted / total_mass
    }

    /// Horizontal offset of the center of mass from the base layer's mean X,
    /// normalized by half the playfield width.
    ///
    /// Returns 0 when the base layer is gone entirely.
    pub fn calculate_tilt(&self, blocks: &[Block]) -> f32 {
        let com = self.calculate_center_of_mass(blocks);

        let (sum_x, count) = self
            .members(blocks.len())
            .map(|i| &blocks[i])
            .filter(|b| b.layer == 0 && !b.is_removed)
            .fold((0.0, 0u32), |(sum, n), b| (sum + b.pos.x, n + 1));

        if count == 0 {
            return 0.0;
        }

        let base_x = sum_x / count as f32;
        (com.x - base_x).abs() / self.config.half_width()
    }

    /// Returns `(is_stable, tilt)` and refreshes the stability score
    pub fn check_stability(&mut self, blocks: &[Block]) -> (bool, f32) {
        let tilt = self.calculate_tilt(blocks);
        self.stability_score = (1.0 - tilt / self.config.collapse_threshold).clamp(0.0, 1.0);
        (tilt < self.config.stability_threshold, tilt)
    }

    /// Current structural state, without touching the stability score
    pub fn tower_state(&self, blocks: &[Block]) -> TowerState {
        if self.collapsed {
            return TowerState::Collapsed;
        }
        if self.calculate_tilt(blocks) < self.config.stability_threshold {
            TowerState::Stable
        } else {
            TowerState::Unstable
        }
    }

    /// Terminal collapse check.
    ///
    /// Collapses when a non-base block reaches the ground (that block is
    /// flagged `is_collapsed`) or when tilt reaches the collapse threshold.
    pub fn check_collapse(&mut self, blocks: &mut [Block]) -> bool {
        if self.collapsed {
            return true;
        }

        let ground_limit = self.config.ground_y - GROUND_MARGIN;
        let grounded = self.members(blocks.len()).find(|&i| {
            let b = &blocks[i];
            b.is_free() && b.layer > 0 && b.bottom() >= ground_limit
        });

        if let Some(i) = grounded {
            blocks[i].is_collapsed = true;
            self.collapsed = true;
            log::info!(
                "Tower collapsed: block {} from layer {} reached the ground",
                i,
                blocks[i].layer
            );
            return true;
        }

        let (_, tilt) = self.check_stability(blocks);
        if tilt >= self.config.collapse_threshold {
            self.collapsed = true;
            log::info!("Tower collapsed: tilt {:.3} over threshold", tilt);
            return true;
        }

        false
    }

    /// Rest blocks on whatever is directly beneath them.
    ///
    /// Supporters are free blocks strictly below (larger Y) within
    /// 1.5 block heights whose X ranges overlap. Any supporter damps the
    /// block's vertical velocity; a supporter within 1.2 block heights whose
    /// surface is touching or penetrated snaps the block onto it. The
    /// highest such surface wins. Rebuilt from scratch every frame.
    pub fn apply_block_support(&self, blocks: &mut [Block], _dt: f32) {
        let len = blocks.len();
        for i in self.members(len) {
            blocks[i].resting = false;
        }

        let search_range = self.config.block_height * SUPPORT_RANGE;
        let contact_range = self.config.block_height * CONTACT_RANGE;

        for i in self.members(len) {
            if !blocks[i].is_free() {
                continue;
            }

            let mut supported = false;
            let mut rest_y: Option<f32> = None;

            for j in self.members(len) {
                if i == j {
                    continue;
                }
                let (block, other) = (&blocks[i], &blocks[j]);
                if !other.is_free() || other.pos.y <= block.pos.y {
                    continue;
                }

                let dist = other.pos.y - block.pos.y;
                if dist > search_range || !block.overlaps_x(other) {
                    continue;
                }
                supported = true;

                if dist < contact_range {
                    let rest_dist = (block.height + other.height) / 2.0;
                    if dist - rest_dist < CONTACT_SLOP {
                        let y = other.pos.y - rest_dist;
                        rest_y = Some(rest_y.map_or(y, |r| r.min(y)));
                    }
                }
            }

            let block = &mut blocks[i];
            if supported {
                block.vel.y *= SUPPORT_DAMPING;
            }
            if let Some(y) = rest_y {
                block.pos.y = y;
                block.vel.y = 0.0;
                block.resting = true;
            }
        }
    }

    /// Push intersecting pairs apart along their axis of smaller overlap,
    /// half the overlap each.
    pub fn resolve_overlaps(&self, blocks: &mut [Block]) {
        let members: Vec<usize> = self.members(blocks.len()).collect();

        for (k, &a) in members.iter().enumerate() {
            if !blocks[a].is_free() {
                continue;
            }
            for &b in &members[k + 1..] {
                if !blocks[b].is_free() {
                    continue;
                }
                let Some(overlap) = blocks[a].rect().overlap(&blocks[b].rect()) else {
                    continue;
                };

                if overlap.x < overlap.y {
                    let push = overlap.x / 2.0;
                    let dir = if blocks[a].pos.x < blocks[b].pos.x { -1.0 } else { 1.0 };
                    blocks[a].pos.x += dir * push;
                    blocks[b].pos.x -= dir * push;
                } else {
                    let push = overlap.y / 2.0;
                    let dir = if blocks[a].pos.y < blocks[b].pos.y { -1.0 } else { 1.0 };
                    blocks[a].pos.y += dir * push;
                    blocks[b].pos.y -= dir * push;
                }
            }
        }
    }

    /// Advance the simulation by one frame
    pub fn update(&mut self, blocks: &mut [Block], dt: f32) {
        let len = blocks.len();

        if self.collapsed {
            for i in self.members(len) {
                blocks[i].free_fall(dt, &self.config);
            }
            return;
        }

        self.apply_block_support(blocks, dt);

        for i in self.members(len) {
            blocks[i].integrate(dt, &self.config);
        }

        self.resolve_overlaps(blocks);
        self.check_collapse(blocks);
    }
}
