//! Tower block entity
//!
//! A block is a mutable physical record: position, rotation, velocity,
//! flags and dimensions. Blocks are never destroyed during a session;
//! removal and placement only flip flags and move fields.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::rect::Rect;
use crate::config::TowerConfig;
use crate::consts::{
    BOUNCE_CUTOFF, COLLAPSE_BOUNCE_CUTOFF, COLLAPSE_FRICTION, COLLAPSE_RESTITUTION,
};
use crate::rotate;

/// A single tower block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Center position (pixels, Y down)
    pub pos: Vec2,
    pub vel: Vec2,
    /// Rotation in radians (0 while structurally placed)
    pub rotation: f32,
    pub angular_vel: f32,
    /// Structural row (0 = base)
    pub layer: u32,
    /// Position within the layer
    pub slot: u32,
    /// Side-by-side across X (even layers) vs. spanning the layer (odd layers)
    pub horizontal: bool,
    pub width: f32,
    pub height: f32,
    /// Held by the player; physics leaves it alone
    pub is_dragging: bool,
    /// Pulled out of the structure
    pub is_removed: bool,
    /// Touched the ground while not part of the base
    pub is_collapsed: bool,
    /// Held up by a support contact this frame
    #[serde(skip)]
    pub resting: bool,
}

impl Block {
    pub fn new(pos: Vec2, layer: u32, slot: u32, horizontal: bool, config: &TowerConfig) -> Self {
        let (width, height) = Self::dimensions(horizontal, config);
        Self {
            pos,
            vel: Vec2::ZERO,
            rotation: 0.0,
            angular_vel: 0.0,
            layer,
            slot,
            horizontal,
            width,
            height,
            is_dragging: false,
            is_removed: false,
            is_collapsed: false,
            resting: false,
        }
    }

    /// Width and height for an orientation.
    ///
    /// Horizontal blocks show their end faces side by side. Perpendicular
    /// blocks span the whole layer and are stacked in depth, so each one is
    /// drawn as a band of the layer's height.
    pub fn dimensions(horizontal: bool, config: &TowerConfig) -> (f32, f32) {
        let n = config.blocks_per_layer as f32;
        if horizontal {
            (config.block_width, config.block_height)
        } else {
            (config.block_width * n, config.block_height / n)
        }
    }

    /// Switch orientation and update dimensions to match
    pub fn set_orientation(&mut self, horizontal: bool, config: &TowerConfig) {
        self.horizontal = horizontal;
        let (width, height) = Self::dimensions(horizontal, config);
        self.width = width;
        self.height = height;
    }

    /// Axis-aligned bounding box (rotation ignored)
    pub fn rect(&self) -> Rect {
        Rect::from_center(self.pos, self.width, self.height)
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.pos.x - self.width / 2.0
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.pos.x + self.width / 2.0
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.pos.y - self.height / 2.0
    }

    /// Lower edge (largest Y)
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.pos.y + self.height / 2.0
    }

    /// Free for physics: not held and not pulled out
    #[inline]
    pub fn is_free(&self) -> bool {
        !self.is_dragging && !self.is_removed
    }

    /// Bounding boxes intersect (touching edges do not count)
    pub fn overlaps(&self, other: &Block) -> bool {
        self.rect().intersects(&other.rect())
    }

    /// Horizontal extents overlap (strict)
    pub fn overlaps_x(&self, other: &Block) -> bool {
        (self.pos.x - other.pos.x).abs() < (self.width + other.width) / 2.0
    }

    /// The four corners of the rotated block
    pub fn corners(&self) -> [Vec2; 4] {
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        [
            Vec2::new(-hw, -hh),
            Vec2::new(hw, -hh),
            Vec2::new(hw, hh),
            Vec2::new(-hw, hh),
        ]
        .map(|c| rotate(c, self.rotation) + self.pos)
    }

    /// Point test in the block's local (unrotated) frame
    pub fn contains_point(&self, p: Vec2) -> bool {
        let local = rotate(p - self.pos, -self.rotation);
        local.x.abs() <= self.width / 2.0 && local.y.abs() <= self.height / 2.0
    }

    /// Clear motion state (used when a block is placed)
    pub fn stop(&mut self) {
        self.vel = Vec2::ZERO;
        self.rotation = 0.0;
        self.angular_vel = 0.0;
    }

    /// Advance one step while free: gravity, damping, motion, ground bounce
    pub fn integrate(&mut self, dt: f32, config: &TowerConfig) {
        if !self.is_free() {
            return;
        }

        // Support contact cancels gravity this frame
        if !self.resting {
            self.vel.y += config.gravity * dt;
        }

        self.vel *= config.friction;
        self.angular_vel *= config.friction;

        self.pos += self.vel * dt;
        self.rotation += self.angular_vel * dt;

        if self.bottom() > config.ground_y {
            self.pos.y = config.ground_y - self.height / 2.0;
            self.vel.y *= -config.restitution;
            self.vel.x *= config.friction;
            if self.vel.y.abs() < BOUNCE_CUTOFF {
                self.vel.y = 0.0;
            }
        }
    }

    /// Simplified post-collapse motion: no support, livelier ground bounce
    pub fn free_fall(&mut self, dt: f32, config: &TowerConfig) {
        if self.is_dragging {
            return;
        }

        self.vel.y += config.gravity * dt;
        self.pos += self.vel * dt;
        self.rotation += self.angular_vel * dt;

        if self.bottom() > config.ground_y {
            self.pos.y = config.ground_y - self.height / 2.0;
            self.vel.y *= -COLLAPSE_RESTITUTION;
            self.vel.x *= COLLAPSE_FRICTION;
            self.angular_vel *= COLLAPSE_FRICTION;
            if self.vel.y.abs() < COLLAPSE_BOUNCE_CUTOFF {
                self.vel.y = 0.0;
            }
        }
    }
}
