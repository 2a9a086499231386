//! World-edge handling
//!
//! Each edge is watched by an oversized guard band that reaches well past the
//! screen, so fast drops cannot skip over it in a single step.

use glam::Vec2;

use super::rect::Rect;
use super::state::{EntityState, RemovalCause, World, WorldBounds};

/// Guard rectangles around the world
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardBands {
    pub left: Rect,
    pub right: Rect,
    /// Far above the top edge; catches drops flung upward
    pub runaway: Rect,
    pub floor: Rect,
}

impl GuardBands {
    pub fn new(bounds: &WorldBounds, margin: f32, runaway_offset: f32) -> Self {
        let (w, h) = (bounds.width, bounds.height);
        let top = -(runaway_offset + margin);
        Self {
            left: Rect::new(Vec2::new(-margin, top), Vec2::new(0.0, h + margin)),
            right: Rect::new(Vec2::new(w, top), Vec2::new(w + margin, h + margin)),
            runaway: Rect::new(Vec2::new(-margin, top), Vec2::new(w + margin, -runaway_offset)),
            floor: Rect::new(Vec2::new(-margin, h), Vec2::new(w + margin, h + margin)),
        }
    }
}

/// Apply wall, runaway and floor rules to falling drops
pub fn resolve_boundaries(world: &mut World) {
    let bands = GuardBands::new(
        &world.bounds,
        world.settings.safety_margin,
        world.settings.runaway_offset,
    );

    // Walls only force the sign of vx; the magnitude is untouched
    for id in world.store.query(&bands.left) {
        if let Some(e) = world.store.get_mut(id) {
            if e.state == EntityState::Falling && e.is_measured() {
                e.velocity.x = e.velocity.x.abs();
            }
        }
    }
    for id in world.store.query(&bands.right) {
        if let Some(e) = world.store.get_mut(id) {
            if e.state == EntityState::Falling && e.is_measured() {
                e.velocity.x = -e.velocity.x.abs();
            }
        }
    }

    for id in world.store.query(&bands.runaway) {
        if let Some(e) = world.store.get_mut(id) {
            if e.state == EntityState::Falling && e.velocity.y < 0.0 {
                log::trace!("Entity {} caught in runaway band", id);
                e.velocity = Vec2::ZERO;
            }
        }
    }

    let floor = world.bounds.height;
    for id in world.store.query(&bands.floor) {
        let Some(e) = world.store.get_mut(id) else {
            continue;
        };
        if e.state != EntityState::Falling {
            continue;
        }
        e.velocity = Vec2::ZERO;
        e.center.y = floor - e.size.y;
        world.remove_entity(id, RemovalCause::Floor);
    }
}
