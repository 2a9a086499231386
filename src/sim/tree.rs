//! Tree contact: sliding down the slope and settling into ornaments
//!
//! The tree is a triangle inscribed in the obstacle rectangle. A falling drop
//! whose center lies horizontally within the triangle's half-width at its
//! height is "on the slope": gravity is suspended and its speed bleeds off
//! until it comes to rest and becomes an ornament.

use glam::Vec2;

use super::rect::Rect;
use super::state::{Entity, EntityId, EntityState, Obstacle, RemovalCause, World};

/// Slope geometry for one drop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeContact {
    /// Horizontal distance from the centerline
    pub offset: f32,
    /// Triangle half-width at the drop's height (never below its radius)
    pub half_width: f32,
}

impl SlopeContact {
    /// 0 at the centerline, approaching 1 at the edge
    pub fn edge_ratio(&self) -> f32 {
        if self.half_width > 0.0 {
            (self.offset / self.half_width).clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

/// Slope contact for `entity`, or `None` when it is outside the triangle
pub fn slope_contact(obstacle: &Obstacle, entity: &Entity) -> Option<SlopeContact> {
    let radius = entity.radius();
    if obstacle.is_degenerate() || radius <= 0.0 {
        return None;
    }
    let half_width = obstacle.half_width_at(entity.center.y).max(radius);
    let offset = (entity.center.x - obstacle.centerline()).abs();
    (offset < half_width).then_some(SlopeContact { offset, half_width })
}

/// Velocity multiplier for one frame on the slope
///
/// Damping weakens toward the edges, so drops near the centerline stop
/// sooner and edge drops slide further.
pub fn slope_retention(
    contact: &SlopeContact,
    damping: f32,
    edge_slip: f32,
    dt_scale: f32,
) -> f32 {
    let slip = 1.0 + edge_slip * contact.edge_ratio();
    (1.0 - damping / slip * dt_scale).clamp(0.0, 1.0)
}

/// Run tree contact for every falling drop touching the obstacle rectangle
pub fn resolve_tree_contacts(world: &mut World, dt_scale: f32) {
    for id in world.store.ids_in_state(EntityState::Falling) {
        if let Some(e) = world.store.get_mut(id) {
            e.on_slope = false;
        }
    }

    let Some(obstacle) = world.obstacle else {
        return;
    };
    if obstacle.is_degenerate() {
        return;
    }

    let damping = world.settings.tree_damping;
    let edge_slip = world.settings.tree_edge_slip;
    let threshold = world.settings.settle_threshold;

    for id in world.store.query(&obstacle.rect) {
        let Some(entity) = world.store.get_mut(id) else {
            continue;
        };
        if entity.state != EntityState::Falling {
            continue;
        }
        let Some(contact) = slope_contact(&obstacle, entity) else {
            continue;
        };

        entity.on_slope = true;
        entity.velocity *= slope_retention(&contact, damping, edge_slip, dt_scale);

        if entity.velocity.y.abs() < threshold {
            settle(world, id);
        }
    }
}

/// Turn a drop into an ornament and knock off the ornaments it lands on
pub fn settle(world: &mut World, id: EntityId) {
    let shrink = world.settings.ornament_shrink;
    let Some(entity) = world.store.get_mut(id) else {
        return;
    };
    entity.velocity = Vec2::ZERO;
    entity.state = EntityState::Settled;
    entity.on_slope = false;
    entity.size *= shrink;

    world.touch(id);
    world.ornaments.insert(id);
    world.ornaments_dirty = true;
    log::debug!("Entity {} settled", id);

    for victim in overlapped_ornaments(world, id) {
        world.remove_entity(victim, RemovalCause::KnockedOff);
    }
}

/// Settled entities whose circles overlap the ornament `id`
fn overlapped_ornaments(world: &World, id: EntityId) -> Vec<EntityId> {
    let Some(ornament) = world.store.get(id) else {
        return Vec::new();
    };
    let radius = ornament.radius();
    if radius <= 0.0 {
        return Vec::new();
    }

    let neighborhood =
        Rect::from_center_size(ornament.center, Vec2::splat(radius * 2.0)).inflate(1.0);
    world
        .store
        .query(&neighborhood)
        .into_iter()
        .filter(|&other| other != id)
        .filter(|&other| {
            world.store.get(other).is_some_and(|e| {
                e.state == EntityState::Settled && ornament.collides_with_radius(e)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::state::{Placement, SpawnRequest};

    fn tree_rect() -> Rect {
        Rect::new(Vec2::new(300.0, 300.0), Vec2::new(700.0, 800.0))
    }

    fn world() -> World {
        World::new(Settings::default(), 1000.0, 800.0, Some(tree_rect()))
    }

    fn drop_at(world: &mut World, source: &str, center: Vec2, velocity: Vec2) -> EntityId {
        world
            .apply_spawn(SpawnRequest::new(source, "s").with_placement(Placement {
                center,
                velocity,
                size: Some(Vec2::splat(30.0)),
                max_fall_speed: Some(6.0),
            }))
            .unwrap()
    }

    #[test]
    fn test_slope_contact_uses_radius_floor_near_apex() {
        let obstacle = Obstacle::new(tree_rect());
        let mut e = Entity::falling(1, Vec2::new(505.0, 300.0), Vec2::ZERO, 5.0);
        e.size = Vec2::splat(30.0);

        let contact = slope_contact(&obstacle, &e).unwrap();
        assert_eq!(contact.half_width, 15.0);
        assert_eq!(contact.offset, 5.0);

        e.center.x = 530.0;
        assert!(slope_contact(&obstacle, &e).is_none());

        // Halfway down the half-width is 100
        e.center.y = 550.0;
        assert_eq!(slope_contact(&obstacle, &e).unwrap().half_width, 100.0);
    }

    #[test]
    fn test_unmeasured_drop_never_touches_tree() {
        let obstacle = Obstacle::new(tree_rect());
        let e = Entity::falling(1, Vec2::new(500.0, 500.0), Vec2::ZERO, 5.0);
        assert!(slope_contact(&obstacle, &e).is_none());
    }

    #[test]
    fn test_edge_drops_keep_more_speed() {
        let center = SlopeContact { offset: 0.0, half_width: 100.0 };
        let edge = SlopeContact { offset: 90.0, half_width: 100.0 };
        let keep_center = slope_retention(&center, 0.15, 1.5, 1.0);
        let keep_edge = slope_retention(&edge, 0.15, 1.5, 1.0);
        assert!((keep_center - 0.85).abs() < 1e-6);
        assert!(keep_edge > keep_center);
    }

    #[test]
    fn test_slope_damps_and_suspends_gravity() {
        let mut world = world();
        let id = drop_at(&mut world, "a", Vec2::new(510.0, 500.0), Vec2::new(0.0, 4.0));
        resolve_tree_contacts(&mut world, 1.0);

        let e = world.entity(id).unwrap();
        assert!(e.on_slope);
        assert!(e.velocity.y < 4.0);
        assert_eq!(e.state, EntityState::Falling);
    }

    #[test]
    fn test_slow_drop_settles_and_shrinks() {
        let mut world = world();
        let id = drop_at(&mut world, "a", Vec2::new(505.0, 450.0), Vec2::new(0.0, 0.4));
        resolve_tree_contacts(&mut world, 1.0);

        let e = world.entity(id).unwrap();
        assert_eq!(e.state, EntityState::Settled);
        assert_eq!(e.velocity, Vec2::ZERO);
        assert!(e.size.abs_diff_eq(Vec2::splat(24.0), 1e-4));
        assert_eq!(world.ornament_ids(), vec![id]);
        assert!(world.ornaments_dirty);
    }

    #[test]
    fn test_settling_knocks_off_overlapped_ornament() {
        let mut world = world();
        let old = drop_at(&mut world, "old", Vec2::new(500.0, 600.0), Vec2::ZERO);
        settle(&mut world, old);

        let new = drop_at(&mut world, "new", Vec2::new(510.0, 605.0), Vec2::ZERO);
        settle(&mut world, new);

        assert!(world.entity(old).is_none());
        assert_eq!(world.ornament_ids(), vec![new]);
        assert!(
            world
                .removed
                .iter()
                .any(|n| n.id == old && n.cause == Some(RemovalCause::KnockedOff))
        );
    }

    #[test]
    fn test_distant_ornaments_survive() {
        let mut world = world();
        let old = drop_at(&mut world, "old", Vec2::new(400.0, 750.0), Vec2::ZERO);
        settle(&mut world, old);
        let new = drop_at(&mut world, "new", Vec2::new(600.0, 750.0), Vec2::ZERO);
        settle(&mut world, new);
        assert_eq!(world.ornament_ids(), vec![old, new]);
    }
}
