//! Per-frame integration of falling drops

use glam::Vec2;

use super::state::{EntityState, World};

/// Move every falling drop by its velocity, then apply gravity and air
/// resistance. Positions are resynced into the spatial index.
pub fn advance(world: &mut World, dt_scale: f32) {
    let gravity = world.settings.gravity;
    let damping = world.settings.air_damping;

    for id in world.store.ids_in_state(EntityState::Falling) {
        let Some(entity) = world.store.get_mut(id) else {
            continue;
        };

        let step = entity.velocity * dt_scale;
        entity.center += step;

        if !entity.on_slope {
            entity.velocity.y += gravity * dt_scale;
        }
        apply_air_resistance(&mut entity.velocity, entity.max_fall_speed, damping, dt_scale);

        if step != Vec2::ZERO {
            world.touch(id);
        }
    }
}

/// Pull speed back toward `max_speed` by decaying only the excess
///
/// `damping` is the fraction of the excess kept per baseline frame.
pub fn apply_air_resistance(velocity: &mut Vec2, max_speed: f32, damping: f32, dt_scale: f32) {
    let speed = velocity.length();
    if speed <= max_speed || speed <= 0.0 {
        return;
    }
    let excess = speed - max_speed.max(0.0);
    let target = max_speed.max(0.0) + excess * damping.powf(dt_scale);
    *velocity *= target / speed;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::sim::state::{Placement, SpawnRequest};

    fn world_with_drop(velocity: Vec2) -> (World, u32) {
        let mut world = World::new(Settings::default(), 1000.0, 800.0, None);
        let id = world
            .apply_spawn(SpawnRequest::new("a", "s").with_placement(Placement {
                center: Vec2::new(500.0, 100.0),
                velocity,
                size: Some(Vec2::splat(20.0)),
                max_fall_speed: Some(6.0),
            }))
            .unwrap();
        (world, id)
    }

    #[test]
    fn test_advance_moves_and_applies_gravity() {
        let (mut world, id) = world_with_drop(Vec2::new(1.0, 2.0));
        advance(&mut world, 1.0);

        let e = world.entity(id).unwrap();
        assert_eq!(e.center, Vec2::new(501.0, 102.0));
        assert!((e.velocity.y - (2.0 + world.settings.gravity)).abs() < 1e-6);
        assert_eq!(world.query(&e.bounds()), vec![id]);
    }

    #[test]
    fn test_displacement_scales_with_dt() {
        let (mut world, id) = world_with_drop(Vec2::new(0.0, 2.0));
        advance(&mut world, 3.0);
        assert_eq!(world.entity(id).unwrap().center.y, 106.0);
    }

    #[test]
    fn test_on_slope_skips_gravity() {
        let (mut world, id) = world_with_drop(Vec2::new(0.0, 2.0));
        world.store.get_mut(id).unwrap().on_slope = true;
        advance(&mut world, 1.0);
        assert_eq!(world.entity(id).unwrap().velocity.y, 2.0);
    }

    #[test]
    fn test_air_resistance_decays_toward_cap() {
        let mut v = Vec2::new(0.0, 10.0);
        apply_air_resistance(&mut v, 6.0, 0.5, 1.0);
        // Excess of 4 halves, not clipped outright
        assert!((v.y - 8.0).abs() < 1e-5);

        let mut slow = Vec2::new(0.0, 3.0);
        apply_air_resistance(&mut slow, 6.0, 0.5, 1.0);
        assert_eq!(slow.y, 3.0);
    }
}
