//! Frame step
//!
//! One call advances the world by the real time elapsed since the previous
//! frame. Order within a frame:
//! 1. Clock, scheduled events, cooldown pruning
//! 2. Queued commands (spawns, measurements, clear, resize)
//! 3. Integration
//! 4. Boundaries, tree contact, drop and ornament collisions
//! 5. Render notifications for everything that changed

use super::boundary::resolve_boundaries;
use super::collision::{prune_cooldowns, resolve_drop_collisions};
use super::integrate::advance;
use super::state::{Command, FrameReport, RenderNotification, ScheduledAction, World};
use super::tree::resolve_tree_contacts;

/// Advance the world by `elapsed_ms` of real time
pub fn tick(world: &mut World, elapsed_ms: f32) -> FrameReport {
    let elapsed_ms = elapsed_ms.max(0.0);
    let dt_scale = crate::dt_scale(elapsed_ms);
    world.now_ms += f64::from(elapsed_ms);

    fire_scheduled(world);
    if world.now_ms >= world.next_prune_ms {
        prune_cooldowns(world);
        world.next_prune_ms = world.now_ms + world.settings.cooldown_prune_interval_ms;
    }
    apply_commands(world);

    advance(world, dt_scale);
    resolve_boundaries(world);
    resolve_tree_contacts(world, dt_scale);
    let collisions = resolve_drop_collisions(world, dt_scale);

    let report = FrameReport {
        renders: collect_renders(world),
        collisions,
        ornaments: world
            .ornaments_dirty
            .then(|| world.ornament_records()),
    };
    world.ornaments_dirty = false;

    log::trace!(
        "Frame at {:.0}ms: {} entities, {} changed, {} collisions",
        world.now_ms,
        world.entity_count(),
        report.renders.len(),
        report.collisions
    );
    report
}

/// Run every scheduled action whose time has come
fn fire_scheduled(world: &mut World) {
    let now = world.now_ms;
    let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut world.scheduled)
        .into_iter()
        .partition(|s| s.fire_at_ms <= now);
    world.scheduled = pending;

    for scheduled in due {
        match scheduled.action {
            ScheduledAction::ReleaseSource(source) => {
                log::debug!("Source '{}' may spawn again", source);
                world.active_sources.remove(&source);
            }
        }
    }
}

/// Drain queued commands in arrival order
fn apply_commands(world: &mut World) {
    while let Some(command) = world.commands.pop_front() {
        match command {
            Command::Spawn(request) => {
                world.apply_spawn(request);
            }
            Command::Measure { id, size } => world.apply_measure(id, size),
            Command::Clear => world.apply_clear(),
            Command::Resize {
                width,
                height,
                obstacle,
            } => world.apply_resize(width, height, obstacle),
        }
    }
}

/// Notifications for changed live entities plus this frame's removals
fn collect_renders(world: &mut World) -> Vec<RenderNotification> {
    let changed = std::mem::take(&mut world.changed);
    let mut renders: Vec<RenderNotification> = changed
        .into_iter()
        .filter_map(|id| world.store.get(id))
        .map(|e| RenderNotification {
            id: e.id,
            center: e.center,
            size: e.size,
            state: e.state,
            cause: None,
        })
        .collect();
    renders.append(&mut world.removed);
    renders.sort_by_key(|r| r.id);
    renders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BASELINE_FRAME_MS;
    use crate::settings::Settings;
    use crate::sim::collision::{Body, CollisionParams, collide, pair_key};
    use crate::sim::state::{EntityState, Placement, RemovalCause, SpawnRequest};
    use glam::Vec2;

    fn world() -> World {
        World::new(Settings::default(), 1000.0, 800.0, None)
    }

    fn placed(source: &str, center: Vec2, velocity: Vec2) -> SpawnRequest {
        SpawnRequest::new(source, "s").with_placement(Placement {
            center,
            velocity,
            size: Some(Vec2::splat(30.0)),
            max_fall_speed: Some(6.0),
        })
    }

    #[test]
    fn test_spawns_apply_on_next_frame() {
        let mut world = world();
        world.spawn(placed("a", Vec2::new(100.0, 100.0), Vec2::ZERO));
        assert_eq!(world.entity_count(), 0);
        assert_eq!(world.pending_commands(), 1);

        let report = tick(&mut world, BASELINE_FRAME_MS);
        assert_eq!(world.entity_count(), 1);
        assert_eq!(report.renders.len(), 1);
        assert_eq!(report.renders[0].state, EntityState::Falling);
    }

    #[test]
    fn test_duplicate_source_in_same_frame_is_ignored() {
        let mut world = world();
        world.spawn(placed("a", Vec2::new(100.0, 100.0), Vec2::ZERO));
        world.spawn(placed("a", Vec2::new(300.0, 100.0), Vec2::ZERO));
        tick(&mut world, BASELINE_FRAME_MS);
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_source_released_after_delay() {
        let mut world = world();
        world.spawn(placed("a", Vec2::new(500.0, 790.0), Vec2::new(0.0, 5.0)));
        let report = tick(&mut world, BASELINE_FRAME_MS);
        assert!(report.renders.iter().any(|r| r.state == EntityState::Removed));
        assert!(world.is_source_active("a"));

        tick(&mut world, 29_000.0);
        assert!(world.is_source_active("a"));
        tick(&mut world, 1_500.0);
        assert!(!world.is_source_active("a"));

        world.spawn(placed("a", Vec2::new(500.0, 100.0), Vec2::ZERO));
        tick(&mut world, BASELINE_FRAME_MS);
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_source_released_after_knock_off() {
        let tree = crate::sim::Rect::new(Vec2::new(300.0, 300.0), Vec2::new(700.0, 800.0));
        let mut world = World::new(Settings::default(), 1000.0, 800.0, Some(tree));
        world.spawn(placed("old", Vec2::new(500.0, 600.0), Vec2::new(0.0, 0.3)));
        tick(&mut world, BASELINE_FRAME_MS);
        assert_eq!(world.ornament_count(), 1);

        world.spawn(placed("new", Vec2::new(510.0, 605.0), Vec2::new(0.0, 0.3)));
        let report = tick(&mut world, BASELINE_FRAME_MS);
        assert!(
            report
                .renders
                .iter()
                .any(|r| r.cause == Some(RemovalCause::KnockedOff))
        );
        assert!(world.is_source_active("old"));

        tick(&mut world, 29_000.0);
        assert!(world.is_source_active("old"));
        tick(&mut world, 1_500.0);
        assert!(!world.is_source_active("old"));
        assert!(world.is_source_active("new"));
    }

    #[test]
    fn test_pair_cooldown_gates_elastic_exchange() {
        let mut world = world();
        world.spawn(placed("a", Vec2::new(500.0, 300.0), Vec2::new(3.0, 0.0)));
        world.spawn(placed("b", Vec2::new(520.0, 300.0), Vec2::new(-3.0, 0.0)));

        let reset = |world: &mut World, ax: f32, bx: f32| {
            let ids: Vec<_> = world.entities().map(|e| e.id).collect();
            for (id, x, vx) in [(ids[0], ax, 3.0), (ids[1], bx, -3.0)] {
                if let Some(e) = world.store.get_mut(id) {
                    e.center = Vec2::new(x, 300.0);
                    e.velocity = Vec2::new(vx, 0.0);
                }
                world.store.sync(id);
            }
            (ids[0], ids[1])
        };

        // First contact exchanges momentum and opens the cooldown window
        let report = tick(&mut world, BASELINE_FRAME_MS);
        assert_eq!(report.collisions, 1);
        let (a, b) = reset(&mut world, 500.0, 520.0);
        let key = pair_key(a, b);
        let until = world.pair_cooldowns[&key];
        assert_eq!(until, world.now_ms + world.settings.pair_cooldown_ms);

        // Inside the window only the out-thrust applies
        let report = tick(&mut world, BASELINE_FRAME_MS);
        assert_eq!(report.collisions, 1);
        let fall = Vec2::new(0.0, world.settings.gravity);
        let body = |id| {
            let e = world.entity(id).unwrap();
            Body {
                velocity: Vec2::new(if id == a { 3.0 } else { -3.0 }, 0.0) + fall,
                ..Body::from(e)
            }
        };
        let params = CollisionParams {
            lower_mass_bias: world.settings.lower_mass_bias,
            out_thrust: world.settings.out_thrust,
        };
        let (want_a, want_b) = collide(&body(a), &body(b), &params, 1.0, false);
        assert!(world.entity(a).unwrap().velocity.abs_diff_eq(want_a, 1e-5));
        assert!(world.entity(b).unwrap().velocity.abs_diff_eq(want_b, 1e-5));
        assert!(want_a.x > 0.0);
        assert_eq!(world.pair_cooldowns[&key], until);

        // Once the window has passed the exchange happens again
        reset(&mut world, 491.0, 529.0);
        tick(&mut world, 100.0);
        assert!(world.now_ms > until);
        assert!(world.entity(a).unwrap().velocity.x < 0.0);
        assert!(world.entity(b).unwrap().velocity.x > 0.0);
        assert_eq!(
            world.pair_cooldowns[&key],
            world.now_ms + world.settings.pair_cooldown_ms
        );
    }

    #[test]
    fn test_unchanged_entities_are_not_reported() {
        let mut world = world();
        let ids = world.restore_ornaments(&[crate::persistence::OrnamentRecord {
            position: crate::persistence::Position { x: 50.0, y: 50.0 },
            sprite_ref: "o".into(),
            is_avatar_style: false,
        }]);
        let first = tick(&mut world, BASELINE_FRAME_MS);
        assert_eq!(first.renders.len(), 1);
        assert_eq!(first.renders[0].id, ids[0]);

        let second = tick(&mut world, BASELINE_FRAME_MS);
        assert!(second.renders.is_empty());
        assert!(second.ornaments.is_none());
    }

    #[test]
    fn test_cooldowns_pruned_on_interval() {
        let mut world = world();
        world.pair_cooldowns.insert((1, 2), 50.0);
        world.pair_cooldowns.insert((3, 4), 1.0e9);
        tick(&mut world, 21_000.0);
        assert_eq!(world.pair_cooldown_count(), 1);
    }

    #[test]
    fn test_resize_rebuilds_index() {
        let mut world = world();
        world.spawn(placed("a", Vec2::new(100.0, 100.0), Vec2::ZERO));
        tick(&mut world, BASELINE_FRAME_MS);

        let tree = crate::sim::Rect::new(Vec2::new(600.0, 300.0), Vec2::new(1000.0, 900.0));
        world.resize(1600.0, 900.0, Some(tree));
        tick(&mut world, BASELINE_FRAME_MS);

        assert_eq!(world.bounds.width, 1600.0);
        assert_eq!(world.obstacle.map(|o| o.centerline()), Some(800.0));
        assert_eq!(world.indexed_count(), 1);
    }
}
