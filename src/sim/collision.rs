//! Drop collision detection and response
//!
//! Broad phase comes from the quadtree, narrow phase is a circle test. The
//! response is a biased elastic collision: the lower drop counts as heavier,
//! so piles tend to settle instead of bouncing apart, and an out-thrust term
//! separates overlapping drops. Resting ornaments act as immovable bodies.

use std::collections::HashSet;

use glam::Vec2;

use super::state::{Entity, EntityId, EntityState, World};

/// The subset of an entity the collision response needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub center: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub max_fall_speed: f32,
}

impl From<&Entity> for Body {
    fn from(e: &Entity) -> Self {
        Self {
            center: e.center,
            velocity: e.velocity,
            radius: e.radius(),
            max_fall_speed: e.max_fall_speed,
        }
    }
}

/// Tuning for [`collide`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionParams {
    pub lower_mass_bias: f32,
    pub out_thrust: f32,
}

/// Unordered pair key, smaller id first
#[inline]
pub fn pair_key(a: EntityId, b: EntityId) -> (EntityId, EntityId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Effective masses: the drop lower on screen (larger y) is heavier
pub fn biased_masses(a: &Body, b: &Body, bias: f32) -> (f32, f32) {
    if a.center.y > b.center.y {
        (bias, 1.0)
    } else if b.center.y > a.center.y {
        (1.0, bias)
    } else {
        (1.0, 1.0)
    }
}

/// Separation push from `a` toward `b`
///
/// Full strength at full overlap, fading to nothing at first contact.
fn out_thrust(a: &Body, b: &Body, params: &CollisionParams, dt_scale: f32) -> Vec2 {
    let delta = b.center - a.center;
    let dist = delta.length();
    let normal = if dist > f32::EPSILON {
        delta / dist
    } else {
        Vec2::X
    };

    let reach = a.radius + b.radius;
    let depth = if reach > 0.0 {
        ((reach - dist) / reach).clamp(0.0, 1.0)
    } else {
        0.0
    };
    normal * params.out_thrust * depth * dt_scale
}

/// New velocities for a colliding pair
///
/// With `elastic` false only the out-thrust is applied (pair is on cooldown).
pub fn collide(
    a: &Body,
    b: &Body,
    params: &CollisionParams,
    dt_scale: f32,
    elastic: bool,
) -> (Vec2, Vec2) {
    let (ma, mb) = biased_masses(a, b, params.lower_mass_bias);
    let total = ma + mb;
    let thrust = out_thrust(a, b, params, dt_scale);

    let mut va = a.velocity - thrust * (2.0 * mb / total);
    let mut vb = b.velocity + thrust * (2.0 * ma / total);

    if elastic {
        let rel_p = a.center - b.center;
        let dist_sq = rel_p.length_squared();
        if dist_sq > f32::EPSILON {
            // Only approaching pairs exchange momentum
            let approach = (a.velocity - b.velocity).dot(rel_p).min(0.0) / dist_sq;
            va -= rel_p * (2.0 * mb / total * approach);
            vb += rel_p * (2.0 * ma / total * approach);
        }
    }

    va.y = va.y.min(a.max_fall_speed);
    vb.y = vb.y.min(b.max_fall_speed);
    (va, vb)
}

/// New velocity for a drop striking a resting ornament
///
/// The ornament has unbounded mass: the drop takes the whole out-thrust and
/// its approach along the contact normal is reflected.
pub fn collide_with_fixed(
    drop: &Body,
    fixed: &Body,
    params: &CollisionParams,
    dt_scale: f32,
    elastic: bool,
) -> Vec2 {
    let mut v = drop.velocity - out_thrust(drop, fixed, params, dt_scale) * 2.0;

    if elastic {
        let rel_p = drop.center - fixed.center;
        let dist_sq = rel_p.length_squared();
        if dist_sq > f32::EPSILON {
            let approach = drop.velocity.dot(rel_p).min(0.0) / dist_sq;
            v -= rel_p * (2.0 * approach);
        }
    }

    v.y = v.y.min(drop.max_fall_speed);
    v
}

/// Resolve every overlapping pair involving a falling drop once, against
/// other drops and against the ornament pile. Returns the number of pairs
/// resolved.
pub fn resolve_drop_collisions(world: &mut World, dt_scale: f32) -> usize {
    let params = CollisionParams {
        lower_mass_bias: world.settings.lower_mass_bias,
        out_thrust: world.settings.out_thrust,
    };
    let cooldown_ms = world.settings.pair_cooldown_ms;
    let now = world.now_ms;

    let mut visited: HashSet<(EntityId, EntityId)> = HashSet::new();
    let mut resolved = 0;

    for a_id in world.store.ids_in_state(EntityState::Falling) {
        let Some(a) = world.store.get(a_id) else {
            continue;
        };
        if !a.is_measured() {
            continue;
        }

        for b_id in world.store.query(&a.bounds()) {
            if b_id == a_id {
                continue;
            }
            let key = pair_key(a_id, b_id);
            if visited.contains(&key) {
                continue;
            }

            // Velocities may have changed from an earlier pair this frame
            let (Some(a), Some(b)) = (world.store.get(a_id), world.store.get(b_id)) else {
                continue;
            };
            if b.state == EntityState::Removed || !a.collides_with_radius(b) {
                continue;
            }
            visited.insert(key);

            let elastic = match world.pair_cooldowns.get(&key) {
                Some(&until) if until > now => false,
                _ => true,
            };
            let (body_a, body_b) = (Body::from(a), Body::from(b));
            let against_ornament = b.state == EntityState::Settled;
            if elastic {
                world.pair_cooldowns.insert(key, now + cooldown_ms);
            }

            if against_ornament {
                let va = collide_with_fixed(&body_a, &body_b, &params, dt_scale, elastic);
                if let Some(a) = world.store.get_mut(a_id) {
                    a.velocity = va;
                }
            } else {
                let (va, vb) = collide(&body_a, &body_b, &params, dt_scale, elastic);
                if let Some(a) = world.store.get_mut(a_id) {
                    a.velocity = va;
                }
                if let Some(b) = world.store.get_mut(b_id) {
                    b.velocity = vb;
                }
            }
            resolved += 1;
        }
    }

    if resolved > 0 {
        log::trace!("Resolved {} collisions", resolved);
    }
    resolved
}

/// Drop cooldown entries whose window has passed
pub fn prune_cooldowns(world: &mut World) {
    let now = world.now_ms;
    let before = world.pair_cooldowns.len();
    world.pair_cooldowns.retain(|_, until| *until > now);
    log::trace!(
        "Pruned {} pair cooldowns",
        before - world.pair_cooldowns.len()
    );
}
