//! World state and core simulation types
//!
//! Everything the frame step reads or writes lives in [`World`]. External
//! inputs arrive as [`Command`]s and are only applied at the start of a frame.

use std::collections::{BTreeSet, HashMap, VecDeque};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::rect::Rect;
use super::store::EntityStore;
use crate::persistence::OrnamentRecord;
use crate::settings::Settings;

pub type EntityId = u32;

/// Lifecycle of a drop. Transitions only go forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    /// Moving under gravity, collision-checked every frame
    Falling,
    /// Resting ornament on the tree
    Settled,
    /// Gone from the world
    Removed,
}

/// Why an entity left the world (drives the renderer's exit animation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalCause {
    /// Hit the floor
    Floor,
    /// Ornament displaced by a newly settled drop
    KnockedOff,
    /// Cleared by request
    Cleared,
}

/// A drop or an ornament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub center: Vec2,
    /// Zero until the renderer reports the sprite's measured size
    pub size: Vec2,
    pub velocity: Vec2,
    /// Air-resistance ceiling on speed
    pub max_fall_speed: f32,
    pub state: EntityState,
    /// Source holding the spawn slot (restored ornaments have none)
    pub spawned_by: Option<String>,
    pub sprite_ref: String,
    #[serde(default)]
    pub is_avatar_style: bool,
    /// Resting against the tree slope last frame (no gravity)
    #[serde(default)]
    pub on_slope: bool,
}

impl Entity {
    /// A bare falling entity with no size and no source
    pub fn falling(id: EntityId, center: Vec2, velocity: Vec2, max_fall_speed: f32) -> Self {
        Self {
            id,
            center,
            size: Vec2::ZERO,
            velocity,
            max_fall_speed,
            state: EntityState::Falling,
            spawned_by: None,
            sprite_ref: String::new(),
            is_avatar_style: false,
            on_slope: false,
        }
    }

    /// Both sides measured and non-zero
    #[inline]
    pub fn is_measured(&self) -> bool {
        self.size.x > 0.0 && self.size.y > 0.0
    }

    /// Collision radius: half the larger side, zero until measured
    #[inline]
    pub fn radius(&self) -> f32 {
        if self.is_measured() {
            self.size.x.max(self.size.y) * 0.5
        } else {
            0.0
        }
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.center, self.size)
    }

    #[inline]
    pub fn left(&self) -> f32 {
        self.center.x - self.size.x * 0.5
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.center.x + self.size.x * 0.5
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.center.y - self.size.y * 0.5
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.center.y + self.size.y * 0.5
    }

    /// Circular narrow-phase test; a zero radius never collides
    pub fn collides_with_radius(&self, other: &Entity) -> bool {
        let (ra, rb) = (self.radius(), other.radius());
        if ra <= 0.0 || rb <= 0.0 {
            return false;
        }
        self.center.distance(other.center) <= ra + rb
    }

    pub fn is_live(&self) -> bool {
        self.state != EntityState::Removed
    }

    fn to_record(&self) -> OrnamentRecord {
        OrnamentRecord {
            position: self.center.into(),
            sprite_ref: self.sprite_ref.clone(),
            is_avatar_style: self.is_avatar_style,
        }
    }
}

/// The triangular tree: apex at the top center of `rect`, base along its bottom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub rect: Rect,
}

impl Obstacle {
    pub fn new(rect: Rect) -> Self {
        Self { rect }
    }

    /// Zero-height or zero-width trees take no part in collisions
    pub fn is_degenerate(&self) -> bool {
        self.rect.is_empty()
    }

    /// x coordinate of the apex/base midpoint
    #[inline]
    pub fn centerline(&self) -> f32 {
        self.rect.center().x
    }

    pub fn apex(&self) -> Vec2 {
        Vec2::new(self.centerline(), self.rect.min.y)
    }

    /// Half-width of the triangle at height `y`, linear from apex to base
    pub fn half_width_at(&self, y: f32) -> f32 {
        let height = self.rect.height();
        if height <= 0.0 {
            return 0.0;
        }
        let t = ((y - self.rect.min.y) / height).clamp(0.0, 1.0);
        t * self.rect.width() * 0.5
    }
}

/// Size of the visible world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(Vec2::ZERO, Vec2::new(self.width, self.height))
    }
}

/// Pinned initial state for a spawn (otherwise drawn from the RNG)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub center: Vec2,
    pub velocity: Vec2,
    #[serde(default)]
    pub size: Option<Vec2>,
    #[serde(default)]
    pub max_fall_speed: Option<f32>,
}

/// Request to drop a new sprite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    pub source_id: String,
    pub sprite_ref: String,
    #[serde(default)]
    pub is_avatar_style: bool,
    #[serde(default)]
    pub placement: Option<Placement>,
}

impl SpawnRequest {
    pub fn new(source_id: impl Into<String>, sprite_ref: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            sprite_ref: sprite_ref.into(),
            is_avatar_style: false,
            placement: None,
        }
    }

    pub fn avatar_style(mut self) -> Self {
        self.is_avatar_style = true;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }
}

/// External input, applied at the start of the next frame
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Spawn(SpawnRequest),
    /// Sprite measured by the renderer
    Measure { id: EntityId, size: Vec2 },
    /// Evict every ornament and wipe stored ones
    Clear,
    /// Window resized; obstacle is the tree's new enclosing rectangle
    Resize {
        width: f32,
        height: f32,
        obstacle: Option<Rect>,
    },
}

/// Deferred world change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduledAction {
    /// Let a source spawn again
    ReleaseSource(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduled {
    pub fire_at_ms: f64,
    pub action: ScheduledAction,
}

/// Per-entity change sent to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderNotification {
    pub id: EntityId,
    pub center: Vec2,
    pub size: Vec2,
    pub state: EntityState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<RemovalCause>,
}

impl RenderNotification {
    fn of(entity: &Entity, cause: Option<RemovalCause>) -> Self {
        Self {
            id: entity.id,
            center: entity.center,
            size: entity.size,
            state: entity.state,
            cause,
        }
    }
}

/// Result of one frame step
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameReport {
    /// Changed entities, ordered by id
    pub renders: Vec<RenderNotification>,
    /// Colliding pairs resolved this frame, ornament contacts included
    pub collisions: usize,
    /// New ornament snapshot when the set changed this frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ornaments: Option<Vec<OrnamentRecord>>,
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct World {
    pub settings: Settings,
    pub bounds: WorldBounds,
    pub obstacle: Option<Obstacle>,
    pub(crate) store: EntityStore,
    /// Settled entity ids
    pub(crate) ornaments: BTreeSet<EntityId>,
    /// Sources currently holding a spawn slot
    pub(crate) active_sources: BTreeSet<String>,
    pub(crate) commands: VecDeque<Command>,
    pub(crate) scheduled: Vec<Scheduled>,
    /// Ordered id pair -> time until which only out-thrust applies
    pub(crate) pair_cooldowns: HashMap<(EntityId, EntityId), f64>,
    pub(crate) next_prune_ms: f64,
    pub(crate) now_ms: f64,
    pub(crate) rng: Pcg32,
    next_id: EntityId,
    // Per-frame bookkeeping
    pub(crate) changed: BTreeSet<EntityId>,
    pub(crate) removed: Vec<RenderNotification>,
    pub(crate) ornaments_dirty: bool,
}

impl World {
    pub fn new(settings: Settings, width: f32, height: f32, obstacle: Option<Rect>) -> Self {
        let settings = settings.sanitized();
        let bounds = WorldBounds::new(width, height);
        let store = EntityStore::new(
            bounds.rect().inflate(settings.safety_margin),
            settings.quadtree_split_threshold,
            settings.quadtree_max_depth,
        );
        let rng = Pcg32::seed_from_u64(settings.seed);
        let next_prune_ms = settings.cooldown_prune_interval_ms;

        Self {
            settings,
            bounds,
            obstacle: obstacle.map(Obstacle::new),
            store,
            ornaments: BTreeSet::new(),
            active_sources: BTreeSet::new(),
            commands: VecDeque::new(),
            scheduled: Vec::new(),
            pair_cooldowns: HashMap::new(),
            next_prune_ms,
            now_ms: 0.0,
            rng,
            next_id: 1,
            changed: BTreeSet::new(),
            removed: Vec::new(),
            ornaments_dirty: false,
        }
    }

    // === Inputs ===

    /// Queue a command for the next frame
    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    pub fn spawn(&mut self, request: SpawnRequest) {
        self.push(Command::Spawn(request));
    }

    pub fn measure(&mut self, id: EntityId, size: Vec2) {
        self.push(Command::Measure { id, size });
    }

    pub fn clear_ornaments(&mut self) {
        self.push(Command::Clear);
    }

    pub fn resize(&mut self, width: f32, height: f32, obstacle: Option<Rect>) {
        self.push(Command::Resize {
            width,
            height,
            obstacle,
        });
    }

    /// Rebuild persisted ornaments. Meant for startup, before the first frame.
    pub fn restore_ornaments(&mut self, records: &[OrnamentRecord]) -> Vec<EntityId> {
        let ids: Vec<EntityId> = records
            .iter()
            .map(|record| {
                let id = self.next_entity_id();
                let entity = Entity {
                    state: EntityState::Settled,
                    sprite_ref: record.sprite_ref.clone(),
                    is_avatar_style: record.is_avatar_style,
                    ..Entity::falling(id, record.position.into(), Vec2::ZERO, 0.0)
                };
                self.store.insert(entity);
                self.ornaments.insert(id);
                self.changed.insert(id);
                id
            })
            .collect();
        log::info!("Restored {} ornaments", ids.len());
        ids
    }

    // === Queries ===

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    /// Live entities in id order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.store.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.store.len()
    }

    pub fn ornament_count(&self) -> usize {
        self.ornaments.len()
    }

    pub fn ornament_ids(&self) -> Vec<EntityId> {
        self.ornaments.iter().copied().collect()
    }

    /// Whether `source` currently holds a spawn slot
    pub fn is_source_active(&self, source: &str) -> bool {
        self.active_sources.contains(source)
    }

    /// Simulation clock in milliseconds
    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    /// Ids intersecting `area` (broad phase)
    pub fn query(&self, area: &Rect) -> Vec<EntityId> {
        self.store.query(area)
    }

    pub fn indexed_count(&self) -> usize {
        self.store.index().count()
    }

    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn pair_cooldown_count(&self) -> usize {
        self.pair_cooldowns.len()
    }

    /// Current ornament set as storable records, in id order
    pub fn ornament_records(&self) -> Vec<OrnamentRecord> {
        self.ornaments
            .iter()
            .filter_map(|id| self.store.get(*id))
            .map(Entity::to_record)
            .collect()
    }

    // === Frame internals ===

    pub(crate) fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Resync the index and flag for a render notification
    pub(crate) fn touch(&mut self, id: EntityId) {
        self.store.sync(id);
        self.changed.insert(id);
    }

    /// Evict an entity from store and index, recording the removal
    pub(crate) fn remove_entity(&mut self, id: EntityId, cause: RemovalCause) {
        let Some(mut entity) = self.store.remove(id) else {
            return;
        };
        let was_settled = entity.state == EntityState::Settled;
        entity.state = EntityState::Removed;
        entity.velocity = Vec2::ZERO;
        entity.on_slope = false;

        self.changed.remove(&id);
        self.removed.push(RenderNotification::of(&entity, Some(cause)));

        if was_settled {
            self.ornaments.remove(&id);
            self.ornaments_dirty = true;
        }

        if let Some(source) = entity.spawned_by {
            match cause {
                RemovalCause::Cleared => {
                    self.active_sources.remove(&source);
                }
                RemovalCause::Floor | RemovalCause::KnockedOff => {
                    self.scheduled.push(Scheduled {
                        fire_at_ms: self.now_ms + self.settings.source_release_delay_ms,
                        action: ScheduledAction::ReleaseSource(source),
                    });
                }
            }
        }
        log::debug!("Entity {} removed ({:?})", id, cause);
    }

    /// Create a drop for a spawn request unless its source is already active
    pub(crate) fn apply_spawn(&mut self, request: SpawnRequest) -> Option<EntityId> {
        if self.active_sources.contains(&request.source_id) {
            log::debug!("Spawn from '{}' ignored: already active", request.source_id);
            return None;
        }

        let (center, velocity, size, max_fall_speed) = match request.placement {
            Some(p) => (
                p.center,
                p.velocity,
                p.size.unwrap_or(Vec2::ZERO).max(Vec2::ZERO),
                p.max_fall_speed.unwrap_or_else(|| self.random_fall_speed()),
            ),
            None => {
                let (center, velocity) = self.random_launch();
                (center, velocity, Vec2::ZERO, self.random_fall_speed())
            }
        };

        let id = self.next_entity_id();
        let entity = Entity {
            size,
            spawned_by: Some(request.source_id.clone()),
            sprite_ref: request.sprite_ref,
            is_avatar_style: request.is_avatar_style,
            ..Entity::falling(id, center, velocity, max_fall_speed)
        };
        self.store.insert(entity);
        self.active_sources.insert(request.source_id);
        self.changed.insert(id);
        log::debug!("Spawned entity {} at ({:.1}, {:.1})", id, center.x, center.y);
        Some(id)
    }

    pub(crate) fn apply_measure(&mut self, id: EntityId, size: Vec2) {
        let shrink = self.settings.ornament_shrink;
        let Some(entity) = self.store.get_mut(id) else {
            log::warn!("Measure for unknown entity {}", id);
            return;
        };
        let mut size = size.max(Vec2::ZERO);
        // Restored ornaments arrive unmeasured and unstyled
        if entity.state == EntityState::Settled && !entity.is_measured() {
            size *= shrink;
        }
        if entity.size != size {
            entity.size = size;
            self.touch(id);
        }
    }

    pub(crate) fn apply_clear(&mut self) {
        let ids = self.ornament_ids();
        for id in &ids {
            self.remove_entity(*id, RemovalCause::Cleared);
        }
        self.ornaments_dirty = true;
        log::info!("Cleared {} ornaments", ids.len());
    }

    pub(crate) fn apply_resize(&mut self, width: f32, height: f32, obstacle: Option<Rect>) {
        self.bounds = WorldBounds::new(width, height);
        self.obstacle = obstacle.map(Obstacle::new);
        self.store
            .rebuild_index(self.bounds.rect().inflate(self.settings.safety_margin));
        log::info!(
            "World resized to {}x{} (tree centerline {:?})",
            self.bounds.width,
            self.bounds.height,
            self.obstacle.map(|o| o.centerline())
        );
    }

    fn random_fall_speed(&mut self) -> f32 {
        let (lo, hi) = (self.settings.min_fall_speed, self.settings.max_fall_speed);
        random_between(&mut self.rng, lo, hi)
    }

    fn random_launch(&mut self) -> (Vec2, Vec2) {
        let x = random_between(&mut self.rng, 0.0, self.bounds.width);
        let center = Vec2::new(x, self.settings.spawn_y);

        let vx = random_between(&mut self.rng, 0.0, self.settings.spawn_max_vx);
        let vx = if self.rng.random_bool(0.5) { -vx } else { vx };
        let vy = random_between(
            &mut self.rng,
            self.settings.spawn_min_vy,
            self.settings.spawn_max_vy,
        );
        (center, Vec2::new(vx, vy))
    }
}

/// Uniform in `[lo, hi)`, or `lo` when the range is empty
fn random_between(rng: &mut Pcg32, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}
