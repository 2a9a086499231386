//! Deterministic simulation module
//!
//! All physics lives here. This module must stay pure and deterministic:
//! - Time only enters through `tick`'s elapsed argument
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, storage or platform dependencies

pub mod boundary;
pub mod collision;
pub mod integrate;
pub mod quadtree;
pub mod rect;
pub mod state;
pub mod store;
pub mod tick;
pub mod tree;

pub use boundary::{GuardBands, resolve_boundaries};
pub use collision::{
    Body, CollisionParams, collide, collide_with_fixed, pair_key, resolve_drop_collisions,
};
pub use integrate::{advance, apply_air_resistance};
pub use quadtree::QuadTree;
pub use rect::Rect;
pub use state::{
    Command, Entity, EntityId, EntityState, FrameReport, Obstacle, Placement, RemovalCause,
    RenderNotification, Scheduled, ScheduledAction, SpawnRequest, World, WorldBounds,
};
pub use store::EntityStore;
pub use tick::tick;
pub use tree::{SlopeContact, resolve_tree_contacts, settle, slope_contact};
