//! Entity store
//!
//! Owns every live entity together with the spatial index over them. All
//! insertions, removals and position syncs go through here so the map and
//! the quadtree never disagree.

use std::collections::BTreeMap;

use super::quadtree::QuadTree;
use super::rect::Rect;
use super::state::{Entity, EntityId, EntityState};

#[derive(Debug, Clone)]
pub struct EntityStore {
    /// Live entities keyed by id (stable iteration order)
    entities: BTreeMap<EntityId, Entity>,
    index: QuadTree,
}

impl EntityStore {
    pub fn new(bounds: Rect, split_threshold: usize, max_depth: u32) -> Self {
        Self {
            entities: BTreeMap::new(),
            index: QuadTree::new(bounds, split_threshold, max_depth),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable access. Callers that move or resize the entity must `sync` it.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Ids of entities in the given state, ascending
    pub fn ids_in_state(&self, state: EntityState) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.state == state)
            .map(|e| e.id)
            .collect()
    }

    pub fn insert(&mut self, entity: Entity) {
        self.index.insert(entity.id, entity.bounds());
        self.entities.insert(entity.id, entity);
    }

    /// Evict from both the map and the index
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.index.remove(id);
        self.entities.remove(&id)
    }

    /// Push an entity's current bounds into the index
    pub fn sync(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get(&id) {
            self.index.update(id, entity.bounds());
        }
    }

    /// Broad-phase query: ids whose bounds intersect `area`
    pub fn query(&self, area: &Rect) -> Vec<EntityId> {
        self.index.query(area)
    }

    /// Rebuild the index over new bounds
    pub fn rebuild_index(&mut self, bounds: Rect) {
        self.index.rebuild(bounds);
    }

    pub fn index(&self) -> &QuadTree {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn world() -> Rect {
        Rect::new(Vec2::ZERO, Vec2::new(1000.0, 800.0))
    }

    #[test]
    fn test_store_and_index_stay_in_step() {
        let mut store = EntityStore::new(world(), 4, 8);
        let mut entity = Entity::falling(1, Vec2::new(100.0, 100.0), Vec2::ZERO, 5.0);
        entity.size = Vec2::splat(20.0);
        store.insert(entity);
        assert_eq!(store.index().count(), 1);

        if let Some(e) = store.get_mut(1) {
            e.center = Vec2::new(600.0, 500.0);
        }
        store.sync(1);
        let hits = store.query(&Rect::from_center_size(Vec2::new(600.0, 500.0), Vec2::splat(4.0)));
        assert_eq!(hits, vec![1]);

        assert!(store.remove(1).is_some());
        assert_eq!(store.index().count(), 0);
        assert!(store.is_empty());
    }
}
