//! Quadtree spatial index for broad-phase queries
//!
//! Nodes live in a flat arena. A node splits once it holds more than the
//! split threshold; items that fit entirely inside one quadrant move down,
//! items straddling a split line stay at the node that owns them. Anything
//! outside the root bounds (drops above the screen, guard bands) is kept at
//! the root, which is always scanned.

use std::collections::HashMap;

use super::rect::Rect;
use super::state::EntityId;

const NO_NODE: usize = usize::MAX;

#[derive(Debug, Clone)]
struct Node {
    bounds: Rect,
    depth: u32,
    parent: usize,
    /// Child node indices (NW, NE, SW, SE); `None` for leaves
    children: Option<[usize; 4]>,
    items: Vec<(EntityId, Rect)>,
}

impl Node {
    fn new(bounds: Rect, depth: u32, parent: usize) -> Self {
        Self {
            bounds,
            depth,
            parent,
            children: None,
            items: Vec::new(),
        }
    }
}

/// Region quadtree over entity bounding boxes
#[derive(Debug, Clone)]
pub struct QuadTree {
    nodes: Vec<Node>,
    free_nodes: Vec<usize>,
    /// Owning node and stored bounds per entity
    locations: HashMap<EntityId, (usize, Rect)>,
    split_threshold: usize,
    max_depth: u32,
}

impl QuadTree {
    pub fn new(bounds: Rect, split_threshold: usize, max_depth: u32) -> Self {
        Self {
            nodes: vec![Node::new(bounds, 0, NO_NODE)],
            free_nodes: Vec::new(),
            locations: HashMap::new(),
            split_threshold: split_threshold.max(1),
            max_depth,
        }
    }

    /// Bounds of the root node
    pub fn bounds(&self) -> Rect {
        self.nodes[0].bounds
    }

    /// Number of indexed entities
    pub fn count(&self) -> usize {
        self.locations.len()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.locations.contains_key(&id)
    }

    /// Stored bounds for an entity
    pub fn bounds_of(&self, id: EntityId) -> Option<Rect> {
        self.locations.get(&id).map(|&(_, rect)| rect)
    }

    /// Insert an entity; an existing entry with the same id is replaced
    pub fn insert(&mut self, id: EntityId, rect: Rect) {
        if self.locations.contains_key(&id) {
            self.remove(id);
        }
        self.insert_at(0, id, rect);
    }

    /// Remove an entity. Unknown ids are ignored.
    pub fn remove(&mut self, id: EntityId) {
        let Some((node, _)) = self.locations.remove(&id) else {
            return;
        };
        let items = &mut self.nodes[node].items;
        if let Some(pos) = items.iter().position(|(item, _)| *item == id) {
            items.swap_remove(pos);
        }
        self.try_merge(node);
    }

    /// Reinsert an entity after its bounds changed
    ///
    /// Calling this with the bounds already stored is a no-op.
    pub fn update(&mut self, id: EntityId, rect: Rect) {
        match self.locations.get(&id) {
            Some(&(_, stored)) if stored == rect => {}
            _ => self.insert(id, rect),
        }
    }

    /// Ids of every entity whose bounds intersect `area`, sorted by id
    ///
    /// A zero-area query matches nothing.
    pub fn query(&self, area: &Rect) -> Vec<EntityId> {
        let mut out = Vec::new();
        if area.is_empty() {
            return out;
        }

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            out.extend(
                node.items
                    .iter()
                    .filter(|(_, rect)| rect.intersects(area))
                    .map(|(id, _)| *id),
            );
            if let Some(children) = node.children {
                stack.extend(
                    children
                        .iter()
                        .copied()
                        .filter(|&child| self.nodes[child].bounds.intersects(area)),
                );
            }
        }

        out.sort_unstable();
        out
    }

    /// Drop every entry and reset to new root bounds
    pub fn clear(&mut self, bounds: Rect) {
        self.nodes.clear();
        self.nodes.push(Node::new(bounds, 0, NO_NODE));
        self.free_nodes.clear();
        self.locations.clear();
    }

    /// Rebuild over new bounds, reinserting every current entry
    pub fn rebuild(&mut self, bounds: Rect) {
        let mut entries: Vec<(EntityId, Rect)> = self
            .locations
            .iter()
            .map(|(&id, &(_, rect))| (id, rect))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);

        self.clear(bounds);
        for (id, rect) in entries {
            self.insert_at(0, id, rect);
        }
        log::debug!("Quadtree rebuilt with {} entries", self.count());
    }

    /// Number of live nodes (for diagnostics)
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    fn insert_at(&mut self, start: usize, id: EntityId, rect: Rect) {
        let mut index = start;

        // Descend while a child fully contains the rect
        loop {
            match self.child_containing(index, &rect) {
                Some(child) => index = child,
                None => break,
            }
        }

        self.nodes[index].items.push((id, rect));
        self.locations.insert(id, (index, rect));

        let node = &self.nodes[index];
        if node.children.is_none()
            && node.items.len() > self.split_threshold
            && node.depth < self.max_depth
        {
            self.split(index);
        }
    }

    fn child_containing(&self, index: usize, rect: &Rect) -> Option<usize> {
        let children = self.nodes[index].children?;
        children
            .into_iter()
            .find(|&child| self.nodes[child].bounds.contains_rect(rect))
    }

    fn alloc_node(&mut self, node: Node) -> usize {
        match self.free_nodes.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn split(&mut self, index: usize) {
        let bounds = self.nodes[index].bounds;
        let depth = self.nodes[index].depth + 1;
        let quads = bounds.quadrants();
        let children = quads.map(|q| self.alloc_node(Node::new(q, depth, index)));
        self.nodes[index].children = Some(children);

        // Push down whatever now fits in a single quadrant
        let items = std::mem::take(&mut self.nodes[index].items);
        for (id, rect) in items {
            match self.child_containing(index, &rect) {
                Some(child) => self.insert_at(child, id, rect),
                None => {
                    self.nodes[index].items.push((id, rect));
                    self.locations.insert(id, (index, rect));
                }
            }
        }
    }

    /// Collapse empty leaf children back into their parent, walking upward
    fn try_merge(&mut self, mut index: usize) {
        loop {
            if self.nodes[index].children.is_none() {
                index = match self.nodes[index].parent {
                    NO_NODE => return,
                    parent => parent,
                };
                continue;
            }

            let Some(children) = self.nodes[index].children else {
                return;
            };
            let collapsible = children.iter().all(|&c| {
                let child = &self.nodes[c];
                child.children.is_none() && child.items.is_empty()
            });
            if !collapsible {
                return;
            }

            self.nodes[index].children = None;
            for child in children {
                self.nodes[child].parent = NO_NODE;
                self.free_nodes.push(child);
            }

            index = match self.nodes[index].parent {
                NO_NODE => return,
                parent => parent,
            };
        }
    }
}
