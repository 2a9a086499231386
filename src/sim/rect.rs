//! Axis-aligned rectangle geometry
//!
//! Screen space: x grows to the right, y grows downward. A rectangle is
//! stored as its min (top-left) and max (bottom-right) corners.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Build from a top-left corner and a size
    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self {
            min: origin,
            max: origin + size.max(Vec2::ZERO),
        }
    }

    /// Build from a center point and a full size
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size.max(Vec2::ZERO) * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// True when the rectangle encloses no area
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Strict overlap test: shared edges do not count
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// True when `other` lies entirely inside this rectangle
    #[inline]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min.x >= self.min.x
            && other.max.x <= self.max.x
            && other.min.y >= self.min.y
            && other.max.y <= self.max.y
    }

    /// Grow by `margin` on every side
    pub fn inflate(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// The four quadrants in NW, NE, SW, SE order
    pub fn quadrants(&self) -> [Rect; 4] {
        let c = self.center();
        [
            Rect::new(self.min, c),
            Rect::new(Vec2::new(c.x, self.min.y), Vec2::new(self.max.x, c.y)),
            Rect::new(Vec2::new(self.min.x, c.y), Vec2::new(c.x, self.max.y)),
            Rect::new(c, self.max),
        ]
    }
}
