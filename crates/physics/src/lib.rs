#![warn(missing_docs)]
//! Player physics (AABB overlap, gravity, hex collision) and inventory.

mod player;

use glam::DVec2;

pub use player::*;

/// Axis-aligned bounding box used for collisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner (x, y).
    pub min: DVec2,
    /// Maximum corner (x, y).
    pub max: DVec2,
}

impl Aabb {
    /// Create a new AABB ensuring min <= max per axis.
    pub fn new(min: DVec2, max: DVec2) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y);
        Self { min, max }
    }

    /// Box of `half_extents` around `center`.
    pub fn around(center: DVec2, half_extents: DVec2) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    /// Open-interval overlap on the x axis; touching edges do not count.
    pub fn overlaps_x(&self, other: &Self) -> bool {
        self.max.x > other.min.x && self.min.x < other.max.x
    }

    /// Open-interval overlap on the y axis; touching edges do not count.
    pub fn overlaps_y(&self, other: &Self) -> bool {
        self.max.y > other.min.y && self.min.y < other.max.y
    }

    /// Tests intersection with another AABB.
    pub fn intersects(&self, other: &Self) -> bool {
        self.overlaps_x(other) && self.overlaps_y(other)
    }
}
