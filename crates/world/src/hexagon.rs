//! A single occupied hex cell.

use glam::DVec2;
use tesselbox_core::{BlockId, Catalog};

use crate::hex::{self, chunk_pos_of, ChunkPos, HEX_RADIUS};

/// Terrain cell. Material flags are cached from the catalog at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Hexagon {
    center: DVec2,
    block: BlockId,
    health: f64,
    max_health: f64,
    hardness: f64,
    transparent: bool,
    solid: bool,
    corners: [DVec2; 6],
    chunk: ChunkPos,
}

impl Hexagon {
    /// Health of a freshly created cell.
    pub const MAX_HEALTH: f64 = 100.0;

    /// Create a full-health cell of `block` centered at `center`.
    pub fn new(center: DVec2, block: BlockId, catalog: &Catalog) -> Self {
        let def = catalog.block(block);
        Self {
            center,
            block,
            health: Self::MAX_HEALTH,
            max_health: Self::MAX_HEALTH,
            hardness: def.hardness,
            transparent: def.transparent,
            solid: def.solid,
            corners: hex::corners(center, HEX_RADIUS),
            chunk: chunk_pos_of(center),
        }
    }

    /// Same as [`Hexagon::new`] with a restored health value.
    pub fn with_health(center: DVec2, block: BlockId, health: f64, catalog: &Catalog) -> Self {
        let mut hexagon = Self::new(center, block, catalog);
        hexagon.health = health.clamp(0.0, hexagon.max_health);
        hexagon
    }

    /// Apply mining damage. Returns `true` when the cell is destroyed.
    ///
    /// Effective damage is `amount / hardness`; cells with hardness `<= 0`
    /// ignore damage entirely.
    pub fn apply_damage(&mut self, amount: f64) -> bool {
        if self.hardness <= 0.0 {
            return false;
        }
        self.health = (self.health - amount / self.hardness).clamp(0.0, self.max_health);
        self.health <= 0.0
    }

    /// Whether damage can ever destroy this cell.
    pub fn is_immune(&self) -> bool {
        self.hardness <= 0.0
    }

    /// Height of the top edge at `x`, if `x` lies within the cell.
    pub fn top_surface_y(&self, x: f64) -> Option<f64> {
        hex::top_surface_y(&self.corners, x)
    }

    /// Center of the cell.
    pub fn center(&self) -> DVec2 {
        self.center
    }

    /// Block type.
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Remaining health.
    pub fn health(&self) -> f64 {
        self.health
    }

    /// Health at creation.
    pub fn max_health(&self) -> f64 {
        self.max_health
    }

    /// Damage divisor.
    pub fn hardness(&self) -> f64 {
        self.hardness
    }

    /// Whether rays and movement pass through.
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Whether the cell is walkable ground.
    pub fn is_solid(&self) -> bool {
        self.solid
    }

    /// Cached corner polygon.
    pub fn corners(&self) -> &[DVec2; 6] {
        &self.corners
    }

    /// Chunk this cell is stored in.
    pub fn chunk(&self) -> ChunkPos {
        self.chunk
    }

    pub(crate) fn set_chunk(&mut self, chunk: ChunkPos) {
        self.chunk = chunk;
    }
}
