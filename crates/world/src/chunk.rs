//! Fixed-size grid of hex cells.

use std::collections::BTreeMap;

use glam::DVec2;
use tesselbox_core::Catalog;

use crate::hex::{ChunkPos, LocalCoord};
use crate::hexagon::Hexagon;
use crate::persist::{ChunkRecord, HexRecord};

/// A `CHUNK_SIZE x CHUNK_SIZE` region of hexes. The map is sparse: slots
/// above the surface are never materialized.
#[derive(Debug, Clone)]
pub struct Chunk {
    position: ChunkPos,
    hexagons: BTreeMap<LocalCoord, Hexagon>,
    modified: bool,
    last_accessed: u64,
}

impl Chunk {
    /// Create an empty chunk.
    pub fn new(position: ChunkPos) -> Self {
        Self {
            position,
            hexagons: BTreeMap::new(),
            modified: false,
            last_accessed: 0,
        }
    }

    /// Chunk coordinate.
    pub fn position(&self) -> ChunkPos {
        self.position
    }

    /// Slot addressed by a world position inside this chunk.
    pub fn slot(&self, pos: DVec2) -> LocalCoord {
        LocalCoord::from_world(self.position, pos)
    }

    /// Store `hexagon` at the slot of `pos`, replacing any occupant.
    ///
    /// Marks the chunk modified and returns the replaced cell.
    pub fn add(&mut self, pos: DVec2, hexagon: Hexagon) -> Option<Hexagon> {
        self.modified = true;
        self.fill(pos, hexagon)
    }

    /// Generation insert: like [`Chunk::add`] without touching the
    /// modified flag.
    pub fn fill(&mut self, pos: DVec2, mut hexagon: Hexagon) -> Option<Hexagon> {
        let slot = self.slot(pos);
        debug_assert!(slot.in_bounds(), "{slot:?} outside chunk {:?}", self.position);
        hexagon.set_chunk(self.position);
        self.hexagons.insert(slot, hexagon)
    }

    /// Occupant of the slot of `pos`.
    pub fn get(&self, pos: DVec2) -> Option<&Hexagon> {
        self.hexagons.get(&self.slot(pos))
    }

    /// Mutable occupant of the slot of `pos`.
    pub fn get_mut(&mut self, pos: DVec2) -> Option<&mut Hexagon> {
        let slot = self.slot(pos);
        self.hexagons.get_mut(&slot)
    }

    /// Remove the occupant of the slot of `pos`, marking the chunk
    /// modified when something was removed.
    pub fn remove(&mut self, pos: DVec2) -> Option<Hexagon> {
        let slot = self.slot(pos);
        let removed = self.hexagons.remove(&slot);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Cells with their slots in row-major order.
    pub fn slots(&self) -> impl Iterator<Item = (LocalCoord, &Hexagon)> {
        self.hexagons.iter().map(|(slot, hex)| (*slot, hex))
    }

    /// Cells in row-major order.
    pub fn hexagons(&self) -> impl Iterator<Item = &Hexagon> {
        self.hexagons.values()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.hexagons.len()
    }

    /// True when no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.hexagons.is_empty()
    }

    /// Whether the chunk was edited after generation.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Flag the chunk as edited (e.g. an organism was removed).
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Logical access stamp.
    pub fn last_accessed(&self) -> u64 {
        self.last_accessed
    }

    /// Record an access.
    pub fn touch(&mut self, stamp: u64) {
        self.last_accessed = stamp;
    }

    /// Persisted form of the cells (organisms are attached by the world).
    pub fn record(&self, catalog: &Catalog) -> ChunkRecord {
        ChunkRecord {
            position: self.position,
            hexagons: self
                .hexagons
                .values()
                .map(|hex| HexRecord {
                    x: hex.center().x,
                    y: hex.center().y,
                    block: catalog.block(hex.block()).key.clone(),
                    health: hex.health(),
                })
                .collect(),
            organisms: Vec::new(),
        }
    }

    /// Rebuild a chunk from its persisted form. Restored chunks are always
    /// modified, since only edited chunks are ever persisted.
    pub fn from_record(record: &ChunkRecord, catalog: &Catalog) -> Self {
        let mut chunk = Self::new(record.position);
        for hex in &record.hexagons {
            let center = DVec2::new(hex.x, hex.y);
            let block = catalog.block_id(&hex.block);
            chunk.fill(center, Hexagon::with_health(center, block, hex.health, catalog));
        }
        chunk.modified = true;
        chunk
    }
}
