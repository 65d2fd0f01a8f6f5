//! The world: resident chunks, organisms and every query over them.
//!
//! Lookups that land in a chunk which is not resident create it, either by
//! restoring retained edits or by generating it from the seed. A read can
//! therefore add world content; callers rely on this to prefetch the area
//! around the player.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use glam::DVec2;
use rand::Rng;
use tesselbox_core::{BlockId, Catalog, OrganismKind, ToolType};
use tracing::{debug, info};

use crate::chunk::Chunk;
use crate::hex::{chunk_pos_of, world_to_hex_center, ChunkPos, HEX_RADIUS};
use crate::hexagon::Hexagon;
use crate::organism::{Organism, OrganismHit, OrganismKey};
use crate::persist::{ChunkRecord, OrganismRecord, PersistError, WorldSnapshot};
use crate::settings::WorldSettings;
use crate::storage::ChunkStorage;
use crate::terrain::TerrainGenerator;

/// Distance between raycast samples in pixels.
pub const RAY_STEP: f64 = 5.0;

/// Result of [`World::damage_hexagon_at`].
#[derive(Debug, Clone, PartialEq)]
pub enum DamageOutcome {
    /// No cell at that position.
    Missing,
    /// The cell ignores damage.
    Immune,
    /// The cell survived with this much health.
    Damaged {
        /// Health after the hit.
        health: f64,
    },
    /// The cell was destroyed and removed from its chunk.
    Destroyed(Hexagon),
}

/// First opaque cell along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Center of the hit cell.
    pub center: DVec2,
    /// Its block.
    pub block: BlockId,
    /// Sample one step before the hit, used to place against the cell.
    pub place_anchor: DVec2,
}

/// Summary of an [`World::unload_distant_chunks`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Chunks dropped from residency.
    pub evicted: usize,
    /// Of those, modified chunks captured into the retained buffer.
    pub retained: usize,
    /// Organisms dropped with their chunks.
    pub organisms: usize,
    /// Chunks still resident.
    pub resident: usize,
}

/// Chunked hex world.
pub struct World {
    seed: u64,
    catalog: Arc<Catalog>,
    settings: WorldSettings,
    generator: TerrainGenerator,
    storage: ChunkStorage,
    organisms: BTreeMap<OrganismKey, Organism>,
    /// Edited chunks that are not resident, restored on next access.
    retained: BTreeMap<ChunkPos, ChunkRecord>,
}

impl World {
    /// Create an empty world. Chunks are generated on demand.
    pub fn new(seed: u64, catalog: Arc<Catalog>, settings: WorldSettings) -> Self {
        Self {
            seed,
            generator: TerrainGenerator::new(seed, Arc::clone(&catalog), settings.clone()),
            catalog,
            settings,
            storage: ChunkStorage::new(),
            organisms: BTreeMap::new(),
            retained: BTreeMap::new(),
        }
    }

    /// Rebuild a world from a decoded snapshot. Saved chunks are held back
    /// and restored the first time they are accessed.
    ///
    /// The whole snapshot is validated first; an invalid one builds nothing.
    pub fn from_snapshot(
        snapshot: WorldSnapshot,
        catalog: Arc<Catalog>,
        settings: WorldSettings,
    ) -> Result<Self, PersistError> {
        snapshot.validate()?;
        let mut world = Self::new(snapshot.seed, catalog, settings);
        for record in snapshot.chunks {
            world.retained.insert(record.position, record);
        }
        info!(
            seed = world.seed,
            chunks = world.retained.len(),
            "World restored from snapshot"
        );
        Ok(world)
    }

    /// Generation seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Shared catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Settings the world was created with.
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Resident chunk at `pos`, or the chunk restored or generated for it.
    ///
    /// Requesting a resident chunk never regenerates it.
    pub fn get_or_create_chunk(&mut self, pos: ChunkPos) -> &mut Chunk {
        let Self {
            catalog,
            generator,
            storage,
            organisms,
            retained,
            ..
        } = self;
        let catalog: &Catalog = catalog;
        storage.get_or_insert_with(pos, || {
            if let Some(record) = retained.remove(&pos) {
                for organism in &record.organisms {
                    let organism = Organism::from_record(organism, catalog);
                    organisms.insert(OrganismKey::of(organism.position()), organism);
                }
                debug!(chunk = ?pos, hexagons = record.hexagons.len(), "Restored edited chunk");
                return Chunk::from_record(&record, catalog);
            }

            let generated = generator.generate(pos);
            for organism in generated.organisms {
                organisms
                    .entry(OrganismKey::of(organism.position()))
                    .or_insert(organism);
            }
            generated.chunk
        })
    }

    /// Resident chunk at `pos` without creating it or recording an access.
    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.storage.get(pos)
    }

    /// Whether `pos` is resident.
    pub fn is_resident(&self, pos: ChunkPos) -> bool {
        self.storage.contains(pos)
    }

    /// Number of resident chunks.
    pub fn resident_chunk_count(&self) -> usize {
        self.storage.len()
    }

    /// Number of edited chunks waiting in the retained buffer.
    pub fn retained_chunk_count(&self) -> usize {
        self.retained.len()
    }

    /// Cells whose center lies within `radius + HEX_RADIUS` of `center` on
    /// both axes.
    ///
    /// Every chunk overlapping the query box, plus a one-chunk margin, is
    /// created if needed and marked as accessed.
    pub fn nearby_hexagons(&mut self, center: DVec2, radius: f64) -> Vec<&Hexagon> {
        let min = chunk_pos_of(center - DVec2::splat(radius));
        let max = chunk_pos_of(center + DVec2::splat(radius));
        let positions: Vec<ChunkPos> = (min.x - 1..=max.x + 1)
            .flat_map(|cx| (min.y - 1..=max.y + 1).map(move |cy| ChunkPos::new(cx, cy)))
            .collect();
        for pos in &positions {
            self.get_or_create_chunk(*pos);
        }

        let reach = radius + HEX_RADIUS;
        positions
            .iter()
            .filter_map(|pos| self.storage.get(*pos))
            .flat_map(|chunk| chunk.hexagons())
            .filter(|hex| {
                let offset = (hex.center() - center).abs();
                offset.x <= reach && offset.y <= reach
            })
            .collect()
    }

    /// Cell containing `pos`.
    pub fn get_hexagon_at(&mut self, pos: DVec2) -> Option<&Hexagon> {
        let center = world_to_hex_center(pos).center;
        self.get_or_create_chunk(chunk_pos_of(center)).get(center)
    }

    /// Remove the cell containing `pos`.
    pub fn remove_hexagon_at(&mut self, pos: DVec2) -> Option<Hexagon> {
        let center = world_to_hex_center(pos).center;
        self.get_or_create_chunk(chunk_pos_of(center)).remove(center)
    }

    /// Place a fresh `block` cell in the hex containing `pos`.
    ///
    /// Returns `None` without changing anything when the slot is occupied.
    pub fn add_hexagon_at(&mut self, pos: DVec2, block: BlockId) -> Option<&Hexagon> {
        let center = world_to_hex_center(pos).center;
        let hexagon = Hexagon::new(center, block, &self.catalog);
        let chunk = self.get_or_create_chunk(chunk_pos_of(center));
        if chunk.get(center).is_some() {
            return None;
        }
        chunk.add(center, hexagon);
        chunk.get(center)
    }

    /// Mine the cell containing `pos`. Destroyed cells are removed in the
    /// same call.
    pub fn damage_hexagon_at(&mut self, pos: DVec2, amount: f64) -> DamageOutcome {
        let center = world_to_hex_center(pos).center;
        let chunk = self.get_or_create_chunk(chunk_pos_of(center));
        let Some(hexagon) = chunk.get_mut(center) else {
            return DamageOutcome::Missing;
        };
        if hexagon.is_immune() {
            return DamageOutcome::Immune;
        }
        let destroyed = hexagon.apply_damage(amount);
        let health = hexagon.health();
        if !destroyed {
            return DamageOutcome::Damaged { health };
        }
        match chunk.remove(center) {
            Some(hexagon) => DamageOutcome::Destroyed(hexagon),
            None => DamageOutcome::Missing,
        }
    }

    /// Walk from `origin` toward `target` in [`RAY_STEP`] increments and
    /// return the first opaque cell.
    ///
    /// Targets further than `max_range` (or exactly at `origin`) never hit.
    pub fn raycast_to_block(&mut self, origin: DVec2, target: DVec2, max_range: f64) -> Option<RayHit> {
        let distance = origin.distance(target);
        if !distance.is_finite() || distance == 0.0 || distance > max_range {
            return None;
        }
        let direction = (target - origin) / distance;

        let limit = distance.floor();
        let mut d = 0.0;
        while d < limit {
            let sample = origin + direction * d;
            let opaque = self
                .get_hexagon_at(sample)
                .filter(|hexagon| !hexagon.is_transparent())
                .map(|hexagon| (hexagon.center(), hexagon.block()));
            if let Some((center, block)) = opaque {
                return Some(RayHit {
                    center,
                    block,
                    place_anchor: origin + direction * (d - RAY_STEP),
                });
            }
            d += RAY_STEP;
        }
        None
    }

    /// Spawn an organism of `kind` at `pos`, replacing any organism keyed
    /// at the same position. The owning chunk becomes modified.
    pub fn add_organism(&mut self, pos: DVec2, kind: OrganismKind) -> &Organism {
        self.get_or_create_chunk(chunk_pos_of(pos)).mark_modified();
        let organism = Organism::new(pos, kind, &self.catalog);
        let key = OrganismKey::of(pos);
        self.organisms.insert(key, organism);
        &self.organisms[&key]
    }

    /// Organisms within Euclidean distance `radius` of `center`.
    pub fn get_nearby_organisms(&self, center: DVec2, radius: f64) -> Vec<&Organism> {
        self.organisms
            .values()
            .filter(|organism| organism.position().distance(center) <= radius)
            .collect()
    }

    /// Remove the organism keyed exactly at `pos`. The owning chunk becomes
    /// modified so the removal survives eviction.
    pub fn remove_organism(&mut self, pos: DVec2) -> Option<Organism> {
        let organism = self.organisms.remove(&OrganismKey::of(pos))?;
        if let Some(chunk) = self.storage.get_mut(chunk_pos_of(pos)) {
            chunk.mark_modified();
        }
        Some(organism)
    }

    /// Nearest organism within `tolerance` of `pos`.
    pub fn get_organism_at(&self, pos: DVec2, tolerance: f64) -> Option<&Organism> {
        self.organisms
            .values()
            .map(|organism| (organism.position().distance(pos), organism))
            .filter(|(distance, _)| *distance <= tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, organism)| organism)
    }

    /// Hit the nearest organism within `tolerance` of `pos`. A killing blow
    /// removes it and returns its loot.
    pub fn damage_organism_at<R: Rng>(
        &mut self,
        pos: DVec2,
        tolerance: f64,
        tool: ToolType,
        damage: f64,
        rng: &mut R,
    ) -> Option<OrganismHit> {
        let position = self.get_organism_at(pos, tolerance)?.position();
        let hit = {
            let organism = self.organisms.get_mut(&OrganismKey::of(position))?;
            let def = self.catalog.organism(organism.kind());
            let drops = organism.apply_damage(def, tool, damage, rng);
            OrganismHit {
                position,
                kind: organism.kind(),
                health: organism.health(),
                killed: !organism.is_alive(),
                drops,
            }
        };
        if hit.killed {
            self.remove_organism(position);
            debug!(x = position.x, y = position.y, drops = hit.drops.len(), "Organism killed");
        }
        Some(hit)
    }

    /// All organisms in position order.
    pub fn organisms(&self) -> impl Iterator<Item = &Organism> {
        self.organisms.values()
    }

    /// Evict least-recently-accessed chunks until at most `max_resident`
    /// remain.
    ///
    /// Modified chunks, with their organisms, move to the retained buffer
    /// and are restored on next access. Unmodified chunks and their
    /// organisms are dropped and regenerate identically. `anchor` is the
    /// position the caller keeps the world around and is only logged.
    pub fn unload_distant_chunks(&mut self, anchor: DVec2, max_resident: usize) -> EvictionReport {
        let evicted = self.storage.evict_to(max_resident);
        let mut report = EvictionReport {
            evicted: evicted.len(),
            resident: self.storage.len(),
            ..EvictionReport::default()
        };
        if evicted.is_empty() {
            return report;
        }

        let positions: BTreeSet<ChunkPos> = evicted.iter().map(Chunk::position).collect();
        let (dropped, kept): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut self.organisms)
            .into_iter()
            .partition(|(_, organism)| positions.contains(&chunk_pos_of(organism.position())));
        self.organisms = kept;
        report.organisms = dropped.len();

        let mut by_chunk = group_by_chunk(dropped.values(), &self.catalog);
        for chunk in evicted.into_iter().filter(Chunk::is_modified) {
            let mut record = chunk.record(&self.catalog);
            record.organisms = by_chunk.remove(&chunk.position()).unwrap_or_default();
            self.retained.insert(chunk.position(), record);
            report.retained += 1;
        }

        info!(
            anchor_x = anchor.x,
            anchor_y = anchor.y,
            evicted = report.evicted,
            retained = report.retained,
            resident = report.resident,
            "Unloaded distant chunks"
        );
        report
    }

    /// Every modified chunk, resident or retained, ordered by position.
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut chunks = self.retained.clone();
        let mut by_chunk = group_by_chunk(self.organisms.values(), &self.catalog);
        for chunk in self.storage.iter().filter(|chunk| chunk.is_modified()) {
            let mut record = chunk.record(&self.catalog);
            record.organisms = by_chunk.remove(&chunk.position()).unwrap_or_default();
            chunks.insert(chunk.position(), record);
        }
        WorldSnapshot {
            seed: self.seed,
            chunks: chunks.into_values().collect(),
        }
    }

    /// Top of the first opaque cell in column `x`, scanning from `from_y`
    /// down to `to_y`.
    pub fn find_surface(&mut self, x: f64, from_y: f64, to_y: f64, step: f64) -> Option<f64> {
        if step <= 0.0 {
            return None;
        }
        let mut y = from_y;
        while y < to_y {
            if let Some(hexagon) = self.get_hexagon_at(DVec2::new(x, y)) {
                if !hexagon.is_transparent() {
                    return Some(y);
                }
            }
            y += step;
        }
        None
    }
}

fn group_by_chunk<'a>(
    organisms: impl Iterator<Item = &'a Organism>,
    catalog: &Catalog,
) -> BTreeMap<ChunkPos, Vec<OrganismRecord>> {
    let mut grouped: BTreeMap<ChunkPos, Vec<OrganismRecord>> = BTreeMap::new();
    for organism in organisms {
        grouped
            .entry(chunk_pos_of(organism.position()))
            .or_default()
            .push(organism.record(catalog));
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex::{LocalCoord, HEX_V_SPACING};
    use rand::{rngs::StdRng, SeedableRng};

    fn world(seed: u64) -> World {
        World::new(seed, Arc::new(Catalog::builtin()), WorldSettings::default())
    }

    fn sky_point() -> DVec2 {
        LocalCoord::new(3, 3).center(ChunkPos::new(0, -2))
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut world = world(42);
        let pos = ChunkPos::new(0, 0);
        let center = world.get_or_create_chunk(pos).hexagons().next().map(Hexagon::center);
        let center = center.expect("chunk (0, 0) holds ground");
        world.remove_hexagon_at(center);
        world.get_or_create_chunk(pos);
        assert!(world.get_hexagon_at(center).is_none(), "resident chunk was regenerated");
    }

    #[test]
    fn lookups_create_chunks() {
        let mut world = world(1);
        assert_eq!(world.resident_chunk_count(), 0);
        world.get_hexagon_at(DVec2::new(800.0, 700.0));
        assert!(world.is_resident(ChunkPos::new(0, 0)));

        world.nearby_hexagons(DVec2::new(800.0, 700.0), 100.0);
        assert_eq!(world.resident_chunk_count(), 9);
    }

    #[test]
    fn nearby_hexagons_uses_axis_box() {
        let mut world = world(5);
        let center = DVec2::new(300.0, 520.0);
        let radius = 120.0;
        let found = world.nearby_hexagons(center, radius);
        assert!(!found.is_empty());
        for hex in &found {
            let offset = (hex.center() - center).abs();
            assert!(offset.x <= radius + HEX_RADIUS && offset.y <= radius + HEX_RADIUS);
        }
    }

    #[test]
    fn add_is_exclusive() {
        let mut world = world(9);
        let catalog = Arc::clone(world.catalog());
        let p = sky_point() + DVec2::new(3.0, -4.0);
        let glass = catalog.block_id("glass");

        let placed = world.add_hexagon_at(p, glass).map(Hexagon::center);
        assert_eq!(placed, Some(world_to_hex_center(p).center));
        assert!(world.add_hexagon_at(p, catalog.block_id("stone")).is_none());
        assert_eq!(world.get_hexagon_at(p).map(Hexagon::block), Some(glass));
        assert!(world.chunk(chunk_pos_of(p)).is_some_and(Chunk::is_modified));
    }

    #[test]
    fn damage_until_destroyed() {
        let mut world = world(9);
        let catalog = Arc::clone(world.catalog());
        let p = sky_point();
        world.add_hexagon_at(p, catalog.block_id("stone"));

        let mut outcomes = Vec::new();
        for _ in 0..5 {
            outcomes.push(world.damage_hexagon_at(p, 40.0));
        }
        assert!(outcomes[..4]
            .iter()
            .all(|o| matches!(o, DamageOutcome::Damaged { .. })));
        assert!(matches!(outcomes[4], DamageOutcome::Destroyed(_)));
        assert!(world.get_hexagon_at(p).is_none());
        assert_eq!(world.damage_hexagon_at(p, 40.0), DamageOutcome::Missing);
    }

    #[test]
    fn bedrock_is_immune() {
        let mut world = world(9);
        let catalog = Arc::clone(world.catalog());
        let p = sky_point();
        world.add_hexagon_at(p, catalog.block_id("bedrock"));
        assert_eq!(world.damage_hexagon_at(p, 1e6), DamageOutcome::Immune);
        assert!(world.get_hexagon_at(p).is_some());
    }

    #[test]
    fn raycast_respects_range_and_transparency() {
        let mut world = world(3);
        let catalog = Arc::clone(world.catalog());
        let origin = sky_point();
        let stone_at = origin + DVec2::new(0.0, 4.0 * HEX_V_SPACING);
        let water_at = origin + DVec2::new(0.0, 2.0 * HEX_V_SPACING);
        world.add_hexagon_at(stone_at, catalog.block_id("stone"));
        world.add_hexagon_at(water_at, catalog.block_id("water"));

        let hit = world
            .raycast_to_block(origin, stone_at, 300.0)
            .expect("stone in range");
        assert_eq!(hit.block, catalog.block_id("stone"));
        assert!(hit.place_anchor.y < hit.center.y);

        assert!(world.raycast_to_block(origin, stone_at, 150.0).is_none());
        assert!(world.raycast_to_block(origin, origin, 150.0).is_none());
    }

    #[test]
    fn raycast_with_unbounded_range() {
        let mut world = world(3);
        let catalog = Arc::clone(world.catalog());
        let origin = sky_point();
        let stone_at = origin + DVec2::new(0.0, 4.0 * HEX_V_SPACING);
        world.add_hexagon_at(stone_at, catalog.block_id("stone"));

        let hit = world.raycast_to_block(origin, stone_at, f64::INFINITY);
        assert_eq!(hit.map(|hit| hit.block), Some(catalog.block_id("stone")));
        let far = DVec2::new(f64::INFINITY, origin.y);
        assert!(world.raycast_to_block(origin, far, f64::INFINITY).is_none());
    }

    #[test]
    fn organism_queries() {
        let mut world = world(4);
        let tree = world.catalog().organism_kind("tree");
        let base = sky_point();
        world.add_organism(base, tree);
        world.add_organism(base + DVec2::new(20.0, 0.0), tree);
        world.add_organism(base + DVec2::new(200.0, 0.0), tree);

        assert_eq!(world.get_nearby_organisms(base, 50.0).len(), 2);
        let nearest = world.get_organism_at(base + DVec2::new(14.0, 0.0), 30.0);
        assert_eq!(nearest.map(Organism::position), Some(base + DVec2::new(20.0, 0.0)));
        assert!(world.get_organism_at(base + DVec2::new(100.0, 0.0), 30.0).is_none());

        // Radius is Euclidean: (35, 35) is inside a 45 box but ~49.5 away.
        let diagonal = base + DVec2::new(-300.0, 0.0);
        world.add_organism(diagonal + DVec2::new(35.0, 35.0), tree);
        assert!(world.get_nearby_organisms(diagonal, 45.0).is_empty());
        assert_eq!(world.get_nearby_organisms(diagonal, 50.0).len(), 1);

        assert!(world.remove_organism(base).is_some());
        assert!(world.remove_organism(base).is_none());
    }

    #[test]
    fn killing_an_organism_removes_it() {
        let mut world = world(4);
        let tree = world.catalog().organism_kind("tree");
        let base = sky_point();
        world.add_organism(base, tree);
        let mut rng = StdRng::seed_from_u64(11);

        let mut last = None;
        for _ in 0..4 {
            last = world.damage_organism_at(base, 30.0, ToolType::Axe, 5.0, &mut rng);
        }
        let hit = last.expect("tree was in reach");
        assert!(hit.killed);
        assert!(!hit.drops.is_empty());
        assert!(world.get_organism_at(base, 30.0).is_none());
    }

    #[test]
    fn eviction_retains_modified_chunks() {
        let mut world = world(8);
        let catalog = Arc::clone(world.catalog());
        let p = sky_point();
        world.add_hexagon_at(p, catalog.block_id("brick"));
        let edited = chunk_pos_of(p);
        for cx in 1..6 {
            world.get_or_create_chunk(ChunkPos::new(cx, 0));
        }

        let report = world.unload_distant_chunks(DVec2::ZERO, 2);
        assert_eq!(report.resident, 2);
        assert_eq!(report.retained, 1);
        assert!(!world.is_resident(edited));

        assert_eq!(
            world.get_hexagon_at(p).map(Hexagon::block),
            Some(catalog.block_id("brick"))
        );
        assert_eq!(world.retained_chunk_count(), 0);
    }

    #[test]
    fn snapshot_holds_only_modified_chunks() {
        let mut world = world(8);
        let catalog = Arc::clone(world.catalog());
        world.nearby_hexagons(DVec2::new(0.0, 500.0), 200.0);
        assert!(world.snapshot().chunks.is_empty());

        world.add_hexagon_at(sky_point(), catalog.block_id("plank"));
        let snapshot = world.snapshot();
        assert_eq!(snapshot.seed, 8);
        assert_eq!(snapshot.chunks.len(), 1);
        assert_eq!(snapshot.chunks[0].hexagons[0].block, "plank");
    }

    #[test]
    fn find_surface_scans_down() {
        let mut world = world(42);
        let surface = world
            .find_surface(640.0, 0.0, 1440.0, 20.0)
            .expect("ground below spawn");
        let hex = world
            .get_hexagon_at(DVec2::new(640.0, surface))
            .expect("cell at surface");
        assert!(!hex.is_transparent());
        assert!(world.find_surface(640.0, 0.0, 1440.0, 0.0).is_none());
    }
}
