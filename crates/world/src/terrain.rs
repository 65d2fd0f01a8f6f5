//! Terrain generation from biome, surface and ore noise.
//!
//! A chunk is generated slot by slot: each hex below its column's surface
//! line gets a block chosen by biome and depth, and depth-0 cells with open
//! sky above may grow a tree.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec2;
use rand::rngs::StdRng;
use rand::Rng;
use tesselbox_core::{chunk_hash, scoped_rng, Biome, BlockId, Catalog, OrganismKind};
use tracing::{debug, instrument};

use crate::biome::BiomeClassifier;
use crate::chunk::Chunk;
use crate::hex::{ChunkPos, LocalCoord, HEX_V_SPACING, HEX_WIDTH};
use crate::hexagon::Hexagon;
use crate::noise::{NoiseConfig, NoiseGenerator};
use crate::organism::Organism;
use crate::settings::WorldSettings;

/// Salt of the per-chunk generation RNG stream.
const GENERATION_SALT: u64 = 0x7E55_E1B0;

/// Shallowest depth (in hexes) where ores may appear.
pub const ORE_MIN_DEPTH: u32 = 10;
/// Depths beyond this are solid bedrock.
pub const BEDROCK_DEPTH: u32 = 30;
/// Rare ores need more than this depth.
pub const RARE_ORE_MIN_DEPTH: u32 = 20;
/// Ore noise above this produces coal or iron.
pub const COMMON_ORE_THRESHOLD: f64 = 0.35;
/// Ore noise above this (and deep enough) produces gold or diamond.
pub const RARE_ORE_THRESHOLD: f64 = 0.5;

/// Weight of the high-frequency surface detail term.
const SURFACE_DETAIL_WEIGHT: f64 = 0.1;

/// Block ids the generator places directly.
#[derive(Debug, Clone, Copy)]
struct Palette {
    dirt: BlockId,
    sand: BlockId,
    stone: BlockId,
    bedrock: BlockId,
    coal_ore: BlockId,
    iron_ore: BlockId,
    gold_ore: BlockId,
    diamond_ore: BlockId,
}

impl Palette {
    fn resolve(catalog: &Catalog) -> Self {
        Self {
            dirt: catalog.block_id("dirt"),
            sand: catalog.block_id("sand"),
            stone: catalog.block_id("stone"),
            bedrock: catalog.block_id("bedrock"),
            coal_ore: catalog.block_id("coal_ore"),
            iron_ore: catalog.block_id("iron_ore"),
            gold_ore: catalog.block_id("gold_ore"),
            diamond_ore: catalog.block_id("diamond_ore"),
        }
    }
}

/// Output of generating one chunk.
#[derive(Debug, Clone)]
pub struct GeneratedChunk {
    /// The filled chunk (not marked modified).
    pub chunk: Chunk,
    /// Organisms spawned on its surface.
    pub organisms: Vec<Organism>,
}

/// Seeded terrain generator.
#[derive(Clone)]
pub struct TerrainGenerator {
    world_seed: u64,
    catalog: Arc<Catalog>,
    settings: WorldSettings,
    classifier: BiomeClassifier,
    surface: NoiseGenerator,
    surface_detail: NoiseGenerator,
    ore: NoiseGenerator,
    trees: NoiseGenerator,
    palette: Palette,
    tree: OrganismKind,
}

impl TerrainGenerator {
    /// Create a terrain generator from world seed.
    pub fn new(world_seed: u64, catalog: Arc<Catalog>, settings: WorldSettings) -> Self {
        let seed = world_seed as u32;
        Self {
            world_seed,
            classifier: BiomeClassifier::new(world_seed),
            surface: NoiseGenerator::new(NoiseConfig::surface(seed)),
            surface_detail: NoiseGenerator::new(NoiseConfig::surface_detail(seed)),
            ore: NoiseGenerator::new(NoiseConfig::ore(seed)),
            trees: NoiseGenerator::new(NoiseConfig::trees(seed)),
            palette: Palette::resolve(&catalog),
            tree: catalog.organism_kind("tree"),
            catalog,
            settings,
        }
    }

    /// World seed.
    pub fn seed(&self) -> u64 {
        self.world_seed
    }

    /// Biome of the column at `x`.
    pub fn biome_at(&self, x: f64) -> Biome {
        self.classifier.classify(x, 0.0)
    }

    /// Ground offset in pixels from the base ground line for `biome`.
    pub fn surface_offset(&self, biome: Biome, x: f64, z: f64) -> f64 {
        let variation = self.catalog.biome(biome).surface_variation;
        let shape = self.surface.sample_2d(x, z);
        let detail = self.surface_detail.sample_2d(x, z) * SURFACE_DETAIL_WEIGHT;
        (shape + detail) * variation * self.settings.surface_amplitude
    }

    /// Surface line of the column at `x`; hexes with `y >= surface_y` are ground.
    pub fn surface_y(&self, x: f64) -> f64 {
        self.column(x).1
    }

    fn column(&self, x: f64) -> (Biome, f64) {
        let biome = self.biome_at(x);
        (
            biome,
            self.settings.base_ground_y + self.surface_offset(biome, x, 0.0),
        )
    }

    /// Block for a cell `depth` hexes below the surface.
    pub fn block_at_depth<R: Rng>(&self, biome: Biome, depth: u32, x: f64, y: f64, rng: &mut R) -> BlockId {
        let profile = self.catalog.biome(biome);
        let p = &self.palette;
        match depth {
            0 => profile.surface_block,
            1..=2 => {
                if rng.gen::<f64>() < 0.2 {
                    if biome.is_sandy() {
                        p.sand
                    } else {
                        p.dirt
                    }
                } else {
                    profile.subsurface_block
                }
            }
            3..=9 => {
                let stone_chance = (depth as f64 / 15.0 + 0.2).min(0.8);
                if rng.gen::<f64>() < stone_chance {
                    p.stone
                } else {
                    p.dirt
                }
            }
            d if d > BEDROCK_DEPTH => p.bedrock,
            d => {
                // Depth is stretched so veins run longer horizontally.
                let vein = self.ore.sample_3d(x, y, d as f64 * 2.5);
                if vein > COMMON_ORE_THRESHOLD {
                    if d > RARE_ORE_MIN_DEPTH && vein > RARE_ORE_THRESHOLD {
                        return if rng.gen::<f64>() < 0.3 {
                            p.diamond_ore
                        } else {
                            p.gold_ore
                        };
                    }
                    if d > ORE_MIN_DEPTH {
                        return if rng.gen::<f64>() < 0.4 {
                            p.iron_ore
                        } else {
                            p.coal_ore
                        };
                    }
                }
                p.stone
            }
        }
    }

    /// Noise gate for trees: density `<= 0` never spawns.
    pub fn tree_gate(&self, biome: Biome, x: f64, z: f64) -> bool {
        let density = self.catalog.biome(biome).tree_density;
        if density <= 0.0 {
            return false;
        }
        self.trees.sample_2d_unit(x, z) > 1.0 - density * 10.0
    }

    /// Generate terrain for a chunk at the given position.
    ///
    /// Identical `(seed, pos)` always produces identical output.
    #[instrument(skip(self), fields(chunk_pos = ?pos, world_seed = self.world_seed))]
    pub fn generate(&self, pos: ChunkPos) -> GeneratedChunk {
        debug!("Starting terrain generation");
        let mut chunk = Chunk::new(pos);
        let mut organisms = Vec::new();
        let mut rng: StdRng = scoped_rng(self.world_seed, chunk_hash(pos.x, pos.y), GENERATION_SALT);

        // Only 2 * CHUNK_SIZE distinct columns exist in a chunk.
        let mut columns: HashMap<u64, (Biome, f64)> = HashMap::new();
        let mut column_at = |x: f64| *columns.entry(x.to_bits()).or_insert_with(|| self.column(x));

        for slot in LocalCoord::all() {
            let center = slot.center(pos);
            let (biome, surface) = column_at(center.x);
            if center.y < surface {
                continue;
            }

            let depth = ((center.y - surface) / HEX_V_SPACING) as u32;
            let block = self.block_at_depth(biome, depth, center.x, center.y, &mut rng);
            chunk.fill(center, Hexagon::new(center, block, &self.catalog));

            if depth == 0 && self.tree_gate(biome, center.x, 0.0) && self.sky_above(center) {
                organisms.push(Organism::new(center, self.tree, &self.catalog));
            }
        }

        debug!(
            hexagons = chunk.len(),
            organisms = organisms.len(),
            "Terrain generation complete"
        );
        GeneratedChunk { chunk, organisms }
    }

    /// Both upper neighbours of `center` lie above their own surface line,
    /// so generation never places a cell there.
    fn sky_above(&self, center: DVec2) -> bool {
        let y = center.y - HEX_V_SPACING;
        [center.x - HEX_WIDTH / 2.0, center.x + HEX_WIDTH / 2.0]
            .into_iter()
            .all(|x| y < self.surface_y(x))
    }
}
