//! Immutable catalog of blocks, items, organisms and biome profiles.
//!
//! The catalog is loaded once from JSON (the builtin content is embedded in
//! the crate) and shared as `Arc<Catalog>`. Every optional field of the file
//! format is resolved to a default here, so the rest of the workspace only
//! ever sees complete records.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::biome::Biome;
use crate::item::{ItemKind, ToolType, DEFAULT_BLOCK_DAMAGE};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Block used when a block key is unknown.
pub const DEFAULT_BLOCK_KEY: &str = "dirt";
/// Item used when an item key is unknown.
pub const DEFAULT_ITEM_KEY: &str = "dirt";
/// Organism used when an organism key is unknown.
pub const DEFAULT_ORGANISM_KEY: &str = "tree";
/// Block treated as empty space.
pub const AIR_KEY: &str = "air";

/// Interned block identifier, an index into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u16);

/// Interned item identifier, an index into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u16);

/// Interned organism kind, an index into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismKind(pub u16);

/// RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

/// Errors emitted while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Wrap IO errors when reading catalog files.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Wrap serde parsing issues.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    /// One of the fallback entries is absent.
    #[error("catalog is missing required {kind} '{key}'")]
    MissingRequired {
        /// Entry class (block, item, organism, biome).
        kind: &'static str,
        /// Missing key.
        key: String,
    },
    /// An entry references a key that does not exist.
    #[error("{owner} references unknown {kind} '{key}'")]
    UnknownReference {
        /// Key of the entry holding the reference.
        owner: String,
        /// Class of the referenced entry.
        kind: &'static str,
        /// Referenced key.
        key: String,
    },
    /// A biome profile uses a key no biome answers to.
    #[error("unknown biome '{0}'")]
    UnknownBiome(String),
    /// More entries than a 16-bit id can address.
    #[error("too many {0} entries")]
    TooMany(&'static str),
}

/// Fully resolved block definition.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDef {
    /// Catalog key (e.g. "stone").
    pub key: String,
    /// Display name.
    pub name: String,
    /// Fill colour.
    pub color: Rgba,
    /// Damage divisor; `<= 0` means indestructible.
    pub hardness: f64,
    /// Rays and the player pass through transparent blocks.
    pub transparent: bool,
    /// Whether the block is walkable ground.
    pub solid: bool,
    /// Whether mining yields an item.
    pub collectible: bool,
    /// Item granted when mined, if any.
    pub drops: Option<ItemId>,
    /// Falls when unsupported (carried for renderers; not simulated).
    pub gravity: bool,
    /// Emitted light level.
    pub light_level: u8,
    /// Damage dealt on contact.
    pub contact_damage: f64,
}

/// Fully resolved item definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDef {
    /// Catalog key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Colour in the world.
    pub color: Rgba,
    /// Colour in the hotbar.
    pub icon_color: Rgba,
    /// Ordering key for the hotbar.
    pub hotbar_order: u32,
    /// What the item does.
    pub kind: ItemKind,
}

/// One roll of an organism's loot table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropEntry {
    /// Item granted.
    pub item: ItemId,
    /// Probability in `[0, 1]`.
    pub chance: f64,
    /// Minimum amount (inclusive).
    pub min: u32,
    /// Maximum amount (inclusive).
    pub max: u32,
}

/// Fully resolved organism definition.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganismDef {
    /// Catalog key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Starting health.
    pub health: f64,
    /// Radius used for hit tests.
    pub hitbox_radius: f64,
    /// Tool that deals boosted damage.
    pub weak_to: ToolType,
    /// Damage multiplier for `weak_to`.
    pub weak_multiplier: f64,
    /// Damage multiplier for every other tool.
    pub other_multiplier: f64,
    /// Loot rolled on death.
    pub drops: Vec<DropEntry>,
}

/// Terrain profile of one biome.
#[derive(Debug, Clone, PartialEq)]
pub struct BiomeDef {
    /// Biome this profile belongs to.
    pub biome: Biome,
    /// Display name.
    pub name: String,
    /// Block at depth 0.
    pub surface_block: BlockId,
    /// Block just below the surface.
    pub subsurface_block: BlockId,
    /// Scales the surface noise.
    pub surface_variation: f64,
    /// Tree spawn density.
    pub tree_density: f64,
    /// Map colour.
    pub color: Rgba,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    blocks: BTreeMap<String, BlockEntry>,
    #[serde(default)]
    items: BTreeMap<String, ItemEntry>,
    #[serde(default)]
    organisms: BTreeMap<String, OrganismEntry>,
    #[serde(default)]
    biomes: BTreeMap<String, BiomeEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct BlockEntry {
    name: Option<String>,
    color: Option<[u8; 4]>,
    hardness: Option<f64>,
    transparent: Option<bool>,
    solid: Option<bool>,
    collectible: Option<bool>,
    drops: Option<String>,
    gravity: Option<bool>,
    light_level: Option<u8>,
    contact_damage: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ItemEntry {
    name: Option<String>,
    color: Option<[u8; 4]>,
    icon_color: Option<[u8; 4]>,
    hotbar_order: Option<u32>,
    kind: Option<String>,
    places: Option<String>,
    tool: Option<String>,
    damage: Option<f64>,
    organism: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OrganismEntry {
    name: Option<String>,
    health: Option<f64>,
    hitbox_radius: Option<f64>,
    weak_to: Option<String>,
    weak_multiplier: Option<f64>,
    other_multiplier: Option<f64>,
    #[serde(default)]
    drops: Vec<DropFileEntry>,
}

#[derive(Debug, Deserialize)]
struct DropFileEntry {
    item: String,
    chance: Option<f64>,
    min: Option<u32>,
    max: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct BiomeEntry {
    name: Option<String>,
    surface_block: Option<String>,
    subsurface_block: Option<String>,
    surface_variation: Option<f64>,
    tree_density: Option<f64>,
    color: Option<[u8; 4]>,
}

/// Immutable lookup tables for every catalogued thing.
#[derive(Debug, Clone)]
pub struct Catalog {
    blocks: Vec<BlockDef>,
    block_ids: HashMap<String, BlockId>,
    items: Vec<ItemDef>,
    item_ids: HashMap<String, ItemId>,
    organisms: Vec<OrganismDef>,
    organism_ids: HashMap<String, OrganismKind>,
    biomes: HashMap<Biome, BiomeDef>,
    hotbar: Vec<ItemId>,
    air: BlockId,
    default_block: BlockId,
    default_item: ItemId,
    default_organism: OrganismKind,
}

impl Catalog {
    /// The content shipped with the game.
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_CATALOG).expect("embedded catalog must be valid")
    }

    /// Read a catalog file from disk.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and resolve a catalog from JSON text.
    pub fn from_json_str(input: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(input)?;
        Self::from_file(file)
    }

    fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        // Ids follow key order so a catalog always interns the same way.
        let block_ids = intern(file.blocks.keys(), "block", BlockId)?;
        let item_ids = intern(file.items.keys(), "item", ItemId)?;
        let organism_ids = intern(file.organisms.keys(), "organism", OrganismKind)?;

        let block_ref = |owner: &str, key: &str| {
            block_ids.get(key).copied().ok_or_else(|| CatalogError::UnknownReference {
                owner: owner.to_string(),
                kind: "block",
                key: key.to_string(),
            })
        };
        let item_ref = |owner: &str, key: &str| {
            item_ids.get(key).copied().ok_or_else(|| CatalogError::UnknownReference {
                owner: owner.to_string(),
                kind: "item",
                key: key.to_string(),
            })
        };
        let organism_ref = |owner: &str, key: &str| {
            organism_ids.get(key).copied().ok_or_else(|| CatalogError::UnknownReference {
                owner: owner.to_string(),
                kind: "organism",
                key: key.to_string(),
            })
        };

        let mut blocks = Vec::with_capacity(file.blocks.len());
        for (key, entry) in &file.blocks {
            let collectible = entry.collectible.unwrap_or(true);
            let drops = match (&entry.drops, collectible) {
                (_, false) => None,
                (Some(item), true) => Some(item_ref(key, item)?),
                (None, true) => item_ids.get(key).copied(),
            };
            blocks.push(BlockDef {
                key: key.clone(),
                name: entry.name.clone().unwrap_or_else(|| key.clone()),
                color: Rgba(entry.color.unwrap_or([255, 255, 255, 255])),
                hardness: entry.hardness.unwrap_or(1.0),
                transparent: entry.transparent.unwrap_or(false),
                solid: entry.solid.unwrap_or(true),
                collectible,
                drops,
                gravity: entry.gravity.unwrap_or(false),
                light_level: entry.light_level.unwrap_or(0),
                contact_damage: entry.contact_damage.unwrap_or(0.0),
            });
        }

        let mut items = Vec::with_capacity(file.items.len());
        for (key, entry) in &file.items {
            let kind = match entry.kind.as_deref() {
                Some("tool") => ItemKind::Tool {
                    tool: ToolType::from_key(entry.tool.as_deref().unwrap_or("none")),
                    damage: entry.damage.unwrap_or(DEFAULT_BLOCK_DAMAGE),
                },
                Some("plantable") => ItemKind::Plantable {
                    organism: organism_ref(
                        key,
                        entry.organism.as_deref().unwrap_or(DEFAULT_ORGANISM_KEY),
                    )?,
                },
                _ => ItemKind::Block {
                    places: block_ref(key, entry.places.as_deref().unwrap_or(key))?,
                },
            };
            let color = Rgba(entry.color.unwrap_or([255, 255, 255, 255]));
            items.push(ItemDef {
                key: key.clone(),
                name: entry.name.clone().unwrap_or_else(|| key.clone()),
                color,
                icon_color: entry.icon_color.map(Rgba).unwrap_or(color),
                hotbar_order: entry.hotbar_order.unwrap_or(999),
                kind,
            });
        }

        let mut organisms = Vec::with_capacity(file.organisms.len());
        for (key, entry) in &file.organisms {
            let drops = entry
                .drops
                .iter()
                .map(|drop| {
                    let min = drop.min.unwrap_or(1);
                    Ok(DropEntry {
                        item: item_ref(key, &drop.item)?,
                        chance: drop.chance.unwrap_or(1.0).clamp(0.0, 1.0),
                        min,
                        max: drop.max.unwrap_or(min).max(min),
                    })
                })
                .collect::<Result<Vec<_>, CatalogError>>()?;
            organisms.push(OrganismDef {
                key: key.clone(),
                name: entry.name.clone().unwrap_or_else(|| key.clone()),
                health: entry.health.unwrap_or(100.0),
                hitbox_radius: entry.hitbox_radius.unwrap_or(30.0),
                weak_to: ToolType::from_key(entry.weak_to.as_deref().unwrap_or("none")),
                weak_multiplier: entry.weak_multiplier.unwrap_or(1.0),
                other_multiplier: entry.other_multiplier.unwrap_or(1.0),
                drops,
            });
        }

        let mut biomes = HashMap::new();
        for (key, entry) in &file.biomes {
            let biome = Biome::from_key(key);
            if biome.key() != key {
                return Err(CatalogError::UnknownBiome(key.clone()));
            }
            let surface_block = block_ref(key, entry.surface_block.as_deref().unwrap_or("grass"))?;
            let subsurface_block =
                block_ref(key, entry.subsurface_block.as_deref().unwrap_or(DEFAULT_BLOCK_KEY))?;
            biomes.insert(
                biome,
                BiomeDef {
                    biome,
                    name: entry.name.clone().unwrap_or_else(|| key.clone()),
                    surface_block,
                    subsurface_block,
                    surface_variation: entry.surface_variation.unwrap_or(0.3),
                    tree_density: entry.tree_density.unwrap_or(0.0),
                    color: Rgba(entry.color.unwrap_or([100, 200, 100, 255])),
                },
            );
        }

        let required = |ids_has: bool, kind: &'static str, key: &str| {
            if ids_has {
                Ok(())
            } else {
                Err(CatalogError::MissingRequired {
                    kind,
                    key: key.to_string(),
                })
            }
        };
        required(block_ids.contains_key(AIR_KEY), "block", AIR_KEY)?;
        required(block_ids.contains_key(DEFAULT_BLOCK_KEY), "block", DEFAULT_BLOCK_KEY)?;
        required(item_ids.contains_key(DEFAULT_ITEM_KEY), "item", DEFAULT_ITEM_KEY)?;
        required(
            organism_ids.contains_key(DEFAULT_ORGANISM_KEY),
            "organism",
            DEFAULT_ORGANISM_KEY,
        )?;
        required(biomes.contains_key(&Biome::Plains), "biome", Biome::Plains.key())?;

        let mut hotbar: Vec<ItemId> = (0..items.len() as u16).map(ItemId).collect();
        hotbar.sort_by(|a, b| {
            let (a, b) = (&items[a.0 as usize], &items[b.0 as usize]);
            a.hotbar_order.cmp(&b.hotbar_order).then_with(|| a.key.cmp(&b.key))
        });

        Ok(Self {
            air: block_ids[AIR_KEY],
            default_block: block_ids[DEFAULT_BLOCK_KEY],
            default_item: item_ids[DEFAULT_ITEM_KEY],
            default_organism: organism_ids[DEFAULT_ORGANISM_KEY],
            blocks,
            block_ids,
            items,
            item_ids,
            organisms,
            organism_ids,
            biomes,
            hotbar,
        })
    }

    /// The empty block.
    pub fn air(&self) -> BlockId {
        self.air
    }

    /// Resolve a block key, returning `None` when it is not catalogued.
    pub fn find_block(&self, key: &str) -> Option<BlockId> {
        self.block_ids.get(key).copied()
    }

    /// Resolve a block key; unknown keys become the default block.
    pub fn block_id(&self, key: &str) -> BlockId {
        self.find_block(key).unwrap_or_else(|| {
            warn!(key, fallback = DEFAULT_BLOCK_KEY, "Unknown block key");
            self.default_block
        })
    }

    /// Block definition; ids from another catalog resolve to the default.
    pub fn block(&self, id: BlockId) -> &BlockDef {
        self.blocks
            .get(id.0 as usize)
            .unwrap_or(&self.blocks[self.default_block.0 as usize])
    }

    /// Every block in id order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BlockDef)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, def)| (BlockId(i as u16), def))
    }

    /// Resolve an item key, returning `None` when it is not catalogued.
    pub fn find_item(&self, key: &str) -> Option<ItemId> {
        self.item_ids.get(key).copied()
    }

    /// Resolve an item key; unknown keys become the default item.
    pub fn item_id(&self, key: &str) -> ItemId {
        self.find_item(key).unwrap_or_else(|| {
            warn!(key, fallback = DEFAULT_ITEM_KEY, "Unknown item key");
            self.default_item
        })
    }

    /// Item definition; foreign ids resolve to the default.
    pub fn item(&self, id: ItemId) -> &ItemDef {
        self.items
            .get(id.0 as usize)
            .unwrap_or(&self.items[self.default_item.0 as usize])
    }

    /// Every item in id order.
    pub fn items(&self) -> impl Iterator<Item = (ItemId, &ItemDef)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, def)| (ItemId(i as u16), def))
    }

    /// Items in hotbar order (by `hotbar_order`, ties by key).
    pub fn hotbar(&self) -> &[ItemId] {
        &self.hotbar
    }

    /// Resolve an organism key, returning `None` when it is not catalogued.
    pub fn find_organism(&self, key: &str) -> Option<OrganismKind> {
        self.organism_ids.get(key).copied()
    }

    /// Resolve an organism key; unknown keys become the default organism.
    pub fn organism_kind(&self, key: &str) -> OrganismKind {
        self.find_organism(key).unwrap_or_else(|| {
            warn!(key, fallback = DEFAULT_ORGANISM_KEY, "Unknown organism key");
            self.default_organism
        })
    }

    /// Organism definition; foreign kinds resolve to the default.
    pub fn organism(&self, kind: OrganismKind) -> &OrganismDef {
        self.organisms
            .get(kind.0 as usize)
            .unwrap_or(&self.organisms[self.default_organism.0 as usize])
    }

    /// Terrain profile of `biome`; uncatalogued biomes use the plains profile.
    pub fn biome(&self, biome: Biome) -> &BiomeDef {
        self.biomes
            .get(&biome)
            .or_else(|| self.biomes.get(&Biome::Plains))
            .expect("plains profile is checked at load time")
    }
}

fn intern<'a, T>(
    keys: impl ExactSizeIterator<Item = &'a String>,
    kind: &'static str,
    make: impl Fn(u16) -> T,
) -> Result<HashMap<String, T>, CatalogError> {
    if keys.len() > u16::MAX as usize {
        return Err(CatalogError::TooMany(kind));
    }
    Ok(keys
        .enumerate()
        .map(|(i, key)| (key.clone(), make(i as u16)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = Catalog::builtin();
        let stone = catalog.block(catalog.block_id("stone"));
        assert_eq!(stone.hardness, 2.0);
        assert!(stone.solid);
        assert!(!stone.transparent);

        let air = catalog.block(catalog.air());
        assert!(air.transparent);
        assert!(!air.solid);
        assert!(!air.collectible);

        let bedrock = catalog.block(catalog.block_id("bedrock"));
        assert!(bedrock.hardness <= 0.0);
        assert_eq!(bedrock.drops, None);
    }

    #[test]
    fn ores_drop_their_resource() {
        let catalog = Catalog::builtin();
        let coal_ore = catalog.block(catalog.block_id("coal_ore"));
        assert_eq!(coal_ore.drops, Some(catalog.item_id("coal")));
        let dirt = catalog.block(catalog.block_id("dirt"));
        assert_eq!(dirt.drops, Some(catalog.item_id("dirt")));
    }

    #[test]
    fn unknown_keys_fall_back() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.block_id("unobtainium"), catalog.block_id("dirt"));
        assert_eq!(catalog.item_id("unobtainium"), catalog.item_id("dirt"));
        assert_eq!(catalog.organism_kind("cow"), catalog.organism_kind("tree"));
        assert_eq!(catalog.block(BlockId(u16::MAX)).key, "dirt");
        assert_eq!(catalog.biome(Biome::River).biome, Biome::Plains);
    }

    #[test]
    fn hotbar_follows_declared_order() {
        let catalog = Catalog::builtin();
        let keys: Vec<&str> = catalog
            .hotbar()
            .iter()
            .map(|id| catalog.item(*id).key.as_str())
            .collect();
        assert_eq!(
            keys,
            [
                "dirt", "grass", "stone", "sand", "coal", "iron", "gold", "diamond", "wood",
                "sapling", "axe"
            ]
        );
    }

    #[test]
    fn tree_loot_table_and_multipliers() {
        let catalog = Catalog::builtin();
        let tree = catalog.organism(catalog.organism_kind("tree"));
        assert_eq!(tree.health, 100.0);
        assert_eq!(tree.weak_to, ToolType::Axe);
        assert_eq!(tree.weak_multiplier, 5.0);
        assert_eq!(tree.other_multiplier, 0.2);
        assert_eq!(tree.drops.len(), 2);
        assert_eq!(tree.drops[0].item, catalog.item_id("wood"));
        assert_eq!((tree.drops[0].min, tree.drops[0].max), (3, 6));
    }

    #[test]
    fn optional_fields_resolve_to_defaults() {
        let json = r#"{
            "blocks": { "air": { "transparent": true, "solid": false, "collectible": false },
                        "dirt": {} },
            "items": { "dirt": {} },
            "organisms": { "tree": {} },
            "biomes": { "plains": { "surface_block": "dirt" } }
        }"#;
        let catalog = Catalog::from_json_str(json).unwrap();
        let dirt = catalog.block(catalog.block_id("dirt"));
        assert_eq!(dirt.hardness, 1.0);
        assert!(dirt.solid && dirt.collectible && !dirt.transparent);
        assert_eq!(dirt.drops, Some(catalog.item_id("dirt")));
        let item = catalog.item(catalog.item_id("dirt"));
        assert_eq!(item.hotbar_order, 999);
        assert_eq!(item.icon_color, item.color);
        assert_eq!(
            item.kind,
            ItemKind::Block {
                places: catalog.block_id("dirt")
            }
        );
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let json = r#"{
            "blocks": { "air": {}, "dirt": { "drops": "gem" } },
            "items": { "dirt": {} },
            "organisms": { "tree": {} },
            "biomes": { "plains": { "surface_block": "dirt" } }
        }"#;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(CatalogError::UnknownReference { .. })
        ));
    }

    #[test]
    fn missing_fallback_entry_is_rejected() {
        let json = r#"{ "blocks": { "air": {}, "dirt": {} }, "items": { "dirt": {} } }"#;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(CatalogError::MissingRequired { kind: "organism", .. })
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Catalog::load_from_path("/nonexistent/catalog.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/catalog.json"));
    }
}
