//! Biome identifiers.

use serde::{Deserialize, Serialize};

/// Biome identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    /// Grassland, the fallback biome.
    Plains,
    /// Sand, no trees.
    Desert,
    /// Dense trees.
    Forest,
    /// Stone peaks.
    Mountain,
    /// Cold stone peaks.
    SnowyMountains,
    /// Cold and wet.
    Taiga,
    /// Cold and dry.
    SnowyTundra,
    /// Warm and wet.
    Swamp,
    /// Hot and wet.
    Jungle,
    /// Hot and dry.
    Savanna,
    /// Hottest, wet.
    Badlands,
    /// Low water.
    Ocean,
    /// Lowest water.
    DeepOcean,
    /// Sand strip next to water.
    Beach,
    /// Catalogued, never produced by the classifier.
    River,
    /// Catalogued, never produced by the classifier.
    FrozenRiver,
    /// Catalogued, never produced by the classifier.
    StoneShore,
}

impl Biome {
    /// Every biome in declaration order.
    pub const ALL: [Biome; 17] = [
        Biome::Plains,
        Biome::Desert,
        Biome::Forest,
        Biome::Mountain,
        Biome::SnowyMountains,
        Biome::Taiga,
        Biome::SnowyTundra,
        Biome::Swamp,
        Biome::Jungle,
        Biome::Savanna,
        Biome::Badlands,
        Biome::Ocean,
        Biome::DeepOcean,
        Biome::Beach,
        Biome::River,
        Biome::FrozenRiver,
        Biome::StoneShore,
    ];

    /// Catalog key of this biome.
    pub fn key(self) -> &'static str {
        match self {
            Biome::Plains => "plains",
            Biome::Desert => "desert",
            Biome::Forest => "forest",
            Biome::Mountain => "mountain",
            Biome::SnowyMountains => "snowy_mountains",
            Biome::Taiga => "taiga",
            Biome::SnowyTundra => "snowy_tundra",
            Biome::Swamp => "swamp",
            Biome::Jungle => "jungle",
            Biome::Savanna => "savanna",
            Biome::Badlands => "badlands",
            Biome::Ocean => "ocean",
            Biome::DeepOcean => "deep_ocean",
            Biome::Beach => "beach",
            Biome::River => "river",
            Biome::FrozenRiver => "frozen_river",
            Biome::StoneShore => "stone_shore",
        }
    }

    /// Resolve a key; unknown keys fall back to [`Biome::Plains`].
    pub fn from_key(key: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.key() == key)
            .unwrap_or(Biome::Plains)
    }

    /// Whether shallow dirt may be swapped for sand in this biome.
    pub fn is_sandy(self) -> bool {
        matches!(self, Biome::Desert | Biome::Beach | Biome::Badlands)
    }
}
