//! Tool types and item behaviours.

use serde::{Deserialize, Serialize};

use crate::catalog::{BlockId, OrganismKind};

/// Tool types. Organisms are weak to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    /// Bare hands or a non-tool item
    #[default]
    None,
    /// Axe - chops trees
    Axe,
    /// Pickaxe - mines stone, ores
    Pickaxe,
    /// Shovel - digs dirt, sand
    Shovel,
    /// Sword - combat weapon
    Sword,
}

impl ToolType {
    /// Parse a catalog string, unknown names become [`ToolType::None`].
    pub fn from_key(key: &str) -> Self {
        match key {
            "axe" => Self::Axe,
            "pickaxe" => Self::Pickaxe,
            "shovel" => Self::Shovel,
            "sword" => Self::Sword,
            _ => Self::None,
        }
    }
}

/// What an item does when used in the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Places a block hexagon.
    Block {
        /// Block placed by this item.
        places: BlockId,
    },
    /// A tool with its own damage.
    Tool {
        /// Tool class used for organism multipliers.
        tool: ToolType,
        /// Damage dealt per hit.
        damage: f64,
    },
    /// Plants an organism on top of a solid block.
    Plantable {
        /// Organism kind planted.
        organism: OrganismKind,
    },
}

impl ItemKind {
    /// Damage dealt to blocks when mining with this item selected.
    pub fn block_damage(&self) -> f64 {
        match self {
            Self::Tool { damage, .. } => *damage,
            _ => DEFAULT_BLOCK_DAMAGE,
        }
    }

    /// Tool class and damage applied to organisms.
    pub fn attack(&self) -> (ToolType, f64) {
        match self {
            Self::Tool { tool, damage } => (*tool, *damage),
            _ => (ToolType::None, DEFAULT_ATTACK_DAMAGE),
        }
    }
}

/// Damage of a non-tool item (or empty hand) against blocks.
pub const DEFAULT_BLOCK_DAMAGE: f64 = 5.0;
/// Damage of a non-tool item (or empty hand) against organisms.
pub const DEFAULT_ATTACK_DAMAGE: f64 = 1.0;
