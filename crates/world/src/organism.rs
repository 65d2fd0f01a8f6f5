//! Living world entities (trees).

use glam::DVec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tesselbox_core::{Catalog, ItemId, OrganismDef, OrganismKind, ToolType};

use crate::persist::OrganismRecord;

/// A living entity keyed by its exact spawn position.
#[derive(Debug, Clone, PartialEq)]
pub struct Organism {
    position: DVec2,
    kind: OrganismKind,
    health: f64,
    max_health: f64,
    alive: bool,
}

impl Organism {
    /// Spawn a full-health organism of `kind` at `position`.
    pub fn new(position: DVec2, kind: OrganismKind, catalog: &Catalog) -> Self {
        let health = catalog.organism(kind).health;
        Self {
            position,
            kind,
            health,
            max_health: health,
            alive: true,
        }
    }

    /// Rebuild an organism from its persisted form.
    pub fn from_record(record: &OrganismRecord, catalog: &Catalog) -> Self {
        let max_health = record.max_health.max(0.0);
        let health = record.health.clamp(0.0, max_health);
        Self {
            position: DVec2::new(record.x, record.y),
            kind: catalog.organism_kind(&record.kind),
            health,
            max_health,
            alive: health > 0.0,
        }
    }

    /// Persisted form.
    pub fn record(&self, catalog: &Catalog) -> OrganismRecord {
        OrganismRecord {
            x: self.position.x,
            y: self.position.y,
            kind: catalog.organism(self.kind).key.clone(),
            health: self.health,
            max_health: self.max_health,
        }
    }

    /// Hit the organism with `tool` for `base_damage`.
    ///
    /// Damage is scaled by the definition's weak/other multiplier. When the
    /// hit kills the organism each drop entry is rolled once and the
    /// non-empty results are returned; otherwise the list is empty.
    pub fn apply_damage<R: Rng>(
        &mut self,
        def: &OrganismDef,
        tool: ToolType,
        base_damage: f64,
        rng: &mut R,
    ) -> Vec<(ItemId, u32)> {
        if !self.alive {
            return Vec::new();
        }
        let multiplier = if tool == def.weak_to {
            def.weak_multiplier
        } else {
            def.other_multiplier
        };
        self.health -= base_damage * multiplier;
        if self.health > 0.0 {
            return Vec::new();
        }

        self.health = 0.0;
        self.alive = false;
        let mut drops = Vec::new();
        for entry in &def.drops {
            if rng.gen::<f64>() >= entry.chance {
                continue;
            }
            let amount = rng.gen_range(entry.min..=entry.max);
            if amount > 0 {
                drops.push((entry.item, amount));
            }
        }
        drops
    }

    /// Spawn position.
    pub fn position(&self) -> DVec2 {
        self.position
    }

    /// Organism kind.
    pub fn kind(&self) -> OrganismKind {
        self.kind
    }

    /// Remaining health.
    pub fn health(&self) -> f64 {
        self.health
    }

    /// Health at spawn.
    pub fn max_health(&self) -> f64 {
        self.max_health
    }

    /// False once health has reached zero.
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Exact-position key for the organism map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrganismKey(u64, u64);

impl OrganismKey {
    /// Key for an exact position.
    pub fn of(position: DVec2) -> Self {
        // Normalize -0.0 so it keys the same as 0.0.
        Self((position.x + 0.0).to_bits(), (position.y + 0.0).to_bits())
    }
}

/// Result of hitting an organism.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganismHit {
    /// Position of the organism that was hit.
    pub position: DVec2,
    /// Its kind.
    pub kind: OrganismKind,
    /// Health after the hit.
    pub health: f64,
    /// Whether the hit killed it (it has been removed from the world).
    pub killed: bool,
    /// Loot produced by the kill.
    pub drops: Vec<(ItemId, u32)>,
}
