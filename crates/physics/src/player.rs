//! The player: movement, collision against nearby hexes, inventory.

use std::collections::BTreeMap;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use tesselbox_core::{Catalog, ItemId};
use tesselbox_world::{Hexagon, PlayerSnapshot, HEX_RADIUS, HEX_WIDTH};
use tracing::warn;

use crate::Aabb;

/// Collision radius of the player in pixels.
pub const PLAYER_RADIUS: f64 = 15.0;
/// Downward acceleration per tick.
pub const GRAVITY: f64 = 0.5;
/// Walking (and flying) speed per tick.
pub const PLAYER_SPEED: f64 = 5.0;
/// Horizontal velocity kept per tick without input.
pub const FRICTION: f64 = 0.8;
/// Vertical velocity of a jump.
pub const JUMP_FORCE: f64 = -12.0;
/// Velocity kept per tick while flying without input.
pub const FLIGHT_DAMPING: f64 = 0.9;

/// Landing snaps when the player's bottom is within this far above a top edge...
const LANDING_ABOVE: f64 = 5.0;
/// ...or this far below it.
const LANDING_BELOW: f64 = 15.0;

/// Directional input for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveInput {
    /// Move left.
    pub left: bool,
    /// Move right.
    pub right: bool,
    /// Fly up.
    pub up: bool,
    /// Fly down.
    pub down: bool,
}

/// Player state.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// Center position.
    pub position: DVec2,
    /// Velocity in pixels per tick.
    pub velocity: DVec2,
    /// Collision radius.
    pub radius: f64,
    /// Standing on a cell after the last update.
    pub on_ground: bool,
    /// Flight ignores gravity and collision.
    pub flight_mode: bool,
    /// Selected hotbar slot.
    pub selected_slot: usize,
    inventory: BTreeMap<ItemId, u32>,
}

impl Player {
    /// Spawn a player at `position` with an empty inventory.
    pub fn new(position: DVec2) -> Self {
        Self {
            position,
            velocity: DVec2::ZERO,
            radius: PLAYER_RADIUS,
            on_ground: false,
            flight_mode: false,
            selected_slot: 0,
            inventory: BTreeMap::new(),
        }
    }

    /// Advance one tick: apply input and gravity, then move along x and y
    /// separately, resolving collisions after each axis.
    pub fn update(&mut self, input: MoveInput, hexagons: &[&Hexagon]) {
        if self.flight_mode {
            self.velocity.x = steer(input.left, input.right, self.velocity.x, FLIGHT_DAMPING);
            self.velocity.y = steer(input.up, input.down, self.velocity.y, FLIGHT_DAMPING);
        } else {
            self.velocity.x = steer(input.left, input.right, self.velocity.x, FRICTION);
            self.velocity.y += GRAVITY;
        }

        self.position.x += self.velocity.x;
        self.resolve_horizontal(hexagons);

        self.position.y += self.velocity.y;
        self.resolve_vertical(hexagons);
    }

    /// Jump when grounded. Flying players can always jump.
    pub fn jump(&mut self) {
        if self.on_ground || self.flight_mode {
            self.velocity.y = JUMP_FORCE;
            if !self.flight_mode {
                self.on_ground = false;
            }
        }
    }

    /// Toggle flight, returning the new state.
    pub fn toggle_flight(&mut self) -> bool {
        self.flight_mode = !self.flight_mode;
        self.flight_mode
    }

    fn bounds(&self) -> Aabb {
        Aabb::around(self.position, DVec2::splat(self.radius))
    }

    fn resolve_horizontal(&mut self, hexagons: &[&Hexagon]) {
        if self.flight_mode {
            return;
        }
        for hex in hexagons.iter().filter(|h| !h.is_transparent()) {
            let cell = Aabb::around(hex.center(), DVec2::new(HEX_WIDTH / 2.0, HEX_RADIUS));
            let body = self.bounds();
            if !body.intersects(&cell) {
                continue;
            }
            let limit = self.radius + HEX_RADIUS;
            if self.velocity.x > 0.0 {
                let overlap = body.max.x - cell.min.x;
                if overlap > 0.0 && overlap < limit {
                    self.position.x -= overlap;
                    self.velocity.x = 0.0;
                }
            } else if self.velocity.x < 0.0 {
                let overlap = cell.max.x - body.min.x;
                if overlap > 0.0 && overlap < limit {
                    self.position.x += overlap;
                    self.velocity.x = 0.0;
                }
            }
        }
    }

    fn resolve_vertical(&mut self, hexagons: &[&Hexagon]) {
        if self.flight_mode {
            return;
        }
        self.on_ground = false;

        for hex in hexagons.iter().filter(|h| !h.is_transparent()) {
            let body = self.bounds();
            // Only the central half of the cell blocks upward motion.
            let cell = Aabb::around(hex.center(), DVec2::new(HEX_WIDTH / 2.0, HEX_RADIUS / 2.0));
            if !body.overlaps_x(&cell) {
                continue;
            }

            if self.velocity.y >= 0.0 {
                let Some(surface) = hex.top_surface_y(self.position.x) else {
                    continue;
                };
                let bottom = body.max.y;
                if bottom >= surface - LANDING_ABOVE && bottom <= surface + LANDING_BELOW {
                    self.position.y = surface - self.radius;
                    self.velocity.y = 0.0;
                    self.on_ground = true;
                    return;
                }
            } else if body.overlaps_y(&cell) {
                let overlap = cell.max.y - body.min.y;
                if overlap > 0.0 {
                    self.position.y += overlap;
                    self.velocity.y = 0.0;
                }
            }
        }
    }

    /// Add `count` of `item`.
    pub fn add_to_inventory(&mut self, item: ItemId, count: u32) {
        if count == 0 {
            return;
        }
        let slot = self.inventory.entry(item).or_insert(0);
        *slot = slot.saturating_add(count);
    }

    /// Take one `item`; false when none is held.
    pub fn remove_from_inventory(&mut self, item: ItemId) -> bool {
        match self.inventory.get_mut(&item) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    /// How many of `item` are held.
    pub fn count(&self, item: ItemId) -> u32 {
        self.inventory.get(&item).copied().unwrap_or(0)
    }

    /// Held items with non-zero counts.
    pub fn inventory(&self) -> impl Iterator<Item = (ItemId, u32)> + '_ {
        self.inventory
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(item, count)| (*item, *count))
    }

    /// Item in the selected hotbar slot.
    pub fn selected_item(&self, hotbar: &[ItemId]) -> Option<ItemId> {
        hotbar.get(self.selected_slot).copied()
    }

    /// Persisted form, with items stored by key.
    pub fn snapshot(&self, catalog: &Catalog) -> PlayerSnapshot {
        PlayerSnapshot {
            position: self.position.to_array(),
            inventory: self
                .inventory()
                .map(|(item, count)| (catalog.item(item).key.clone(), count))
                .collect(),
            selected_slot: self.selected_slot,
        }
    }

    /// Rebuild a player from its persisted form. Unknown item keys are
    /// skipped.
    pub fn from_snapshot(snapshot: &PlayerSnapshot, catalog: &Catalog) -> Self {
        let mut player = Self::new(DVec2::from_array(snapshot.position));
        player.selected_slot = snapshot.selected_slot;
        for (key, count) in &snapshot.inventory {
            match catalog.find_item(key) {
                Some(item) => player.add_to_inventory(item, *count),
                None => warn!(key = key.as_str(), "Dropping unknown item from saved inventory"),
            }
        }
        player
    }
}

/// Velocity along one axis: full speed toward a pressed direction (the
/// negative one wins), otherwise decayed by `keep`.
fn steer(negative: bool, positive: bool, velocity: f64, keep: f64) -> f64 {
    if negative {
        -PLAYER_SPEED
    } else if positive {
        PLAYER_SPEED
    } else {
        velocity * keep
    }
}
