//! Session controller: menu/playing/paused states, one world and one player.
//!
//! The game owns everything mutable. Callers (the headless loop or the
//! bridge owner loop) drive it one tick at a time.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use glam::DVec2;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tesselbox_core::item::{DEFAULT_ATTACK_DAMAGE, DEFAULT_BLOCK_DAMAGE};
use tesselbox_core::{scoped_rng, BlockId, Catalog, ItemId, ItemKind, OrganismKind, SimTick, ToolType};
use tesselbox_physics::Player;
use tesselbox_world::{
    chunk_pos_of, validate_name, world_to_hex_center, ChunkPos, DamageOutcome, OrganismHit,
    PersistError, World, WorldStore, CHUNK_HEIGHT, HEX_RADIUS, HEX_V_SPACING,
};
use tracing::{debug, info, instrument, warn};

use crate::config::GameConfig;
use crate::input::{InputSource, Key};

pub const DEFAULT_WORLD_NAME: &str = "world";
/// Hotbar slots reachable with the number keys and the wheel.
pub const HOTBAR_SLOTS: usize = 9;
/// Stock of every collectible item granted in creative mode.
pub const CREATIVE_STOCK: u32 = 999;
/// How close the cursor must be to an organism to target it.
pub const ORGANISM_HIT_TOLERANCE: f64 = 30.0;

const SPAWN_X: f64 = 640.0;
const SPAWN_SCAN_STEP: f64 = 20.0;
const SPAWN_CLEARANCE: f64 = 50.0;
const SPAWN_FALLBACK_Y: f64 = 300.0;
const ACTION_RNG_SALT: u64 = 0xAC71_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    Menu,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Survival,
    Creative,
}

impl GameMode {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "survival" => Some(Self::Survival),
            "creative" => Some(Self::Creative),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Survival => "survival",
            Self::Creative => "creative",
        }
    }
}

/// Mouse state for one tick. `cursor` is in view coordinates; the camera
/// offset turns it into a world position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Intent {
    pub cursor: DVec2,
    pub mining: bool,
    pub place: bool,
    /// Wheel notches; negative moves toward slot 0.
    pub scroll: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotPlaying,
    OutOfRange,
    TooClose,
    Occupied,
    Unsupported,
    NotPlaceable,
    NothingSelected,
    NoneLeft,
    Immune,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::NotPlaying => "not_playing",
            Rejection::OutOfRange => "out_of_range",
            Rejection::TooClose => "too_close",
            Rejection::Occupied => "occupied",
            Rejection::Unsupported => "unsupported",
            Rejection::NotPlaceable => "not_placeable",
            Rejection::NothingSelected => "nothing_selected",
            Rejection::NoneLeft => "none_left",
            Rejection::Immune => "immune",
        }
    }
}

/// What a mining or placing action did.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Nothing was under the cursor.
    Missed,
    Rejected(Rejection),
    HitOrganism(OrganismHit),
    DamagedBlock {
        center: DVec2,
        health: f64,
    },
    MinedBlock {
        center: DVec2,
        block: BlockId,
        collected: Option<ItemId>,
    },
    PlacedBlock {
        center: DVec2,
        block: BlockId,
    },
    Planted {
        center: DVec2,
        organism: OrganismKind,
    },
}

impl ActionOutcome {
    /// Client-facing description, with catalog keys in place of ids.
    pub fn view(&self, catalog: &Catalog) -> OutcomeView {
        let mut view = OutcomeView {
            outcome: "missed",
            at: None,
            subject: None,
            health: None,
            items: Vec::new(),
        };
        match self {
            ActionOutcome::Missed => {}
            ActionOutcome::Rejected(reason) => {
                view.outcome = "rejected";
                view.subject = Some(reason.as_str().to_string());
            }
            ActionOutcome::HitOrganism(hit) => {
                view.outcome = if hit.killed { "killed" } else { "hit" };
                view.at = Some(hit.position.to_array());
                view.subject = Some(catalog.organism(hit.kind).key.clone());
                view.health = Some(hit.health);
                view.items = hit
                    .drops
                    .iter()
                    .map(|(item, count)| (catalog.item(*item).key.clone(), *count))
                    .collect();
            }
            ActionOutcome::DamagedBlock { center, health } => {
                view.outcome = "damaged";
                view.at = Some(center.to_array());
                view.health = Some(*health);
            }
            ActionOutcome::MinedBlock {
                center,
                block,
                collected,
            } => {
                view.outcome = "mined";
                view.at = Some(center.to_array());
                view.subject = Some(catalog.block(*block).key.clone());
                view.items = collected
                    .iter()
                    .map(|item| (catalog.item(*item).key.clone(), 1))
                    .collect();
            }
            ActionOutcome::PlacedBlock { center, block } => {
                view.outcome = "placed";
                view.at = Some(center.to_array());
                view.subject = Some(catalog.block(*block).key.clone());
            }
            ActionOutcome::Planted { center, organism } => {
                view.outcome = "planted";
                view.at = Some(center.to_array());
                view.subject = Some(catalog.organism(*organism).key.clone());
            }
        }
        view
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeView {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<(String, u32)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub selected_slot: usize,
    pub flight_mode: bool,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HexView {
    pub x: f64,
    pub y: f64,
    pub block: String,
    pub color: [u8; 4],
    pub health: f64,
    pub max_health: f64,
    pub transparent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganismView {
    pub x: f64,
    pub y: f64,
    pub kind: String,
    pub health: f64,
    pub max_health: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotView {
    pub item: String,
    pub count: u32,
}

/// Everything a renderer needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    pub tick: u64,
    pub world: String,
    pub mode: GameMode,
    pub paused: bool,
    pub camera: [f64; 2],
    pub player: PlayerView,
    pub hexagons: Vec<HexView>,
    pub organisms: Vec<OrganismView>,
    pub hotbar: Vec<SlotView>,
    pub events: Vec<OutcomeView>,
}

/// A running world and its player.
pub struct Session {
    pub name: String,
    pub mode: GameMode,
    pub world: World,
    pub player: Player,
}

pub struct Game {
    config: GameConfig,
    catalog: Arc<Catalog>,
    store: WorldStore,
    state: GameState,
    session: Option<Session>,
    tick: SimTick,
    held: BTreeSet<Key>,
    rng: StdRng,
    recent: Vec<ActionOutcome>,
}

impl Game {
    pub fn new(config: GameConfig, catalog: Arc<Catalog>) -> Result<Self> {
        let store = WorldStore::new(&config.saves_dir)
            .with_context(|| format!("opening saves dir {}", config.saves_dir.display()))?;
        Ok(Self {
            config,
            catalog,
            store,
            state: GameState::Menu,
            session: None,
            tick: SimTick::ZERO,
            held: BTreeSet::new(),
            rng: scoped_rng(0, 0, ACTION_RNG_SALT),
            recent: Vec::new(),
        })
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn tick_count(&self) -> SimTick {
        self.tick
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Load `name` if it has been saved, otherwise create it. A loaded
    /// world without a player file spawns a fresh player.
    ///
    /// A game already in progress is saved and closed first.
    #[instrument(skip(self))]
    pub fn start(&mut self, mode: GameMode, name: &str, seed: Option<u64>) -> Result<()> {
        validate_name(name)?;
        if self.session.is_some() {
            self.back_to_menu()?;
        }

        let settings = self.config.world.clone();
        let catalog = Arc::clone(&self.catalog);
        let (mut world, loaded) = if self.store.world_exists(name) {
            let snapshot = self
                .store
                .load_world(name)
                .with_context(|| format!("loading world `{name}`"))?;
            if seed.is_some_and(|seed| seed != snapshot.seed) {
                warn!(world = name, "Ignoring --seed for an existing world");
            }
            let world = World::from_snapshot(snapshot, catalog, settings)
                .with_context(|| format!("restoring world `{name}`"))?;
            (world, true)
        } else {
            let seed = seed.unwrap_or_else(rand::random);
            (World::new(seed, catalog, settings), false)
        };

        let mut player = match self.store.load_player(name) {
            Ok(snapshot) if loaded => Player::from_snapshot(&snapshot, &self.catalog),
            Ok(_) | Err(PersistError::NotFound(_)) => spawn_player(&mut world, mode, &self.catalog),
            Err(err) => {
                return Err(err).with_context(|| format!("loading player for `{name}`"));
            }
        };
        player.flight_mode = mode == GameMode::Creative;

        info!(world = name, seed = world.seed(), loaded, mode = mode.as_str(), "Game started");
        self.rng = scoped_rng(world.seed(), 0, ACTION_RNG_SALT);
        self.session = Some(Session {
            name: name.to_string(),
            mode,
            world,
            player,
        });
        self.state = GameState::Playing;
        self.tick = SimTick::ZERO;
        self.held.clear();
        self.recent.clear();
        Ok(())
    }

    /// Write the world and player files of the running game.
    pub fn save(&self) -> Result<()> {
        let Some(session) = &self.session else {
            bail!("no game in progress");
        };
        let snapshot = session.world.snapshot();
        self.store
            .save_world(&session.name, &snapshot)
            .with_context(|| format!("saving world `{}`", session.name))?;
        self.store
            .save_player(&session.name, &session.player.snapshot(&self.catalog))
            .with_context(|| format!("saving player for `{}`", session.name))?;
        Ok(())
    }

    /// Save and close the running game. On a failed save the game keeps
    /// running.
    pub fn back_to_menu(&mut self) -> Result<()> {
        if self.session.is_some() {
            self.save()?;
        }
        self.session = None;
        self.state = GameState::Menu;
        self.held.clear();
        self.recent.clear();
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state == GameState::Playing {
            self.state = GameState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == GameState::Paused {
            self.state = GameState::Playing;
        }
    }

    fn toggle_pause(&mut self) {
        match self.state {
            GameState::Playing => self.pause(),
            GameState::Paused => self.resume(),
            GameState::Menu => {}
        }
    }

    /// Saved world names, or the default name when nothing is saved yet.
    pub fn list_worlds(&self) -> Result<Vec<String>> {
        let mut worlds = self.store.list_worlds()?;
        if worlds.is_empty() {
            worlds.push(DEFAULT_WORLD_NAME.to_string());
        }
        Ok(worlds)
    }

    /// First unused name in `world`, `world_2`, `world_3`, ...
    pub fn next_world_name(&self) -> String {
        if !self.store.world_exists(DEFAULT_WORLD_NAME) {
            return DEFAULT_WORLD_NAME.to_string();
        }
        (2u32..)
            .map(|n| format!("{DEFAULT_WORLD_NAME}_{n}"))
            .find(|name| !self.store.world_exists(name))
            .unwrap_or_else(|| DEFAULT_WORLD_NAME.to_string())
    }

    fn camera_offset(&self) -> DVec2 {
        DVec2::from_array(self.config.view_size) / 2.0
    }

    /// Advance one tick.
    ///
    /// Newly pressed keys act once: Escape pauses or resumes, digits select
    /// a slot, F toggles flight in creative mode and Space jumps. Held keys
    /// steer the player. Mining and placing target the cursor.
    pub fn tick(&mut self, input: &impl InputSource, intent: Intent) -> Vec<ActionOutcome> {
        let pressed = input.pressed();
        let edges: Vec<Key> = pressed.difference(&self.held).copied().collect();
        self.held = pressed;

        if edges.contains(&Key::Escape) {
            self.toggle_pause();
        }
        if self.state != GameState::Playing {
            return Vec::new();
        }

        let offset = self.camera_offset();
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let player = &mut session.player;
        for key in &edges {
            match key {
                Key::Digit(_) => {
                    if let Some(slot) = key.hotbar_slot() {
                        player.selected_slot = slot;
                    }
                }
                Key::F if session.mode == GameMode::Creative => {
                    let flying = player.toggle_flight();
                    debug!(flying, "Flight toggled");
                }
                Key::Space => player.jump(),
                _ => {}
            }
        }
        if intent.scroll != 0 {
            let slot = player.selected_slot as i64 + intent.scroll as i64;
            player.selected_slot = slot.clamp(0, HOTBAR_SLOTS as i64 - 1) as usize;
        }

        let hexagons = session
            .world
            .nearby_hexagons(player.position, self.config.query_radius);
        player.update(input.movement(), &hexagons);
        let target = intent.cursor + player.position - offset;

        let mut outcomes = Vec::new();
        if intent.mining {
            outcomes.push(self.mine_at(target));
        }
        if intent.place {
            outcomes.push(self.place_at(target));
        }

        self.tick = self.tick.advance(1);
        let every = self.config.unload_every_ticks;
        if every > 0 && self.tick.0 % every == 0 {
            if let Some(session) = self.session.as_mut() {
                let max_resident = session.world.settings().max_resident_chunks;
                session
                    .world
                    .unload_distant_chunks(session.player.position, max_resident);
            }
        }

        self.recent = outcomes.clone();
        outcomes
    }

    /// Attack the organism under `target`, or mine the first opaque cell on
    /// the line from the player to `target`.
    pub fn mine_at(&mut self, target: DVec2) -> ActionOutcome {
        let Some(session) = self.session.as_mut() else {
            return ActionOutcome::Rejected(Rejection::NotPlaying);
        };
        let catalog = &self.catalog;
        let range = self.config.mining_range;
        let selected: Option<ItemKind> = session
            .player
            .selected_item(catalog.hotbar())
            .map(|item| catalog.item(item).kind);

        let organism = session
            .world
            .get_organism_at(target, ORGANISM_HIT_TOLERANCE)
            .map(|organism| organism.position());
        if let Some(position) = organism {
            if position.distance(session.player.position) > range {
                return ActionOutcome::Rejected(Rejection::OutOfRange);
            }
            let (tool, damage) =
                selected.map_or((ToolType::None, DEFAULT_ATTACK_DAMAGE), |kind| kind.attack());
            let Some(hit) = session
                .world
                .damage_organism_at(position, 0.0, tool, damage, &mut self.rng)
            else {
                return ActionOutcome::Missed;
            };
            if hit.killed {
                for (item, count) in &hit.drops {
                    session.player.add_to_inventory(*item, *count);
                }
            }
            return ActionOutcome::HitOrganism(hit);
        }

        let Some(ray) = session
            .world
            .raycast_to_block(session.player.position, target, range)
        else {
            return ActionOutcome::Missed;
        };
        let damage = selected.map_or(DEFAULT_BLOCK_DAMAGE, |kind| kind.block_damage());
        match session.world.damage_hexagon_at(ray.center, damage) {
            DamageOutcome::Destroyed(hexagon) => {
                let def = catalog.block(hexagon.block());
                let collected = def.drops.filter(|_| def.collectible);
                if let Some(item) = collected {
                    session.player.add_to_inventory(item, 1);
                }
                ActionOutcome::MinedBlock {
                    center: hexagon.center(),
                    block: hexagon.block(),
                    collected,
                }
            }
            DamageOutcome::Damaged { health } => ActionOutcome::DamagedBlock {
                center: ray.center,
                health,
            },
            DamageOutcome::Immune => ActionOutcome::Rejected(Rejection::Immune),
            DamageOutcome::Missing => ActionOutcome::Missed,
        }
    }

    /// Use the selected item at `target`: blocks fill the empty cell there,
    /// plantables grow an organism on top of an opaque cell. Survival mode
    /// spends one item per use.
    pub fn place_at(&mut self, target: DVec2) -> ActionOutcome {
        let Some(session) = self.session.as_mut() else {
            return ActionOutcome::Rejected(Rejection::NotPlaying);
        };
        let catalog = &self.catalog;
        let Some(selected) = session.player.selected_item(catalog.hotbar()) else {
            return ActionOutcome::Rejected(Rejection::NothingSelected);
        };
        let center = world_to_hex_center(target).center;
        let survival = session.mode == GameMode::Survival;

        match catalog.item(selected).kind {
            ItemKind::Tool { .. } => ActionOutcome::Rejected(Rejection::NotPlaceable),
            ItemKind::Plantable { organism } => {
                let below = target + DVec2::new(0.0, HEX_V_SPACING);
                let supported = session
                    .world
                    .get_hexagon_at(below)
                    .is_some_and(|hexagon| !hexagon.is_transparent());
                if !supported {
                    return ActionOutcome::Rejected(Rejection::Unsupported);
                }
                if session
                    .world
                    .get_organism_at(center, ORGANISM_HIT_TOLERANCE)
                    .is_some()
                {
                    return ActionOutcome::Rejected(Rejection::Occupied);
                }
                if survival && !session.player.remove_from_inventory(selected) {
                    return ActionOutcome::Rejected(Rejection::NoneLeft);
                }
                session.world.add_organism(center, organism);
                ActionOutcome::Planted { center, organism }
            }
            ItemKind::Block { places } => {
                let dist_sq = session.player.position.distance_squared(center);
                if dist_sq > self.config.mining_range.powi(2) {
                    return ActionOutcome::Rejected(Rejection::OutOfRange);
                }
                if dist_sq < (HEX_RADIUS + session.player.radius).powi(2) {
                    return ActionOutcome::Rejected(Rejection::TooClose);
                }
                if session.world.get_hexagon_at(center).is_some() {
                    return ActionOutcome::Rejected(Rejection::Occupied);
                }
                if survival && !session.player.remove_from_inventory(selected) {
                    return ActionOutcome::Rejected(Rejection::NoneLeft);
                }
                session.world.add_hexagon_at(center, places);
                ActionOutcome::PlacedBlock {
                    center,
                    block: places,
                }
            }
        }
    }

    /// Frame description for clients. Only resident chunks are reported;
    /// building the view never generates terrain.
    pub fn view(&self) -> Option<StateView> {
        let session = self.session.as_ref()?;
        let catalog = &self.catalog;
        let player = &session.player;
        let camera = player.position - self.camera_offset();
        let [width, height] = self.config.view_size;
        let on_screen = |p: DVec2, margin: f64| {
            let s = p - camera;
            s.x > -margin && s.x < width + margin && s.y > -margin && s.y < height + margin
        };

        let home = chunk_pos_of(player.position);
        let reach = self.config.render_distance;
        let mut hexagons = Vec::new();
        for cx in home.x - reach..=home.x + reach {
            for cy in home.y - reach..=home.y + reach {
                let Some(chunk) = session.world.chunk(ChunkPos::new(cx, cy)) else {
                    continue;
                };
                for hexagon in chunk.hexagons() {
                    if !on_screen(hexagon.center(), HEX_RADIUS) {
                        continue;
                    }
                    let def = catalog.block(hexagon.block());
                    hexagons.push(HexView {
                        x: hexagon.center().x,
                        y: hexagon.center().y,
                        block: def.key.clone(),
                        color: def.color.0,
                        health: hexagon.health(),
                        max_health: hexagon.max_health(),
                        transparent: hexagon.is_transparent(),
                    });
                }
            }
        }

        let organisms = session
            .world
            .get_nearby_organisms(player.position, self.config.organism_radius)
            .into_iter()
            .filter(|organism| on_screen(organism.position(), 100.0))
            .map(|organism| OrganismView {
                x: organism.position().x,
                y: organism.position().y,
                kind: catalog.organism(organism.kind()).key.clone(),
                health: organism.health(),
                max_health: organism.max_health(),
            })
            .collect();

        let hotbar = catalog
            .hotbar()
            .iter()
            .take(HOTBAR_SLOTS)
            .map(|item| SlotView {
                item: catalog.item(*item).key.clone(),
                count: player.count(*item),
            })
            .collect();

        Some(StateView {
            tick: self.tick.0,
            world: session.name.clone(),
            mode: session.mode,
            paused: self.state == GameState::Paused,
            camera: camera.to_array(),
            player: PlayerView {
                x: player.position.x,
                y: player.position.y,
                radius: player.radius,
                selected_slot: player.selected_slot,
                flight_mode: player.flight_mode,
                on_ground: player.on_ground,
            },
            hexagons,
            organisms,
            hotbar,
            events: self.recent.iter().map(|o| o.view(catalog)).collect(),
        })
    }
}

/// Place a new player on the ground above the spawn column, or at a safe
/// height when the column is open all the way down.
fn spawn_player(world: &mut World, mode: GameMode, catalog: &Catalog) -> Player {
    let y = world
        .find_surface(SPAWN_X, 0.0, CHUNK_HEIGHT, SPAWN_SCAN_STEP)
        .map_or(SPAWN_FALLBACK_Y, |surface| surface - SPAWN_CLEARANCE);
    let mut player = Player::new(DVec2::new(SPAWN_X, y));
    if mode == GameMode::Creative {
        for (_, def) in catalog.blocks() {
            let Some(item) = def.drops.filter(|_| def.collectible) else {
                continue;
            };
            let missing = CREATIVE_STOCK.saturating_sub(player.count(item));
            player.add_to_inventory(item, missing);
        }
    }
    player
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{KeySnapshot, NoInput};
    use std::fs;
    use tesselbox_testkit::unique_temp_dir;

    fn game(tag: &str) -> (Game, std::path::PathBuf) {
        let dir = unique_temp_dir(tag);
        let config = GameConfig {
            saves_dir: dir.clone(),
            ..GameConfig::default()
        };
        let game = Game::new(config, Arc::new(Catalog::builtin())).unwrap();
        (game, dir)
    }

    fn session(game: &mut Game) -> &mut Session {
        game.session_mut().expect("game in progress")
    }

    /// Clear a pocket of sky around the player and hover them there so
    /// actions are independent of terrain.
    fn float_in_sky(game: &mut Game) -> DVec2 {
        let session = session(game);
        let at = DVec2::new(0.0, -3000.0);
        session.player.position = at;
        session.player.flight_mode = true;
        at
    }

    #[test]
    fn start_spawns_above_ground() {
        let (mut game, dir) = game("game_spawn");
        game.start(GameMode::Survival, "alpha", Some(42)).unwrap();
        assert_eq!(game.state(), GameState::Playing);

        let session = session(&mut game);
        assert_eq!(session.player.position.x, SPAWN_X);
        assert!(!session.player.flight_mode);
        assert_eq!(session.player.inventory().count(), 0);
        let below = session.player.position + DVec2::new(0.0, SPAWN_CLEARANCE);
        assert!(session.world.get_hexagon_at(below).is_some());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn creative_grants_stock_and_flight() {
        let (mut game, dir) = game("game_creative");
        game.start(GameMode::Creative, "alpha", Some(1)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let player = &session(&mut game).player;
        assert!(player.flight_mode);
        assert_eq!(player.count(catalog.item_id("dirt")), CREATIVE_STOCK);
        assert_eq!(player.count(catalog.item_id("stone")), CREATIVE_STOCK);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn keys_act_on_press_not_hold() {
        let (mut game, dir) = game("game_keys");
        game.start(GameMode::Creative, "alpha", Some(1)).unwrap();

        let keys = KeySnapshot::new().with(Key::Digit(3)).with(Key::F);
        game.tick(&keys, Intent::default());
        assert_eq!(session(&mut game).player.selected_slot, 2);
        assert!(!session(&mut game).player.flight_mode);

        // Still held: no second toggle.
        game.tick(&keys, Intent::default());
        assert!(!session(&mut game).player.flight_mode);

        game.tick(&NoInput, Intent::default());
        game.tick(&KeySnapshot::new().with(Key::F), Intent::default());
        assert!(session(&mut game).player.flight_mode);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn survival_cannot_fly() {
        let (mut game, dir) = game("game_noflight");
        game.start(GameMode::Survival, "alpha", Some(1)).unwrap();
        game.tick(&KeySnapshot::new().with(Key::F), Intent::default());
        assert!(!session(&mut game).player.flight_mode);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn escape_pauses_and_resumes() {
        let (mut game, dir) = game("game_pause");
        game.start(GameMode::Survival, "alpha", Some(1)).unwrap();
        let escape = KeySnapshot::new().with(Key::Escape);

        game.tick(&escape, Intent::default());
        assert_eq!(game.state(), GameState::Paused);
        let frozen = session(&mut game).player.position;
        game.tick(&NoInput, Intent::default());
        assert_eq!(session(&mut game).player.position, frozen);

        game.tick(&escape, Intent::default());
        assert_eq!(game.state(), GameState::Playing);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn scroll_clamps_to_hotbar() {
        let (mut game, dir) = game("game_scroll");
        game.start(GameMode::Survival, "alpha", Some(1)).unwrap();
        let scroll = |n| Intent {
            scroll: n,
            ..Intent::default()
        };
        game.tick(&NoInput, scroll(-3));
        assert_eq!(session(&mut game).player.selected_slot, 0);
        game.tick(&NoInput, scroll(20));
        assert_eq!(session(&mut game).player.selected_slot, HOTBAR_SLOTS - 1);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mining_breaks_and_collects() {
        let (mut game, dir) = game("game_mine");
        game.start(GameMode::Survival, "alpha", Some(9)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let at = float_in_sky(&mut game);
        let cell = world_to_hex_center(at + DVec2::new(0.0, 90.0)).center;
        session(&mut game)
            .world
            .add_hexagon_at(cell, catalog.block_id("dirt"));

        let mut mined = None;
        for _ in 0..200 {
            match game.mine_at(cell) {
                ActionOutcome::DamagedBlock { .. } => {}
                outcome @ ActionOutcome::MinedBlock { .. } => {
                    mined = Some(outcome);
                    break;
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        let Some(ActionOutcome::MinedBlock { collected, .. }) = mined else {
            panic!("dirt never broke");
        };
        assert_eq!(collected, Some(catalog.item_id("dirt")));
        let session = session(&mut game);
        assert_eq!(session.player.count(catalog.item_id("dirt")), 1);
        assert!(session.world.get_hexagon_at(cell).is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mining_out_of_range_misses() {
        let (mut game, dir) = game("game_range");
        game.start(GameMode::Survival, "alpha", Some(9)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let at = float_in_sky(&mut game);
        let far = at + DVec2::new(400.0, 0.0);
        session(&mut game)
            .world
            .add_hexagon_at(far, catalog.block_id("stone"));
        assert_eq!(game.mine_at(far), ActionOutcome::Missed);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn axe_fells_trees_and_collects_drops() {
        let (mut game, dir) = game("game_axe");
        game.start(GameMode::Survival, "alpha", Some(5)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let at = float_in_sky(&mut game);
        let tree_at = at + DVec2::new(60.0, 0.0);
        let axe_slot = catalog
            .hotbar()
            .iter()
            .position(|item| *item == catalog.item_id("axe"))
            .unwrap();
        {
            let session = session(&mut game);
            session.world.add_organism(tree_at, catalog.organism_kind("tree"));
            session.player.selected_slot = axe_slot;
        }

        let mut killed = None;
        for _ in 0..100 {
            match game.mine_at(tree_at) {
                ActionOutcome::HitOrganism(hit) if hit.killed => {
                    killed = Some(hit);
                    break;
                }
                ActionOutcome::HitOrganism(_) => {}
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        let hit = killed.expect("tree survived");
        let session = session(&mut game);
        assert!(session.world.get_organism_at(tree_at, 1.0).is_none());
        for (item, count) in &hit.drops {
            assert!(session.player.count(*item) >= *count);
        }
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn placement_rules() {
        let (mut game, dir) = game("game_place");
        game.start(GameMode::Survival, "alpha", Some(3)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let at = float_in_sky(&mut game);
        let dirt = catalog.item_id("dirt");
        let spot = at + DVec2::new(90.0, 0.0);

        assert_eq!(
            game.place_at(spot),
            ActionOutcome::Rejected(Rejection::NoneLeft)
        );
        session(&mut game).player.add_to_inventory(dirt, 2);

        assert!(matches!(game.place_at(spot), ActionOutcome::PlacedBlock { .. }));
        assert_eq!(
            game.place_at(spot),
            ActionOutcome::Rejected(Rejection::Occupied)
        );
        assert_eq!(
            game.place_at(at),
            ActionOutcome::Rejected(Rejection::TooClose)
        );
        assert_eq!(
            game.place_at(at + DVec2::new(0.0, 400.0)),
            ActionOutcome::Rejected(Rejection::OutOfRange)
        );
        assert_eq!(session(&mut game).player.count(dirt), 1);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn saplings_need_ground() {
        let (mut game, dir) = game("game_sapling");
        game.start(GameMode::Creative, "alpha", Some(3)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let at = float_in_sky(&mut game);
        let sapling_slot = catalog
            .hotbar()
            .iter()
            .position(|item| *item == catalog.item_id("sapling"))
            .unwrap();
        session(&mut game).player.selected_slot = sapling_slot;

        let spot = world_to_hex_center(at + DVec2::new(90.0, 0.0)).center;
        assert_eq!(
            game.place_at(spot),
            ActionOutcome::Rejected(Rejection::Unsupported)
        );

        session(&mut game)
            .world
            .add_hexagon_at(spot + DVec2::new(0.0, HEX_V_SPACING), catalog.block_id("dirt"));
        assert!(matches!(game.place_at(spot), ActionOutcome::Planted { .. }));
        assert_eq!(
            game.place_at(spot),
            ActionOutcome::Rejected(Rejection::Occupied)
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn tools_are_not_placeable() {
        let (mut game, dir) = game("game_tool");
        game.start(GameMode::Creative, "alpha", Some(3)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let at = float_in_sky(&mut game);
        let axe_slot = catalog
            .hotbar()
            .iter()
            .position(|item| *item == catalog.item_id("axe"))
            .unwrap();
        session(&mut game).player.selected_slot = axe_slot;
        assert_eq!(
            game.place_at(at + DVec2::new(90.0, 0.0)),
            ActionOutcome::Rejected(Rejection::NotPlaceable)
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn menu_saves_and_start_reloads() {
        let (mut game, dir) = game("game_reload");
        game.start(GameMode::Survival, "alpha", Some(77)).unwrap();
        let catalog = Arc::clone(game.catalog());
        let at = float_in_sky(&mut game);
        let spot = at + DVec2::new(90.0, 0.0);
        let placed = {
            let session = session(&mut game);
            session.player.add_to_inventory(catalog.item_id("stone"), 5);
            session.player.selected_slot = 2;
            session.world.add_hexagon_at(spot, catalog.block_id("brick"));
            session.player.position
        };

        game.back_to_menu().unwrap();
        assert_eq!(game.state(), GameState::Menu);
        assert!(game.session().is_none());
        assert_eq!(game.list_worlds().unwrap(), vec!["alpha".to_string()]);

        game.start(GameMode::Survival, "alpha", None).unwrap();
        let session = session(&mut game);
        assert_eq!(session.world.seed(), 77);
        assert_eq!(session.player.position, placed);
        assert_eq!(session.player.selected_slot, 2);
        assert_eq!(session.player.count(catalog.item_id("stone")), 5);
        assert_eq!(
            session.world.get_hexagon_at(spot).map(|h| h.block()),
            Some(catalog.block_id("brick"))
        );
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn world_names() {
        let (mut game, dir) = game("game_names");
        assert_eq!(game.list_worlds().unwrap(), vec![DEFAULT_WORLD_NAME.to_string()]);
        assert_eq!(game.next_world_name(), "world");
        game.start(GameMode::Survival, "world", Some(1)).unwrap();
        game.save().unwrap();
        assert_eq!(game.next_world_name(), "world_2");
        assert!(game.start(GameMode::Survival, "../escape", None).is_err());
        assert_eq!(game.state(), GameState::Playing);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn view_reports_resident_cells_only() {
        let (mut game, dir) = game("game_view");
        assert!(game.view().is_none());
        game.start(GameMode::Survival, "alpha", Some(11)).unwrap();
        game.tick(&NoInput, Intent::default());

        let view = game.view().unwrap();
        assert_eq!(view.tick, 1);
        assert_eq!(view.hotbar.len(), HOTBAR_SLOTS);
        assert_eq!(view.camera[0], view.player.x - 640.0);
        assert!(!view.hexagons.is_empty());
        assert!(view
            .hexagons
            .iter()
            .all(|h| h.x - view.camera[0] > -HEX_RADIUS && h.x - view.camera[0] < 1280.0 + HEX_RADIUS));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["mode"], "survival");
        fs::remove_dir_all(&dir).ok();
    }
}
