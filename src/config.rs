use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tesselbox_core::Catalog;
use tesselbox_world::WorldSettings;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/tesselbox.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GameConfig {
    /// Directory holding `<name>.world` and `player_<name>.json` files.
    pub saves_dir: PathBuf,
    /// Catalog JSON replacing the built-in content.
    pub catalog_path: Option<PathBuf>,
    /// Reach for mining, attacking and placing, in pixels.
    pub mining_range: f64,
    /// Radius of the hexagon query the player collides against.
    pub query_radius: f64,
    /// Radius of the organism query reported to clients.
    pub organism_radius: f64,
    /// Ticks between eviction passes.
    pub unload_every_ticks: u64,
    /// Chunk radius reported to clients around the player.
    pub render_distance: i32,
    /// Viewport size; the camera keeps the player centred in it.
    pub view_size: [f64; 2],
    pub bridge_addr: String,
    pub world: WorldSettings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            saves_dir: PathBuf::from("saves"),
            catalog_path: None,
            mining_range: 150.0,
            query_radius: 500.0,
            organism_radius: 600.0,
            unload_every_ticks: 60,
            render_distance: 4,
            view_size: [1280.0, 720.0],
            bridge_addr: "127.0.0.1:9999".to_string(),
            world: WorldSettings::default(),
        }
    }
}

impl GameConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<GameConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    GameConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    info!("Config not found at {}. Using defaults", path.display());
                }
                GameConfig::default()
            }
        }
    }

    /// The configured catalog, or the built-in one.
    ///
    /// A configured catalog that fails to load is an error rather than a
    /// silent fallback: saves refer to blocks by key.
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::load_from_path(path)
                .with_context(|| format!("loading catalog {}", path.display())),
            None => Ok(Catalog::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tesselbox_testkit::unique_temp_dir;

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: GameConfig = toml::from_str(
            r#"
            mining_range = 200.0

            [world]
            max_resident_chunks = 12
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mining_range, 200.0);
        assert_eq!(cfg.query_radius, 500.0);
        assert_eq!(cfg.world.max_resident_chunks, 12);
        assert_eq!(cfg.world.base_ground_y, 500.0);
    }

    #[test]
    fn unreadable_or_invalid_files_fall_back() {
        let dir = unique_temp_dir("config");
        fs::create_dir_all(&dir).unwrap();
        assert_eq!(
            GameConfig::load_from_path(&dir.join("missing.toml")),
            GameConfig::default()
        );

        let broken = dir.join("broken.toml");
        fs::write(&broken, "mining_range = \"far\"").unwrap();
        assert_eq!(GameConfig::load_from_path(&broken), GameConfig::default());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn written_config_loads_back() {
        let dir = unique_temp_dir("config_write");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tesselbox.toml");
        let cfg = GameConfig {
            unload_every_ticks: 5,
            catalog_path: Some(PathBuf::from("content/catalog.json")),
            ..GameConfig::default()
        };
        fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();
        assert_eq!(GameConfig::load_from_path(&path), cfg);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_catalog_file_is_an_error() {
        let cfg = GameConfig {
            catalog_path: Some(unique_temp_dir("no_catalog").join("catalog.json")),
            ..GameConfig::default()
        };
        assert!(cfg.load_catalog().is_err());
        assert!(GameConfig::default().load_catalog().is_ok());
    }
}
