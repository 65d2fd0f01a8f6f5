//! World and player persistence.
//!
//! A world file is a 14-byte header (magic, version, CRC32 of the payload,
//! payload length) followed by a zstd-compressed bincode [`WorldSnapshot`].
//! Only modified chunks are stored; everything else regenerates from the
//! seed. Player state is a small pretty-printed JSON file next to it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::hex::{chunk_pos_of, world_to_hex_center, ChunkPos, LocalCoord};
use crate::hexagon::Hexagon;

/// Magic number for world files ("TSBX").
const WORLD_MAGIC: u32 = u32::from_be_bytes(*b"TSBX");

/// Current world file format version.
const WORLD_VERSION: u16 = 1;

/// Encoded header length in bytes.
const HEADER_LEN: usize = 14;

/// Distance in pixels a stored center may sit from its lattice center.
const CENTER_TOLERANCE: f64 = 1e-6;

/// zstd level for world payloads.
const COMPRESSION_LEVEL: i32 = 3;

const WORLD_EXTENSION: &str = "world";
const PLAYER_PREFIX: &str = "player_";

/// Errors emitted while saving or loading.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("failed to access {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// No save with that name exists.
    #[error("no saved world named '{0}'")]
    NotFound(String),
    /// World names are plain file stems.
    #[error("invalid world name '{0}'")]
    InvalidName(String),
    /// The header is missing or malformed.
    #[error("invalid world header: {0}")]
    Header(String),
    /// The payload does not match its checksum.
    #[error("CRC32 mismatch: expected {expected:08X}, got {actual:08X}")]
    Checksum {
        /// CRC stored in the header.
        expected: u32,
        /// CRC of the bytes on disk.
        actual: u32,
    },
    /// zstd failed.
    #[error("failed to (de)compress world payload: {0}")]
    Compression(#[source] std::io::Error),
    /// bincode failed.
    #[error("failed to (de)serialize world payload: {0}")]
    Codec(#[from] bincode::Error),
    /// The payload decoded but describes an impossible world.
    #[error("invalid world snapshot: {0}")]
    Invalid(String),
    /// Player JSON failed.
    #[error("failed to (de)serialize player state: {0}")]
    Json(#[from] serde_json::Error),
}

/// One persisted hex cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HexRecord {
    /// Exact center x.
    pub x: f64,
    /// Exact center y.
    pub y: f64,
    /// Catalog key of the block.
    pub block: String,
    /// Current health.
    pub health: f64,
}

/// One persisted organism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganismRecord {
    /// Exact position x.
    pub x: f64,
    /// Exact position y.
    pub y: f64,
    /// Catalog key of the organism.
    pub kind: String,
    /// Current health.
    pub health: f64,
    /// Health at spawn.
    pub max_health: f64,
}

/// Everything needed to restore an edited chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk coordinate.
    pub position: ChunkPos,
    /// Occupied cells.
    pub hexagons: Vec<HexRecord>,
    /// Organisms standing in the chunk.
    pub organisms: Vec<OrganismRecord>,
}

/// Whole-world save state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Generation seed.
    pub seed: u64,
    /// Modified chunks, ordered by position.
    pub chunks: Vec<ChunkRecord>,
}

impl WorldSnapshot {
    /// Check every record before anything is restored from it.
    ///
    /// Each cell must sit on a lattice center inside its own chunk, one per
    /// slot, with health in `(0, MAX_HEALTH]`. Organisms must stand inside
    /// their chunk with health in `(0, max_health]`. Chunks appear once.
    pub fn validate(&self) -> Result<(), PersistError> {
        let mut positions = BTreeSet::new();
        for record in &self.chunks {
            let chunk = record.position;
            if !positions.insert(chunk) {
                return Err(invalid(chunk, "chunk is stored twice"));
            }

            let mut slots = BTreeSet::new();
            for hex in &record.hexagons {
                let at = DVec2::new(hex.x, hex.y);
                if !at.is_finite() {
                    return Err(invalid(chunk, "cell position is not finite"));
                }
                if world_to_hex_center(at).center.distance(at) > CENTER_TOLERANCE {
                    return Err(invalid(chunk, format!("({}, {}) is not a cell center", hex.x, hex.y)));
                }
                if chunk_pos_of(at) != chunk {
                    return Err(invalid(chunk, format!("cell ({}, {}) lies in another chunk", hex.x, hex.y)));
                }
                let slot = LocalCoord::from_world(chunk, at);
                if !slot.in_bounds() {
                    return Err(invalid(chunk, format!("{slot:?} is outside the chunk")));
                }
                if !slots.insert(slot) {
                    return Err(invalid(chunk, format!("{slot:?} is stored twice")));
                }
                if !(hex.health.is_finite() && hex.health > 0.0 && hex.health <= Hexagon::MAX_HEALTH) {
                    return Err(invalid(chunk, format!("cell health {} out of range", hex.health)));
                }
            }

            for organism in &record.organisms {
                let at = DVec2::new(organism.x, organism.y);
                if !at.is_finite() || chunk_pos_of(at) != chunk {
                    return Err(invalid(
                        chunk,
                        format!("organism at ({}, {}) lies outside the chunk", organism.x, organism.y),
                    ));
                }
                let max = organism.max_health;
                if !(max.is_finite() && max > 0.0) {
                    return Err(invalid(chunk, format!("organism max health {max} out of range")));
                }
                if !(organism.health.is_finite() && organism.health > 0.0 && organism.health <= max) {
                    return Err(invalid(
                        chunk,
                        format!("organism health {} out of range", organism.health),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn invalid(chunk: ChunkPos, what: impl Display) -> PersistError {
    PersistError::Invalid(format!("chunk ({}, {}): {what}", chunk.x, chunk.y))
}

/// Player save state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Position `[x, y]`.
    pub position: [f64; 2],
    /// Item key to count.
    pub inventory: BTreeMap<String, u32>,
    /// Selected hotbar slot.
    #[serde(default)]
    pub selected_slot: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct WorldHeader {
    magic: u32,
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl WorldHeader {
    fn new(crc32: u32, payload_len: u32) -> Self {
        Self {
            magic: WORLD_MAGIC,
            version: WORLD_VERSION,
            crc32,
            payload_len,
        }
    }

    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[10..14].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, PersistError> {
        if bytes.len() < HEADER_LEN {
            return Err(PersistError::Header(format!(
                "expected {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != WORLD_MAGIC {
            return Err(PersistError::Header(format!(
                "bad magic 0x{magic:08X}, expected 0x{WORLD_MAGIC:08X}"
            )));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != WORLD_VERSION {
            return Err(PersistError::Header(format!(
                "unsupported version {version}"
            )));
        }
        let crc32 = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let payload_len = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);

        Ok(Self {
            magic,
            version,
            crc32,
            payload_len,
        })
    }
}

fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Encode a snapshot into the on-disk world format.
pub fn encode_snapshot(snapshot: &WorldSnapshot) -> Result<Vec<u8>, PersistError> {
    let serialized = bincode::serialize(snapshot)?;
    let compressed =
        zstd::encode_all(&serialized[..], COMPRESSION_LEVEL).map_err(PersistError::Compression)?;
    let payload_len = u32::try_from(compressed.len())
        .map_err(|_| PersistError::Header("payload exceeds 4 GiB".to_string()))?;

    let header = WorldHeader::new(checksum(&compressed), payload_len);
    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// Decode the on-disk world format. Nothing is returned unless the whole
/// snapshot verified, decoded and passed [`WorldSnapshot::validate`].
pub fn decode_snapshot(bytes: &[u8]) -> Result<WorldSnapshot, PersistError> {
    let header = WorldHeader::from_bytes(bytes)?;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != header.payload_len as usize {
        return Err(PersistError::Header(format!(
            "payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }

    let actual = checksum(payload);
    if actual != header.crc32 {
        return Err(PersistError::Checksum {
            expected: header.crc32,
            actual,
        });
    }

    let decompressed = zstd::decode_all(payload).map_err(PersistError::Compression)?;
    let snapshot: WorldSnapshot = bincode::deserialize(&decompressed)?;
    snapshot.validate()?;
    Ok(snapshot)
}

/// Save directory holding `<name>.world` and `player_<name>.json` files.
#[derive(Debug, Clone)]
pub struct WorldStore {
    dir: PathBuf,
}

impl WorldStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PersistError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| PersistError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the world file for `name`.
    pub fn world_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{WORLD_EXTENSION}"))
    }

    /// Path of the player file for `name`.
    pub fn player_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{PLAYER_PREFIX}{name}.json"))
    }

    /// Whether a world file exists for `name`.
    pub fn world_exists(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.world_path(name).is_file()
    }

    /// Write `snapshot` as world `name`.
    pub fn save_world(&self, name: &str, snapshot: &WorldSnapshot) -> Result<(), PersistError> {
        validate_name(name)?;
        let bytes = encode_snapshot(snapshot)?;
        write_atomic(&self.world_path(name), &bytes)?;
        info!(
            world = name,
            chunks = snapshot.chunks.len(),
            bytes = bytes.len(),
            "Saved world"
        );
        Ok(())
    }

    /// Read world `name`.
    pub fn load_world(&self, name: &str) -> Result<WorldSnapshot, PersistError> {
        validate_name(name)?;
        let path = self.world_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::NotFound(name.to_string()))
            }
            Err(source) => return Err(PersistError::Io { path, source }),
        };
        let snapshot = decode_snapshot(&bytes)?;
        info!(world = name, chunks = snapshot.chunks.len(), "Loaded world");
        Ok(snapshot)
    }

    /// Write the player file for world `name`.
    pub fn save_player(&self, name: &str, player: &PlayerSnapshot) -> Result<(), PersistError> {
        validate_name(name)?;
        let json = serde_json::to_vec_pretty(player)?;
        write_atomic(&self.player_path(name), &json)?;
        debug!(world = name, "Saved player");
        Ok(())
    }

    /// Read the player file for world `name`.
    pub fn load_player(&self, name: &str) -> Result<PlayerSnapshot, PersistError> {
        validate_name(name)?;
        let path = self.player_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::NotFound(name.to_string()))
            }
            Err(source) => return Err(PersistError::Io { path, source }),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Names of saved worlds, sorted.
    pub fn list_worlds(&self) -> Result<Vec<String>, PersistError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| PersistError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == WORLD_EXTENSION))
            .filter_map(|path| path.file_stem()?.to_str().map(str::to_owned))
            .filter(|name| validate_name(name).is_ok())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// World names are file stems: ASCII alphanumerics, `_` and `-`, up to 64
/// characters, and never the player-file prefix.
pub fn validate_name(name: &str) -> Result<(), PersistError> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && !name.starts_with(PLAYER_PREFIX)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(PersistError::InvalidName(name.to_string()))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|source| PersistError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_store(tag: &str) -> (WorldStore, PathBuf) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = env::temp_dir().join(format!("tesselbox_test_{tag}_{timestamp}"));
        (WorldStore::new(&dir).unwrap(), dir)
    }

    fn sample_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            seed: 42,
            chunks: vec![ChunkRecord {
                position: ChunkPos::new(-1, 0),
                hexagons: vec![HexRecord {
                    x: -25.98,
                    y: 540.0,
                    block: "stone".to_string(),
                    health: 60.0,
                }],
                organisms: vec![OrganismRecord {
                    x: -77.9,
                    y: 495.0,
                    kind: "tree".to_string(),
                    health: 40.0,
                    max_health: 100.0,
                }],
            }],
        }
    }

    #[test]
    fn world_header_roundtrip() {
        let header = WorldHeader::new(0xDEADBEEF, 1234);
        let decoded = WorldHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(&header.to_bytes()[0..4], &WORLD_MAGIC.to_le_bytes());
    }

    #[test]
    fn snapshot_survives_encoding() {
        let snapshot = sample_snapshot();
        let bytes = encode_snapshot(&snapshot).unwrap();
        assert_eq!(decode_snapshot(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn corrupt_payload_is_rejected() {
        let mut bytes = encode_snapshot(&sample_snapshot()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            decode_snapshot(&bytes),
            Err(PersistError::Checksum { .. })
        ));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let bytes = encode_snapshot(&sample_snapshot()).unwrap();
        assert!(matches!(
            decode_snapshot(&bytes[..bytes.len() - 3]),
            Err(PersistError::Header(_))
        ));
        assert!(matches!(
            decode_snapshot(&bytes[..5]),
            Err(PersistError::Header(_))
        ));
    }

    #[test]
    fn save_load_and_list() {
        let (store, dir) = temp_store("store");
        store.save_world("alpha", &sample_snapshot()).unwrap();
        store.save_world("beta", &sample_snapshot()).unwrap();
        store
            .save_player(
                "alpha",
                &PlayerSnapshot {
                    position: [640.0, 420.0],
                    inventory: BTreeMap::from([("dirt".to_string(), 3)]),
                    selected_slot: 2,
                },
            )
            .unwrap();

        assert_eq!(store.load_world("alpha").unwrap(), sample_snapshot());
        assert_eq!(store.load_player("alpha").unwrap().selected_slot, 2);
        assert_eq!(store.list_worlds().unwrap(), vec!["alpha", "beta"]);
        assert!(matches!(
            store.load_world("gamma"),
            Err(PersistError::NotFound(_))
        ));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn names_cannot_escape_the_directory() {
        let (store, dir) = temp_store("names");
        assert!(matches!(
            store.save_world("../evil", &sample_snapshot()),
            Err(PersistError::InvalidName(_))
        ));
        assert!(matches!(
            store.load_world("player_x"),
            Err(PersistError::InvalidName(_))
        ));
        fs::remove_dir_all(&dir).ok();
    }
}
