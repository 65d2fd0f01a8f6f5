#![warn(missing_docs)]
//! Chunked hexagonal world: lattice geometry, terrain generation, chunk
//! residency, organisms and persistence.

mod biome;
mod chunk;
mod hex;
mod hexagon;
mod noise;
mod organism;
mod persist;
mod settings;
mod storage;
mod terrain;
mod world;

pub use biome::*;
pub use chunk::*;
pub use hex::*;
pub use hexagon::*;
pub use self::noise::*;
pub use organism::*;
pub use persist::*;
pub use settings::*;
pub use storage::*;
pub use terrain::*;
pub use world::*;
