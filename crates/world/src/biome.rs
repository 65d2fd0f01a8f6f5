//! Biome classification.
//!
//! Three independent noise channels (temperature, humidity, height) are
//! sampled per column and run through a fixed decision table.

use tesselbox_core::Biome;

use crate::noise::{NoiseConfig, NoiseGenerator};

/// Normalized climate channels at a column, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    /// 0 = cold, 1 = hot.
    pub temperature: f64,
    /// 0 = dry, 1 = wet.
    pub humidity: f64,
    /// 0 = sea floor, 1 = peaks.
    pub height: f64,
}

/// Decision table mapping a climate sample to a biome.
///
/// | height  | temperature | humidity | biome           |
/// |---------|-------------|----------|-----------------|
/// | < 0.1   |             |          | DeepOcean       |
/// | < 0.2   |             |          | Ocean           |
/// | < 0.25  |             |          | Beach           |
/// | > 0.8   | < 0.3       |          | SnowyMountains  |
/// | > 0.8   | >= 0.3      |          | Mountain        |
/// |         | < 0.2       | > 0.7    | Taiga           |
/// |         | < 0.2       | <= 0.7   | SnowyTundra     |
/// |         | < 0.4       | > 0.7    | Forest          |
/// |         | < 0.4       | <= 0.7   | Plains          |
/// |         | < 0.6       | > 0.7    | Swamp           |
/// |         | < 0.6       | <= 0.7   | Plains          |
/// |         | < 0.8       | > 0.7    | Jungle          |
/// |         | < 0.8       | <= 0.7   | Savanna         |
/// |         | >= 0.8      | > 0.5    | Badlands        |
/// |         | >= 0.8      | <= 0.5   | Desert          |
pub fn select_biome(climate: Climate) -> Biome {
    let Climate {
        temperature: t,
        humidity: h,
        height,
    } = climate;

    if height < 0.1 {
        return Biome::DeepOcean;
    }
    if height < 0.2 {
        return Biome::Ocean;
    }
    if height < 0.25 {
        return Biome::Beach;
    }
    if height > 0.8 {
        return if t < 0.3 {
            Biome::SnowyMountains
        } else {
            Biome::Mountain
        };
    }

    match (t, h > 0.7) {
        (t, true) if t < 0.2 => Biome::Taiga,
        (t, false) if t < 0.2 => Biome::SnowyTundra,
        (t, true) if t < 0.4 => Biome::Forest,
        (t, false) if t < 0.4 => Biome::Plains,
        (t, true) if t < 0.6 => Biome::Swamp,
        (t, false) if t < 0.6 => Biome::Plains,
        (t, true) if t < 0.8 => Biome::Jungle,
        (t, false) if t < 0.8 => Biome::Savanna,
        _ if h > 0.5 => Biome::Badlands,
        _ => Biome::Desert,
    }
}

/// Seeded classifier from world coordinates to biome.
#[derive(Clone)]
pub struct BiomeClassifier {
    temperature: NoiseGenerator,
    humidity: NoiseGenerator,
    height: NoiseGenerator,
}

impl BiomeClassifier {
    /// Create a classifier from the world seed.
    pub fn new(world_seed: u64) -> Self {
        let seed = world_seed as u32;
        Self {
            temperature: NoiseGenerator::new(NoiseConfig::temperature(seed)),
            humidity: NoiseGenerator::new(NoiseConfig::humidity(seed)),
            height: NoiseGenerator::new(NoiseConfig::height(seed)),
        }
    }

    /// Sample all three channels at `(x, z)`.
    pub fn climate(&self, x: f64, z: f64) -> Climate {
        Climate {
            temperature: self.temperature.sample_2d_unit(x, z),
            humidity: self.humidity.sample_2d_unit(x, z),
            height: self.height.sample_2d_unit(x, z),
        }
    }

    /// Biome at `(x, z)`.
    pub fn classify(&self, x: f64, z: f64) -> Biome {
        select_biome(self.climate(x, z))
    }
}
