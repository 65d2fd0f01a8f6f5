//! Noise generation utilities for terrain generation.
//!
//! Every terrain channel is a multi-octave Perlin sample normalized to
//! [-1, 1]. Channels differ by frequency, octave shape, a coordinate offset
//! and a seed offset from the world seed.

use ::noise::{NoiseFn, Perlin};

/// Noise channel used by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseLayer {
    /// Temperature for biome assignment
    Temperature,
    /// Humidity for biome assignment
    Humidity,
    /// Continental height for biome assignment
    Height,
    /// Rolling surface shape
    Surface,
    /// Fine surface detail
    SurfaceDetail,
    /// Ore veins below the surface
    Ore,
    /// Tree placement gate
    Trees,
}

/// Configuration for multi-octave noise generation.
#[derive(Debug, Clone)]
pub struct NoiseConfig {
    /// Number of octaves (layers of detail)
    pub octaves: u32,
    /// Frequency multiplier between octaves
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves (persistence)
    pub persistence: f64,
    /// Base frequency (scale)
    pub frequency: f64,
    /// Added to x before scaling so channels decorrelate
    pub offset: f64,
    /// Seed for deterministic generation
    pub seed: u32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            frequency: 1.0,
            offset: 0.0,
            seed: 0,
        }
    }
}

impl NoiseConfig {
    /// Preset for `layer` derived from the world seed.
    pub fn for_layer(layer: NoiseLayer, seed: u32) -> Self {
        match layer {
            NoiseLayer::Temperature => Self::temperature(seed),
            NoiseLayer::Humidity => Self::humidity(seed),
            NoiseLayer::Height => Self::height(seed),
            NoiseLayer::Surface => Self::surface(seed),
            NoiseLayer::SurfaceDetail => Self::surface_detail(seed),
            NoiseLayer::Ore => Self::ore(seed),
            NoiseLayer::Trees => Self::trees(seed),
        }
    }

    /// Temperature channel (scale 400).
    pub fn temperature(seed: u32) -> Self {
        Self {
            octaves: 3,
            frequency: 1.0 / 400.0,
            seed,
            ..Default::default()
        }
    }

    /// Humidity channel (scale 350, shifted by 1000).
    pub fn humidity(seed: u32) -> Self {
        Self {
            octaves: 3,
            frequency: 1.0 / 350.0,
            offset: 1000.0,
            seed: seed.wrapping_add(1),
            ..Default::default()
        }
    }

    /// Height channel (scale 200, shifted by 2000).
    pub fn height(seed: u32) -> Self {
        Self {
            octaves: 5,
            lacunarity: 1.8,
            persistence: 0.6,
            frequency: 1.0 / 200.0,
            offset: 2000.0,
            seed: seed.wrapping_add(2),
        }
    }

    /// Rolling surface shape (scale 100).
    pub fn surface(seed: u32) -> Self {
        Self {
            octaves: 4,
            frequency: 1.0 / 100.0,
            seed: seed.wrapping_add(3),
            ..Default::default()
        }
    }

    /// Single-octave surface detail.
    pub fn surface_detail(seed: u32) -> Self {
        Self {
            octaves: 1,
            frequency: 0.1,
            seed: seed.wrapping_add(4),
            ..Default::default()
        }
    }

    /// Ore veins, sampled in 3D over (x, y, depth).
    pub fn ore(seed: u32) -> Self {
        Self {
            octaves: 3,
            frequency: 1.0 / 50.0,
            seed: seed.wrapping_add(3),
            ..Default::default()
        }
    }

    /// Tree gate (scale 20).
    pub fn trees(seed: u32) -> Self {
        Self {
            octaves: 2,
            frequency: 1.0 / 20.0,
            seed: seed.wrapping_add(5),
            ..Default::default()
        }
    }
}

/// Noise generator using Perlin noise.
#[derive(Clone)]
pub struct NoiseGenerator {
    perlin: Perlin,
    config: NoiseConfig,
}

impl NoiseGenerator {
    /// Create a new noise generator with the given configuration.
    pub fn new(config: NoiseConfig) -> Self {
        Self {
            perlin: Perlin::new(config.seed),
            config,
        }
    }

    /// Generate noise value at 2D coordinates with multi-octave sampling.
    ///
    /// Returns value in range [-1.0, 1.0].
    pub fn sample_2d(&self, x: f64, y: f64) -> f64 {
        let x = x + self.config.offset;
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.frequency;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            value += self.perlin.get([x * frequency, y * frequency]) * amplitude;
            max_value += amplitude;

            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }

        value / max_value
    }

    /// Generate noise value at 3D coordinates with multi-octave sampling.
    ///
    /// Returns value in range [-1.0, 1.0].
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let x = x + self.config.offset;
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.config.frequency;
        let mut max_value = 0.0;

        for _ in 0..self.config.octaves {
            value += self
                .perlin
                .get([x * frequency, y * frequency, z * frequency])
                * amplitude;
            max_value += amplitude;

            amplitude *= self.config.persistence;
            frequency *= self.config.lacunarity;
        }

        value / max_value
    }

    /// Sample 2D noise mapped to [0, 1].
    pub fn sample_2d_unit(&self, x: f64, y: f64) -> f64 {
        self.sample_2d_range(x, y, 0.0, 1.0)
    }

    /// Sample noise and map to a specific range.
    pub fn sample_2d_range(&self, x: f64, y: f64, min: f64, max: f64) -> f64 {
        let noise = self.sample_2d(x, y);
        ((noise + 1.0) * 0.5 * (max - min) + min).clamp(min.min(max), max.max(min))
    }
}
