//! Tunables for world generation and residency.

use serde::{Deserialize, Serialize};

/// World-level settings, loadable from the game config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Average ground line in pixels (y grows downward).
    pub base_ground_y: f64,
    /// Pixel scale applied to the surface noise.
    pub surface_amplitude: f64,
    /// Resident chunk count kept by periodic eviction.
    pub max_resident_chunks: usize,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            base_ground_y: 500.0,
            surface_amplitude: 60.0,
            max_resident_chunks: 50,
        }
    }
}
