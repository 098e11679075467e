//! Engine configuration loaded from JSON

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::{Result, UVec3, Vec3};

/// Top-level engine configuration
///
/// Every field has a default, so a config file only needs to list the
/// values it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial render width in pixels
    pub window_width: u32,
    /// Initial render height in pixels
    pub window_height: u32,
    /// Title handed to the windowing layer
    pub window_title: String,
    /// Full-resolution size of the global occupancy grid (each axis even)
    pub world_dimensions: [u32; 3],
    /// World-space sun position used by the lighting pass
    pub sun_position: [f32; 3],
    /// Default log filter, overridden by RUST_LOG
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            window_title: "voxlume".to_string(),
            world_dimensions: [512, 128, 512],
            sun_position: [100_000.0, 300_000.0, 100_000.0],
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Write the config as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn world_dimensions(&self) -> UVec3 {
        UVec3::from_array(self.world_dimensions)
    }

    pub fn sun_position(&self) -> Vec3 {
        Vec3::from_array(self.sun_position)
    }
}
