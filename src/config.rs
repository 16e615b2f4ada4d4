// Configuration - load settings from config.toml
//
// Provides sensible defaults if the config file is missing or has errors.
// Everything here is cosmetic or environmental; the Vulkan setup itself
// (formats, present modes, feature toggles) is negotiated at runtime.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Triangle".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub clear_color: [f32; 4],
    pub shader_path: String,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            shader_path: "shaders/triangle.spv".to_string(),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);

        Ok(config)
    }

    /// Whether to request the validation layer. Validation is only ever
    /// enabled in debug builds, and can be switched off there via config.
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.debug.validation_layers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tutorial_window() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: Config = toml::from_str(
            r#"
            [window]
            title = "custom"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.title, "custom");
        assert_eq!(config.window.width, 800);
        assert!(config.debug.validation_layers);
        assert_eq!(config.graphics.shader_path, "shaders/triangle.spv");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from_path("does-not-exist.toml").unwrap();
        assert_eq!(config.window.height, 600);
    }
}
