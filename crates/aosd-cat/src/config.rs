//! aosd-cat configuration
//!
//! Loads `~/.config/aosd/aosd-cat.toml`, writing the defaults there on first run.
//! Every section is optional; missing keys keep their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub appearance: AppearanceConfig,
    pub colors: ColorConfig,
    pub placement: PlacementConfig,
    pub timing: TimingConfig,
    pub scrollback: ScrollbackConfig,
}

impl Config {
    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, creating it with the defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            if let Err(e) = Self::save_default(path) {
                warn!("Failed to create default config file: {:#}", e);
            }
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        info!("Configuration loaded from {:?}", path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("aosd");
        Ok(config_dir.join("aosd-cat.toml"))
    }

    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;
        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Transparency as spelled in the config file and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransparencyMode {
    None,
    Fake,
    #[default]
    Composite,
}

impl From<TransparencyMode> for aosd::Transparency {
    fn from(mode: TransparencyMode) -> Self {
        match mode {
            TransparencyMode::None => aosd::Transparency::None,
            TransparencyMode::Fake => aosd::Transparency::Fake,
            TransparencyMode::Composite => aosd::Transparency::Composite,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    pub font_family: String,
    /// Font size in pixels
    pub font_size: f32,
    /// Wrap lines wider than this many pixels (0 = never wrap)
    pub wrap_width: u32,
    /// Margin between the window edge and the text
    pub padding: u32,
    pub transparency: TransparencyMode,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            font_family: "Sans".to_string(),
            font_size: 24.0,
            wrap_width: 0,
            padding: 4,
            transparency: TransparencyMode::Composite,
        }
    }
}

/// Colours are `#rrggbb` or a CSS colour name, opacities 0-255.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub fore: String,
    pub fore_opacity: u8,
    pub shadow: String,
    pub shadow_opacity: u8,
    pub back: String,
    pub back_opacity: u8,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            fore: "green".to_string(),
            fore_opacity: 255,
            shadow: "black".to_string(),
            shadow_opacity: 192,
            back: "black".to_string(),
            back_opacity: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// 0 is the top-left corner, 8 the bottom-right
    pub position: u8,
    pub x_offset: i32,
    pub y_offset: i32,
    pub shadow_offset: i32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            position: 6,
            x_offset: 50,
            y_offset: -50,
            shadow_offset: 2,
        }
    }
}

/// Durations in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub fade_in: u32,
    pub fade_full: u32,
    pub fade_out: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fade_in: 300,
            fade_full: 3000,
            fade_out: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollbackConfig {
    /// Lines shown at once
    pub lines: usize,
    /// Drop lines older than this many milliseconds (0 = keep forever)
    pub age: u64,
}

impl Default for ScrollbackConfig {
    fn default() -> Self {
        Self { lines: 1, age: 0 }
    }
}
