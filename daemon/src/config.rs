use crate::options::EngineOptions;
use crate::validate_enum;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub window: WindowSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub engine: EngineOptions,
}

/// General daemon settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Host window the view is laid out in
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSettings {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    720
}

/// Playback behaviour of the daemon's view
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    /// Call play() right after every load
    #[serde(default)]
    pub autoplay: bool,

    /// Step for the left/right key bindings
    #[serde(default = "default_skip_step")]
    pub skip_step_ms: i64,

    /// Key codes the view swallows before the default bindings see them
    #[serde(default)]
    pub intercept_keys: Vec<String>,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            autoplay: false,
            skip_step_ms: default_skip_step(),
            intercept_keys: Vec::new(),
        }
    }
}

fn default_skip_step() -> i64 {
    10_000
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        config.validate()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("vidview");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        self.validate_log_level(&self.general.log_level)?;

        if self.window.width == 0 || self.window.height == 0 {
            anyhow::bail!(
                "Invalid window size: {}x{}",
                self.window.width,
                self.window.height
            );
        }

        if self.playback.skip_step_ms <= 0 {
            anyhow::bail!(
                "Invalid skip step (must be positive): {}",
                self.playback.skip_step_ms
            );
        }

        Ok(())
    }

    fn validate_log_level(&self, level: &str) -> Result<()> {
        validate_enum!(level, "trace", "debug", "info", "warn", "error")
    }
}
