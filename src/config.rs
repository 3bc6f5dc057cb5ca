//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\song-overlay\config.toml
//! - macOS: ~/Library/Application Support/song-overlay/config.toml
//! - Linux: ~/.config/song-overlay/config.toml
//!
//! Settings are loaded at startup and saved when changed. The override
//! registry itself is not stored here; it lives in the preference file
//! named by [`StorageConfig::prefs_path`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lyrics::FollowConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lyric display and sync settings
    pub lyrics: LyricsConfig,

    /// Where persisted state lives
    pub storage: StorageConfig,
}

/// Lyric display and sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    /// Fraction of the viewport (0.0 - 1.0) at which the active line is held
    pub follow_offset: f32,

    /// Pad the list so the first and last lines can reach the follow point
    pub extra_padding: bool,

    /// Scroll automatically as the active line changes
    pub autoscroll: bool,

    /// Sync offset applied when a song has no override of its own
    pub default_sync_offset_ms: i64,

    /// Longest the polling loop may sleep between lookups
    pub poll_cap_ms: u64,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            follow_offset: 0.5,
            extra_padding: true,
            autoscroll: true,
            default_sync_offset_ms: 0,
            poll_cap_ms: 100,
        }
    }
}

impl LyricsConfig {
    /// Poll cap as a duration, never below one millisecond.
    pub fn poll_cap(&self) -> Duration {
        Duration::from_millis(self.poll_cap_ms.max(1))
    }

    /// Scroll-follow settings for a viewport of the given size.
    pub fn follow_config(&self, viewport_px: f32, line_height_px: f32, line_spacing_px: f32) -> FollowConfig {
        FollowConfig {
            follow_offset: self.follow_offset.clamp(0.0, 1.0),
            extra_padding: self.extra_padding,
            viewport_px,
            line_height_px,
            line_spacing_px,
            ..FollowConfig::default()
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Preference file holding the override registry (None = config dir default)
    pub prefs_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolved preference file path.
    pub fn prefs_path(&self) -> Option<PathBuf> {
        self.prefs_path
            .clone()
            .or_else(|| config_dir().map(|d| d.join("prefs.json")))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("song-overlay"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns default config if the file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!(target: "config", "Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!(target: "config", "No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!(target: "config", "Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!(target: "config", "Failed to parse config file {:?}: {}", path, e);
                tracing::warn!(target: "config", "Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!(target: "config", "Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

/// Save configuration to a specific file.
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!(target: "config", "Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
