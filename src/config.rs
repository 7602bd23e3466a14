// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON in `<config_dir>/filter-camera/config.json`. Missing fields
//! fall back to their defaults so older files keep loading.

use crate::constants::{APP_NAME, pipeline, storage, timing};
use crate::errors::AppError;
use crate::filters::{FilterType, RenderMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera device path (`/dev/videoN`, PipeWire node id, or `test`).
    /// `None` picks the first enumerated camera.
    pub camera_path: Option<String>,
    /// Requested capture width
    pub capture_width: u32,
    /// Requested capture height
    pub capture_height: u32,
    /// Sensor rotation override in degrees (clockwise)
    pub rotation_degrees: Option<i32>,
    /// Filter rendering backend preference
    pub render_mode: RenderMode,
    /// Filter selected at startup
    pub default_filter: FilterType,
    /// JPEG quality for saved pictures
    pub jpeg_quality: u8,
    /// Album path relative to the home directory
    pub album_path: String,
    /// Delay before the camera restarts after reset (milliseconds)
    pub reset_delay_ms: u64,
    /// Still capture timeout (milliseconds)
    pub capture_timeout_ms: u64,
    /// Mirror the live preview horizontally
    pub mirror_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_path: None,
            capture_width: pipeline::DEFAULT_WIDTH,
            capture_height: pipeline::DEFAULT_HEIGHT,
            rotation_degrees: None,
            render_mode: RenderMode::default(),
            default_filter: FilterType::default(),
            jpeg_quality: storage::JPEG_QUALITY,
            album_path: storage::RELATIVE_PATH.to_string(),
            reset_delay_ms: timing::RESET_DELAY.as_millis() as u64,
            capture_timeout_ms: timing::CAPTURE_TIMEOUT.as_millis() as u64,
            mirror_preview: false,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Load the config from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Load the config from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Loaded config");
        Ok(config.sanitized())
    }

    /// Write the config to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Config(e.to_string()))?;
        }
        let text =
            serde_json::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| AppError::Config(e.to_string()))?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Delay between reset and camera restart
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }

    /// Still capture timeout
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    fn sanitized(mut self) -> Self {
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        if self.capture_width == 0 || self.capture_height == 0 {
            self.capture_width = pipeline::DEFAULT_WIDTH;
            self.capture_height = pipeline::DEFAULT_HEIGHT;
        }
        if self.album_path.trim().is_empty() {
            self.album_path = storage::RELATIVE_PATH.to_string();
        }
        self
    }
}
