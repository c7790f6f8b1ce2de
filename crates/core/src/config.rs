//! Application configuration.
//!
//! Loaded from a TOML file named by `LIGHTFIELD_CONFIG`, else
//! `lightfield.toml` in the working directory. A missing file means the
//! defaults; every table and key is optional.
//!
//! ```toml
//! [window]
//! width = 512
//! height = 512
//!
//! [light_field]
//! directory = "benchmark/training/cotton/"
//! name_filter = "input_Cam"
//! indices = [38, 48, 57, 40, 49, 58, 41, 50, 59]
//!
//! [renderer]
//! frames_in_flight = 2
//! present_mode = "fifo"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "LIGHTFIELD_CONFIG";

/// File read when [`CONFIG_ENV`] is not set.
pub const DEFAULT_CONFIG_FILE: &str = "lightfield.toml";

/// Highest accepted disparity step count.
pub const MAX_STEP_COUNT: u32 = 64;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub light_field: LightFieldConfig,
    pub shaders: ShaderConfig,
    pub renderer: RendererConfig,
    pub disparity: DisparityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            title: "Light Field Disparity".to_string(),
        }
    }
}

/// Where the 3x3 view grid is read from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LightFieldConfig {
    pub directory: PathBuf,
    /// Substring a file name must contain to be considered.
    pub name_filter: String,
    /// Positions in the sorted file list, row-major over the grid.
    pub indices: Vec<usize>,
}

impl Default for LightFieldConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("benchmark/training/cotton/"),
            name_filter: "input_Cam".to_string(),
            indices: vec![38, 48, 57, 40, 49, 58, 41, 50, 59],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory holding the compiled `.spv` files.
    pub directory: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("shaders/spirv"),
        }
    }
}

/// Requested presentation mode. Unsupported requests fall back to FIFO.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentMode {
    #[default]
    Fifo,
    Mailbox,
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererConfig {
    /// `None` enables validation in debug builds only.
    pub validation: Option<bool>,
    pub frames_in_flight: u32,
    pub present_mode: PresentMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: None,
            frames_in_flight: 2,
            present_mode: PresentMode::Fifo,
        }
    }
}

impl RendererConfig {
    /// Whether to request the validation layer.
    pub fn validation_enabled(&self) -> bool {
        self.validation.unwrap_or(cfg!(debug_assertions))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DisparityConfig {
    /// Initial number of disparity hypotheses.
    pub step_count: u32,
}

impl Default for DisparityConfig {
    fn default() -> Self {
        Self { step_count: 16 }
    }
}

impl Config {
    /// Loads the file named by [`CONFIG_ENV`], else [`DEFAULT_CONFIG_FILE`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Loads `path`, or the defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = toml::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Checks values serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            )));
        }
        if self.light_field.indices.is_empty() {
            return Err(Error::Config(
                "light_field.indices must not be empty".to_string(),
            ));
        }
        if self.renderer.frames_in_flight == 0 {
            return Err(Error::Config(
                "renderer.frames_in_flight must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_STEP_COUNT).contains(&self.disparity.step_count) {
            return Err(Error::Config(format!(
                "disparity.step_count must be in 1..={MAX_STEP_COUNT}, got {}",
                self.disparity.step_count
            )));
        }
        Ok(())
    }
}
