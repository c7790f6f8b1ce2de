//! Core utilities for the light-field viewer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Configuration loading

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    CONFIG_ENV, Config, DEFAULT_CONFIG_FILE, DisparityConfig, LightFieldConfig, MAX_STEP_COUNT,
    PresentMode, RendererConfig, ShaderConfig, WindowConfig,
};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging};
pub use timer::{FrameStats, StatsWindow, Timer};
