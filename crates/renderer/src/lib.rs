//! Disparity rendering for the light-field viewer.
//!
//! This crate orchestrates each frame:
//! - Light-field upload
//! - Disparity compute pass
//! - Composite render pass and overlay
//! - Frame plan and swapchain recreation

pub mod composite_pass;
pub mod disparity_pass;
pub mod error;
pub mod frame_plan;
pub mod light_field;
pub mod overlay;
pub mod push_constants;
pub mod renderer;

pub use error::{RendererError, RendererResult};
pub use overlay::{NullOverlay, Overlay, StatsOverlay};
pub use push_constants::PushConstants;
pub use renderer::{FrameOutcome, Renderer};
