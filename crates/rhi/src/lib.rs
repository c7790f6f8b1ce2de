//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance creation and adapter selection
//! - Logical device and queue setup
//! - Swapchain management and the per-frame sync ring
//! - Command pools, command buffers and one-shot submissions
//! - GPU images, staging uploads and layout transitions
//! - Descriptors, shaders, pipelines and render passes

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
