//! Error type of the renderer crate.

use thiserror::Error;

use lightfield_resources::ResourceError;
use lightfield_rhi::RhiError;

use crate::frame_plan::PlanError;

/// Anything that can stop the renderer from starting or drawing.
#[derive(Error, Debug)]
pub enum RendererError {
    /// Vulkan or GPU resource failure
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Light-field files could not be found or decoded
    #[error("Light field: {0}")]
    Resource(#[from] ResourceError),

    /// Window or surface failure
    #[error(transparent)]
    Platform(#[from] lightfield_core::Error),

    /// The frame plan breaks a layout rule
    #[error("Invalid frame plan: {0}")]
    Plan(#[from] PlanError),
}

/// Result type alias for renderer operations.
pub type RendererResult<T> = Result<T, RendererError>;
