//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No adapter passed the suitability checks
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A required device extension is not advertised by the adapter
    #[error("Missing required device extension: {0}")]
    MissingExtension(String),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// The swapchain no longer matches the surface and must be recreated
    #[error("Swapchain is out of date")]
    SwapchainOutOfDate,

    /// Invalid handle error
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Image creation or upload error
    #[error("Image error: {0}")]
    ImageError(String),

    /// The allocator mutex was poisoned by a panicking thread
    #[error("Allocator lock poisoned")]
    LockPoisoned,
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
