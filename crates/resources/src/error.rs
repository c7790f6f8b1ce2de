//! Error types for light-field loading.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The capture directory does not exist or is not a directory.
    #[error("Light-field directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// No file name in the directory contains the filter string.
    #[error("No files in '{directory}' match '{filter}'")]
    NoMatchingImages {
        /// Directory that was searched.
        directory: PathBuf,
        /// Substring every capture file name must contain.
        filter: String,
    },

    /// A requested view index is past the end of the sorted file list.
    #[error("View index {index} out of range ({available} matching files)")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// Number of files that matched the filter.
        available: usize,
    },

    /// The requested target extent has a zero side.
    #[error("Invalid light-field extent {width}x{height}")]
    InvalidExtent { width: u32, height: u32 },

    /// Packed view data does not match `width * height * 4 * views`.
    #[error("Light-field data is {actual} bytes, expected {expected}")]
    DataSize { expected: usize, actual: usize },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
