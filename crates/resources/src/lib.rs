//! Light-field resource loading.
//!
//! This crate finds the capture files of a light field on disk and decodes
//! them into one packed RGBA8 buffer ready for upload.

pub mod error;
pub mod light_field;

pub use error::{ResourceError, ResourceResult};
pub use light_field::{BYTES_PER_TEXEL, LightField, select_light_field_files};
