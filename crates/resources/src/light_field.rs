//! Light-field capture discovery and decoding.
//!
//! A capture is a directory of per-camera images whose names share a common
//! substring. Files are taken in lexicographic order and a caller-supplied
//! index list picks the views, so the same directory can feed different
//! sub-sampled camera grids.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::{debug, info, warn};

use crate::error::{ResourceError, ResourceResult};

/// Bytes per decoded texel (RGBA8).
pub const BYTES_PER_TEXEL: usize = 4;

/// Lists the capture files of a light field.
///
/// Keeps the entries of `directory` whose file name contains `name_filter`,
/// sorts them lexicographically and returns them in `indices` order.
///
/// # Errors
/// - [`ResourceError::DirectoryNotFound`] if `directory` is not a directory
/// - [`ResourceError::NoMatchingImages`] if nothing matches the filter
/// - [`ResourceError::IndexOutOfRange`] for an index past the match list
pub fn select_light_field_files(
    directory: &Path,
    name_filter: &str,
    indices: &[usize],
) -> ResourceResult<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(ResourceError::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut matches = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().contains(name_filter) {
            matches.push(entry.path());
        }
    }

    if matches.is_empty() {
        return Err(ResourceError::NoMatchingImages {
            directory: directory.to_path_buf(),
            filter: name_filter.to_string(),
        });
    }

    matches.sort();
    debug!(
        "{} file(s) in {:?} match '{}'",
        matches.len(),
        directory,
        name_filter
    );

    indices
        .iter()
        .map(|&index| {
            matches
                .get(index)
                .cloned()
                .ok_or(ResourceError::IndexOutOfRange {
                    index,
                    available: matches.len(),
                })
        })
        .collect()
}

/// Decoded light-field views packed into one host buffer.
///
/// View `i` occupies bytes `[i * slice_size, (i + 1) * slice_size)` as
/// row-major RGBA8.
#[derive(Debug, Clone)]
pub struct LightField {
    width: u32,
    height: u32,
    view_count: u32,
    data: Vec<u8>,
}

impl LightField {
    /// Loads and decodes the selected views at `width` x `height`.
    ///
    /// Views with a different size are resized to the target extent.
    pub fn load(
        directory: &Path,
        name_filter: &str,
        indices: &[usize],
        width: u32,
        height: u32,
    ) -> ResourceResult<Self> {
        let files = select_light_field_files(directory, name_filter, indices)?;
        Self::from_files(&files, width, height)
    }

    /// Decodes `files` in order into a packed buffer.
    pub fn from_files(files: &[PathBuf], width: u32, height: u32) -> ResourceResult<Self> {
        if width == 0 || height == 0 {
            return Err(ResourceError::InvalidExtent { width, height });
        }

        let slice_size = width as usize * height as usize * BYTES_PER_TEXEL;
        let mut data = Vec::with_capacity(slice_size * files.len());

        for path in files {
            let mut view = image::open(path)?.to_rgba8();
            if view.dimensions() != (width, height) {
                warn!(
                    "{:?} is {}x{}, resizing to {}x{}",
                    path,
                    view.width(),
                    view.height(),
                    width,
                    height
                );
                view = image::imageops::resize(&view, width, height, FilterType::Triangle);
            }
            data.extend_from_slice(view.as_raw());
        }

        info!(
            "Loaded light field: {} view(s) at {}x{} ({} bytes)",
            files.len(),
            width,
            height,
            data.len()
        );

        Ok(Self {
            width,
            height,
            view_count: files.len() as u32,
            data,
        })
    }

    /// Wraps views that are already decoded and packed back to back.
    ///
    /// # Errors
    /// - [`ResourceError::InvalidExtent`] for a zero width or height
    /// - [`ResourceError::DataSize`] if `data` does not hold exactly
    ///   `view_count` views
    pub fn from_raw(
        width: u32,
        height: u32,
        view_count: u32,
        data: Vec<u8>,
    ) -> ResourceResult<Self> {
        if width == 0 || height == 0 {
            return Err(ResourceError::InvalidExtent { width, height });
        }
        let expected = width as usize * height as usize * BYTES_PER_TEXEL * view_count as usize;
        if data.len() != expected {
            return Err(ResourceError::DataSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            view_count,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of views, which is the depth of the GPU image.
    pub fn view_count(&self) -> u32 {
        self.view_count
    }

    /// Size in bytes of one view.
    pub fn slice_size(&self) -> usize {
        self.width as usize * self.height as usize * BYTES_PER_TEXEL
    }

    /// Bytes of view `index`, if present.
    pub fn view(&self, index: usize) -> Option<&[u8]> {
        let size = self.slice_size();
        self.data.get(index * size..(index + 1) * size)
    }

    /// All views, packed back to back.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_directory() {
        let result = select_light_field_files(
            Path::new("/nonexistent/light/field"),
            "input_Cam",
            &[0],
        );
        assert!(matches!(result, Err(ResourceError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_zero_extent_rejected() {
        let result = LightField::from_files(&[], 0, 4);
        assert!(matches!(
            result,
            Err(ResourceError::InvalidExtent { width: 0, height: 4 })
        ));
    }

    #[test]
    fn test_from_raw_checks_size() {
        let light_field = LightField::from_raw(2, 2, 1, vec![7; 16]).unwrap();
        assert_eq!(light_field.view_count(), 1);
        assert_eq!(light_field.view(0), Some(&[7u8; 16][..]));

        assert!(matches!(
            LightField::from_raw(2, 2, 2, vec![0; 16]),
            Err(ResourceError::DataSize {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_empty_file_list() {
        let light_field = LightField::from_files(&[], 2, 2).unwrap();
        assert_eq!(light_field.view_count(), 0);
        assert_eq!(light_field.slice_size(), 16);
        assert!(light_field.data().is_empty());
        assert!(light_field.view(0).is_none());
    }
}
