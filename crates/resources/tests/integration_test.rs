//! Integration tests for light-field discovery and decoding.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use lightfield_resources::{LightField, ResourceError, select_light_field_files};

/// Fresh scratch directory under the system temp dir.
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "lightfield-resources-{}-{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("Failed to create scratch dir");
    dir
}

/// Writes a solid-color PNG whose red channel is `value`.
fn write_png(dir: &Path, file_name: &str, size: u32, value: u8) {
    let img = RgbaImage::from_pixel(size, size, Rgba([value, 0, 0, 255]));
    img.save(dir.join(file_name)).expect("Failed to write PNG");
}

#[test]
fn test_select_filters_sorts_and_indexes() {
    let dir = scratch_dir("select");
    for i in [3u8, 0, 2, 1] {
        write_png(&dir, &format!("input_Cam{:03}.png", i), 2, i);
    }
    write_png(&dir, "gt_disp_lowres.png", 2, 200);
    fs::create_dir(dir.join("input_Cam_subdir")).unwrap();

    let files = select_light_field_files(&dir, "input_Cam", &[2, 0, 3]).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["input_Cam002.png", "input_Cam000.png", "input_Cam003.png"]
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_select_reports_bad_index() {
    let dir = scratch_dir("bad-index");
    write_png(&dir, "input_Cam000.png", 2, 0);
    write_png(&dir, "input_Cam001.png", 2, 1);

    let err = select_light_field_files(&dir, "input_Cam", &[0, 5]).unwrap_err();
    assert!(matches!(
        err,
        ResourceError::IndexOutOfRange {
            index: 5,
            available: 2
        }
    ));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_select_reports_no_matches() {
    let dir = scratch_dir("no-match");
    write_png(&dir, "other.png", 2, 0);

    let err = select_light_field_files(&dir, "input_Cam", &[0]).unwrap_err();
    assert!(matches!(err, ResourceError::NoMatchingImages { .. }));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_packs_slices_in_index_order() {
    let dir = scratch_dir("load");
    for i in 0..4u8 {
        write_png(&dir, &format!("input_Cam{:03}.png", i), 4, i * 10);
    }

    let light_field = LightField::load(&dir, "input_Cam", &[3, 1], 4, 4).unwrap();
    assert_eq!(light_field.view_count(), 2);
    assert_eq!(light_field.data().len(), 2 * 4 * 4 * 4);

    let first = light_field.view(0).unwrap();
    let second = light_field.view(1).unwrap();
    assert!(first.chunks(4).all(|px| px == [30, 0, 0, 255]));
    assert!(second.chunks(4).all(|px| px == [10, 0, 0, 255]));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_resizes_mismatched_views() {
    let dir = scratch_dir("resize");
    write_png(&dir, "input_Cam000.png", 8, 77);

    let light_field = LightField::load(&dir, "input_Cam", &[0], 4, 4).unwrap();
    assert_eq!(light_field.data().len(), 4 * 4 * 4);
    // Resizing a solid image keeps its color, up to filter rounding.
    assert!(
        light_field
            .data()
            .chunks(4)
            .all(|px| px[0].abs_diff(77) <= 1 && px[3].abs_diff(255) <= 1)
    );

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_load_benchmark_capture() {
    let dir = Path::new("../../benchmark/training/cotton/");

    // Skip test if the dataset isn't checked out
    if !dir.exists() {
        println!("Skipping test: light-field capture not found at {:?}", dir);
        return;
    }

    let indices = [38, 48, 57, 40, 49, 58, 41, 50, 59];
    let light_field = LightField::load(dir, "input_Cam", &indices, 512, 512)
        .expect("Failed to load light field");
    assert_eq!(light_field.view_count(), 9);
    assert_eq!(light_field.data().len(), 9 * 512 * 512 * 4);
}
