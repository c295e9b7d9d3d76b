//! Shared test utilities for the dataset-prep test suite.
//!
//! Builds small synthetic datasets on disk so pipeline tests never depend on
//! checked-in binary fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_dataset();
//! write_corrupt(tmp.path(), "broken.jpg");
//! let images = list_images(tmp.path()).unwrap();
//! ```

use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// Opaque product shot: white backdrop with a centered dark-blue block.
pub fn studio_shot(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        let inside = x >= w / 4 && x < w - w / 4 && y >= h / 4 && y < h - h / 4;
        if inside {
            Rgb([20, 30, 160])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// RGBA image whose left half is opaque red and right half fully clear.
pub fn half_clear(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, _| {
        if x < w / 2 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

// =========================================================================
// Dataset setup
// =========================================================================

/// Save `img` at `root/rel`, creating parent directories.
pub fn write_image(root: &Path, rel: &str, img: &DynamicImage) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save(&path).unwrap();
    path
}

/// Write bytes that carry an image extension but do not decode.
pub fn write_corrupt(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"\xFF\xD8 truncated jpeg").unwrap();
    path
}

/// A temp directory holding a small mixed dataset:
///
/// ```text
/// a.jpg              80x60  opaque
/// nested/b.png       40x90  opaque
/// nested/c.bmp       50x50  opaque
/// alpha/d.png        64x32  half transparent
/// readme.txt         (ignored)
/// ```
pub fn setup_dataset() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_image(root, "a.jpg", &DynamicImage::ImageRgb8(studio_shot(80, 60)));
    write_image(
        root,
        "nested/b.png",
        &DynamicImage::ImageRgb8(studio_shot(40, 90)),
    );
    write_image(
        root,
        "nested/c.bmp",
        &DynamicImage::ImageRgb8(studio_shot(50, 50)),
    );
    write_image(
        root,
        "alpha/d.png",
        &DynamicImage::ImageRgba8(half_clear(64, 32)),
    );
    std::fs::write(root.join("readme.txt"), b"not an image").unwrap();
    tmp
}
