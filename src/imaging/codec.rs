//! Decoding and encoding with the `image` crate.
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, WebP, BMP, TIFF) | `image::ImageReader` with content sniffing |
//! | Encode JPEG | `image::codecs::jpeg::JpegEncoder` at the configured quality |
//! | Encode PNG / WebP | `DynamicImage::save_with_format` (WebP is lossless) |
//!
//! Decoded images are normalized to RGB8 or RGBA8 so every later stage only
//! needs to handle those two color types.

use super::ImagingError;
use super::params::Quality;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use std::path::{Path, PathBuf};

/// Input extensions accepted by the scanner (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];

/// Extensions that can carry an alpha channel on output.
const ALPHA_OUTPUT_EXTENSIONS: &[&str] = &["png", "webp"];

/// Extensions kept as-is for opaque output.
const OPAQUE_OUTPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether `path` has one of the [`SUPPORTED_EXTENSIONS`].
pub fn is_supported_image(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&lowercase_extension(path).as_str())
}

/// Load and decode an image from disk, normalized to RGB8 or RGBA8.
pub fn load_image(path: &Path) -> Result<DynamicImage, ImagingError> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| ImagingError::Decode(format!("{}: {}", path.display(), e)))?;
    Ok(normalize_color(img))
}

/// Collapse every color type onto RGB8 / RGBA8 depending on alpha presence.
pub fn normalize_color(img: DynamicImage) -> DynamicImage {
    match img.color() {
        ColorType::Rgb8 | ColorType::Rgba8 => img,
        c if c.has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// Pick the path an image will actually be written to.
///
/// Images with an alpha channel keep `.png`/`.webp` and otherwise become
/// `.png`. Opaque images keep `.jpg/.jpeg/.png/.webp` and otherwise become
/// `.jpg`.
pub fn output_path_for(img: &DynamicImage, requested: &Path) -> PathBuf {
    let ext = lowercase_extension(requested);
    if img.color().has_alpha() {
        if ALPHA_OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
            requested.to_path_buf()
        } else {
            requested.with_extension("png")
        }
    } else if OPAQUE_OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
        requested.to_path_buf()
    } else {
        requested.with_extension("jpg")
    }
}

/// Save `img` next to `requested`, switching format when transparency demands it.
///
/// Creates parent directories. Returns the path actually written.
pub fn save_image(
    img: &DynamicImage,
    requested: &Path,
    quality: Quality,
) -> Result<PathBuf, ImagingError> {
    let path = output_path_for(img, requested);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match lowercase_extension(&path).as_str() {
        "jpg" | "jpeg" => save_jpeg(img, &path, quality)?,
        "png" => img
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| ImagingError::Encode(format!("PNG {}: {}", path.display(), e)))?,
        "webp" => img
            .save_with_format(&path, ImageFormat::WebP)
            .map_err(|e| ImagingError::Encode(format!("WebP {}: {}", path.display(), e)))?,
        other => {
            return Err(ImagingError::Encode(format!(
                "Unsupported output format: {}",
                other
            )));
        }
    }
    Ok(path)
}

fn save_jpeg(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), ImagingError> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.value());
    // JPEG has no alpha; callers only route opaque images here
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| ImagingError::Encode(format!("JPEG {}: {}", path.display(), e)))
}
