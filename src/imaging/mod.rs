//! Image processing: decode, isolate, composite, adjust and resize.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode / encode** | `image::ImageReader`, `JpegEncoder`, PNG / WebP writers |
//! | **Subject isolation** | [`Segmenter`] trait: [`KeySegmenter`], `OnnxSegmenter` (`onnx` feature) |
//! | **Canvas / composite** | `imageops::replace` + `imageops::overlay` |
//! | **Resize** | Lanczos3 with stretch / pad / crop fitting |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Segment**: [`Segmenter`] trait and its backends
//! - **Codec**: Disk I/O and output format selection
//! - **Operations**: Pixel-level functions combining calculations + segmenter

mod calculations;
pub mod codec;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod operations;
mod params;
pub mod segment;

use thiserror::Error;

pub use calculations::{
    calculate_fill_dimensions, calculate_fit_dimensions, calculate_square_fit, center_offset,
};
pub use codec::{SUPPORTED_EXTENSIONS, is_supported_image, load_image, save_image};
#[cfg(feature = "onnx")]
pub use onnx::OnnxSegmenter;
pub use operations::{adjust_brightness, remove_background, resize};
pub use params::{
    BackgroundParams, BackgroundSpec, FitMode, Quality, ResizeSpec, SquareSpec, parse_hex_color,
};
pub use segment::{KeySegmenter, SegmentError, Segmenter};

#[derive(Error, Debug)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error(transparent)]
    Segment(#[from] SegmentError),
}
