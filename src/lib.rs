//! # Dataset Prep
//!
//! A batch pre-processor for image datasets. Point it at a folder, a ZIP, or
//! a shared link; it removes backgrounds, squares subjects, adjusts
//! brightness and resizes, then writes a mirrored folder or ZIP.
//!
//! # Architecture
//!
//! ```text
//! 1. Resolve   dir | zip | url   →  local input root  (temp dir when needed)
//! 2. Scan      input root        →  sorted image list
//! 3. Process   image list        →  output root       (one pipeline per file)
//! 4. Deliver   output root       →  dir | zip
//! ```
//!
//! Every file is independent. A file that fails is recorded in the
//! [`process::RunReport`] and the batch keeps going.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Input / output locations: directories, ZIPs, Drive links, temp dirs |
//! | [`archive`] | ZIP pack / unpack |
//! | [`scan`] | Recursive discovery of supported images |
//! | [`process`] | Pipeline planning, per-file driver, parallel batch, run report |
//! | [`config`] | Layered `prep.toml` loading, validation, CLI overrides |
//! | [`imaging`] | Pixel work: segmentation, compositing, brightness, resize, codecs |
//! | [`output`] | CLI output formatting for scan and run progress |
//!
//! # Design Decisions
//!
//! ## Segmentation Behind a Trait
//!
//! Background removal goes through [`imaging::Segmenter`]. The default
//! [`imaging::KeySegmenter`] is pure Rust and handles studio shots on plain
//! backdrops. The `onnx` feature adds a saliency-model backend for cluttered
//! scenes. Tests use a mock that returns its input.
//!
//! ## Format Follows Transparency
//!
//! Results with alpha are written as PNG (or WebP when requested); opaque
//! results keep common extensions or become JPEG. A transparent cut-out is
//! never silently flattened by a JPEG encoder.

pub mod archive;
pub mod config;
pub mod imaging;
pub mod output;
pub mod process;
pub mod scan;
pub mod source;

#[cfg(test)]
pub(crate) mod test_helpers;
