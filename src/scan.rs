//! Input discovery.
//!
//! Walks an input root recursively and collects every file whose extension is
//! in [`SUPPORTED_EXTENSIONS`](crate::imaging::SUPPORTED_EXTENSIONS). Paths are
//! kept absolute (rooted at the input) and sorted, so output order and report
//! order are stable across runs and platforms.
//!
//! ```text
//! input/
//! ├── a.jpg            → a.jpg
//! ├── notes.txt          (skipped)
//! └── shoes/
//!     ├── 01.PNG       → shoes/01.PNG
//!     └── 02.webp      → shoes/02.webp
//! ```

use crate::imaging::is_supported_image;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Input root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Result of scanning one input root.
#[derive(Debug, Serialize)]
pub struct ScanResult {
    pub root: PathBuf,
    pub images: Vec<PathBuf>,
}

impl ScanResult {
    /// Path of `image` relative to the scanned root.
    pub fn relative<'a>(&self, image: &'a Path) -> &'a Path {
        image.strip_prefix(&self.root).unwrap_or(image)
    }
}

/// Recursively list supported images under `root`, sorted by path.
pub fn list_images(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort();
    tracing::debug!(root = %root.display(), count = images.len(), "scanned input");
    Ok(images)
}

pub fn scan(root: &Path) -> Result<ScanResult, ScanError> {
    Ok(ScanResult {
        root: root.to_path_buf(),
        images: list_images(root)?,
    })
}
