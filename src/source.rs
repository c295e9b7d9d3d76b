//! Input and output locations.
//!
//! A run reads from one of three places and writes to one of two:
//!
//! | Input | Resolution |
//! |---|---|
//! | directory | used in place |
//! | `*.zip` file | extracted into a temporary directory |
//! | `http(s)://` URL | downloaded, checked to be a ZIP, extracted into a temporary directory |
//!
//! | Output | Handling |
//! |---|---|
//! | directory | written in place |
//! | `*.zip` file | rendered into a temporary directory, packed on [`PreparedOutput::finish`] |
//!
//! Temporary directories are owned by [`ResolvedInput`] / [`PreparedOutput`]
//! and removed when those values drop, whether the run succeeded or not.
//!
//! Google Drive share links (`.../file/d/<id>/view`) are rewritten to the
//! direct-download endpoint before fetching.

use crate::archive::{self, ArchiveError};
use regex::Regex;
use reqwest::blocking::Client;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Download failed with status {status}: {url}")]
    Status { status: u16, url: String },
    #[error("downloaded file is not a ZIP archive")]
    NotZipDownload,
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
    #[error("Unsupported input (expected a directory, a .zip file, or an http(s) URL): {0}")]
    Unsupported(String),
}

static DRIVE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/d/([A-Za-z0-9_-]+)").unwrap_or_else(|e| panic!("invalid Drive id regex: {e}"))
});

/// Where the input images come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Directory(PathBuf),
    Archive(PathBuf),
    Remote(String),
}

impl InputSource {
    /// Classify a command-line input argument.
    pub fn parse(arg: &str) -> Result<Self, SourceError> {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            return Ok(Self::Remote(arg.to_string()));
        }
        let path = PathBuf::from(arg);
        if path.is_dir() {
            Ok(Self::Directory(path))
        } else if has_zip_extension(&path) {
            if path.is_file() {
                Ok(Self::Archive(path))
            } else {
                Err(SourceError::NotFound(path))
            }
        } else if path.exists() {
            Err(SourceError::Unsupported(arg.to_string()))
        } else {
            Err(SourceError::NotFound(path))
        }
    }

    /// Materialize the source as a local directory.
    pub fn resolve(&self) -> Result<ResolvedInput, SourceError> {
        match self {
            Self::Directory(dir) => Ok(ResolvedInput {
                root: dir.clone(),
                temp: None,
            }),
            Self::Archive(zip) => {
                let temp = tempfile::Builder::new().prefix("prep-input-").tempdir()?;
                archive::unzip(zip, temp.path())?;
                tracing::info!(archive = %zip.display(), "extracted input archive");
                Ok(ResolvedInput {
                    root: temp.path().to_path_buf(),
                    temp: Some(temp),
                })
            }
            Self::Remote(url) => resolve_remote(&http_client()?, url),
        }
    }
}

fn http_client() -> Result<Client, SourceError> {
    Ok(Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Download `url` (after the Drive rewrite), check it is a ZIP, and extract it.
fn resolve_remote(client: &Client, url: &str) -> Result<ResolvedInput, SourceError> {
    let temp = tempfile::Builder::new().prefix("prep-download-").tempdir()?;
    let download = temp.path().join("download.zip");
    fetch(client, &direct_download_url(url), &download)?;
    if !archive::looks_like_zip(&download)? {
        return Err(SourceError::NotZipDownload);
    }
    let root = temp.path().join("extracted");
    archive::unzip(&download, &root)?;
    std::fs::remove_file(&download)?;
    tracing::info!(%url, "downloaded and extracted input archive");
    Ok(ResolvedInput {
        root,
        temp: Some(temp),
    })
}

/// A local directory holding the input images.
///
/// Keeps any temporary directory alive for as long as the input is in use.
#[derive(Debug)]
pub struct ResolvedInput {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl ResolvedInput {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }
}

/// Rewrite a Google Drive share link to its direct-download URL.
///
/// URLs without a `/d/<id>` segment are returned unchanged.
pub fn direct_download_url(url: &str) -> String {
    match DRIVE_ID.captures(url).and_then(|c| c.get(1)) {
        Some(id) if url.contains("drive.google.com") => format!(
            "https://drive.google.com/uc?export=download&id={}",
            id.as_str()
        ),
        _ => url.to_string(),
    }
}

fn fetch(client: &Client, url: &str, dest: &Path) -> Result<(), SourceError> {
    tracing::debug!(%url, "downloading");
    let mut response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(SourceError::Status {
            status: response.status().as_u16(),
            url: url.to_string(),
        });
    }
    let mut file = BufWriter::new(File::create(dest)?);
    response.copy_to(&mut file)?;
    Ok(())
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Where processed images go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl OutputTarget {
    pub fn parse(path: &Path) -> Self {
        if has_zip_extension(path) {
            Self::Archive(path.to_path_buf())
        } else {
            Self::Directory(path.to_path_buf())
        }
    }

    /// Create the directory the pipeline writes into.
    pub fn prepare(&self) -> Result<PreparedOutput, SourceError> {
        match self {
            Self::Directory(dir) => {
                std::fs::create_dir_all(dir)?;
                Ok(PreparedOutput {
                    target: self.clone(),
                    root: dir.clone(),
                    _temp: None,
                })
            }
            Self::Archive(_) => {
                let temp = tempfile::Builder::new().prefix("prep-output-").tempdir()?;
                Ok(PreparedOutput {
                    target: self.clone(),
                    root: temp.path().to_path_buf(),
                    _temp: Some(temp),
                })
            }
        }
    }
}

/// An output directory ready for writing.
#[derive(Debug)]
pub struct PreparedOutput {
    target: OutputTarget,
    root: PathBuf,
    _temp: Option<TempDir>,
}

impl PreparedOutput {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pack the rendered files if the target is an archive.
    ///
    /// Returns the final output location.
    pub fn finish(self) -> Result<PathBuf, SourceError> {
        match &self.target {
            OutputTarget::Directory(dir) => Ok(dir.clone()),
            OutputTarget::Archive(zip) => {
                let count = archive::zip_dir(&self.root, zip)?;
                tracing::info!(archive = %zip.display(), files = count, "packed output archive");
                Ok(zip.clone())
            }
        }
    }
}
