//! ZIP packing and unpacking.
//!
//! Entry paths are relative with `/` separators. Extraction goes through
//! `ZipArchive::extract`, which refuses entries escaping the target directory.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{0} is not a ZIP archive")]
    NotZip(PathBuf),
}

const LOCAL_HEADER: &[u8; 4] = b"PK\x03\x04";
const EMPTY_ARCHIVE: &[u8; 4] = b"PK\x05\x06";

/// Whether `path` starts with a ZIP signature.
pub fn looks_like_zip(path: &Path) -> Result<bool, ArchiveError> {
    let mut magic = [0u8; 4];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == LOCAL_HEADER || &magic == EMPTY_ARCHIVE),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Extract every entry of `archive` into `dest`.
pub fn unzip(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    if !looks_like_zip(archive)? {
        return Err(ArchiveError::NotZip(archive.to_path_buf()));
    }
    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
    tracing::debug!(
        archive = %archive.display(),
        entries = zip.len(),
        "extracting archive"
    );
    zip.extract(dest)?;
    Ok(())
}

/// Pack every regular file under `dir` into a new Deflate archive at `archive`.
///
/// Returns the number of files written.
pub fn zip_dir(dir: &Path, archive: &Path) -> Result<usize, ArchiveError> {
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = ZipWriter::new(BufWriter::new(File::create(archive)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    for path in &files {
        let rel = path.strip_prefix(dir).unwrap_or(path);
        writer.start_file(entry_name(rel), options)?;
        let mut file = File::open(path)?;
        io::copy(&mut file, &mut writer)?;
    }
    writer.finish()?;

    tracing::debug!(archive = %archive.display(), files = files.len(), "wrote archive");
    Ok(files.len())
}

fn entry_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
