//! Zip import and export of workspace contents.

use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::Path;

use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::session::FileTree;

/// Errors reading or writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The bytes are not a usable zip archive, or an entry would land
    /// outside the destination directory.
    #[error("malformed archive: {0}")]
    Malformed(String),
    /// Filesystem failure while extracting or packing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        match err {
            ZipError::Io(e) => ArchiveError::Io(e),
            other => ArchiveError::Malformed(other.to_string()),
        }
    }
}

/// Extract every entry of a zip archive under `dest`.
///
/// Entry names are validated before anything is written for them; an entry
/// such as `../evil` or `/etc/passwd` fails the whole extraction.
///
/// The archive lives in memory, so every failure while decoding it (bad
/// headers, CRC mismatch, corrupt deflate stream) is [`ArchiveError::Malformed`].
/// Only failures writing to `dest` are [`ArchiveError::Io`].
pub fn extract(bytes: &[u8], dest: &Path) -> Result<usize, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(malformed)?;
    let mut files = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(malformed)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveError::Malformed(format!(
                "entry {:?} escapes the archive root",
                entry.name()
            )));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        let mut data = Vec::new();
        entry.read_to_end(&mut data).map_err(|e| {
            ArchiveError::Malformed(format!("entry {:?} is corrupt: {e}", entry.name()))
        })?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &data)?;
        files += 1;
    }

    tracing::debug!(dest = %dest.display(), files, "extracted archive");
    Ok(files)
}

/// Pack the listed files of `root` into a zip archive held in memory.
pub fn pack(root: &Path, files: &FileTree) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for path in files.paths() {
        writer.start_file(path, file_options())?;
        let mut source = File::open(root.join(path))?;
        io::copy(&mut source, &mut writer)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

fn malformed(err: ZipError) -> ArchiveError {
    ArchiveError::Malformed(err.to_string())
}

fn file_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}
