use std::fs;
use std::io::{self, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Gzip,
}

/// Decide the archive format from its leading magic bytes. The server's
/// content-type is advisory only; the file on disk is what gets extracted.
pub fn sniff_archive_kind(path: &Path) -> Result<ArchiveKind, FetchError> {
    let mut file = fs::File::open(path)
        .map_err(|err| FetchError::Filesystem(format!("open archive {}: {err}", path.display())))?;
    let mut magic = [0u8; 4];
    let read = file
        .read(&mut magic)
        .map_err(|err| FetchError::Filesystem(err.to_string()))?;

    if read >= 4 && magic[..2] == *b"PK" && matches!(magic[2], 3 | 5 | 7) {
        return Ok(ArchiveKind::Zip);
    }
    if read >= 2 && magic[..2] == [0x1f, 0x8b] {
        return Ok(ArchiveKind::Gzip);
    }
    Err(FetchError::UnsupportedArchive(format!(
        "{} is neither a zip nor a gzip file",
        path.display()
    )))
}

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), FetchError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| FetchError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| FetchError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| FetchError::Archive(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(FetchError::Archive(
                    "zip entry path traversal detected".to_string(),
                ));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| FetchError::Filesystem(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| FetchError::Archive(err.to_string()))?;
    }
    Ok(())
}

/// Stream every entry to a sink so a truncated or corrupt archive fails
/// before anything is written under the destination.
pub fn validate_zip(zip_path: &Path) -> Result<(), FetchError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| FetchError::Filesystem(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| FetchError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| FetchError::Archive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| FetchError::Archive(err.to_string()))?;
    }
    Ok(())
}

/// Single-file gzip payloads (e.g. `train.csv.gz`) decompress to one file
/// named after the archive minus its `.gz` suffix.
pub fn extract_gzip(gz_path: &Path, target_dir: &Path, output_name: &str) -> Result<(), FetchError> {
    let file = fs::File::open(gz_path)
        .map_err(|err| FetchError::Filesystem(format!("open gzip {}: {err}", gz_path.display())))?;
    let mut decoder = GzDecoder::new(file);

    fs::create_dir_all(target_dir).map_err(|err| FetchError::Filesystem(err.to_string()))?;
    let mut outfile = fs::File::create(target_dir.join(output_name))
        .map_err(|err| FetchError::Filesystem(err.to_string()))?;
    io::copy(&mut decoder, &mut outfile).map_err(|err| FetchError::Archive(err.to_string()))?;
    Ok(())
}

pub fn gzip_output_name(archive_name: &str) -> String {
    archive_name
        .strip_suffix(".gz")
        .unwrap_or(archive_name)
        .to_string()
}
