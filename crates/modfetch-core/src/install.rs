//! Install projector: unpack a downloaded archive into a user-chosen
//! directory.
//!
//! The destination must already exist; this component never creates it.
//! Extraction lands in an isolated temp staging area first, then the files
//! are copied into a staging subtree inside the destination and promoted
//! into place with renames, so a failure mid-install never leaves a
//! half-installed mod. Both staging areas are removed on every exit path.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("install destination does not exist: {0}")]
    DestinationMissing(PathBuf),

    #[error("downloaded file is not a readable zip archive: {path}")]
    BadArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive entry escapes the extraction root: {0}")]
    UnsafeEntry(String),

    #[error("extracting the archive failed")]
    Extract(#[source] io::Error),

    #[error("install copy failed; the destination was left as it was")]
    PartialFailure(#[source] io::Error),

    #[error("install I/O error")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub files_installed: usize,
    pub destination: PathBuf,
}

/// Extract `archive` and project its contents into `destination`.
///
/// Two phases: everything is first copied into a hidden staging subtree of
/// `destination` (same filesystem), then promoted into place with renames.
/// A failure during the copy phase removes the staging subtree and leaves
/// the destination untouched.
pub fn install(archive: &Path, destination: &Path) -> Result<InstallReport, InstallError> {
    if !destination.is_dir() {
        return Err(InstallError::DestinationMissing(destination.to_path_buf()));
    }

    // TempDir removes the extraction area on every exit path below.
    let extracted = tempfile::Builder::new()
        .prefix("modfetch-extract-")
        .tempdir()?;
    extract_archive(archive, extracted.path())?;

    let staging = destination.join(format!(".modfetch-staging-{}", std::process::id()));
    fs::create_dir(&staging)?;

    let copied = match copy_tree(extracted.path(), &staging) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(InstallError::PartialFailure(e));
        }
    };

    if let Err(e) = promote(&staging, destination) {
        let _ = fs::remove_dir_all(&staging);
        return Err(InstallError::PartialFailure(e));
    }
    let _ = fs::remove_dir_all(&staging);

    tracing::info!(
        destination = %destination.display(),
        files = copied,
        "mod installed"
    );
    Ok(InstallReport {
        files_installed: copied,
        destination: destination.to_path_buf(),
    })
}

fn extract_archive(archive: &Path, into: &Path) -> Result<(), InstallError> {
    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|source| InstallError::BadArchive {
        path: archive.to_path_buf(),
        source,
    })?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|source| InstallError::BadArchive {
            path: archive.to_path_buf(),
            source,
        })?;
        let rel = entry
            .enclosed_name()
            .ok_or_else(|| InstallError::UnsafeEntry(entry.name().to_string()))?;
        let out_path = into.join(rel);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(InstallError::Extract)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(InstallError::Extract)?;
        }
        let mut out = File::create(&out_path).map_err(InstallError::Extract)?;
        io::copy(&mut entry, &mut out).map_err(InstallError::Extract)?;
    }
    Ok(())
}

/// Recursive copy; returns the number of files copied.
fn copy_tree(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut copied = 0;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copied += copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Move staged entries into their final place. Directories that already
/// exist at the destination are merged; files are replaced with an atomic
/// rename (staging and destination share a filesystem).
fn promote(staging: &Path, dst: &Path) -> io::Result<()> {
    for entry in fs::read_dir(staging)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() && target.is_dir() {
            promote(&entry.path(), &target)?;
        } else {
            fs::rename(entry.path(), &target)?;
        }
    }
    Ok(())
}
