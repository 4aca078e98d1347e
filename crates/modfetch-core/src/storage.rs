//! Temp-file lifecycle for downloads.
//!
//! Bytes stream into a `.part` sibling of the final path; only a full,
//! length-verified transfer is renamed into place, so a partial file is
//! never visible at the destination. An abandoned `.part` file is always
//! safe to delete.

use std::path::{Path, PathBuf};

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path
/// (e.g. `pack.zip` → `pack.zip.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Atomically rename the completed temp file into place. Both paths live
/// in the same directory, so the rename cannot cross filesystems.
pub async fn finalize(temp: &Path, final_path: &Path) -> std::io::Result<()> {
    tokio::fs::rename(temp, final_path).await
}

/// Remove a leftover temp file, ignoring absence.
pub async fn discard(temp: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(path = %temp.display(), error = %e, "could not remove temp file");
        }
    }
}
