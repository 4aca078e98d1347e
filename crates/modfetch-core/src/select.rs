//! File selection: pick exactly one file out of a mod's file list.
//!
//! The rule is total and deterministic: latest `date_added` wins, with
//! ties broken by the highest file id. Malformed timestamps were already
//! coerced to 0 (earliest) at the API boundary.

use std::path::Path;

use thiserror::Error;

use crate::api::ModFileInfo;

/// Fallback when neither the record nor its URL yields a usable filename.
const DEFAULT_FILENAME: &str = "modfile.bin";

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("mod has no downloadable files")]
    NoFiles,
}

/// A mod file with everything the transfer engine needs, mapped out of the
/// wire model. Records without a download URL are dropped during mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_id: u64,
    pub date_added: i64,
    pub download_url: String,
    pub filename: String,
    pub version: Option<String>,
    pub size: Option<u64>,
}

impl FileRecord {
    /// Map a wire record, returning `None` when it carries no binary URL.
    pub fn from_api(f: &ModFileInfo) -> Option<Self> {
        let download_url = f
            .download
            .as_ref()
            .and_then(|d| d.binary_url.as_deref())
            .map(|u| u.replace("\\/", "/"))?;
        if download_url.trim().is_empty() {
            return None;
        }
        let filename = f
            .filename
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| filename_from_url(&download_url))
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        Some(Self {
            file_id: f.id,
            date_added: f.date_added,
            download_url,
            filename,
            version: f.version.clone(),
            size: f.expected_size(),
        })
    }
}

/// Map a whole file list, dropping unusable records.
pub fn map_records(files: &[ModFileInfo]) -> Vec<FileRecord> {
    files.iter().filter_map(FileRecord::from_api).collect()
}

/// Selects the file to download: maximum `date_added`, ties broken by the
/// highest `file_id`. Re-running on the same list always yields the same
/// record.
pub fn select_latest(files: &[FileRecord]) -> Result<&FileRecord, SelectionError> {
    files
        .iter()
        .max_by_key(|f| (f.date_added, f.file_id))
        .ok_or(SelectionError::NoFiles)
}

/// Last path segment of the download URL, percent-decoded, as a filename
/// hint. Path separators in the decoded value are rejected.
fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = percent_decode(segment);
    let name = Path::new(&decoded).file_name()?.to_str()?;
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

fn percent_decode(s: &str) -> String {
    // Decoded byte-wise: slicing the str would panic if a multibyte
    // character followed a stray '%'.
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
