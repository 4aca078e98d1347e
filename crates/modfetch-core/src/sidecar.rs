//! Append-only metadata log of successful downloads.
//!
//! One JSON object per line. Purely informational; nothing in the
//! pipeline reads it back.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadRecord {
    pub mod_id: u64,
    pub file_id: u64,
    pub filename: String,
    pub downloaded_at: DateTime<Utc>,
}

/// Append one record as a JSON line, creating the file (and parent dir)
/// if needed.
pub fn append(path: &Path, record: &DownloadRecord) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open metadata log: {}", path.display()))?;
    let line = serde_json::to_string(record).context("serialize download record")?;
    writeln!(file, "{line}").with_context(|| format!("append to metadata log: {}", path.display()))?;
    Ok(())
}
