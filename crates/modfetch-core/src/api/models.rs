//! Wire models for the mod.io v1 API.
//!
//! Only the fields the pipeline consumes are declared; everything else in
//! the JSON is ignored. Fields that have drifted in shape historically
//! (`date_added`) get lenient deserializers so one malformed record cannot
//! poison a whole file list.

use serde::Deserialize;

/// Paginated envelope: `{ "data": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Paged<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// A game as returned by `GET /games`.
#[derive(Debug, Clone, Deserialize)]
pub struct GameInfo {
    pub id: u64,
    #[serde(default)]
    pub name_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A mod as returned by `GET /games/{id}/mods`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModInfo {
    pub id: u64,
    #[serde(default)]
    pub game_id: Option<u64>,
    #[serde(default)]
    pub name_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One downloadable file of a mod.
#[derive(Debug, Clone, Deserialize)]
pub struct ModFileInfo {
    pub id: u64,
    /// Unix seconds. A missing or malformed value is treated as the
    /// earliest possible time so such files never win selection.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub date_added: i64,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub download: Option<DownloadInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadInfo {
    #[serde(default)]
    pub binary_url: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

impl ModFileInfo {
    /// Size the server claims for the binary, preferring the top-level field.
    pub fn expected_size(&self) -> Option<u64> {
        self.filesize
            .or_else(|| self.download.as_ref().and_then(|d| d.filesize))
    }
}

/// Accepts an integer, a numeric string, or garbage; garbage becomes 0.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        serde_json::Value::String(s) => s.parse::<i64>().unwrap_or(0),
        _ => 0,
    })
}
