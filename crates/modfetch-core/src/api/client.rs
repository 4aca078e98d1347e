//! Thin reqwest wrapper over the mod.io endpoints the pipeline uses.

use std::time::Duration;

use super::error::ApiError;
use super::models::{GameInfo, ModFileInfo, ModInfo, Paged};

/// Production API base. Tests point the client at a local stub instead.
pub const API_BASE: &str = "https://api.mod.io/v1";

pub const USER_AGENT: &str = concat!("modfetch/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the mod.io API. Cheap to clone; the underlying reqwest
/// client is shared. Holds the API key explicitly.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the credential.
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base(api_key, API_BASE)
    }

    /// Client against an arbitrary base URL (no trailing slash). Used by
    /// integration tests to talk to a local stub server.
    pub fn with_base(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Underlying HTTP client, for the transfer engine's binary GETs.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &'static str,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after = parse_retry_after(resp.headers());
            return Err(ApiError::RateLimited { context, retry_after });
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                context,
            });
        }

        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { context, source })
    }

    pub async fn game_by_slug(&self, slug: &str) -> Result<Vec<GameInfo>, ApiError> {
        let page: Paged<GameInfo> = self
            .get_json("/games", &[("name_id", slug), ("limit", "1")], "resolving game")
            .await?;
        Ok(page.data)
    }

    pub async fn search_games(&self, query: &str) -> Result<Vec<GameInfo>, ApiError> {
        let page: Paged<GameInfo> = self
            .get_json("/games", &[("_q", query), ("limit", "100")], "searching games")
            .await?;
        Ok(page.data)
    }

    pub async fn mod_by_slug(&self, game_id: u64, slug: &str) -> Result<Vec<ModInfo>, ApiError> {
        let page: Paged<ModInfo> = self
            .get_json(
                &format!("/games/{game_id}/mods"),
                &[("name_id", slug), ("limit", "1")],
                "resolving mod",
            )
            .await?;
        Ok(page.data)
    }

    pub async fn search_mods(&self, game_id: u64, query: &str) -> Result<Vec<ModInfo>, ApiError> {
        let page: Paged<ModInfo> = self
            .get_json(
                &format!("/games/{game_id}/mods"),
                &[("_q", query), ("limit", "100")],
                "searching mods",
            )
            .await?;
        Ok(page.data)
    }

    pub async fn mod_by_id(&self, game_id: u64, mod_id: u64) -> Result<ModInfo, ApiError> {
        self.get_json(
            &format!("/games/{game_id}/mods/{mod_id}"),
            &[],
            "fetching mod details",
        )
        .await
    }

    pub async fn mod_files(&self, game_id: u64, mod_id: u64) -> Result<Vec<ModFileInfo>, ApiError> {
        let page: Paged<ModFileInfo> = self
            .get_json(
                &format!("/games/{game_id}/mods/{mod_id}/files"),
                &[("limit", "100")],
                "listing mod files",
            )
            .await?;
        Ok(page.data)
    }
}

/// Parse a `Retry-After` header value in seconds (the delta form; the
/// HTTP-date form is ignored).
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
