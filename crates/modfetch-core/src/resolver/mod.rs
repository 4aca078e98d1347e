//! Identity resolution: slug pair → stable numeric identities.
//!
//! Two sequential lookups (game, then mod within the game), each with a
//! search-based fallback because slugs drift over time while display names
//! persist. Game identities are cached in memory for the lifetime of a
//! batch run so a file of URLs for one game costs one lookup.

mod url;

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::api::{ApiClient, ApiError, GameInfo, ModInfo};

pub use url::{parse_mod_url, ModReference};

/// A game slug resolved to its numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameIdentity {
    pub slug: String,
    pub id: u64,
    /// Display name, when the API provided one. Informational only.
    pub name: Option<String>,
}

/// A mod slug resolved under a specific game. Only meaningful paired with
/// the game it was resolved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModIdentity {
    pub slug: String,
    pub id: u64,
    pub game_id: u64,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("invalid mod.io URL (expected https://mod.io/g/<game>/m/<mod>): {0}")]
    InvalidUrl(String),

    /// Covers both "does not exist" and access-restricted content: a
    /// private, unlisted, or OAuth-only game looks identical to a missing
    /// one when queried with a plain API key.
    #[error("game '{slug}' was not found, or is not accessible with this API key")]
    GameNotFound { slug: String },

    #[error("mod '{slug}' was not found in game {game_id}")]
    ModNotFound { slug: String, game_id: u64 },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Resolves slugs to identities against the API, caching game lookups.
///
/// Safe to share across batch workers; the cache lock is never held over
/// a network call.
pub struct Resolver {
    api: ApiClient,
    games: Mutex<HashMap<String, GameIdentity>>,
}

impl Resolver {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            games: Mutex::new(HashMap::new()),
        }
    }

    /// Full resolution for one parsed URL: game first, then mod under it.
    pub async fn resolve(&self, reference: &ModReference) -> Result<ModIdentity, ResolutionError> {
        let game = self.resolve_game(&reference.game_slug).await?;
        self.resolve_mod(&game, &reference.mod_slug).await
    }

    /// Resolve a game slug, consulting the per-run cache first.
    pub async fn resolve_game(&self, slug: &str) -> Result<GameIdentity, ResolutionError> {
        let key = slug.to_ascii_lowercase();
        if let Some(cached) = self.games.lock().expect("game cache poisoned").get(&key) {
            tracing::debug!(slug, id = cached.id, "game resolved from cache");
            return Ok(cached.clone());
        }

        let identity = self.lookup_game(slug).await?;
        self.games
            .lock()
            .expect("game cache poisoned")
            .insert(key, identity.clone());
        Ok(identity)
    }

    async fn lookup_game(&self, slug: &str) -> Result<GameIdentity, ResolutionError> {
        let direct = match self.api.game_by_slug(slug).await {
            Ok(games) => games,
            Err(e) if e.is_not_found_or_restricted() => {
                return Err(ResolutionError::GameNotFound { slug: slug.to_string() })
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(game) = direct.into_iter().next() {
            return Ok(game_identity(slug, game));
        }

        // Slug lookup came back empty; the slug may have drifted. Search
        // and accept only an exact (case-insensitive) name_id match.
        let candidates = self.api.search_games(slug).await?;
        let mut matches = candidates
            .into_iter()
            .filter(|g| slug_matches(g.name_id.as_deref(), slug));
        match (matches.next(), matches.next()) {
            (Some(game), None) => Ok(game_identity(slug, game)),
            _ => Err(ResolutionError::GameNotFound { slug: slug.to_string() }),
        }
    }

    /// Resolve a mod slug within an already-resolved game.
    ///
    /// Order: direct slug lookup, then a search scoped to the game (exactly
    /// one exact slug match required), then — as a last resort for pasted
    /// URLs that embed a numeric id — a direct id fetch.
    pub async fn resolve_mod(
        &self,
        game: &GameIdentity,
        slug: &str,
    ) -> Result<ModIdentity, ResolutionError> {
        let not_found = || ResolutionError::ModNotFound {
            slug: slug.to_string(),
            game_id: game.id,
        };

        match self.api.mod_by_slug(game.id, slug).await {
            Ok(mods) => {
                if let Some(m) = mods.into_iter().next() {
                    return Ok(mod_identity(slug, game.id, m));
                }
            }
            Err(e) if e.is_not_found_or_restricted() => {}
            Err(e) => return Err(e.into()),
        }

        let candidates = self.api.search_mods(game.id, slug).await?;
        let mut matches = candidates
            .into_iter()
            .filter(|m| m.game_id.map_or(true, |gid| gid == game.id))
            .filter(|m| slug_matches(m.name_id.as_deref(), slug));
        if let (Some(m), None) = (matches.next(), matches.next()) {
            return Ok(mod_identity(slug, game.id, m));
        }

        if slug.chars().all(|c| c.is_ascii_digit()) && !slug.is_empty() {
            if let Ok(id) = slug.parse::<u64>() {
                match self.api.mod_by_id(game.id, id).await {
                    Ok(m) => return Ok(mod_identity(slug, game.id, m)),
                    Err(e) if e.is_not_found_or_restricted() => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Err(not_found())
    }
}

fn slug_matches(name_id: Option<&str>, slug: &str) -> bool {
    name_id.is_some_and(|n| n.eq_ignore_ascii_case(slug))
}

fn game_identity(slug: &str, game: GameInfo) -> GameIdentity {
    GameIdentity {
        slug: slug.to_string(),
        id: game.id,
        name: game.name,
    }
}

fn mod_identity(slug: &str, game_id: u64, m: ModInfo) -> ModIdentity {
    ModIdentity {
        slug: slug.to_string(),
        id: m.id,
        game_id,
        name: m.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_match_is_case_insensitive() {
        assert!(slug_matches(Some("Assault-Weapons-Pack1"), "assault-weapons-pack1"));
        assert!(!slug_matches(Some("other"), "assault-weapons-pack1"));
        assert!(!slug_matches(None, "assault-weapons-pack1"));
    }

    #[test]
    fn identities_carry_their_game() {
        let m = mod_identity(
            "pack",
            4,
            ModInfo {
                id: 77,
                game_id: Some(4),
                name_id: Some("pack".into()),
                name: None,
            },
        );
        assert_eq!(m.game_id, 4);
        assert_eq!(m.id, 77);
    }
}
