//! Pure parsing of mod.io mod page URLs.
//!
//! The expected shape is `https://mod.io/g/<game_slug>/m/<mod_slug>`;
//! query strings, fragments, and trailing path segments are ignored.
//! Parsing performs no I/O.

use super::ResolutionError;

/// The (game_slug, mod_slug) pair embedded in a pasted URL. Exists only
/// for the duration of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModReference {
    pub game_slug: String,
    pub mod_slug: String,
}

/// Parses a pasted mod.io URL into a [`ModReference`].
///
/// Accepts `mod.io` and `www.mod.io` hosts over http/https. Anything after
/// the mod slug (extra segments, `?`, `#`) is ignored, as is trailing text
/// after the first whitespace (people paste URLs with annotations).
pub fn parse_mod_url(raw: &str) -> Result<ModReference, ResolutionError> {
    let token = raw
        .split_whitespace()
        .next()
        .ok_or_else(|| ResolutionError::InvalidUrl(raw.to_string()))?;

    let parsed =
        url::Url::parse(token).map_err(|_| ResolutionError::InvalidUrl(token.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ResolutionError::InvalidUrl(token.to_string()));
    }
    let host = parsed.host_str().unwrap_or("");
    if !host.eq_ignore_ascii_case("mod.io") && !host.eq_ignore_ascii_case("www.mod.io") {
        return Err(ResolutionError::InvalidUrl(token.to_string()));
    }

    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["g", game_slug, "m", mod_slug, ..] if !game_slug.is_empty() && !mod_slug.is_empty() => {
            Ok(ModReference {
                game_slug: game_slug.to_string(),
                mod_slug: mod_slug.to_string(),
            })
        }
        _ => Err(ResolutionError::InvalidUrl(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_url() {
        let r = parse_mod_url("https://mod.io/g/spaceengineers/m/assault-weapons-pack1").unwrap();
        assert_eq!(r.game_slug, "spaceengineers");
        assert_eq!(r.mod_slug, "assault-weapons-pack1");
    }

    #[test]
    fn parses_www_and_http() {
        let r = parse_mod_url("http://www.mod.io/g/drg/m/some-mod").unwrap();
        assert_eq!(r.game_slug, "drg");
        assert_eq!(r.mod_slug, "some-mod");
    }

    #[test]
    fn ignores_query_fragment_and_trailing_segments() {
        let r = parse_mod_url("https://mod.io/g/drg/m/some-mod/gallery?tab=files#top").unwrap();
        assert_eq!(r.mod_slug, "some-mod");
    }

    #[test]
    fn ignores_text_after_whitespace() {
        let r = parse_mod_url("https://mod.io/g/drg/m/some-mod  # my favourite").unwrap();
        assert_eq!(r.mod_slug, "some-mod");
    }

    #[test]
    fn rejects_malformed_inputs() {
        for bad in [
            "",
            "not a url",
            "ftp://mod.io/g/a/m/b",
            "https://example.com/g/a/m/b",
            "https://mod.io/g/a",
            "https://mod.io/g/a/m/",
            "https://mod.io/m/a/g/b",
        ] {
            assert!(
                matches!(parse_mod_url(bad), Err(ResolutionError::InvalidUrl(_))),
                "should reject {bad:?}"
            );
        }
    }

    #[test]
    fn parsing_is_deterministic() {
        let url = "https://mod.io/g/spaceengineers/m/assault-weapons-pack1";
        assert_eq!(parse_mod_url(url).unwrap(), parse_mod_url(url).unwrap());
    }
}
