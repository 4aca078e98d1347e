use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per transfer (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/modfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModfetchConfig {
    /// mod.io API key. Can be overridden by `--api-key` or `MODFETCH_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Where downloaded mod files (and the cache ledger) live.
    /// Defaults to `./downloads` under the current directory.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Number of concurrent pipelines in batch mode.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_jobs() -> usize {
    4
}

impl Default for ModfetchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            download_dir: None,
            jobs: default_jobs(),
            retry: None,
        }
    }
}

impl ModfetchConfig {
    /// Effective download directory: config value or `./downloads`.
    pub fn download_dir(&self) -> Result<PathBuf> {
        match &self.download_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?.join("downloads")),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("modfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ModfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ModfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: ModfetchConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ModfetchConfig::default();
        assert_eq!(cfg.jobs, 4);
        assert!(cfg.api_key.is_none());
        assert!(cfg.download_dir.is_none());
        assert!(cfg.retry.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ModfetchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ModfetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.jobs, cfg.jobs);
        assert_eq!(parsed.api_key, cfg.api_key);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            api_key = "abc123"
            download_dir = "/srv/mods"
            jobs = 2

            [retry]
            max_attempts = 3
            base_delay_secs = 0.5
            max_delay_secs = 15
        "#;
        let cfg: ModfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.api_key.as_deref(), Some("abc123"));
        assert_eq!(cfg.download_dir.as_deref(), Some(std::path::Path::new("/srv/mods")));
        assert_eq!(cfg.jobs, 2);
        let retry = cfg.retry.as_ref().unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert!((retry.base_delay_secs - 0.5).abs() < 1e-9);
        assert_eq!(retry.max_delay_secs, 15);
    }
}
