use std::env;
use std::path::PathBuf;

use url::Url;

const DEFAULT_TABLE: &str = "HWS_YTVideos";
const DEFAULT_SITE_URL: &str = "http://localhost:5173";
const STATE_DIR_NAME: &str = ".vidshelf";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} not set. Find it under Project Settings → API in your BaaS dashboard")]
    Missing(&'static str),

    #[error("Invalid {name}: {source}")]
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },

    #[error("Cannot locate a state directory: set VIDSHELF_STATE_DIR or HOME")]
    NoStateDir,
}

/// A secret that never shows up in `Debug` output or logs.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: &str) -> Self {
        Self(key.trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Runtime configuration.
///
/// Read from the environment:
/// - `SUPABASE_URL`: project URL (required)
/// - `SUPABASE_ANON_KEY`: public anon key (required)
/// - `VIDSHELF_TABLE`: videos table (default `HWS_YTVideos`)
/// - `VIDSHELF_STATE_DIR`: where the session is kept (default `$HOME/.vidshelf`)
/// - `VIDSHELF_SITE_URL`: public site used for share links and auth redirects
#[derive(Debug, Clone)]
pub struct Config {
    pub project_url: Url,
    pub anon_key: ApiKey,
    pub table: String,
    pub state_dir: PathBuf,
    pub site_url: Url,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let project_url = get("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let project_url = parse_base_url("SUPABASE_URL", &project_url)?;
        let anon_key = get("SUPABASE_ANON_KEY").ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?;
        let table = get("VIDSHELF_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        let state_dir = match get("VIDSHELF_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => get("HOME")
                .map(|home| PathBuf::from(home).join(STATE_DIR_NAME))
                .ok_or(ConfigError::NoStateDir)?,
        };
        let site_url = get("VIDSHELF_SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
        let site_url = parse_base_url("VIDSHELF_SITE_URL", &site_url)?;

        Ok(Self {
            project_url,
            anon_key: ApiKey::new(&anon_key),
            table,
            state_dir,
            site_url,
        })
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins append instead of replace.
fn parse_base_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash).map_err(|source| ConfigError::InvalidUrl { name, source })
}
