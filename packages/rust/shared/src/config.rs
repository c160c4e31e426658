//! Application configuration for Tidewatch.
//!
//! User config lives at `~/.tidewatch/tidewatch.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file; it only names the environment
//! variables that hold them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TidewatchError};
use crate::types::DEFAULT_SOURCE_TAG;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "tidewatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".tidewatch";

/// Coastal-hazard search expression: hazard keywords AND place keywords,
/// English only, no retweets.
pub const DEFAULT_QUERY: &str = r#"("oil spill" OR "illegal fishing" OR "red tide" OR "whale beaching" OR "polluted beach") (India OR Mumbai OR Chennai OR Vizag OR coast OR ocean) -is:retweet lang:en"#;

// ---------------------------------------------------------------------------
// Config structs (matching tidewatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search API settings.
    #[serde(default)]
    pub twitter: TwitterConfig,

    /// Mention store settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Polling schedule.
    #[serde(default)]
    pub poll: PollConfig,
}

/// `[twitter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// Name of the env var holding the bearer token.
    #[serde(default = "default_bearer_token_env")]
    pub bearer_token_env: String,

    /// API origin; overridden in tests to point at a mock server.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Search expression sent verbatim on every tick.
    #[serde(default = "default_query")]
    pub query: String,

    /// Page size requested per tick.
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// HTTP request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            bearer_token_env: default_bearer_token_env(),
            api_base_url: default_api_base_url(),
            query: default_query(),
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_bearer_token_env() -> String {
    "TWITTER_BEARER_TOKEN".into()
}
fn default_api_base_url() -> String {
    "https://api.twitter.com".into()
}
fn default_query() -> String {
    DEFAULT_QUERY.into()
}
fn default_max_results() -> u32 {
    10
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the env var holding the connection string
    /// (a local path, `file:` URL, or `libsql://` URL).
    #[serde(default = "default_url_env")]
    pub url_env: String,

    /// Name of the env var holding the auth token for remote databases.
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            auth_token_env: default_auth_token_env(),
        }
    }
}

fn default_url_env() -> String {
    "TIDEWATCH_DATABASE_URL".into()
}
fn default_auth_token_env() -> String {
    "TIDEWATCH_DATABASE_AUTH_TOKEN".into()
}

/// `[poll]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds to sleep after each tick finishes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Tag written into `source` on every new record.
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            source_tag: default_source_tag(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}
fn default_source_tag() -> String {
    DEFAULT_SOURCE_TAG.into()
}

// ---------------------------------------------------------------------------
// Ingest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime ingestion settings, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Opaque search expression.
    pub query: String,
    /// Page size per search request.
    pub max_results: u32,
    /// Tag stored in `MentionRecord::source`.
    pub source_tag: String,
    /// Fixed pause between the end of one tick and the start of the next.
    pub interval: Duration,
}

impl From<&AppConfig> for IngestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            query: config.twitter.query.clone(),
            max_results: config.twitter.max_results,
            source_tag: config.poll.source_tag.clone(),
            interval: Duration::from_secs(config.poll.interval_secs),
        }
    }
}

/// Resolved database location and credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    /// Local path or remote URL.
    pub url: String,
    /// Auth token for remote databases.
    pub auth_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.tidewatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| TidewatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.tidewatch/tidewatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TidewatchError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TidewatchError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TidewatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TidewatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TidewatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject values that would make every tick fail.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.twitter.query.trim().is_empty() {
        return Err(TidewatchError::config("twitter.query must not be empty"));
    }
    if config.poll.source_tag.trim().is_empty() {
        return Err(TidewatchError::config("poll.source_tag must not be empty"));
    }
    if config.poll.interval_secs == 0 {
        return Err(TidewatchError::config("poll.interval_secs must be at least 1"));
    }
    url::Url::parse(&config.twitter.api_base_url).map_err(|e| {
        TidewatchError::config(format!(
            "twitter.api_base_url '{}' is not a valid URL: {e}",
            config.twitter.api_base_url
        ))
    })?;
    Ok(())
}

/// Read the search API bearer token from the configured env var.
pub fn resolve_bearer_token(config: &AppConfig) -> Result<String> {
    let var_name = &config.twitter.bearer_token_env;
    require_env(var_name, |name| std::env::var(name).ok()).map_err(|_| {
        TidewatchError::config(format!(
            "Twitter bearer token not found. Set the {var_name} environment variable."
        ))
    })
}

/// Read the database connection string (and optional auth token).
pub fn resolve_database(config: &AppConfig) -> Result<DatabaseTarget> {
    resolve_database_with(config, |name| std::env::var(name).ok())
}

fn resolve_database_with(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<DatabaseTarget> {
    let var_name = &config.database.url_env;
    let url = require_env(var_name, &lookup).map_err(|_| {
        TidewatchError::config(format!(
            "database connection string not found. Set the {var_name} environment variable."
        ))
    })?;

    let auth_token = lookup(&config.database.auth_token_env).filter(|t| !t.is_empty());

    Ok(DatabaseTarget { url, auth_token })
}

fn require_env(name: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
    match lookup(name) {
        Some(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(TidewatchError::config(format!("{name} is not set"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("TWITTER_BEARER_TOKEN"));
        assert!(toml_str.contains("TIDEWATCH_DATABASE_URL"));
        assert!(toml_str.contains("interval_secs = 60"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[poll]
interval_secs = 15

[twitter]
query = "\"red tide\" lang:en"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.poll.interval_secs, 15);
        assert_eq!(config.poll.source_tag, "twitter");
        assert_eq!(config.twitter.query, "\"red tide\" lang:en");
        assert_eq!(config.twitter.max_results, 10);
        assert_eq!(config.database.url_env, "TIDEWATCH_DATABASE_URL");
    }

    #[test]
    fn ingest_config_from_app_config() {
        let app = AppConfig::default();
        let ingest = IngestConfig::from(&app);
        assert_eq!(ingest.max_results, 10);
        assert_eq!(ingest.interval, Duration::from_secs(60));
        assert_eq!(ingest.source_tag, "twitter");
        assert!(ingest.query.contains("-is:retweet lang:en"));
    }

    #[test]
    fn load_rejects_empty_query() {
        let path = std::env::temp_dir().join(format!("tw_cfg_{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[twitter]\nquery = \"  \"\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("twitter.query"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = AppConfig::default();
        config.poll.interval_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, TidewatchError::Config { .. }));
        assert!(err.to_string().contains("poll.interval_secs"));
    }

    #[test]
    fn missing_bearer_token_is_config_error() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.twitter.bearer_token_env = "TW_TEST_NONEXISTENT_TOKEN_12345".into();
        let err = resolve_bearer_token(&config).unwrap_err();
        assert!(matches!(err, TidewatchError::Config { .. }));
        assert!(err.to_string().contains("TW_TEST_NONEXISTENT_TOKEN_12345"));
    }

    #[test]
    fn database_target_resolution() {
        let config = AppConfig::default();

        let err = resolve_database_with(&config, |_| None).unwrap_err();
        assert!(err.to_string().contains("TIDEWATCH_DATABASE_URL"));

        let target = resolve_database_with(&config, |name| match name {
            "TIDEWATCH_DATABASE_URL" => Some("libsql://mentions.example.io".into()),
            "TIDEWATCH_DATABASE_AUTH_TOKEN" => Some("secret".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(target.url, "libsql://mentions.example.io");
        assert_eq!(target.auth_token.as_deref(), Some("secret"));

        let local = resolve_database_with(&config, |name| {
            (name == "TIDEWATCH_DATABASE_URL").then(|| "/var/lib/tidewatch/mentions.db".into())
        })
        .unwrap();
        assert!(local.auth_token.is_none());
    }
}
