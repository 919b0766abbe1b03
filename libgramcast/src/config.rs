//! Configuration management for Gramcast
//!
//! Everything the agent needs is read once at startup into an immutable
//! [`Config`] and handed to each component's constructor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

/// Marker prefix used by the shipped config template
const PLACEHOLDER_PREFIX: &str = "your-";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub media: MediaConfig,
    #[serde(default)]
    pub hashtags: HashtagsConfig,
    pub staging: StagingConfig,
    pub graph: GraphConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub directory: String,
    #[serde(default = "default_max_image_mb")]
    pub max_image_mb: u64,
    #[serde(default = "default_max_video_mb")]
    pub max_video_mb: u64,
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashtagsConfig {
    #[serde(default = "default_hashtags_file")]
    pub file: String,
    #[serde(default = "default_hashtag_count")]
    pub count: usize,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub remote_dir: String,
    pub public_base_url: String,
    #[serde(default = "default_staging_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub account_id: String,
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_thumb_offset")]
    pub reels_thumb_offset: u64,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_file")]
    pub file: String,
    #[serde(default = "default_warning_days")]
    pub warning_days: i64,
    #[serde(default = "default_lifetime_days")]
    pub lifetime_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_cycle_delay")]
    pub cycle_delay: DelayRange,
    #[serde(default = "default_settle_delay")]
    pub settle_delay: DelayRange,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// Inclusive range of whole minutes a delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_minutes: u64,
    pub max_minutes: u64,
}

impl DelayRange {
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            max_minutes,
        }
    }
}

impl Default for HashtagsConfig {
    fn default() -> Self {
        Self {
            file: default_hashtags_file(),
            count: default_hashtag_count(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            file: default_token_file(),
            warning_days: default_warning_days(),
            lifetime_days: default_lifetime_days(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cycle_delay: default_cycle_delay(),
            settle_delay: default_settle_delay(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl fmt::Debug for StagingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("remote_dir", &self.remote_dir)
            .field("public_base_url", &self.public_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("account_id", &self.account_id)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .field("reels_thumb_offset", &self.reels_thumb_offset)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl GraphConfig {
    /// Versioned graph endpoint, e.g. `https://graph.facebook.com/v18.0`
    pub fn versioned_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_version.trim_matches('/')
        )
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// Secrets missing from the file are taken from `GRAMCAST_APP_SECRET`
    /// and `GRAMCAST_SFTP_PASSWORD`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.graph.app_secret.is_empty() {
            if let Ok(secret) = std::env::var("GRAMCAST_APP_SECRET") {
                self.graph.app_secret = secret;
            }
        }
        if self.staging.password.is_empty() {
            if let Ok(password) = std::env::var("GRAMCAST_SFTP_PASSWORD") {
                self.staging.password = password;
            }
        }
    }

    /// Check that every credential is present and every range is sane
    ///
    /// Called once before the daemon starts; failures are fatal.
    pub fn validate(&self) -> Result<()> {
        self.validate_graph_credentials()?;

        require("staging.host", &self.staging.host)?;
        require("staging.username", &self.staging.username)?;
        require("staging.password", &self.staging.password)?;
        require("staging.remote_dir", &self.staging.remote_dir)?;
        require("staging.public_base_url", &self.staging.public_base_url)?;
        require("media.directory", &self.media.directory)?;

        check_range("schedule.cycle_delay", self.schedule.cycle_delay)?;
        check_range("schedule.settle_delay", self.schedule.settle_delay)?;

        if self.schedule.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "schedule.poll_interval_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }

        if self.token.warning_days >= self.token.lifetime_days {
            return Err(ConfigError::Invalid {
                field: "token.warning_days".to_string(),
                reason: "must be shorter than token.lifetime_days".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Only the graph app credentials; enough for the setup wizard
    pub fn validate_graph_credentials(&self) -> Result<()> {
        require("graph.account_id", &self.graph.account_id)?;
        require("graph.app_id", &self.graph.app_id)?;
        require("graph.app_secret", &self.graph.app_secret)?;
        Ok(())
    }

    pub fn media_directory(&self) -> PathBuf {
        expand_path(&self.media.directory)
    }

    pub fn hashtags_path(&self) -> PathBuf {
        expand_path(&self.hashtags.file)
    }

    pub fn token_path(&self) -> PathBuf {
        expand_path(&self.token.file)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if value.is_empty() || value.starts_with(PLACEHOLDER_PREFIX) {
        return Err(ConfigError::MissingField(field.to_string()).into());
    }
    Ok(())
}

fn check_range(field: &str, range: DelayRange) -> Result<()> {
    if range.min_minutes > range.max_minutes {
        return Err(ConfigError::Invalid {
            field: field.to_string(),
            reason: "min_minutes exceeds max_minutes".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Expand `~` in a configured path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("GRAMCAST_CONFIG") {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("gramcast").join("config.toml"))
}

fn default_max_image_mb() -> u64 {
    8
}

fn default_max_video_mb() -> u64 {
    100
}

fn default_video_extensions() -> Vec<String> {
    [".mp4", ".avi", ".mkv", ".mov", ".wmv", ".flv", ".webm"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_hashtags_file() -> String {
    "~/.config/gramcast/hashtags.txt".to_string()
}

fn default_hashtag_count() -> usize {
    5
}

fn default_sftp_port() -> u16 {
    22
}

fn default_staging_timeout() -> u64 {
    30
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
    "v18.0".to_string()
}

fn default_thumb_offset() -> u64 {
    10
}

fn default_http_timeout() -> u64 {
    10
}

fn default_token_file() -> String {
    "~/.local/share/gramcast/token.json".to_string()
}

fn default_warning_days() -> i64 {
    7
}

fn default_lifetime_days() -> i64 {
    60
}

fn default_cycle_delay() -> DelayRange {
    DelayRange::new(150, 300)
}

fn default_settle_delay() -> DelayRange {
    DelayRange::new(1, 3)
}

fn default_poll_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GramcastError;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[media]
directory = "/srv/media"

[staging]
host = "sftp.example.com"
username = "poster"
password = "hunter2"
remote_dir = "/public_html/uploads/"
public_base_url = "https://example.com/uploads/"

[graph]
account_id = "17841400000000000"
app_id = "123456"
app_secret = "shh"
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_minimal_config_uses_defaults() {
        let file = write_config(MINIMAL);
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.media.max_image_mb, 8);
        assert_eq!(config.media.max_video_mb, 100);
        assert!(config.media.video_extensions.contains(&".webm".to_string()));
        assert_eq!(config.hashtags.count, 5);
        assert_eq!(config.staging.port, 22);
        assert_eq!(config.graph.api_version, "v18.0");
        assert_eq!(config.graph.reels_thumb_offset, 10);
        assert_eq!(config.token.warning_days, 7);
        assert_eq!(config.token.lifetime_days, 60);
        assert_eq!(config.schedule.cycle_delay, DelayRange::new(150, 300));
        assert_eq!(config.schedule.settle_delay, DelayRange::new(1, 3));
        assert_eq!(config.schedule.poll_interval_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_versioned_url_trims_slashes() {
        let file = write_config(MINIMAL);
        let mut config = Config::load_from_path(file.path()).unwrap();
        config.graph.base_url = "http://127.0.0.1:9000/".to_string();
        assert_eq!(config.graph.versioned_url(), "http://127.0.0.1:9000/v18.0");
    }

    #[test]
    #[serial]
    fn test_placeholder_credentials_rejected() {
        let content = MINIMAL.replace("app_id = \"123456\"", "app_id = \"your-app-id-here\"");
        let file = write_config(&content);
        let config = Config::load_from_path(file.path()).unwrap();

        match config.validate() {
            Err(GramcastError::Config(ConfigError::MissingField(field))) => {
                assert_eq!(field, "graph.app_id")
            }
            other => panic!("Expected missing graph.app_id, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_secrets_fall_back_to_environment() {
        let content = MINIMAL
            .replace("app_secret = \"shh\"", "")
            .replace("password = \"hunter2\"", "");
        let file = write_config(&content);

        std::env::set_var("GRAMCAST_APP_SECRET", "from-env");
        std::env::set_var("GRAMCAST_SFTP_PASSWORD", "env-pass");
        let config = Config::load_from_path(file.path()).unwrap();
        std::env::remove_var("GRAMCAST_APP_SECRET");
        std::env::remove_var("GRAMCAST_SFTP_PASSWORD");

        assert_eq!(config.graph.app_secret, "from-env");
        assert_eq!(config.staging.password, "env-pass");
    }

    #[test]
    #[serial]
    fn test_missing_secret_fails_validation() {
        std::env::remove_var("GRAMCAST_SFTP_PASSWORD");
        let content = MINIMAL.replace("password = \"hunter2\"", "");
        let file = write_config(&content);
        let config = Config::load_from_path(file.path()).unwrap();

        assert!(matches!(
            config.validate(),
            Err(GramcastError::Config(ConfigError::MissingField(ref f))) if f == "staging.password"
        ));
    }

    #[test]
    #[serial]
    fn test_inverted_delay_range_rejected() {
        let content = format!(
            "{}\n[schedule]\ncycle_delay = {{ min_minutes = 300, max_minutes = 150 }}\n",
            MINIMAL
        );
        let file = write_config(&content);
        let config = Config::load_from_path(file.path()).unwrap();

        assert!(matches!(
            config.validate(),
            Err(GramcastError::Config(ConfigError::Invalid { .. }))
        ));
    }

    #[test]
    fn test_unparsable_config_is_parse_error() {
        let file = write_config("invalid toml content [[[");
        match Config::load_from_path(file.path()) {
            Err(GramcastError::Config(ConfigError::ParseError(_))) => {}
            other => panic!("Expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let file = write_config(MINIMAL);
        let config = Config::load_from_path(file.path()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("\"shh\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_honors_env() {
        std::env::set_var("GRAMCAST_CONFIG", "/tmp/gramcast-test.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("GRAMCAST_CONFIG");
        assert_eq!(path, PathBuf::from("/tmp/gramcast-test.toml"));
    }
}
