//! Long-lived access token management
//!
//! The token is loaded from a small JSON state file at startup, checked
//! against an expiry warning window before every use, and replaced wholesale
//! when an operator exchanges a fresh short-lived token. There is no silent
//! refresh: once the token enters the warning window the agent stops posting
//! until `gram-setup` is run again.

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Result, TokenError};
use crate::logging::preview;

/// Characters of the token shown in logs
const TOKEN_PREVIEW_LEN: usize = 20;

/// A token together with what we know about its expiry
#[derive(Debug, Clone)]
pub struct Credential {
    token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(token: SecretString, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True when the token expires at or before `now + warning`
    ///
    /// A credential with unknown expiry is not "expiring"; callers have to
    /// validate it remotely instead.
    pub fn is_expiring(&self, now: DateTime<Utc>, warning: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now + warning,
            None => false,
        }
    }
}

/// On-disk shape of the token state file
#[derive(Debug, Serialize, Deserialize)]
struct TokenFile {
    access_token: Option<String>,
    expires_at: Option<String>,
    last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    access_token: String,
}

/// Persists and validates the graph API access token
pub struct TokenStore {
    http: reqwest::Client,
    graph_url: String,
    app_id: String,
    app_secret: SecretString,
    path: PathBuf,
    warning: Duration,
    lifetime: Duration,
    current: Mutex<Option<Credential>>,
}

impl TokenStore {
    /// Create an empty store; nothing is read from disk yet
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            graph_url: config.graph.versioned_url(),
            app_id: config.graph.app_id.clone(),
            app_secret: SecretString::from(config.graph.app_secret.clone()),
            path: config.token_path(),
            warning: Duration::days(config.token.warning_days),
            lifetime: Duration::days(config.token.lifetime_days),
            current: Mutex::new(None),
        }
    }

    /// Create a store and load the persisted token
    ///
    /// If no token file exists and `bootstrap` is given, the bootstrap token
    /// is validated against the graph API and persisted on success.
    pub async fn open(
        config: &Config,
        http: reqwest::Client,
        bootstrap: Option<String>,
    ) -> Result<Self> {
        let store = Self::new(config, http);

        if store.path.exists() {
            let loaded = load_token_file(&store.path).await;
            *store.current.lock().await = loaded;
        } else if let Some(token) = bootstrap.filter(|t| !t.trim().is_empty()) {
            store.adopt_bootstrap(token.trim().to_string()).await?;
        } else {
            debug!(path = %store.path.display(), "No token file and no bootstrap token");
        }

        Ok(store)
    }

    async fn adopt_bootstrap(&self, token: String) -> Result<()> {
        info!("Validating bootstrap token {}", preview(&token, TOKEN_PREVIEW_LEN));

        match self.validate_remote(&token).await {
            Ok(()) => {
                let credential = Credential::new(
                    SecretString::from(token),
                    Some(Utc::now() + self.lifetime),
                );
                persist(&self.path, &credential).await?;
                *self.current.lock().await = Some(credential);
                info!("Bootstrap token accepted and saved");
            }
            Err(e) => {
                // Leave the store empty; startup reports the missing token.
                error!("Bootstrap token rejected: {}", e);
            }
        }
        Ok(())
    }

    /// Path of the persisted token state
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current credential's expiry
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.current
            .lock()
            .await
            .as_ref()
            .and_then(Credential::expires_at)
    }

    /// Check whether the held token can be used right now
    ///
    /// A token with unknown expiry is validated live; on success its expiry is
    /// set to now + the long-lived token lifetime.
    pub async fn is_valid(&self) -> bool {
        let mut current = self.current.lock().await;

        let Some(credential) = current.as_ref() else {
            return false;
        };

        if credential.expires_at().is_none() {
            let token = credential.token().expose_secret().to_string();
            return match self.validate_remote(&token).await {
                Ok(()) => {
                    let refreshed =
                        Credential::new(SecretString::from(token), Some(Utc::now() + self.lifetime));
                    if let Err(e) = persist(&self.path, &refreshed).await {
                        warn!("Token validated but state not saved: {}", e);
                    }
                    *current = Some(refreshed);
                    true
                }
                Err(e) => {
                    warn!("Token validation failed: {}", e);
                    false
                }
            };
        }

        if credential.is_expiring(Utc::now(), self.warning) {
            warn!(
                expires_at = ?credential.expires_at(),
                "Token expires within {} days",
                self.warning.num_days()
            );
            return false;
        }

        true
    }

    /// Return the token if it is valid and outside the warning window
    pub async fn valid_token(&self) -> Option<SecretString> {
        if self.is_valid().await {
            return self
                .current
                .lock()
                .await
                .as_ref()
                .map(|c| c.token().clone());
        }

        error!("Token invalid or expiring soon. Generate a new short-lived token and run gram-setup.");
        None
    }

    /// Exchange a short-lived token for a long-lived one
    ///
    /// On success the new token replaces the old one and is persisted. On
    /// failure the error carries the response body and the held token is
    /// left untouched.
    pub async fn exchange_for_long_lived(&self, short_lived: &str) -> Result<DateTime<Utc>> {
        info!("Exchanging short-lived token for a long-lived one");

        let url = format!("{}/oauth/access_token", self.graph_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("grant_type", "fb_exchange_token"),
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.expose_secret()),
                ("fb_exchange_token", short_lived),
            ])
            .send()
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Exchange response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Exchange {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: ExchangeResponse = response.json().await.map_err(|e| TokenError::Exchange {
            status: status.as_u16(),
            body: format!("unreadable response: {}", e),
        })?;

        let expires_at = Utc::now() + self.lifetime;
        let credential = Credential::new(SecretString::from(parsed.access_token), Some(expires_at));

        persist(&self.path, &credential).await?;
        *self.current.lock().await = Some(credential);

        info!(%expires_at, "Long-lived token obtained");
        Ok(expires_at)
    }

    async fn validate_remote(&self, token: &str) -> std::result::Result<(), TokenError> {
        let url = format!("{}/me", self.graph_url);
        let response = self
            .http
            .get(&url)
            .query(&[("access_token", token)])
            .send()
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "Token validation response");

        if status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(TokenError::Validation {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

async fn load_token_file(path: &Path) -> Option<Credential> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            error!(path = %path.display(), "Could not read token file: {}", e);
            return None;
        }
    };

    let file: TokenFile = match serde_json::from_str(&content) {
        Ok(file) => file,
        Err(e) => {
            error!(path = %path.display(), "Could not parse token file: {}", e);
            return None;
        }
    };

    let token = file.access_token.filter(|t| !t.is_empty())?;
    let expires_at = file.expires_at.as_deref().and_then(parse_timestamp);

    info!(?expires_at, "Loaded token from file");
    Some(Credential::new(SecretString::from(token), expires_at))
}

/// Accepts RFC 3339 and naive ISO-8601 (interpreted as local time)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("Ignoring unreadable expires_at '{}': {}", raw, e);
            None
        }
    }
}

/// Overwrite the state file via a temp file and rename
async fn persist(path: &Path, credential: &Credential) -> std::result::Result<(), TokenError> {
    let file = TokenFile {
        access_token: Some(credential.token().expose_secret().to_string()),
        expires_at: credential.expires_at().map(|dt| dt.to_rfc3339()),
        last_updated: Some(Utc::now().to_rfc3339()),
    };
    let json =
        serde_json::to_string_pretty(&file).map_err(|e| TokenError::Persist(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TokenError::Persist(e.to_string()))?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| TokenError::Persist(e.to_string()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| TokenError::Persist(e.to_string()))?;

    debug!(path = %path.display(), "Token saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential_expiring_in(now: DateTime<Utc>, days: i64) -> Credential {
        Credential::new(
            SecretString::from("token".to_string()),
            Some(now + Duration::days(days)),
        )
    }

    #[test]
    fn test_expiry_inside_warning_window_is_expiring() {
        let now = Utc::now();
        let warning = Duration::days(7);

        for days in [-1, 0, 1, 6, 7] {
            assert!(
                credential_expiring_in(now, days).is_expiring(now, warning),
                "{} days left should be inside the warning window",
                days
            );
        }
    }

    #[test]
    fn test_expiry_beyond_warning_window_is_fine() {
        let now = Utc::now();
        let warning = Duration::days(7);

        for days in [8, 30, 60] {
            assert!(!credential_expiring_in(now, days).is_expiring(now, warning));
        }
    }

    #[test]
    fn test_exact_warning_horizon_is_expiring() {
        let now = Utc::now();
        let credential = Credential::new(
            SecretString::from("token".to_string()),
            Some(now + Duration::days(7)),
        );
        assert!(credential.is_expiring(now, Duration::days(7)));

        let one_second_later = Credential::new(
            SecretString::from("token".to_string()),
            Some(now + Duration::days(7) + Duration::seconds(1)),
        );
        assert!(!one_second_later.is_expiring(now, Duration::days(7)));
    }

    #[test]
    fn test_unknown_expiry_is_not_expiring() {
        let credential = Credential::new(SecretString::from("token".to_string()), None);
        assert!(!credential.is_expiring(Utc::now(), Duration::days(7)));
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let parsed = parse_timestamp("2030-01-02T03:04:05+00:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2030-01-02T03:04:05+00:00");
    }

    #[test]
    fn test_parse_timestamp_naive_iso() {
        let parsed = parse_timestamp("2030-01-02T03:04:05.123456");
        assert!(parsed.is_some());
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("next tuesday").is_none());
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let credential = Credential::new(SecretString::from("EAAGsecret".to_string()), None);
        assert!(!format!("{:?}", credential).contains("EAAGsecret"));
    }

    #[tokio::test]
    async fn test_persist_then_load_keeps_token_and_expiry() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let expires = Utc::now() + Duration::days(30);
        let credential = Credential::new(SecretString::from("abc".to_string()), Some(expires));

        persist(&path, &credential).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = load_token_file(&path).await.unwrap();
        assert_eq!(loaded.token().expose_secret(), "abc");
        assert_eq!(
            loaded.expires_at().unwrap().timestamp(),
            expires.timestamp()
        );

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("last_updated").and_then(|v| v.as_str()).is_some());
    }

    #[tokio::test]
    async fn test_load_corrupt_file_yields_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(load_token_file(&path).await.is_none());
    }

    #[tokio::test]
    async fn test_load_null_token_yields_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{"access_token": null, "expires_at": null, "last_updated": null}"#,
        )
        .unwrap();

        assert!(load_token_file(&path).await.is_none());
    }
}
