//! Graph API publisher
//!
//! Posting is two-phase: a media container is created from a public URL,
//! then published by id. Reels are the exception; the remote side processes
//! and publishes them on its own, so callers never call `publish` for video.
//!
//! Every call asks the [`TokenStore`] for a current token first and makes
//! exactly one bounded request. Nothing is retried here; the caller decides
//! what a failure means for the cycle.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::logging::preview;
use crate::token::TokenStore;

/// Characters of a caption shown in debug logs
const CAPTION_PREVIEW_LEN: usize = 100;

/// What a container will become once published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Image,
    Reels,
    Story,
}

impl ContainerKind {
    fn media_type(self) -> Option<&'static str> {
        match self {
            ContainerKind::Image => None,
            ContainerKind::Reels => Some("REELS"),
            ContainerKind::Story => Some("STORIES"),
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Image => write!(f, "image"),
            ContainerKind::Reels => write!(f, "reels"),
            ContainerKind::Story => write!(f, "story"),
        }
    }
}

/// A created, not necessarily published, media container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub kind: ContainerKind,
}

/// Two-phase publishing against a graph-style media API
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create a feed image container
    async fn create_image_container(
        &self,
        caption: &str,
        image_url: &str,
    ) -> std::result::Result<Container, GraphError>;

    /// Create a reels container; the remote side publishes it after processing
    async fn create_video_container(
        &self,
        caption: &str,
        video_url: &str,
    ) -> std::result::Result<Container, GraphError>;

    /// Create a story container (stories carry no caption)
    async fn create_story_container(
        &self,
        image_url: &str,
    ) -> std::result::Result<Container, GraphError>;

    /// Publish a created container, returning the published media id
    async fn publish(&self, creation_id: &str) -> std::result::Result<String, GraphError>;
}

/// Build the shared HTTP client with the configured request timeout
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("gramcast/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(GraphError::from)?;
    Ok(client)
}

/// HTTP implementation of [`Publisher`]
pub struct GraphClient {
    http: reqwest::Client,
    media_url: String,
    publish_url: String,
    thumb_offset: String,
    tokens: Arc<TokenStore>,
}

impl GraphClient {
    pub fn new(config: &GraphConfig, http: reqwest::Client, tokens: Arc<TokenStore>) -> Self {
        let account_url = format!("{}/{}", config.versioned_url(), config.account_id);
        Self {
            http,
            media_url: format!("{}/media", account_url),
            publish_url: format!("{}/media_publish", account_url),
            thumb_offset: config.reels_thumb_offset.to_string(),
            tokens,
        }
    }

    async fn create_container(
        &self,
        kind: ContainerKind,
        caption: Option<&str>,
        url_param: &'static str,
        url: &str,
    ) -> std::result::Result<Container, GraphError> {
        if let Some(caption) = caption {
            debug!(%kind, caption = %preview(caption, CAPTION_PREVIEW_LEN), "Creating container");
        }
        debug!(%kind, %url, "Media URL");

        let mut params = vec![(url_param, url.to_string())];
        if let Some(caption) = caption {
            params.push(("caption", caption.to_string()));
        }
        if let Some(media_type) = kind.media_type() {
            params.push(("media_type", media_type.to_string()));
        }
        if kind == ContainerKind::Reels {
            params.push(("thumb_offset", self.thumb_offset.clone()));
        }

        let id = self.post(&self.media_url, params).await?;
        info!(%kind, container_id = %id, "Container created");
        Ok(Container { id, kind })
    }

    async fn post(
        &self,
        url: &str,
        params: Vec<(&'static str, String)>,
    ) -> std::result::Result<String, GraphError> {
        let token = self.tokens.valid_token().await.ok_or(GraphError::NoToken)?;

        let mut query: Vec<(&str, &str)> = vec![("access_token", token.expose_secret())];
        query.extend(params.iter().map(|(k, v)| (*k, v.as_str())));

        let response = self.http.post(url).query(&query).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(status, body = %text, "Graph response");

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| GraphError::Decode(format!("HTTP {}: {} ({})", status, e, text)))?;

        parse_response(status, body)
    }
}

/// Turn a graph response into the created/published id or a typed error
pub fn parse_response(status: u16, body: Value) -> std::result::Result<String, GraphError> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(GraphError::Api {
            status,
            message,
            raw: body,
        });
    }

    if !(200..300).contains(&status) {
        return Err(GraphError::Api {
            status,
            message: format!("unexpected HTTP status {}", status),
            raw: body,
        });
    }

    match body.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(GraphError::Decode(format!(
            "response has neither id nor error: {}",
            body
        ))),
    }
}

#[async_trait]
impl Publisher for GraphClient {
    async fn create_image_container(
        &self,
        caption: &str,
        image_url: &str,
    ) -> std::result::Result<Container, GraphError> {
        self.create_container(ContainerKind::Image, Some(caption), "image_url", image_url)
            .await
    }

    async fn create_video_container(
        &self,
        caption: &str,
        video_url: &str,
    ) -> std::result::Result<Container, GraphError> {
        self.create_container(ContainerKind::Reels, Some(caption), "video_url", video_url)
            .await
    }

    async fn create_story_container(
        &self,
        image_url: &str,
    ) -> std::result::Result<Container, GraphError> {
        self.create_container(ContainerKind::Story, None, "image_url", image_url)
            .await
    }

    async fn publish(&self, creation_id: &str) -> std::result::Result<String, GraphError> {
        debug!(%creation_id, "Publishing container");
        let media_id = self
            .post(
                &self.publish_url,
                vec![("creation_id", creation_id.to_string())],
            )
            .await?;
        info!(%creation_id, %media_id, "Container published");
        Ok(media_id)
    }
}
