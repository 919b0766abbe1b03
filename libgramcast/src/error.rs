//! Error types for Gramcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GramcastError>;

#[derive(Error, Debug)]
pub enum GramcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Graph API error: {0}")]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GramcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GramcastError::Config(_) => 2,
            GramcastError::Token(TokenError::Missing) => 2,
            GramcastError::InvalidInput(_) => 3,
            GramcastError::Token(_) => 1,
            GramcastError::Staging(_) => 1,
            GramcastError::Graph(_) => 1,
            GramcastError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No valid access token available. Run gram-setup to exchange a new one.")]
    Missing,

    #[error("Token exchange failed (HTTP {status}): {body}")]
    Exchange { status: u16, body: String },

    #[error("Token validation failed (HTTP {status}): {body}")]
    Validation { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to persist token state: {0}")]
    Persist(String),
}

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("SFTP operation failed ({operation}): {message}")]
    Sftp { operation: String, message: String },

    #[error("Local file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Staging task aborted: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StagingError {
    fn from(err: tokio::task::JoinError) -> Self {
        StagingError::Task(err.to_string())
    }
}

/// Failure of a single graph API call
///
/// `Api` carries the remote `error.message` together with the raw payload so
/// callers can log exactly what the endpoint answered.
#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("No valid access token available")]
    NoToken,

    #[error("Remote API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        raw: serde_json::Value,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl GraphError {
    /// Transport-level failures (timeouts, refused connections)
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::Network(_))
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GraphError::Decode(err.to_string())
        } else {
            GraphError::Network(err.to_string())
        }
    }
}
