//! Custom error types for lise

use thiserror::Error;

/// Main error type for lise operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Index not found at {0}: run 'lise datasources index' first")]
    IndexNotFound(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Missing API key: set {0} in the environment or a .env file")]
    MissingApiKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("A property with this name or website already exists: {0}")]
    PropertyExists(String),

    #[error("No content: {0}")]
    NoContent(String),

    #[error("Robots.txt disallowed: {0}")]
    RobotsDisallowed(String),

    #[error("Already initialized at {0}")]
    AlreadyInitialized(String),
}

/// Result type alias for lise
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the failure came from the completion endpoint throttling us
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }
}
