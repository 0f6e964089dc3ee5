use crate::error::ShortenerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, ShortenerError>;

/// Outcome of a successful create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new short URL was issued.
    Created(String),
    /// The URL was already shortened; this is the short URL issued earlier.
    Conflict(String),
}

impl Shortened {
    pub fn short_url(&self) -> &str {
        match self {
            Shortened::Created(url) | Shortened::Conflict(url) => url,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Shortened::Conflict(_))
    }
}

/// One entry of a batch create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Caller-supplied identifier echoed back in the result.
    pub correlation_id: String,
    pub original_url: String,
}

/// One entry of a batch create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens a URL and returns the short URL.
    ///
    /// Submitting a URL the backend already holds under a unique constraint
    /// yields [`Shortened::Conflict`] with the existing short URL.
    async fn shorten(&self, original_url: &str) -> Result<Shortened>;

    /// Shortens every item or none. Results keep the input order.
    async fn shorten_batch(&self, items: Vec<BatchItem>) -> Result<Vec<BatchResult>>;

    /// Resolves an encoded short key to its original URL.
    async fn resolve(&self, short_key: &str) -> Result<String>;

    /// Checks that the storage backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Flushes and releases the storage backend.
    async fn shutdown(&self) -> Result<()>;
}

/// Validates that the URL has a valid format (has a scheme and host).
pub fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(ShortenerError::InvalidUrl(
            "URL cannot be empty".to_string(),
        ));
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must have a valid scheme and host: {}",
            url
        )));
    };

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if scheme.is_empty() || host.is_empty() {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must have a valid scheme and host: {}",
            url
        )));
    }

    let scheme = scheme.to_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL scheme must be http or https: {}",
            scheme
        )));
    }

    if url.chars().any(char::is_whitespace) {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must not contain whitespace: {}",
            url
        )));
    }

    Ok(())
}
