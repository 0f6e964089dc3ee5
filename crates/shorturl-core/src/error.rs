use thiserror::Error;

/// Errors reported by storage backends.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    /// The original URL already has a persisted short key.
    #[error("original url already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("persisted state is corrupt: {0}")]
    CorruptState(String),
    #[error("invalid storage configuration: {0}")]
    InvalidConfiguration(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Errors reported by the shortener service.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("short key not found: {0}")]
    NotFound(String),
    /// A batch contained a URL that is already shortened; nothing was stored.
    #[error("batch rejected, url already shortened: {0}")]
    BatchConflict(String),
    #[error("{operation} failed: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: StorageError,
    },
}

impl ShortenerError {
    /// Wraps a storage error with the name of the failed operation.
    pub fn storage(operation: &'static str, source: StorageError) -> Self {
        Self::Storage { operation, source }
    }
}
