use crate::error::StorageError;
use crate::shortkey::ShortKey;
use async_trait::async_trait;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// The short key, carrying both identifier and encoded form.
    pub key: ShortKey,
    /// The original URL that was shortened.
    pub original_url: String,
}

impl UrlRecord {
    pub fn new(key: ShortKey, original_url: impl Into<String>) -> Self {
        Self {
            key,
            original_url: original_url.into(),
        }
    }
}

/// The read side of a storage backend.
#[async_trait]
pub trait ReadStorage: Send + Sync + 'static {
    /// Resolves an encoded short key to its original URL.
    /// Returns `Err(NotFound)` if the key does not exist.
    async fn lookup(&self, short_key: &str) -> Result<String>;

    /// Finds the short key already issued for an original URL.
    /// Returns `Err(NotFound)` if the URL was never stored.
    async fn lookup_key(&self, original_url: &str) -> Result<ShortKey>;

    /// Checks that the backend is reachable.
    ///
    /// Backends without an external dependency are always healthy.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait Storage: ReadStorage {
    /// Stores a single record.
    ///
    /// Backends that enforce unique original URLs return `Err(Conflict)`.
    async fn store(&self, key: &ShortKey, original_url: &str) -> Result<()>;

    /// Stores all records or none of them.
    async fn store_batch(&self, records: &[UrlRecord]) -> Result<()>;

    /// Releases file handles and connections. Pending writes are flushed
    /// where the backend buffers them.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
