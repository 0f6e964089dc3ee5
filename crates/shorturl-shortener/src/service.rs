use async_trait::async_trait;
use shorturl_core::base62;
use shorturl_core::shortener::validate_url;
use shorturl_core::{
    BatchItem, BatchResult, ShortKey, Shortened, Shortener, ShortenerError, Storage, StorageError,
    UrlRecord,
};
use shorturl_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, ShortenerError>;

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Storage` and a `Generator` to handle:
/// - Key generation, one fresh key per submitted URL
/// - Duplicate URL resolution for backends that enforce unique URLs
/// - Composing short URLs from the configured base URL
///
/// Note: The `Generator` implementation is responsible for ensuring
/// uniqueness of generated keys. No collision retry is performed.
#[derive(Debug)]
pub struct ShortenerService<S, G> {
    storage: Arc<S>,
    generator: Arc<G>,
    base_url: String,
}

impl<S, G> Clone for ShortenerService<S, G> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            generator: Arc::clone(&self.generator),
            base_url: self.base_url.clone(),
        }
    }
}

impl<S: Storage, G: Generator> ShortenerService<S, G> {
    /// Creates a new `ShortenerService`. A trailing `/` on `base_url` is dropped.
    pub fn new(storage: S, generator: G, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            storage: Arc::new(storage),
            generator: Arc::new(generator),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn next_key(&self, original_url: &str) -> ShortKey {
        self.generator.generate(original_url).into()
    }
}

#[async_trait]
impl<S: Storage, G: Generator> Shortener for ShortenerService<S, G> {
    async fn shorten(&self, original_url: &str) -> Result<Shortened> {
        validate_url(original_url)?;

        let key = self.next_key(original_url);
        match self.storage.store(&key, original_url).await {
            Ok(()) => {
                info!(key = %key, id = key.id(), "short url created");
                Ok(Shortened::Created(key.to_url(&self.base_url)))
            }
            Err(StorageError::Conflict(_)) => {
                let existing = self
                    .storage
                    .lookup_key(original_url)
                    .await
                    .map_err(|e| ShortenerError::storage("lookup_key", e))?;
                debug!(key = %existing, discarded = %key, "url already shortened");
                Ok(Shortened::Conflict(existing.to_url(&self.base_url)))
            }
            Err(e) => Err(ShortenerError::storage("store", e)),
        }
    }

    async fn shorten_batch(&self, items: Vec<BatchItem>) -> Result<Vec<BatchResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        for item in &items {
            validate_url(&item.original_url)?;
        }

        let records: Vec<UrlRecord> = items
            .iter()
            .map(|item| UrlRecord::new(self.next_key(&item.original_url), &item.original_url))
            .collect();

        self.storage
            .store_batch(&records)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(url) => {
                    warn!(url = %url, size = records.len(), "batch rejected");
                    ShortenerError::BatchConflict(url)
                }
                other => ShortenerError::storage("store_batch", other),
            })?;

        info!(size = records.len(), "short url batch created");
        Ok(items
            .into_iter()
            .zip(&records)
            .map(|(item, record)| BatchResult {
                correlation_id: item.correlation_id,
                short_url: record.key.to_url(&self.base_url),
            })
            .collect())
    }

    async fn resolve(&self, short_key: &str) -> Result<String> {
        // Keys outside the alphabet were never issued.
        if !base62::is_valid(short_key) {
            return Err(ShortenerError::NotFound(short_key.to_string()));
        }

        self.storage.lookup(short_key).await.map_err(|e| match e {
            StorageError::NotFound(_) => ShortenerError::NotFound(short_key.to_string()),
            other => ShortenerError::storage("lookup", other),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.storage
            .ping()
            .await
            .map_err(|e| ShortenerError::storage("ping", e))
    }

    async fn shutdown(&self) -> Result<()> {
        self.storage
            .close()
            .await
            .map_err(|e| ShortenerError::storage("close", e))
    }
}
