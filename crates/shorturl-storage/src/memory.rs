use async_trait::async_trait;
use dashmap::DashMap;
use shorturl_core::storage::Result;
use shorturl_core::{ReadStorage, ShortKey, Storage, StorageError, UrlRecord};
use smol_str::SmolStr;

/// In-memory storage entry for a URL mapping.
#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    original_url: String,
}

/// In-memory implementation of the Storage trait using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking.
///
/// Original URLs are not unique here: storing the same URL twice under two
/// keys keeps both mappings.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    storage: DashMap<SmolStr, Entry>,
}

impl MemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Number of stored mappings.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Synchronous insert shared by the async path and journal replay.
    pub(crate) fn insert(&self, key: &ShortKey, original_url: &str) {
        self.storage.insert(
            SmolStr::new(key.as_str()),
            Entry {
                id: key.id(),
                original_url: original_url.to_owned(),
            },
        );
    }
}

#[async_trait]
impl ReadStorage for MemoryStore {
    async fn lookup(&self, short_key: &str) -> Result<String> {
        self.storage
            .get(short_key)
            .map(|entry| entry.original_url.clone())
            .ok_or_else(|| StorageError::NotFound(short_key.to_string()))
    }

    async fn lookup_key(&self, original_url: &str) -> Result<ShortKey> {
        // Reverse lookups are rare here (the memory backend never conflicts),
        // so a scan is acceptable. The lowest identifier wins when a URL was
        // stored more than once.
        self.storage
            .iter()
            .filter(|entry| entry.original_url == original_url)
            .min_by_key(|entry| entry.id)
            .map(|entry| ShortKey::from_parts(entry.id, entry.key().clone()))
            .ok_or_else(|| StorageError::NotFound(original_url.to_string()))
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn store(&self, key: &ShortKey, original_url: &str) -> Result<()> {
        self.insert(key, original_url);
        Ok(())
    }

    async fn store_batch(&self, records: &[UrlRecord]) -> Result<()> {
        for record in records {
            self.insert(&record.key, &record.original_url);
        }
        Ok(())
    }
}
