use crate::journal::{JournalSettings, JournaledStore};
use crate::memory::MemoryStore;
use crate::relational::{self, RelationalStore, DEFAULT_PING_TIMEOUT};
use async_trait::async_trait;
use shorturl_core::storage::Result;
use shorturl_core::{ReadStorage, ShortKey, Storage, StorageError, UrlRecord};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use typed_builder::TypedBuilder;

/// Storage selection and tuning, built once at boot.
#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageConfig {
    /// Journal file. `None` keeps everything in memory.
    #[builder(default, setter(into))]
    pub storage_path: Option<PathBuf>,
    /// Database connection string. Takes precedence over `storage_path`.
    #[builder(default, setter(into))]
    pub database_dsn: Option<String>,
    #[builder(default = DEFAULT_PING_TIMEOUT)]
    pub ping_timeout: Duration,
    #[builder(default)]
    pub journal: JournalSettings,
}

/// The backend a [`StorageConfig`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind<'a> {
    Memory,
    Journal(&'a Path),
    Relational(&'a str),
}

impl Display for BackendKind<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Journal(_) => write!(f, "journal"),
            BackendKind::Relational(_) => write!(f, "relational"),
        }
    }
}

impl StorageConfig {
    /// Resolves which backend to open.
    ///
    /// A non-empty DSN always wins over a journal path. A DSN without a
    /// supported scheme is rejected rather than silently ignored.
    pub fn backend(&self) -> Result<BackendKind<'_>> {
        let dsn = self.database_dsn.as_deref().filter(|dsn| !dsn.is_empty());
        if let Some(dsn) = dsn {
            if !relational::is_supported_dsn(dsn) {
                return Err(StorageError::InvalidConfiguration(format!(
                    "unsupported database dsn, expected one of {:?}",
                    relational::SUPPORTED_SCHEMES
                )));
            }
            return Ok(BackendKind::Relational(dsn));
        }

        let path = self
            .storage_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty());
        Ok(match path {
            Some(path) => BackendKind::Journal(path),
            None => BackendKind::Memory,
        })
    }
}

/// One of the concrete storage backends.
#[derive(Debug)]
pub enum AnyStorage {
    Memory(MemoryStore),
    Journaled(JournaledStore),
    Relational(RelationalStore),
}

impl AnyStorage {
    pub fn kind(&self) -> &'static str {
        match self {
            AnyStorage::Memory(_) => "memory",
            AnyStorage::Journaled(_) => "journal",
            AnyStorage::Relational(_) => "relational",
        }
    }
}

/// A ready storage backend and the highest identifier it already holds.
#[derive(Debug)]
pub struct OpenedStorage {
    pub storage: AnyStorage,
    pub recovered_max: u64,
}

/// Opens the backend selected by `config`, replaying or querying persisted
/// state to recover the highest identifier issued so far.
pub async fn open_storage(config: &StorageConfig) -> Result<OpenedStorage> {
    let backend = config.backend()?;
    info!(backend = %backend, "opening storage");

    let (storage, recovered_max) = match backend {
        BackendKind::Memory => (AnyStorage::Memory(MemoryStore::new()), 0),
        BackendKind::Journal(path) => {
            let (store, max_id) = JournaledStore::open(path, config.journal).await?;
            (AnyStorage::Journaled(store), max_id)
        }
        BackendKind::Relational(dsn) => {
            let (store, max_id) = RelationalStore::connect(dsn, config.ping_timeout).await?;
            (AnyStorage::Relational(store), max_id)
        }
    };

    info!(backend = storage.kind(), recovered_max, "storage ready");
    Ok(OpenedStorage {
        storage,
        recovered_max,
    })
}

#[async_trait]
impl ReadStorage for AnyStorage {
    async fn lookup(&self, short_key: &str) -> Result<String> {
        match self {
            AnyStorage::Memory(store) => store.lookup(short_key).await,
            AnyStorage::Journaled(store) => store.lookup(short_key).await,
            AnyStorage::Relational(store) => store.lookup(short_key).await,
        }
    }

    async fn lookup_key(&self, original_url: &str) -> Result<ShortKey> {
        match self {
            AnyStorage::Memory(store) => store.lookup_key(original_url).await,
            AnyStorage::Journaled(store) => store.lookup_key(original_url).await,
            AnyStorage::Relational(store) => store.lookup_key(original_url).await,
        }
    }

    async fn ping(&self) -> Result<()> {
        match self {
            AnyStorage::Memory(store) => store.ping().await,
            AnyStorage::Journaled(store) => store.ping().await,
            AnyStorage::Relational(store) => store.ping().await,
        }
    }
}

#[async_trait]
impl Storage for AnyStorage {
    async fn store(&self, key: &ShortKey, original_url: &str) -> Result<()> {
        match self {
            AnyStorage::Memory(store) => store.store(key, original_url).await,
            AnyStorage::Journaled(store) => store.store(key, original_url).await,
            AnyStorage::Relational(store) => store.store(key, original_url).await,
        }
    }

    async fn store_batch(&self, records: &[UrlRecord]) -> Result<()> {
        match self {
            AnyStorage::Memory(store) => store.store_batch(records).await,
            AnyStorage::Journaled(store) => store.store_batch(records).await,
            AnyStorage::Relational(store) => store.store_batch(records).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            AnyStorage::Memory(store) => store.close().await,
            AnyStorage::Journaled(store) => store.close().await,
            AnyStorage::Relational(store) => store.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_config_is_memory() {
        let config = StorageConfig::builder().build();
        assert_eq!(config.backend().unwrap(), BackendKind::Memory);
    }

    #[test]
    fn empty_strings_mean_unset() {
        let config = StorageConfig::builder()
            .storage_path(PathBuf::new())
            .database_dsn(String::new())
            .build();
        assert_eq!(config.backend().unwrap(), BackendKind::Memory);
    }

    #[test]
    fn path_selects_journal() {
        let config = StorageConfig::builder()
            .storage_path(PathBuf::from("/tmp/short-url-db.json"))
            .build();
        assert_eq!(
            config.backend().unwrap(),
            BackendKind::Journal(Path::new("/tmp/short-url-db.json"))
        );
    }

    #[test]
    fn dsn_wins_over_path() {
        let config = StorageConfig::builder()
            .storage_path(PathBuf::from("/tmp/short-url-db.json"))
            .database_dsn("postgres://localhost/shorturl".to_string())
            .build();
        assert_eq!(
            config.backend().unwrap(),
            BackendKind::Relational("postgres://localhost/shorturl")
        );
    }

    #[test]
    fn unknown_dsn_scheme_is_rejected() {
        let config = StorageConfig::builder()
            .storage_path(PathBuf::from("/tmp/short-url-db.json"))
            .database_dsn("mysql://localhost/shorturl".to_string())
            .build();
        assert!(matches!(
            config.backend().unwrap_err(),
            StorageError::InvalidConfiguration(_)
        ));
    }

    #[tokio::test]
    async fn open_with_dsn_and_path_never_touches_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short-url-db.json");
        let config = StorageConfig::builder()
            .storage_path(path.clone())
            .database_dsn("sqlite::memory:".to_string())
            .build();

        let opened = open_storage(&config).await.unwrap();

        assert!(matches!(opened.storage, AnyStorage::Relational(_)));
        assert_eq!(opened.recovered_max, 0);
        assert!(!path.exists());
        opened.storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn open_memory_backend() {
        let opened = open_storage(&StorageConfig::builder().build()).await.unwrap();

        assert_eq!(opened.storage.kind(), "memory");
        assert_eq!(opened.recovered_max, 0);
        opened.storage.ping().await.unwrap();
    }

    #[tokio::test]
    async fn open_journal_recovers_max_id() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short-url-db.json");
        std::fs::write(
            &path,
            concat!(
                r#"{"uuid":"41","short_url":"aaaaaP","original_url":"https://a.example"}"#,
                "\n"
            ),
        )
        .unwrap();
        let config = StorageConfig::builder().storage_path(path).build();

        let opened = open_storage(&config).await.unwrap();

        assert_eq!(opened.storage.kind(), "journal");
        assert_eq!(opened.recovered_max, 41);
        assert_eq!(
            opened.storage.lookup("aaaaaP").await.unwrap(),
            "https://a.example"
        );
        opened.storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_journal_fails_boot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short-url-db.json");
        std::fs::write(&path, "{\"uuid\":\n").unwrap();
        let config = StorageConfig::builder().storage_path(path).build();

        let err = open_storage(&config).await.unwrap_err();
        assert!(matches!(err, StorageError::CorruptState(_)));
    }
}
