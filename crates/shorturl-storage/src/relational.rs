use async_trait::async_trait;
use shorturl_core::storage::Result;
use shorturl_core::{ReadStorage, ShortKey, Storage, StorageError, UrlRecord};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyConnection, AnyPool, Connection, Row};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(3);

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS urls (
  uuid BIGINT PRIMARY KEY,
  short_url TEXT NOT NULL,
  original_url TEXT NOT NULL UNIQUE
)
"#;

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS short_url_idx ON urls (short_url)";

/// DSN prefixes that select the relational backend.
pub const SUPPORTED_SCHEMES: &[&str] = &["postgres://", "postgresql://", "sqlite:"];

/// Returns `true` if the DSN names a database this store can open.
pub fn is_supported_dsn(dsn: &str) -> bool {
    SUPPORTED_SCHEMES
        .iter()
        .any(|scheme| dsn.starts_with(scheme))
}

/// SQL implementation of the storage contract.
///
/// Rows live in a single `urls` table with a unique constraint on
/// `original_url`; submitting a URL twice surfaces as
/// [`StorageError::Conflict`]. Batches are written in one transaction.
#[derive(Debug, Clone)]
pub struct RelationalStore {
    pool: AnyPool,
    ping_timeout: Duration,
}

impl RelationalStore {
    /// Creates a store from an existing connection pool.
    ///
    /// The schema is not touched; call [`RelationalStore::migrate`] first on a
    /// fresh database.
    pub fn new(pool: AnyPool, ping_timeout: Duration) -> Self {
        Self { pool, ping_timeout }
    }

    /// Connects, verifies connectivity, creates the schema if needed and
    /// returns the store together with the highest persisted identifier.
    pub async fn connect(dsn: &str, ping_timeout: Duration) -> Result<(Self, u64)> {
        if !is_supported_dsn(dsn) {
            return Err(StorageError::InvalidConfiguration(format!(
                "unsupported database dsn, expected one of {:?}",
                SUPPORTED_SCHEMES
            )));
        }

        sqlx::any::install_default_drivers();

        let mut options = AnyPoolOptions::new().acquire_timeout(ping_timeout);
        if dsn.contains(":memory:") {
            // Every in-memory SQLite connection is its own database.
            options = options.max_connections(1).idle_timeout(None).max_lifetime(None);
        }

        let pool = options.connect(dsn).await.map_err(map_sqlx_error)?;
        let store = Self::new(pool, ping_timeout);

        store.ping().await?;
        store.migrate().await?;
        let max_id = store.max_id().await?;

        info!(max_id, "connected to relational storage");
        Ok((store, max_id))
    }

    /// Creates the `urls` table and its index. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query(CREATE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("relational schema is up to date");
        Ok(())
    }

    /// Returns the highest identifier in the table, or 0 when it is empty.
    pub async fn max_id(&self) -> Result<u64> {
        let max: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(uuid), 0) FROM urls")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        u64::try_from(max)
            .map_err(|_| StorageError::InvalidData(format!("negative uuid in urls table: {max}")))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

fn to_db_id(key: &ShortKey) -> Result<i64> {
    i64::try_from(key.id())
        .map_err(|_| StorageError::InvalidData(format!("uuid {} does not fit BIGINT", key.id())))
}

async fn insert(conn: &mut AnyConnection, key: &ShortKey, original_url: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO urls (uuid, short_url, original_url)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(to_db_id(key)?)
    .bind(key.as_str())
    .bind(original_url)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => {
            Err(StorageError::Conflict(original_url.to_string()))
        }
        Err(err) => Err(map_sqlx_error(err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::Configuration(_) => StorageError::InvalidConfiguration(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadStorage for RelationalStore {
    async fn lookup(&self, short_key: &str) -> Result<String> {
        let original_url: Option<String> = sqlx::query_scalar(
            r#"
            SELECT original_url
            FROM urls
            WHERE short_url = $1
            LIMIT 1
            "#,
        )
        .bind(short_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        original_url.ok_or_else(|| StorageError::NotFound(short_key.to_string()))
    }

    async fn lookup_key(&self, original_url: &str) -> Result<ShortKey> {
        let row = sqlx::query(
            r#"
            SELECT uuid, short_url
            FROM urls
            WHERE original_url = $1
            "#,
        )
        .bind(original_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StorageError::NotFound(original_url.to_string()));
        };

        let uuid: i64 = row.try_get("uuid").map_err(map_sqlx_error)?;
        let short_url: String = row.try_get("short_url").map_err(map_sqlx_error)?;
        let uuid = u64::try_from(uuid)
            .map_err(|_| StorageError::InvalidData(format!("negative uuid in urls table: {uuid}")))?;

        Ok(ShortKey::from_parts(uuid, short_url))
    }

    async fn ping(&self) -> Result<()> {
        let ping = async {
            let mut conn = self.pool.acquire().await?;
            conn.ping().await?;
            Ok::<_, sqlx::Error>(())
        };

        match tokio::time::timeout(self.ping_timeout, ping).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(StorageError::Timeout(format!(
                "database did not answer within {:?}",
                self.ping_timeout
            ))),
        }
    }
}

#[async_trait]
impl Storage for RelationalStore {
    async fn store(&self, key: &ShortKey, original_url: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        insert(&mut conn, key, original_url).await
    }

    async fn store_batch(&self, records: &[UrlRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for record in records {
            if let Err(err) = insert(&mut *tx, &record.key, &record.original_url).await {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "failed to roll back batch insert");
                }
                return Err(err);
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(records = records.len(), "batch committed");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        info!("relational storage closed");
        Ok(())
    }
}
