use crate::memory::MemoryStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shorturl_core::storage::Result;
use shorturl_core::{ReadStorage, ShortKey, Storage, StorageError, UrlRecord};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_CLOSE_DEADLINE: Duration = Duration::from_secs(5);

/// Tuning for the journal writer.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct JournalSettings {
    /// Records that may wait for the writer before producers block.
    #[builder(default = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// How often buffered records are flushed and synced to disk.
    #[builder(default = DEFAULT_SYNC_INTERVAL)]
    pub sync_interval: Duration,
    /// How long `close` waits for the writer to drain.
    #[builder(default = DEFAULT_CLOSE_DEADLINE)]
    pub close_deadline: Duration,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Lifecycle of a journaled store.
///
/// `open` moves through `Replaying` and only hands out a `Ready` store;
/// `close` moves it to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalState {
    Closed,
    Replaying,
    Ready,
}

/// One line of the journal file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(with = "decimal_id")]
    pub uuid: u64,
    pub short_url: String,
    pub original_url: String,
}

impl JournalEntry {
    fn new(key: &ShortKey, original_url: &str) -> Self {
        Self {
            uuid: key.id(),
            short_url: key.as_str().to_owned(),
            original_url: original_url.to_owned(),
        }
    }
}

/// Identifiers are written as decimal strings and read back from either a
/// decimal string or a JSON number.
mod decimal_id {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(id) => Ok(id),
            Raw::Text(text) => text
                .parse()
                .map_err(|e| D::Error::custom(format!("invalid uuid '{text}': {e}"))),
        }
    }
}

/// Durable storage layered over a [`MemoryStore`].
///
/// Lookups are served from memory. Every successful write is also queued to a
/// single background task that appends it as one JSON line to the journal
/// file, so callers never wait on disk I/O beyond enqueueing. On open, the
/// journal is replayed into memory and the highest identifier is recovered.
#[derive(Debug)]
pub struct JournaledStore {
    memory: MemoryStore,
    path: PathBuf,
    sender: Mutex<Option<mpsc::Sender<JournalEntry>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    close_deadline: Duration,
}

impl JournaledStore {
    /// Opens (creating if absent) and replays the journal at `path`.
    ///
    /// Returns the ready store and the highest identifier found in the
    /// journal, or 0 for an empty one. A line that cannot be decoded aborts
    /// the open with [`StorageError::CorruptState`].
    pub async fn open(path: impl Into<PathBuf>, settings: JournalSettings) -> Result<(Self, u64)> {
        let path = path.into();

        if settings.queue_capacity == 0 {
            return Err(StorageError::InvalidConfiguration(
                "journal queue capacity must be greater than zero".to_string(),
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::Unavailable(format!(
                    "failed to open journal {}: {e}",
                    path.display()
                ))
            })?;

        debug!(path = %path.display(), state = ?JournalState::Replaying, "replaying journal");
        let memory = MemoryStore::new();
        let (mut file, replayed) = replay(file, &path, &memory).await?;

        if replayed.missing_newline {
            warn!(path = %path.display(), "journal does not end with a newline, repairing");
            file.write_all(b"\n").await.map_err(|e| {
                StorageError::Unavailable(format!(
                    "failed to repair journal {}: {e}",
                    path.display()
                ))
            })?;
        }

        let (sender, receiver) = mpsc::channel(settings.queue_capacity);
        let writer = tokio::spawn(run_writer(
            file,
            path.clone(),
            receiver,
            settings.sync_interval,
        ));

        info!(
            path = %path.display(),
            records = replayed.records,
            max_id = replayed.max_id,
            state = ?JournalState::Ready,
            "journal replayed"
        );

        let store = Self {
            memory,
            path,
            sender: Mutex::new(Some(sender)),
            writer: Mutex::new(Some(writer)),
            close_deadline: settings.close_deadline,
        };
        Ok((store, replayed.max_id))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> JournalState {
        if self.sender.lock().is_some() {
            JournalState::Ready
        } else {
            JournalState::Closed
        }
    }

    /// Returns the queue handle, or an error once the store is closed.
    fn sender(&self) -> Result<mpsc::Sender<JournalEntry>> {
        self.sender.lock().clone().ok_or_else(|| {
            StorageError::Unavailable(format!("journal {} is closed", self.path.display()))
        })
    }

    async fn enqueue(&self, sender: &mpsc::Sender<JournalEntry>, entry: JournalEntry) {
        let uuid = entry.uuid;
        if sender.send(entry).await.is_err() {
            // The record is already in memory; only durability is lost.
            error!(path = %self.path.display(), uuid, "journal writer stopped, record not persisted");
        }
    }
}

#[async_trait]
impl ReadStorage for JournaledStore {
    async fn lookup(&self, short_key: &str) -> Result<String> {
        self.memory.lookup(short_key).await
    }

    async fn lookup_key(&self, original_url: &str) -> Result<ShortKey> {
        self.memory.lookup_key(original_url).await
    }
}

#[async_trait]
impl Storage for JournaledStore {
    async fn store(&self, key: &ShortKey, original_url: &str) -> Result<()> {
        let sender = self.sender()?;
        self.memory.store(key, original_url).await?;
        self.enqueue(&sender, JournalEntry::new(key, original_url))
            .await;
        Ok(())
    }

    async fn store_batch(&self, records: &[UrlRecord]) -> Result<()> {
        let sender = self.sender()?;
        self.memory.store_batch(records).await?;
        for record in records {
            self.enqueue(&sender, JournalEntry::new(&record.key, &record.original_url))
                .await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Dropping the last sender lets the writer drain the queue and exit.
        let sender = self.sender.lock().take();
        let Some(sender) = sender else {
            return Ok(());
        };
        drop(sender);

        let writer = self.writer.lock().take();
        let Some(writer) = writer else {
            return Ok(());
        };

        match tokio::time::timeout(self.close_deadline, writer).await {
            Ok(Ok(())) => {
                info!(path = %self.path.display(), state = ?JournalState::Closed, "journal closed");
                Ok(())
            }
            Ok(Err(e)) => Err(StorageError::Unavailable(format!(
                "journal writer for {} failed: {e}",
                self.path.display()
            ))),
            Err(_) => {
                warn!(
                    path = %self.path.display(),
                    deadline = ?self.close_deadline,
                    "journal writer did not drain before the deadline, pending records may be lost"
                );
                Ok(())
            }
        }
    }
}

struct Replayed {
    records: usize,
    max_id: u64,
    missing_newline: bool,
}

async fn replay(file: File, path: &Path, memory: &MemoryStore) -> Result<(File, Replayed)> {
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut line_no = 0usize;
    let mut replayed = Replayed {
        records: 0,
        max_id: 0,
        missing_newline: false,
    };

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await.map_err(|e| {
            if e.kind() == io::ErrorKind::InvalidData {
                StorageError::CorruptState(format!("{}:{}: {e}", path.display(), line_no + 1))
            } else {
                StorageError::Unavailable(format!(
                    "failed to read journal {}: {e}",
                    path.display()
                ))
            }
        })?;
        if read == 0 {
            break;
        }
        line_no += 1;
        replayed.missing_newline = !line.ends_with('\n');

        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }

        let entry: JournalEntry = serde_json::from_str(raw).map_err(|e| {
            StorageError::CorruptState(format!("{}:{line_no}: {e}", path.display()))
        })?;

        let key = ShortKey::from_parts(entry.uuid, entry.short_url.as_str());
        memory.insert(&key, &entry.original_url);
        replayed.records += 1;
        replayed.max_id = replayed.max_id.max(entry.uuid);
    }

    Ok((reader.into_inner(), replayed))
}

async fn run_writer(
    file: File,
    path: PathBuf,
    mut receiver: mpsc::Receiver<JournalEntry>,
    sync_interval: Duration,
) {
    let mut writer = BufWriter::new(file);
    let mut ticker = tokio::time::interval(sync_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut dirty = false;

    loop {
        tokio::select! {
            received = receiver.recv() => {
                let Some(entry) = received else {
                    break;
                };
                match append(&mut writer, &entry).await {
                    Ok(()) => dirty = true,
                    Err(e) => error!(
                        path = %path.display(),
                        uuid = entry.uuid,
                        error = %e,
                        "failed to append journal record"
                    ),
                }
            }
            _ = ticker.tick() => {
                if dirty {
                    match sync(&mut writer).await {
                        Ok(()) => dirty = false,
                        Err(e) => error!(path = %path.display(), error = %e, "failed to sync journal"),
                    }
                }
            }
        }
    }

    if let Err(e) = sync(&mut writer).await {
        error!(path = %path.display(), error = %e, "failed to sync journal on shutdown");
    }
    debug!(path = %path.display(), "journal writer stopped");
}

async fn append(writer: &mut BufWriter<File>, entry: &JournalEntry) -> io::Result<()> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    writer.write_all(&line).await
}

async fn sync(writer: &mut BufWriter<File>) -> io::Result<()> {
    writer.flush().await?;
    writer.get_ref().sync_data().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(id: u64) -> ShortKey {
        ShortKey::from_id(id)
    }

    fn journal_path(dir: &TempDir) -> PathBuf {
        dir.path().join("short-url-db.json")
    }

    async fn open(path: &Path) -> (JournaledStore, u64) {
        JournaledStore::open(path, JournalSettings::default())
            .await
            .unwrap()
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[tokio::test]
    async fn open_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);

        let (store, max_id) = open(&path).await;

        assert!(path.exists());
        assert_eq!(max_id, 0);
        assert_eq!(store.state(), JournalState::Ready);
        store.close().await.unwrap();
        assert_eq!(store.state(), JournalState::Closed);
    }

    #[tokio::test]
    async fn unopenable_path_is_unavailable() {
        let dir = TempDir::new().unwrap();

        // A directory cannot be opened for appending.
        let err = JournaledStore::open(dir.path(), JournalSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[tokio::test]
    async fn zero_queue_capacity_is_rejected() {
        let dir = TempDir::new().unwrap();
        let settings = JournalSettings::builder().queue_capacity(0).build();

        let err = JournaledStore::open(journal_path(&dir), settings)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn writes_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);

        let (store, _) = open(&path).await;
        for id in 1..=3 {
            store
                .store(&key(id), &format!("https://example.com/{id}"))
                .await
                .unwrap();
        }
        store.close().await.unwrap();

        let (reopened, max_id) = open(&path).await;
        assert_eq!(max_id, 3);
        for id in 1..=3 {
            let url = reopened.lookup(key(id).as_str()).await.unwrap();
            assert_eq!(url, format!("https://example.com/{id}"));
        }
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    async fn lookups_are_served_before_the_writer_flushes() {
        let dir = TempDir::new().unwrap();
        let settings = JournalSettings::builder()
            .sync_interval(Duration::from_secs(3600))
            .build();
        let (store, _) = JournaledStore::open(journal_path(&dir), settings)
            .await
            .unwrap();

        store.store(&key(1), "https://example.com").await.unwrap();

        assert_eq!(store.lookup("aaaaab").await.unwrap(), "https://example.com");
        assert_eq!(store.lookup_key("https://example.com").await.unwrap(), key(1));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn disk_order_matches_write_order() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);

        let (store, _) = open(&path).await;
        for id in 1..=250 {
            store.store(&key(id), "https://example.com").await.unwrap();
        }
        store.close().await.unwrap();

        let ids: Vec<u64> = lines(&path)
            .iter()
            .map(|line| serde_json::from_str::<JournalEntry>(line).unwrap().uuid)
            .collect();
        assert_eq!(ids, (1..=250).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn record_format_uses_decimal_string_uuid() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);

        let (store, _) = open(&path).await;
        store.store(&key(1), "https://example.com/a").await.unwrap();
        store.close().await.unwrap();

        let written: serde_json::Value = serde_json::from_str(&lines(&path)[0]).unwrap();
        assert_eq!(
            written,
            serde_json::json!({
                "uuid": "1",
                "short_url": "aaaaab",
                "original_url": "https://example.com/a",
            })
        );
    }

    #[tokio::test]
    async fn replay_accepts_numeric_and_string_uuids() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);
        std::fs::write(
            &path,
            concat!(
                r#"{"uuid": 7, "short_url": "aaaaah", "original_url": "https://a.example"}"#,
                "\n",
                r#"{"uuid": "12", "short_url": "aaaaam", "original_url": "https://b.example"}"#,
                "\n",
            ),
        )
        .unwrap();

        let (store, max_id) = open(&path).await;

        assert_eq!(max_id, 12);
        assert_eq!(store.lookup("aaaaah").await.unwrap(), "https://a.example");
        assert_eq!(store.lookup("aaaaam").await.unwrap(), "https://b.example");
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn max_id_does_not_depend_on_line_order() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);
        std::fs::write(
            &path,
            concat!(
                r#"{"uuid":"9","short_url":"aaaaaj","original_url":"https://a.example"}"#,
                "\n",
                r#"{"uuid":"4","short_url":"aaaaae","original_url":"https://b.example"}"#,
                "\n",
            ),
        )
        .unwrap();

        let (store, max_id) = open(&path).await;
        assert_eq!(max_id, 9);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);
        std::fs::write(
            &path,
            concat!(
                "\n",
                r#"{"uuid":"1","short_url":"aaaaab","original_url":"https://a.example"}"#,
                "\n\n",
            ),
        )
        .unwrap();

        let (store, max_id) = open(&path).await;
        assert_eq!(max_id, 1);
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_line_aborts_replay() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);
        std::fs::write(
            &path,
            concat!(
                r#"{"uuid":"1","short_url":"aaaaab","original_url":"https://a.example"}"#,
                "\n",
                "not json\n",
            ),
        )
        .unwrap();

        let err = JournaledStore::open(&path, JournalSettings::default())
            .await
            .unwrap_err();

        let StorageError::CorruptState(message) = err else {
            panic!("expected corrupt state, got {err:?}");
        };
        assert!(message.contains(":2:"), "{message}");
    }

    #[tokio::test]
    async fn non_decimal_uuid_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);
        std::fs::write(
            &path,
            r#"{"uuid":"abc","short_url":"aaaaab","original_url":"https://a.example"}"#,
        )
        .unwrap();

        let err = JournaledStore::open(&path, JournalSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::CorruptState(_)));
    }

    #[tokio::test]
    async fn missing_trailing_newline_is_repaired() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);
        std::fs::write(
            &path,
            r#"{"uuid":"1","short_url":"aaaaab","original_url":"https://a.example"}"#,
        )
        .unwrap();

        let (store, max_id) = open(&path).await;
        store
            .store(&key(max_id + 1), "https://b.example")
            .await
            .unwrap();
        store.close().await.unwrap();

        let (reopened, max_id) = open(&path).await;
        assert_eq!(max_id, 2);
        assert_eq!(reopened.lookup("aaaaab").await.unwrap(), "https://a.example");
        assert_eq!(reopened.lookup("aaaaac").await.unwrap(), "https://b.example");
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    async fn batch_is_journaled() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);

        let (store, _) = open(&path).await;
        let records = vec![
            UrlRecord::new(key(1), "https://a.example"),
            UrlRecord::new(key(2), "https://b.example"),
            UrlRecord::new(key(3), "https://c.example"),
        ];
        store.store_batch(&records).await.unwrap();
        store.close().await.unwrap();

        assert_eq!(lines(&path).len(), 3);
        let (reopened, max_id) = open(&path).await;
        assert_eq!(max_id, 3);
        assert_eq!(reopened.lookup("aaaaad").await.unwrap(), "https://c.example");
        reopened.close().await.unwrap();
    }

    #[tokio::test]
    async fn store_after_close_fails() {
        let dir = TempDir::new().unwrap();
        let (store, _) = open(&journal_path(&dir)).await;
        store.close().await.unwrap();

        let err = store.store(&key(1), "https://example.com").await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(store.lookup("aaaaab").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let (store, _) = open(&journal_path(&dir)).await;

        store.close().await.unwrap();
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn small_queue_applies_backpressure_without_losing_records() {
        let dir = TempDir::new().unwrap();
        let path = journal_path(&dir);
        let settings = JournalSettings::builder().queue_capacity(1).build();

        let (store, _) = JournaledStore::open(&path, settings).await.unwrap();
        for id in 1..=20 {
            store.store(&key(id), "https://example.com").await.unwrap();
        }
        store.close().await.unwrap();

        assert_eq!(lines(&path).len(), 20);
    }
}
