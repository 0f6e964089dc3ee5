pub mod backend;
pub mod journal;
pub mod memory;
pub mod relational;

pub use backend::{open_storage, AnyStorage, BackendKind, OpenedStorage, StorageConfig};
pub use journal::{JournalSettings, JournaledStore};
pub use memory::MemoryStore;
pub use relational::RelationalStore;
pub use shorturl_core::StorageError;
