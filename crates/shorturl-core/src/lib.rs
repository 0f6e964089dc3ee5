//! Core types and traits for the shorturl service.
//!
//! This crate provides the short key type and its base62 codec, the storage
//! contract shared by every backend, and the shortener contract consumed by
//! the HTTP gateway.

pub mod base62;
pub mod error;
pub mod shortener;
pub mod shortkey;
pub mod storage;

pub use error::{ShortenerError, StorageError};
pub use shortener::{BatchItem, BatchResult, Shortened, Shortener};
pub use shortkey::ShortKey;
pub use storage::{ReadStorage, Storage, UrlRecord};
