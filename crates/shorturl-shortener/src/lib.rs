//! URL shortener service implementation.
//!
//! [`ShortenerService`] pairs a storage backend with a key generator and owns
//! the duplicate-URL policy. Core types are re-exported from `shorturl_core`.

pub mod service;

pub use service::ShortenerService;
pub use shorturl_core::{BatchItem, BatchResult, Shortened, Shortener, ShortenerError};
