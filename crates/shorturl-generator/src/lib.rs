pub mod seq;

pub use seq::SeqGenerator;

use shorturl_core::ShortKey;

/// Trait for generating short keys.
///
/// Implementations are pure generators that don't interact with storage.
/// Any state recovered from storage is handed over at construction time.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortKey>;

    /// Generates a key that has never been issued by this generator.
    ///
    /// The original URL is part of the contract but implementations are free
    /// to ignore it.
    fn generate(&self, original_url: &str) -> Self::Output;
}
