use crate::Generator;
use shorturl_core::ShortKey;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// A short key generator backed by a sequential counter.
///
/// Identifiers are handed out in strictly increasing order starting at 1, or
/// right after the highest identifier recovered from storage. A single atomic
/// increment is the only synchronization point, so concurrent callers never
/// block each other and never receive the same identifier.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
}

impl SeqGenerator {
    /// Creates a generator for an empty store. The first identifier is 1.
    pub fn new() -> Self {
        Self::resume_after(0)
    }

    /// Creates a generator that continues after `recovered_max`, the highest
    /// identifier already persisted by the active backend.
    pub fn resume_after(recovered_max: u64) -> Self {
        debug!(recovered_max, "seeding key generator");
        Self {
            counter: AtomicU64::new(recovered_max.saturating_add(1)),
        }
    }

    /// Returns the identifier the next call to `generate` will use.
    pub fn peek(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

impl Default for SeqGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for SeqGenerator {
    type Output = ShortKey;

    fn generate(&self, _original_url: &str) -> ShortKey {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortKey::from_id(id)
    }
}
