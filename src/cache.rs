//! Time-based cache of fully rendered pages.
//!
//! Entries are only dropped by expiry or `clear`; writes elsewhere in the
//! application never invalidate them, so a cached page can be stale for up to
//! one TTL after a new post is published.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

/// Key prefix for the home page listing
pub const INDEX_PAGE_PREFIX: &str = "index_page";

/// Upper bound on cached pages, one per viewer
const MAX_CACHED_PAGES: u64 = 10_000;

#[derive(Clone)]
pub struct PageCache {
    ttl: Duration,
    entries: Cache<String, String>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        let mut builder = Cache::builder().max_capacity(MAX_CACHED_PAGES);
        if !ttl.is_zero() {
            builder = builder.time_to_live(ttl);
        }

        PageCache {
            ttl,
            entries: builder.build(),
        }
    }

    /// Builds `<prefix>:<variant>`. The variant never includes the query string.
    pub fn key(prefix: &str, variant: &str) -> String {
        format!("{}:{}", prefix, variant)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let hit = self.entries.get(key).await;
        if hit.is_some() {
            debug!("Page cache hit: {}", key);
        }
        hit
    }

    /// A zero TTL turns caching off.
    pub async fn insert(&self, key: impl Into<String>, body: String) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.insert(key.into(), body).await;
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        debug!("Page cache cleared");
    }
}
