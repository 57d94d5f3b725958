//! Result cache for finished, already-encoded payloads.
//!
//! Content-addressed by the canonicalized identifier string: field order
//! fixed and optional-field defaults applied, so spelling out a default
//! encoding hits the same entry as omitting it.
//!
//! Entries are immutable once written and carry their insertion instant;
//! reads treat entries older than the TTL as misses. There is no automatic
//! invalidation on dataset mutation: a changed specimen dataset requires an
//! explicit [`ResultCache::clear`].
//!
//! Entries are written only after a fully successful encode. Concurrent
//! encodes of the same key may race; the last writer wins and every reader
//! observes a complete entry.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::RwLock;

/// Default cache capacity: 256MB of encoded payloads.
pub const DEFAULT_RESULT_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// Default entry TTL: one hour.
pub const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(3600);

/// Maximum number of entries, bounding LRU bookkeeping.
const MAX_ENTRIES: usize = 100_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    bytes: Bytes,
    content_type: String,
    inserted: Instant,
}

/// Size-bounded LRU cache of encoded payloads with TTL expiry.
pub struct ResultCache {
    cache: RwLock<LruCache<String, CacheEntry>>,
    max_size: usize,
    current_size: RwLock<usize>,
    ttl: Option<Duration>,
}

impl ResultCache {
    /// Create a cache with the default capacity and TTL.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RESULT_CACHE_CAPACITY, Some(DEFAULT_RESULT_TTL))
    }

    /// Create a cache with an explicit byte capacity and optional TTL.
    pub fn with_capacity(max_size: usize, ttl: Option<Duration>) -> Self {
        Self {
            cache: RwLock::new(LruCache::new(NonZeroUsize::new(MAX_ENTRIES).unwrap())),
            max_size,
            current_size: RwLock::new(0),
            ttl,
        }
    }

    /// Look up an entry. Expired entries are evicted and count as misses.
    pub async fn get(&self, key: &str) -> Option<(Bytes, String)> {
        let mut cache = self.cache.write().await;
        let expired = match cache.get(key) {
            Some(entry) => match self.ttl {
                Some(ttl) => entry.inserted.elapsed() > ttl,
                None => false,
            },
            None => return None,
        };

        if expired {
            if let Some(entry) = cache.pop(key) {
                let mut current_size = self.current_size.write().await;
                *current_size = current_size.saturating_sub(entry.bytes.len());
            }
            return None;
        }

        cache
            .get(key)
            .map(|entry| (entry.bytes.clone(), entry.content_type.clone()))
    }

    /// Store an encoded payload, evicting least-recently-used entries until
    /// the cache fits its byte capacity.
    pub async fn put(&self, key: String, bytes: Bytes, content_type: String) {
        let entry_size = bytes.len();
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;

        if let Some(old) = cache.peek(&key) {
            *current_size = current_size.saturating_sub(old.bytes.len());
        }

        cache.put(
            key,
            CacheEntry {
                bytes,
                content_type,
                inserted: Instant::now(),
            },
        );
        *current_size += entry_size;

        while *current_size > self.max_size {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    *current_size = current_size.saturating_sub(evicted.bytes.len());
                }
                None => break,
            }
        }
    }

    /// Drop all entries (the explicit flush for changed datasets).
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        let mut current_size = self.current_size.write().await;
        cache.clear();
        *current_size = 0;
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }

    /// Current total size of cached payloads in bytes.
    pub async fn size(&self) -> usize {
        *self.current_size.read().await
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
