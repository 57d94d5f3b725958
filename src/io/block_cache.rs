use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};

use super::RangeReader;
use crate::error::StoreError;

/// Default block size: 256KB.
/// Large enough to amortize per-read overhead, small enough to not waste
/// memory on sparsely accessed containers.
pub const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// Default cache capacity in number of blocks.
/// 100 blocks * 256KB = 25.6MB per container.
pub const DEFAULT_BLOCK_CACHE_CAPACITY: usize = 100;

/// Block-based caching layer that wraps any [`RangeReader`].
///
/// The stack container reads one array row at a time, which produces many
/// small reads at scattered offsets. This cache amortizes them into fewer,
/// larger block reads.
///
/// Features:
/// - Fixed-size block cache with LRU eviction
/// - Singleflight: concurrent requests for the same block share one fetch
/// - Handles reads spanning multiple blocks
pub struct BlockCache<R> {
    /// The underlying reader
    inner: Arc<R>,
    /// Block size in bytes
    block_size: usize,
    /// Cached blocks indexed by block number
    cache: RwLock<LruCache<u64, Bytes>>,
    /// In-flight block fetches for singleflight pattern
    in_flight: Mutex<HashMap<u64, Arc<Notify>>>,
}

impl<R: RangeReader> BlockCache<R> {
    /// Create a new BlockCache with default block size and capacity.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_CACHE_CAPACITY)
    }

    /// Create a new BlockCache with custom block size and capacity.
    ///
    /// # Arguments
    /// * `inner` - The underlying reader to wrap
    /// * `block_size` - Size of each cached block in bytes
    /// * `capacity` - Maximum number of blocks to cache
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        Self {
            inner: Arc::new(inner),
            block_size,
            cache: RwLock::new(LruCache::new(
                std::num::NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get a block from cache or fetch it from the underlying reader.
    ///
    /// Implements the singleflight pattern: if multiple tasks request the
    /// same block concurrently, only one fetch is performed and all tasks
    /// share the result.
    async fn get_block(&self, block_idx: u64) -> Result<Bytes, StoreError> {
        loop {
            // Fast path: check cache
            {
                let cache = self.cache.read().await;
                if let Some(data) = cache.peek(&block_idx) {
                    return Ok(data.clone());
                }
            }

            // Slow path: check in_flight or become leader
            let notify = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(notify) = in_flight.get(&block_idx) {
                    // Another task is fetching this block, wait for it
                    let notify = notify.clone();
                    drop(in_flight);
                    notify.notified().await;
                    // Loop back to check cache
                    continue;
                }

                // We're the leader for this block
                let notify = Arc::new(Notify::new());
                in_flight.insert(block_idx, notify.clone());
                notify
            };

            // Fetch the block from source
            let result = self.fetch_block_from_source(block_idx).await;

            // Update cache and in_flight atomically, then notify waiters
            {
                let mut cache = self.cache.write().await;
                let mut in_flight = self.in_flight.lock().await;

                if let Ok(ref data) = result {
                    cache.put(block_idx, data.clone());
                }

                in_flight.remove(&block_idx);
            }

            notify.notify_waiters();

            return result;
        }
    }

    /// Read one block directly from the underlying reader.
    ///
    /// The final block of the resource may be shorter than `block_size`.
    async fn fetch_block_from_source(&self, block_idx: u64) -> Result<Bytes, StoreError> {
        let start = block_idx * self.block_size as u64;
        let size = self.inner.size();
        if start >= size {
            return Err(StoreError::Io(format!(
                "block {} starts past end of {} ({} bytes)",
                block_idx,
                self.inner.identifier(),
                size
            )));
        }
        let len = (self.block_size as u64).min(size - start) as usize;
        self.inner.read_exact_at(start, len).await
    }

    /// Number of blocks currently cached.
    pub async fn cached_blocks(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[async_trait]
impl<R: RangeReader> RangeReader for BlockCache<R> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, StoreError> {
        if len == 0 {
            return Ok(Bytes::new());
        }
        if offset + len as u64 > self.inner.size() {
            return Err(StoreError::Io(format!(
                "range out of bounds: {} bytes at offset {}, size is {}",
                len,
                offset,
                self.inner.size()
            )));
        }

        let first_block = offset / self.block_size as u64;
        let last_block = (offset + len as u64 - 1) / self.block_size as u64;

        // Common case: the read falls within one block
        if first_block == last_block {
            let block = self.get_block(first_block).await?;
            let start = (offset - first_block * self.block_size as u64) as usize;
            return Ok(block.slice(start..start + len));
        }

        // Read spans multiple blocks: assemble
        let mut out = BytesMut::with_capacity(len);
        for block_idx in first_block..=last_block {
            let block = self.get_block(block_idx).await?;
            let block_start = block_idx * self.block_size as u64;

            let copy_from = offset.max(block_start) - block_start;
            let copy_to = ((offset + len as u64).min(block_start + block.len() as u64)
                - block_start) as usize;
            out.extend_from_slice(&block[copy_from as usize..copy_to]);
        }

        Ok(out.freeze())
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
