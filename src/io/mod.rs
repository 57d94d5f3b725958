//! I/O layer: positioned reads over local files and block caching.
//!
//! The stack container performs many small scattered reads (one per array
//! row); the [`BlockCache`] amortizes those into fewer, larger reads with
//! LRU retention and singleflight fetch coalescing.

mod block_cache;
mod range_reader;

pub use block_cache::{BlockCache, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
pub use range_reader::{FsRangeReader, RangeReader};
