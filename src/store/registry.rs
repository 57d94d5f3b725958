//! Registry of opened storage backends.
//!
//! Opening a store parses its on-disk metadata (level documents, container
//! headers), which is worth doing once per dataset rather than per request.
//! The registry:
//! - caches opened stores with LRU eviction
//! - opens on-demand, dispatching on the dataset entry's declared format
//! - uses singleflight so concurrent requests for the same dataset share
//!   one open

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use crate::error::StoreError;
use crate::meta::{ArrayDatasetEntry, MeshDatasetEntry, StoreFormat};

use super::mesh::MeshStore;
use super::sharded::ShardedStore;
use super::stack::StackStore;
use super::VolumeStore;

/// Default number of opened stores to keep.
pub const DEFAULT_STORE_CACHE_CAPACITY: usize = 64;

/// An opened backend of either kind.
#[derive(Clone)]
pub enum OpenStore {
    Volume(Arc<dyn VolumeStore>),
    Mesh(Arc<MeshStore>),
}

/// State for an in-flight open operation.
struct InFlightState {
    /// Notification for waiters
    notify: Notify,
    /// Result of the open (set when complete)
    result: Mutex<Option<Result<OpenStore, StoreError>>>,
}

/// What to open, resolved from a specimen's dataset entry.
enum OpenSpec<'a> {
    Volume(&'a ArrayDatasetEntry),
    Mesh(&'a MeshDatasetEntry),
}

/// LRU-cached, singleflight-guarded store opener.
pub struct StoreRegistry {
    data_root: PathBuf,
    cache: RwLock<LruCache<String, OpenStore>>,
    in_flight: Mutex<HashMap<String, Arc<InFlightState>>>,
}

impl StoreRegistry {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(data_root, DEFAULT_STORE_CACHE_CAPACITY)
    }

    pub fn with_capacity(data_root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            data_root: data_root.into(),
            cache: RwLock::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or open) the volume store behind an array dataset entry.
    ///
    /// `key` must uniquely identify the dataset, e.g.
    /// `"{specimen_id}/{modality}"`.
    pub async fn volume(
        &self,
        key: &str,
        entry: &ArrayDatasetEntry,
    ) -> Result<Arc<dyn VolumeStore>, StoreError> {
        match self.get_or_open(key, OpenSpec::Volume(entry)).await? {
            OpenStore::Volume(store) => Ok(store),
            OpenStore::Mesh(_) => Err(StoreError::Unsupported {
                reason: format!("store key '{}' is already open as a mesh store", key),
            }),
        }
    }

    /// Get (or open) the mesh store behind a mesh dataset entry.
    pub async fn mesh(
        &self,
        key: &str,
        entry: &MeshDatasetEntry,
    ) -> Result<Arc<MeshStore>, StoreError> {
        match self.get_or_open(key, OpenSpec::Mesh(entry)).await? {
            OpenStore::Mesh(store) => Ok(store),
            OpenStore::Volume(_) => Err(StoreError::Unsupported {
                reason: format!("store key '{}' is already open as a volume store", key),
            }),
        }
    }

    async fn get_or_open(&self, key: &str, spec: OpenSpec<'_>) -> Result<OpenStore, StoreError> {
        // Fast path: check cache
        {
            let mut cache = self.cache.write().await;
            if let Some(store) = cache.get(key) {
                return Ok(store.clone());
            }
        }

        // Slow path: wait for an in-flight open or become the leader
        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(state) = in_flight.get(key) {
                    state.clone()
                } else {
                    let state = Arc::new(InFlightState {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(key.to_string(), state.clone());
                    drop(in_flight);

                    let result = self.open_store(key, &spec).await;

                    {
                        let mut result_guard = state.result.lock().await;
                        *result_guard = Some(result.clone());
                    }

                    if let Ok(ref store) = result {
                        let mut cache = self.cache.write().await;
                        cache.put(key.to_string(), store.clone());
                    }

                    {
                        let mut in_flight = self.in_flight.lock().await;
                        in_flight.remove(key);
                    }
                    state.notify.notify_waiters();

                    return result;
                }
            };

            // Wait for the leader to finish
            state.notify.notified().await;

            let result_guard = state.result.lock().await;
            if let Some(ref result) = *result_guard {
                return result.clone();
            }
            // Result not yet available; loop back (shouldn't normally happen)
        }
    }

    async fn open_store(&self, key: &str, spec: &OpenSpec<'_>) -> Result<OpenStore, StoreError> {
        debug!(key, "opening store");
        match spec {
            OpenSpec::Volume(entry) => {
                let path = self.data_root.join(&entry.source);
                let store: Arc<dyn VolumeStore> = match entry.format {
                    StoreFormat::Shard3 => Arc::new(ShardedStore::open(path).await?),
                    StoreFormat::Stack => Arc::new(StackStore::open(path).await?),
                };
                Ok(OpenStore::Volume(store))
            }
            OpenSpec::Mesh(entry) => {
                let dir = self.data_root.join(&entry.dir_path);
                if !tokio::fs::try_exists(&dir).await? {
                    return Err(StoreError::Io(format!(
                        "mesh directory not found: {}",
                        dir.display()
                    )));
                }
                Ok(OpenStore::Mesh(Arc::new(MeshStore::new(
                    dir,
                    entry.source.clone(),
                ))))
            }
        }
    }

    /// Drop one opened store, forcing a re-open on next access.
    pub async fn invalidate(&self, key: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(key);
    }

    /// Drop all opened stores.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Number of currently cached stores.
    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}
