//! Data service: per-request orchestration.
//!
//! `get_data` is the engine's single entry point: it parses the composite
//! identifier against the current registry snapshot, consults the result
//! cache, extracts the payload from the backing store, encodes it, and
//! caches the finished bytes.
//!
//! Error classification happens here: a box outside the volume or an
//! unknown region is a not-found result; an I/O or decode failure inside an
//! adapter is a storage failure, logged at error severity and never
//! converted to empty data.

use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{DataError, ExtractError, StoreError};
use crate::id::{self, DataDescriptor, IndexRef, Modality};
use crate::meta::{resolve_region, MetadataRegistry, RegistrySnapshot, ResolveError};
use crate::store::StoreRegistry;

use super::cache::ResultCache;
use super::encoder::{RawPayload, TileEncoder};
use super::plane::{slab_to_tile, tile_box};

/// Response for one data request.
#[derive(Debug, Clone)]
pub struct DataResponse {
    pub bytes: bytes::Bytes,
    pub content_type: String,
    /// Whether the payload came from the result cache
    pub cache_hit: bool,
}

/// The data-identifier resolution and tile-extraction engine.
pub struct DataService {
    registry: Arc<MetadataRegistry>,
    stores: StoreRegistry,
    encoder: TileEncoder,
    /// `None` means pass-through: every request re-invokes the adapters
    cache: Option<ResultCache>,
}

impl DataService {
    /// Create a service with the result cache disabled.
    pub fn new(registry: Arc<MetadataRegistry>) -> Self {
        let stores = StoreRegistry::new(registry.data_root());
        Self {
            registry,
            stores,
            encoder: TileEncoder::new(),
            cache: None,
        }
    }

    /// Create a service with a result cache.
    pub fn with_cache(registry: Arc<MetadataRegistry>, cache: ResultCache) -> Self {
        let stores = StoreRegistry::new(registry.data_root());
        Self {
            registry,
            stores,
            encoder: TileEncoder::new(),
            cache: Some(cache),
        }
    }

    /// Resolve one composite identifier to encoded bytes + content-type.
    pub async fn get_data(&self, data_id: &str) -> Result<DataResponse, DataError> {
        let snapshot = self.registry.snapshot();
        let descriptor = id::parse(data_id, &snapshot)?;
        let key = descriptor.canonical_id();

        if let Some(cache) = &self.cache {
            if let Some((bytes, content_type)) = cache.get(&key).await {
                debug!(%key, "result cache hit");
                return Ok(DataResponse {
                    bytes,
                    content_type,
                    cache_hit: true,
                });
            }
        }

        let payload = self.extract(&descriptor, &snapshot).await?;
        let encoded = self
            .encoder
            .encode(&payload, &descriptor.encoding)
            .map_err(|e| {
                // Parser and registry agree on offered encodings, so this is
                // a desynchronization bug, not a client error
                error!(%key, encoding = %descriptor.encoding, error = %e, "encoder rejected a validated encoding");
                ExtractError::Encode(e)
            })?;

        if let Some(cache) = &self.cache {
            cache
                .put(key, encoded.bytes.clone(), encoded.content_type.clone())
                .await;
        }

        Ok(DataResponse {
            bytes: encoded.bytes,
            content_type: encoded.content_type,
            cache_hit: false,
        })
    }

    /// Extract the raw payload for a validated descriptor.
    pub async fn extract(
        &self,
        descriptor: &DataDescriptor,
        snapshot: &RegistrySnapshot,
    ) -> Result<RawPayload, ExtractError> {
        let result = match descriptor.modality {
            Modality::Image | Modality::Mask => self.extract_tile(descriptor, snapshot).await,
            Modality::Mesh => self.extract_mesh(descriptor, snapshot).await,
        };

        if let Err(ExtractError::Storage(ref e)) = result {
            error!(
                specimen = %descriptor.specimen_id,
                modality = %descriptor.modality,
                error = %e,
                "storage failure during extraction"
            );
        }

        result
    }

    async fn extract_tile(
        &self,
        descriptor: &DataDescriptor,
        snapshot: &RegistrySnapshot,
    ) -> Result<RawPayload, ExtractError> {
        // The parser validated specimen, modality, level and channel
        let entry = snapshot
            .get(&descriptor.specimen_id)
            .ok_or_else(|| ExtractError::NotFound {
                reason: format!("specimen {} disappeared from registry", descriptor.specimen_id),
            })?;
        let (dataset_name, dataset) = entry
            .array_dataset(descriptor.modality)
            .ok_or_else(|| ExtractError::NotFound {
                reason: format!("no {} dataset", descriptor.modality),
            })?;

        let IndexRef::Voxel { z, y, x } = descriptor.index else {
            return Err(ExtractError::NotFound {
                reason: "array request without voxel coordinates".into(),
            });
        };

        let (origin, shape) =
            tile_box(descriptor.view, [z, y, x], dataset.tile_size_2d).ok_or_else(|| {
                ExtractError::Storage(StoreError::Unsupported {
                    reason: "volumetric array extraction is not available".into(),
                })
            })?;

        let store_key = format!(
            "{}/{}/{}",
            descriptor.specimen_id, descriptor.modality, dataset_name
        );
        let store = self.stores.volume(&store_key, dataset).await?;

        let slab = store
            .read_box(
                descriptor.level.unwrap_or(0),
                descriptor.channel.unwrap_or(0),
                origin,
                shape,
            )
            .await?;

        let tile = slab_to_tile(descriptor.view, &slab).ok_or_else(|| {
            ExtractError::Storage(StoreError::Unsupported {
                reason: "volumetric array extraction is not available".into(),
            })
        })?;

        debug!(
            specimen = %descriptor.specimen_id,
            view = %descriptor.view,
            height = tile.height,
            width = tile.width,
            "extracted tile"
        );

        Ok(RawPayload::Tile(tile))
    }

    async fn extract_mesh(
        &self,
        descriptor: &DataDescriptor,
        snapshot: &RegistrySnapshot,
    ) -> Result<RawPayload, ExtractError> {
        let IndexRef::Region { ref name, plane_z } = descriptor.index else {
            return Err(ExtractError::NotFound {
                reason: "mesh request without region name".into(),
            });
        };

        let geometry =
            resolve_region(snapshot, &descriptor.specimen_id, name).map_err(|e| match e {
                ResolveError::UnknownSpecimen { .. } | ResolveError::UnknownRegion { .. } => {
                    ExtractError::NotFound {
                        reason: e.to_string(),
                    }
                }
            })?;

        let entry = snapshot
            .get(&descriptor.specimen_id)
            .ok_or_else(|| ExtractError::NotFound {
                reason: format!("specimen {} disappeared from registry", descriptor.specimen_id),
            })?;
        let (dataset_name, dataset) =
            entry.mesh_dataset().ok_or_else(|| ExtractError::NotFound {
                reason: "no mesh dataset".into(),
            })?;

        let store_key = format!("{}/meh/{}", descriptor.specimen_id, dataset_name);
        let store = self.stores.mesh(&store_key, dataset).await?;

        match plane_z {
            None => {
                let bytes = store.read_object(&geometry.name).await?;
                Ok(RawPayload::MeshBytes(bytes))
            }
            Some(z) => {
                let contours = store.cross_section(&geometry.name, z as f64).await?;
                if contours.is_empty() {
                    return Err(ExtractError::NotFound {
                        reason: format!(
                            "plane z={} does not intersect region '{}'",
                            z, geometry.name
                        ),
                    });
                }
                Ok(RawPayload::Contours(contours))
            }
        }
    }

    /// The metadata registry backing this service.
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }

    /// Whether the result cache is enabled.
    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Result cache statistics: `(current_size, capacity, entry_count)`,
    /// or `None` when the cache is disabled.
    pub async fn cache_stats(&self) -> Option<(usize, usize, usize)> {
        match &self.cache {
            Some(cache) => Some((cache.size().await, cache.capacity(), cache.len().await)),
            None => None,
        }
    }

    /// Flush the result cache and drop opened stores. The explicit
    /// invalidation path for changed datasets.
    pub async fn flush(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
        self.stores.clear().await;
    }
}
