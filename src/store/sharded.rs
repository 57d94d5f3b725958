//! Sharded chunk store for multi-resolution volumes.
//!
//! On-disk layout (Zarr v3 sharding):
//!
//! ```text
//! volume.zarr/
//!   zarr.json                 - group marker
//!   0/
//!     zarr.json               - level metadata (shape, shard/chunk geometry, codecs)
//!     c/<s0>/<s1>/<s2>/<s3>   - shard files
//!   1/
//!     ...
//! ```
//!
//! Arrays are 4-D `(channel, z, y, x)`. Each shard file packs a grid of
//! zstd-compressed inner chunks and ends with an index array: one
//! little-endian `(offset, nbytes)` u64 pair per inner chunk, followed by a
//! 4-byte crc32c of the index. A pair of `u64::MAX` marks an absent chunk,
//! which decodes to the fill value, as does a missing shard file.
//!
//! Only the `zstd` chunk codec and the raw (`bytes`) index codec are
//! supported; other codec chains fail at open time. The index crc32c
//! trailer is not verified on read.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::debug;

use crate::error::StoreError;

use super::{clip_box, Dtype, Slab, VolumeStore};

/// Sentinel index pair marking an absent inner chunk.
const CHUNK_ABSENT: u64 = u64::MAX;

/// Bytes of the crc32c trailer after the index array.
const INDEX_CRC_BYTES: u64 = 4;

/// Shard index arrays cached per (level, shard) to avoid re-reading file
/// tails on every chunk access.
const INDEX_CACHE_ITEMS: usize = 4096;

// =============================================================================
// Level Metadata
// =============================================================================

/// Parsed per-level metadata from `<level>/zarr.json`.
#[derive(Debug, Clone)]
struct LevelMeta {
    level: u32,
    /// Array shape `(c, z, y, x)`
    shape: [u64; 4],
    /// Shard shape (outer chunk grid)
    shard_shape: [u64; 4],
    /// Inner chunk shape
    chunk_shape: [u64; 4],
    fill_value: u64,
}

impl LevelMeta {
    /// Inner chunks per shard, per axis.
    fn chunks_per_shard(&self) -> [u64; 4] {
        let mut n = [0u64; 4];
        for axis in 0..4 {
            n[axis] = self.shard_shape[axis] / self.chunk_shape[axis];
        }
        n
    }

    /// Voxels per inner chunk.
    fn chunk_len(&self) -> usize {
        self.chunk_shape.iter().product::<u64>() as usize
    }
}

/// Split an absolute inner-chunk index into its shard index and its position
/// within that shard.
fn shard_and_position(chunk_idx: [u64; 4], chunks_per_shard: [u64; 4]) -> ([u64; 4], [u64; 4]) {
    let mut shard = [0u64; 4];
    let mut pos = [0u64; 4];
    for axis in 0..4 {
        shard[axis] = chunk_idx[axis] / chunks_per_shard[axis];
        pos[axis] = chunk_idx[axis] % chunks_per_shard[axis];
    }
    (shard, pos)
}

// =============================================================================
// Sharded Store
// =============================================================================

/// Reader over the sharded multi-resolution chunk store.
pub struct ShardedStore {
    root: PathBuf,
    dtype: Dtype,
    /// Per-level metadata, sorted by level number
    levels: Vec<LevelMeta>,
    /// Cached shard index arrays keyed by (level, shard index)
    index_cache: Mutex<LruCache<(u32, [u64; 4]), Arc<Vec<u64>>>>,
}

impl ShardedStore {
    /// Open a sharded store rooted at `root`.
    ///
    /// Eagerly parses every level's metadata; levels must agree on dtype.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();

        let group_marker = root.join("zarr.json");
        if !tokio::fs::try_exists(&group_marker).await? {
            return Err(StoreError::Corrupt {
                path: root.display().to_string(),
                reason: "missing zarr.json group metadata".into(),
            });
        }

        // Level directories are numerically named
        let mut level_numbers = Vec::new();
        let mut entries = tokio::fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Ok(level) = entry.file_name().to_string_lossy().parse::<u32>() {
                level_numbers.push(level);
            }
        }
        level_numbers.sort_unstable();

        if level_numbers.is_empty() {
            return Err(StoreError::Corrupt {
                path: root.display().to_string(),
                reason: "no resolution level directories".into(),
            });
        }

        let mut levels = Vec::with_capacity(level_numbers.len());
        let mut dtype = None;
        for level in level_numbers {
            let (meta, level_dtype) = parse_level_meta(&root, level).await?;
            match dtype {
                None => dtype = Some(level_dtype),
                Some(d) if d == level_dtype => {}
                Some(d) => {
                    return Err(StoreError::Unsupported {
                        reason: format!(
                            "mixed dtypes across levels: {} vs {}",
                            d.name(),
                            level_dtype.name()
                        ),
                    })
                }
            }
            levels.push(meta);
        }

        debug!(
            root = %root.display(),
            levels = levels.len(),
            "opened sharded store"
        );

        Ok(Self {
            root,
            dtype: dtype.unwrap(),
            levels,
            index_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(INDEX_CACHE_ITEMS).unwrap(),
            )),
        })
    }

    fn level_meta(&self, level: u32) -> Option<&LevelMeta> {
        self.levels.iter().find(|m| m.level == level)
    }

    /// Read and decode one inner chunk, or `None` if the chunk is absent.
    async fn read_chunk(
        &self,
        meta: &LevelMeta,
        chunk_idx: [u64; 4],
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let chunks_per_shard = meta.chunks_per_shard();
        let (shard_idx, pos) = shard_and_position(chunk_idx, chunks_per_shard);

        let shard_path = self
            .root
            .join(meta.level.to_string())
            .join("c")
            .join(shard_idx[0].to_string())
            .join(shard_idx[1].to_string())
            .join(shard_idx[2].to_string())
            .join(shard_idx[3].to_string());

        let mut file = match tokio::fs::File::open(&shard_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let index = self
            .shard_index(meta, &mut file, shard_idx, chunks_per_shard)
            .await?;

        let flat = (((pos[0] * chunks_per_shard[1] + pos[1]) * chunks_per_shard[2] + pos[2])
            * chunks_per_shard[3]
            + pos[3]) as usize;
        let (offset, nbytes) = (index[flat * 2], index[flat * 2 + 1]);

        if offset == CHUNK_ABSENT && nbytes == CHUNK_ABSENT {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(offset)).await?;
        let mut compressed = vec![0u8; nbytes as usize];
        file.read_exact(&mut compressed).await?;

        let decoded =
            zstd::decode_all(compressed.as_slice()).map_err(|e| StoreError::Corrupt {
                path: shard_path.display().to_string(),
                reason: format!("chunk decode failed: {}", e),
            })?;

        let expected = meta.chunk_len() * self.dtype.size();
        if decoded.len() != expected {
            return Err(StoreError::Corrupt {
                path: shard_path.display().to_string(),
                reason: format!(
                    "chunk decoded to {} bytes, expected {}",
                    decoded.len(),
                    expected
                ),
            });
        }

        Ok(Some(decoded))
    }

    /// Load a shard's index array, cached per (level, shard).
    ///
    /// The crc32c trailer is skipped, as is checking offset/nbytes against
    /// the file size: the index is trusted once the shard exists.
    async fn shard_index(
        &self,
        meta: &LevelMeta,
        file: &mut tokio::fs::File,
        shard_idx: [u64; 4],
        chunks_per_shard: [u64; 4],
    ) -> Result<Arc<Vec<u64>>, StoreError> {
        let key = (meta.level, shard_idx);
        {
            let mut cache = self.index_cache.lock().unwrap();
            if let Some(index) = cache.get(&key) {
                return Ok(Arc::clone(index));
            }
        }

        let entries = chunks_per_shard.iter().product::<u64>() as usize;
        let index_bytes = entries * 16;

        let read = async {
            file.seek(SeekFrom::End(-(index_bytes as i64 + INDEX_CRC_BYTES as i64)))
                .await?;
            let mut buf = vec![0u8; index_bytes];
            file.read_exact(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };
        let buf = read.await.map_err(|e| StoreError::Corrupt {
            path: format!("{}/{}/c shard {:?}", self.root.display(), meta.level, shard_idx),
            reason: format!("shard index unreadable: {}", e),
        })?;

        let mut index = Vec::with_capacity(entries * 2);
        for pair in buf.chunks_exact(8) {
            index.push(u64::from_le_bytes(pair.try_into().unwrap()));
        }
        let index = Arc::new(index);

        self.index_cache
            .lock()
            .unwrap()
            .put(key, Arc::clone(&index));
        Ok(index)
    }
}

#[async_trait]
impl VolumeStore for ShardedStore {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_shape(&self, level: u32) -> Option<[u64; 3]> {
        self.level_meta(level)
            .map(|m| [m.shape[1], m.shape[2], m.shape[3]])
    }

    fn channel_count(&self) -> u32 {
        self.levels.first().map(|m| m.shape[0] as u32).unwrap_or(0)
    }

    async fn read_box(
        &self,
        level: u32,
        channel: u32,
        origin: [i64; 3],
        shape: [u64; 3],
    ) -> Result<Slab, StoreError> {
        let meta = self
            .level_meta(level)
            .ok_or(StoreError::DatasetMissing { level, channel })?
            .clone();

        if u64::from(channel) >= meta.shape[0] {
            return Err(StoreError::DatasetMissing { level, channel });
        }

        let volume = [meta.shape[1], meta.shape[2], meta.shape[3]];
        let (start, extent) = clip_box(origin, shape, volume)?;

        // Absent chunks leave the fill value in place
        let mut slab = Slab::filled(extent, self.dtype, meta.fill_value);
        let es = self.dtype.size();

        let c = u64::from(channel);
        let cs = meta.chunk_shape;
        let chunk_c = c / cs[0];
        let c_in_chunk = c % cs[0];

        let end = [
            start[0] + extent[0] as u64,
            start[1] + extent[1] as u64,
            start[2] + extent[2] as u64,
        ];

        for cz in start[0] / cs[1]..=(end[0] - 1) / cs[1] {
            for cy in start[1] / cs[2]..=(end[1] - 1) / cs[2] {
                for cx in start[2] / cs[3]..=(end[2] - 1) / cs[3] {
                    let chunk = match self.read_chunk(&meta, [chunk_c, cz, cy, cx]).await? {
                        Some(chunk) => chunk,
                        None => continue,
                    };

                    let chunk_origin = [cz * cs[1], cy * cs[2], cx * cs[3]];
                    let z0 = start[0].max(chunk_origin[0]);
                    let z1 = end[0].min(chunk_origin[0] + cs[1]);
                    let y0 = start[1].max(chunk_origin[1]);
                    let y1 = end[1].min(chunk_origin[1] + cs[2]);
                    let x0 = start[2].max(chunk_origin[2]);
                    let x1 = end[2].min(chunk_origin[2] + cs[3]);

                    let run = (x1 - x0) as usize * es;
                    for z in z0..z1 {
                        for y in y0..y1 {
                            let src = (((c_in_chunk * cs[1] + (z - chunk_origin[0])) * cs[2]
                                + (y - chunk_origin[1]))
                                * cs[3]
                                + (x0 - chunk_origin[2]))
                                as usize
                                * es;
                            let dst = slab.offset(
                                (z - start[0]) as usize,
                                (y - start[1]) as usize,
                                (x0 - start[2]) as usize,
                            );
                            slab.data[dst..dst + run].copy_from_slice(&chunk[src..src + run]);
                        }
                    }
                }
            }
        }

        Ok(slab)
    }
}

// =============================================================================
// Metadata Parsing
// =============================================================================

async fn parse_level_meta(
    root: &std::path::Path,
    level: u32,
) -> Result<(LevelMeta, Dtype), StoreError> {
    let path = root.join(level.to_string()).join("zarr.json");
    let text = tokio::fs::read_to_string(&path).await?;
    let doc: Value =
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: format!("invalid level metadata: {}", e),
        })?;

    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    let shape = u64_array4(&doc["shape"]).ok_or_else(|| corrupt("bad 'shape'".into()))?;
    let shard_shape = u64_array4(&doc["chunk_grid"]["configuration"]["chunk_shape"])
        .ok_or_else(|| corrupt("bad chunk_grid chunk_shape".into()))?;

    let sharding = &doc["codecs"][0];
    if sharding["name"].as_str() != Some("sharding_indexed") {
        return Err(StoreError::Unsupported {
            reason: format!(
                "only the sharding_indexed codec is supported, got {:?}",
                sharding["name"]
            ),
        });
    }
    let chunk_shape = u64_array4(&sharding["configuration"]["chunk_shape"])
        .ok_or_else(|| corrupt("bad inner chunk_shape".into()))?;

    // Chunk codec chain must end in zstd; index codec must be raw bytes
    let chunk_codecs = sharding["configuration"]["codecs"]
        .as_array()
        .ok_or_else(|| corrupt("missing chunk codecs".into()))?;
    let last_codec = chunk_codecs.last().and_then(|c| c["name"].as_str());
    if last_codec != Some("zstd") {
        return Err(StoreError::Unsupported {
            reason: format!("only the zstd chunk codec is supported, got {:?}", last_codec),
        });
    }
    let index_codec = sharding["configuration"]["index_codecs"][0]["name"].as_str();
    if index_codec != Some("bytes") {
        return Err(StoreError::Unsupported {
            reason: format!("only the bytes index codec is supported, got {:?}", index_codec),
        });
    }

    for axis in 0..4 {
        if chunk_shape[axis] == 0 || shard_shape[axis] % chunk_shape[axis] != 0 {
            return Err(StoreError::Unsupported {
                reason: format!(
                    "shard shape {:?} is not a multiple of chunk shape {:?}",
                    shard_shape, chunk_shape
                ),
            });
        }
    }

    let dtype = doc["data_type"]
        .as_str()
        .ok_or_else(|| corrupt("missing data_type".into()))
        .and_then(Dtype::parse)?;
    let fill_value = doc["fill_value"].as_u64().unwrap_or(0);

    Ok((
        LevelMeta {
            level,
            shape,
            shard_shape,
            chunk_shape,
            fill_value,
        },
        dtype,
    ))
}

fn u64_array4(value: &Value) -> Option<[u64; 4]> {
    let arr = value.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0u64; 4];
    for (slot, v) in out.iter_mut().zip(arr) {
        *slot = v.as_u64()?;
    }
    Some(out)
}
