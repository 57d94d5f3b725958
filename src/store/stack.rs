//! Single-file multi-resolution stack container.
//!
//! Layout:
//!
//! ```text
//! +---------+-----------+----------------------+------------------------+
//! | "NSTK"  | u32 LE    | JSON header          | dataset payloads ...   |
//! | 4 bytes | hdr bytes | dtype + dataset dir  | raw LE row-major data  |
//! +---------+-----------+----------------------+------------------------+
//! ```
//!
//! The header directory maps `(level, channel)` to an absolute byte range
//! holding one dense `(z, y, x)` little-endian array. Reads resolve the
//! requested level and channel to a dataset and fetch the bounded sub-array
//! row by row through a block-cached range reader; no chunk assembly is
//! needed.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StoreError;
use crate::io::{BlockCache, FsRangeReader, RangeReader};

use super::{clip_box, Dtype, Slab, VolumeStore};

/// File magic.
pub const STACK_MAGIC: &[u8; 4] = b"NSTK";

/// One dense dataset inside the container.
#[derive(Debug, Clone, Deserialize)]
struct DatasetRecord {
    level: u32,
    channel: u32,
    /// Shape as `(z, y, x)`
    shape: [u64; 3],
    /// Absolute byte offset of the array data
    offset: u64,
    /// Byte length of the array data
    nbytes: u64,
}

#[derive(Debug, Deserialize)]
struct StackHeader {
    dtype: String,
    datasets: Vec<DatasetRecord>,
}

/// Reader over a single-file stack container.
pub struct StackStore {
    reader: BlockCache<FsRangeReader>,
    dtype: Dtype,
    datasets: HashMap<(u32, u32), DatasetRecord>,
    level_count: usize,
    channel_count: u32,
}

impl StackStore {
    /// Open and validate a stack container file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let reader = BlockCache::new(FsRangeReader::open(path).await?);

        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.display().to_string(),
            reason,
        };

        if reader.size() < 8 {
            return Err(corrupt("file too small for header".into()));
        }

        let prefix = reader.read_exact_at(0, 8).await?;
        if &prefix[..4] != STACK_MAGIC {
            return Err(corrupt("bad magic (not a stack container)".into()));
        }
        let header_len = u32::from_le_bytes(prefix[4..8].try_into().unwrap()) as usize;
        if 8 + header_len as u64 > reader.size() {
            return Err(corrupt("header length exceeds file size".into()));
        }

        let header_bytes = reader.read_exact_at(8, header_len).await?;
        let header: StackHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| corrupt(format!("invalid header: {}", e)))?;

        let dtype = Dtype::parse(&header.dtype)?;

        let mut datasets = HashMap::new();
        let mut max_level = None;
        let mut max_channel = 0u32;
        for record in header.datasets {
            let voxels: u64 = record.shape.iter().product();
            if record.nbytes != voxels * dtype.size() as u64 {
                return Err(corrupt(format!(
                    "dataset (level {}, channel {}) declares {} bytes for shape {:?}",
                    record.level, record.channel, record.nbytes, record.shape
                )));
            }
            if record.offset + record.nbytes > reader.size() {
                return Err(corrupt(format!(
                    "dataset (level {}, channel {}) extends past end of file",
                    record.level, record.channel
                )));
            }
            max_level = Some(max_level.map_or(record.level, |m: u32| m.max(record.level)));
            max_channel = max_channel.max(record.channel);
            datasets.insert((record.level, record.channel), record);
        }

        if datasets.is_empty() {
            return Err(corrupt("container holds no datasets".into()));
        }

        Ok(Self {
            reader,
            dtype,
            datasets,
            level_count: max_level.unwrap() as usize + 1,
            channel_count: max_channel + 1,
        })
    }
}

#[async_trait]
impl VolumeStore for StackStore {
    fn dtype(&self) -> Dtype {
        self.dtype
    }

    fn level_count(&self) -> usize {
        self.level_count
    }

    fn level_shape(&self, level: u32) -> Option<[u64; 3]> {
        self.datasets
            .iter()
            .find(|((l, _), _)| *l == level)
            .map(|(_, record)| record.shape)
    }

    fn channel_count(&self) -> u32 {
        self.channel_count
    }

    async fn read_box(
        &self,
        level: u32,
        channel: u32,
        origin: [i64; 3],
        shape: [u64; 3],
    ) -> Result<Slab, StoreError> {
        let record = self
            .datasets
            .get(&(level, channel))
            .ok_or(StoreError::DatasetMissing { level, channel })?;

        let (start, extent) = clip_box(origin, shape, record.shape)?;

        let es = self.dtype.size() as u64;
        let [_, ny, nx] = record.shape;
        let run = extent[2] * es as usize;

        let mut slab = Slab::zeroed(extent, self.dtype);
        for z in 0..extent[0] as u64 {
            for y in 0..extent[1] as u64 {
                let src = record.offset
                    + (((start[0] + z) * ny + (start[1] + y)) * nx + start[2]) * es;
                let bytes = self.reader.read_exact_at(src, run).await?;
                let dst = slab.offset(z as usize, y as usize, 0);
                slab.data[dst..dst + run].copy_from_slice(&bytes);
            }
        }

        Ok(slab)
    }
}
