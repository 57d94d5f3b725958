use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

/// Trait for reading byte ranges from a backing resource.
///
/// This abstraction lets the container parsers work against any byte source.
/// Implementations must be safe to share across concurrent requests: no
/// per-call seek state, positioned reads only.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, StoreError>;

    /// Total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Identifier of this resource for logging and cache keys.
    fn identifier(&self) -> &str;
}

// =============================================================================
// Filesystem Range Reader
// =============================================================================

/// Range reader over a local file.
///
/// The file handle is opened once and shared via `Arc`; reads are positioned
/// (`read_at`), so concurrent requests never contend on a file cursor and a
/// cancelled request leaves no state behind. The actual read runs on the
/// blocking pool.
pub struct FsRangeReader {
    file: Arc<std::fs::File>,
    size: u64,
    identifier: String,
}

impl FsRangeReader {
    /// Open a file for positioned reads.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_owned();
        let identifier = path.display().to_string();

        let (file, size) = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path)?;
            let size = file.metadata()?.len();
            Ok::<_, std::io::Error>((file, size))
        })
        .await
        .map_err(|e| StoreError::Io(format!("blocking task failed: {}", e)))??;

        Ok(Self {
            file: Arc::new(file),
            size,
            identifier,
        })
    }
}

#[async_trait]
impl RangeReader for FsRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, StoreError> {
        if offset + len as u64 > self.size {
            return Err(StoreError::Io(format!(
                "range out of bounds: {} bytes at offset {}, file size is {}",
                len, offset, self.size
            )));
        }

        let file = Arc::clone(&self.file);
        let data = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; len];
            read_at(&file, &mut buf, offset)?;
            Ok::<_, std::io::Error>(buf)
        })
        .await
        .map_err(|e| StoreError::Io(format!("blocking task failed: {}", e)))??;

        Ok(Bytes::from(data))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[cfg(unix)]
fn read_at(file: &std::fs::File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &std::fs::File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut read = 0usize;
    while read < buf.len() {
        let n = file.seek_read(&mut buf[read..], offset + read as u64)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "unexpected end of file",
            ));
        }
        read += n;
    }
    Ok(())
}
