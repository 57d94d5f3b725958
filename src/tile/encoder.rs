//! Wire encodings for extracted payloads.
//!
//! Every encoding is deterministic: the same input payload always produces
//! the same output bytes, so cache keys stay valid and outputs are testable
//! byte-for-byte even for the lossy encodings.
//!
//! Registered encodings:
//!
//! | encoding       | payload  | output                                         |
//! |----------------|----------|------------------------------------------------|
//! | `raw`          | tile/mesh| little-endian row-major passthrough            |
//! | `zstd_sqrt_v1` | tile     | integer sqrt quantization to u8, then zstd     |
//! | `textr`        | tile     | r8 texture bytes, row-major                    |
//! | `jpg`          | tile     | max-normalized 8-bit grayscale JPEG            |
//! | `png`          | tile     | max-normalized 8-bit grayscale PNG (lossless)  |
//! | `obj`          | mesh     | OBJ text: verbatim file or contour polylines   |
//!
//! The parser has already validated the encoding against the registry, so
//! an unknown encoding here is an internal invariant violation, not a
//! client error.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder};

use crate::error::EncodeError;
use crate::store::{ContourSet, Dtype};

use super::plane::Tile;

/// JPEG quality used for the `jpg` encoding.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Fixed zstd level for `zstd_sqrt_v1`; part of the encoding's definition,
/// changing it changes output bytes.
pub const ZSTD_LEVEL: i32 = 3;

/// An extracted payload awaiting encoding.
#[derive(Debug, Clone)]
pub enum RawPayload {
    /// 2-D array tile (image or mask)
    Tile(Tile),
    /// Whole-object mesh bytes, verbatim from storage
    MeshBytes(Bytes),
    /// Plane/mesh intersection contours
    Contours(ContourSet),
}

/// An encoded payload with its wire content-type.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Stateless payload encoder.
#[derive(Debug, Clone)]
pub struct TileEncoder {
    jpeg_quality: u8,
}

impl Default for TileEncoder {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl TileEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jpeg_quality(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Encode a payload into the requested wire encoding.
    pub fn encode(&self, payload: &RawPayload, encoding: &str) -> Result<Encoded, EncodeError> {
        match (payload, encoding) {
            (RawPayload::Tile(tile), "raw") => Ok(Encoded {
                bytes: Bytes::from(tile.data.clone()),
                content_type: format!(
                    "application/octet-stream; dtype={}; shape={}x{}; layout=row-major",
                    tile.dtype.name(),
                    tile.height,
                    tile.width
                ),
            }),
            (RawPayload::Tile(tile), "zstd_sqrt_v1") => self.encode_zstd_sqrt(tile),
            (RawPayload::Tile(tile), "textr") => Ok(Encoded {
                bytes: Bytes::from(pack_r8(tile)),
                content_type: format!(
                    "application/x-texture; format=r8; shape={}x{}; layout=row-major",
                    tile.height, tile.width
                ),
            }),
            (RawPayload::Tile(tile), "jpg") => self.encode_raster(tile, RasterFormat::Jpeg),
            (RawPayload::Tile(tile), "png") => self.encode_raster(tile, RasterFormat::Png),
            (RawPayload::MeshBytes(bytes), "obj") => Ok(Encoded {
                bytes: bytes.clone(),
                content_type: "text/plain; charset=utf-8".to_string(),
            }),
            (RawPayload::MeshBytes(bytes), "raw") => Ok(Encoded {
                bytes: bytes.clone(),
                content_type: "application/octet-stream".to_string(),
            }),
            (RawPayload::Contours(contours), "obj") => Ok(Encoded {
                bytes: Bytes::from(contours_to_obj(contours)),
                content_type: "text/plain; charset=utf-8".to_string(),
            }),
            _ => Err(EncodeError::UnsupportedEncoding {
                encoding: encoding.to_string(),
            }),
        }
    }

    /// Square-root-domain quantization to u8, then zstd.
    ///
    /// u16 samples map through the integer square root (sqrt(65535) < 256,
    /// so the result always fits); u8 samples pass through unchanged.
    fn encode_zstd_sqrt(&self, tile: &Tile) -> Result<Encoded, EncodeError> {
        let quantized: Vec<u8> = match tile.dtype {
            Dtype::Uint8 => tile.data.clone(),
            Dtype::Uint16 => tile
                .data
                .chunks_exact(2)
                .map(|s| isqrt(u32::from(u16::from_le_bytes([s[0], s[1]]))) as u8)
                .collect(),
            Dtype::Uint32 => {
                return Err(EncodeError::Encode {
                    message: "zstd_sqrt_v1 is not defined for uint32 data".into(),
                })
            }
        };

        let compressed =
            zstd::encode_all(quantized.as_slice(), ZSTD_LEVEL).map_err(|e| EncodeError::Encode {
                message: format!("zstd: {}", e),
            })?;

        Ok(Encoded {
            bytes: Bytes::from(compressed),
            content_type: format!(
                "application/x-sqrt-zstd; dtype=uint8; shape={}x{}; layout=row-major",
                tile.height, tile.width
            ),
        })
    }

    fn encode_raster(&self, tile: &Tile, format: RasterFormat) -> Result<Encoded, EncodeError> {
        let pixels = normalize_to_u8(tile);
        let image = GrayImage::from_raw(tile.width as u32, tile.height as u32, pixels)
            .ok_or_else(|| EncodeError::Encode {
                message: "tile dimensions do not match pixel buffer".into(),
            })?;

        let mut out = Vec::new();
        match format {
            RasterFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
                encoder
                    .write_image(
                        image.as_raw(),
                        image.width(),
                        image.height(),
                        ExtendedColorType::L8,
                    )
                    .map_err(|e| EncodeError::Encode {
                        message: e.to_string(),
                    })?;
            }
            RasterFormat::Png => {
                let encoder = PngEncoder::new(&mut out);
                encoder
                    .write_image(
                        image.as_raw(),
                        image.width(),
                        image.height(),
                        ExtendedColorType::L8,
                    )
                    .map_err(|e| EncodeError::Encode {
                        message: e.to_string(),
                    })?;
            }
        }

        Ok(Encoded {
            bytes: Bytes::from(out),
            content_type: match format {
                RasterFormat::Jpeg => "image/jpeg".to_string(),
                RasterFormat::Png => "image/png".to_string(),
            },
        })
    }
}

#[derive(Clone, Copy)]
enum RasterFormat {
    Jpeg,
    Png,
}

/// Integer floor square root.
fn isqrt(v: u32) -> u32 {
    if v == 0 {
        return 0;
    }
    let mut x = (v as f64).sqrt() as u32;
    while (x + 1).checked_mul(x + 1).is_some_and(|sq| sq <= v) {
        x += 1;
    }
    while x * x > v {
        x -= 1;
    }
    x
}

/// Pack a tile into r8 texture bytes: u16 keeps its high byte, u32 its
/// highest byte, u8 passes through.
fn pack_r8(tile: &Tile) -> Vec<u8> {
    match tile.dtype {
        Dtype::Uint8 => tile.data.clone(),
        Dtype::Uint16 => tile.data.chunks_exact(2).map(|s| s[1]).collect(),
        Dtype::Uint32 => tile.data.chunks_exact(4).map(|s| s[3]).collect(),
    }
}

/// Scale samples into 0..=255 by the tile maximum, truncating. An all-zero
/// tile stays zero.
fn normalize_to_u8(tile: &Tile) -> Vec<u8> {
    match tile.dtype {
        Dtype::Uint8 => tile.data.clone(),
        Dtype::Uint16 => {
            let samples: Vec<u16> = tile
                .data
                .chunks_exact(2)
                .map(|s| u16::from_le_bytes([s[0], s[1]]))
                .collect();
            let max = samples.iter().copied().max().unwrap_or(0);
            scale(&samples, u32::from(max))
        }
        Dtype::Uint32 => {
            let samples: Vec<u32> = tile
                .data
                .chunks_exact(4)
                .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
                .collect();
            let max = samples.iter().copied().max().unwrap_or(0);
            scale(&samples, max)
        }
    }
}

fn scale<T: Copy + Into<u64>>(samples: &[T], max: impl Into<u64>) -> Vec<u8> {
    let max: u64 = max.into();
    if max == 0 {
        return vec![0u8; samples.len()];
    }
    samples
        .iter()
        .map(|&v| {
            let v: u64 = v.into();
            ((v as f32 / max as f32) * 255.0) as u8
        })
        .collect()
}

/// Serialize contour polygons as OBJ text.
///
/// Flattening convention: z is fixed at the plane coordinate, x/y are the
/// vertex coordinates. Each polygon becomes one `l` polyline element,
/// closed by repeating its first index.
fn contours_to_obj(contours: &ContourSet) -> Vec<u8> {
    let mut out = String::new();
    let mut base = 1usize;
    for polygon in &contours.polygons {
        for p in polygon {
            out.push_str(&format!("v {:.4} {:.4} {:.4}\n", p[0], p[1], contours.plane_z));
        }
        out.push('l');
        for i in 0..polygon.len() {
            out.push_str(&format!(" {}", base + i));
        }
        out.push_str(&format!(" {}\n", base));
        base += polygon.len();
    }
    out.into_bytes()
}
