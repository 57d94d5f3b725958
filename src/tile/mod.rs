//! Tile extraction, encoding and result caching.
//!
//! The data service sits between the HTTP layer and the storage adapters:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                HTTP handlers                │
//! └──────────────────────┬──────────────────────┘
//!                        │ data_id
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │                 DataService                 │
//! │  parse → cache lookup → extract → encode    │
//! │        → cache store → bytes + content-type │
//! │  ┌─────────────┐  ┌──────────────────────┐  │
//! │  │ ResultCache │  │     TileEncoder      │  │
//! │  └─────────────┘  └──────────────────────┘  │
//! └──────────────────────┬──────────────────────┘
//!                        │
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │      MetadataRegistry + StoreRegistry       │
//! └─────────────────────────────────────────────┘
//! ```

mod cache;
mod encoder;
mod extract;
mod plane;

pub use cache::{ResultCache, DEFAULT_RESULT_CACHE_CAPACITY, DEFAULT_RESULT_TTL};
pub use encoder::{Encoded, RawPayload, TileEncoder, DEFAULT_JPEG_QUALITY, ZSTD_LEVEL};
pub use extract::{DataResponse, DataService};
pub use plane::{slab_to_tile, tile_box, Tile};
