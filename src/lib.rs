//! # neuro-streamer
//!
//! A tile server for multi-resolution brain specimen imaging datasets.
//!
//! The core of this library is a data-identifier resolution and
//! tile-extraction engine: it parses a composite identifier such as
//! `RM009:imgxy:0:0:43200,512,1536`, validates it against per-specimen
//! metadata, extracts the addressed tile, mask block or mesh asset from the
//! backing store, and transcodes it into the requested wire encoding.
//!
//! ## Features
//!
//! - **Composite identifiers**: one string encodes specimen, modality,
//!   view plane, resolution level, channel, encoding and spatial index
//! - **Format support**: sharded chunk stores (Zarr v3 sharding with zstd
//!   chunks), single-file stack containers, and static OBJ meshes with
//!   plane cross-sections
//! - **Registry-driven validation**: valid modality/view/encoding/level
//!   combinations are enumerated in specimen metadata, not hard-coded
//! - **Result caching**: content-addressed LRU cache of encoded payloads
//!   with TTL expiry, or pass-through when disabled
//! - **Atomic metadata reload**: readers always see a complete registry
//!   snapshot
//!
//! ## Architecture
//!
//! - [`id`] - composite identifier descriptor and parser
//! - [`meta`] - specimen metadata registry and region hierarchy resolver
//! - [`io`] - positioned file reads and block caching
//! - [`store`] - storage backend adapters and the open-store registry
//! - [`tile`] - extraction orchestration, encodings, result cache
//! - [`server`] - Axum HTTP boundary
//! - [`config`] - CLI and environment configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neuro_streamer::meta::MetadataRegistry;
//! use neuro_streamer::tile::DataService;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(MetadataRegistry::load("data").unwrap());
//!     let service = DataService::new(registry);
//!
//!     let response = service
//!         .get_data("RM009:imgxy:0:0:43200,512,1536")
//!         .await
//!         .unwrap();
//!     println!("{} bytes, {}", response.bytes.len(), response.content_type);
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod io;
pub mod meta;
pub mod server;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use config::Config;
pub use error::{DataError, EncodeError, ExtractError, ParseError, StoreError};
pub use id::{parse, DataDescriptor, IndexRef, Modality, ViewPlane};
pub use meta::{MetadataRegistry, RegistrySnapshot, SpecimenEntry};
pub use server::{create_router, AppState, RouterConfig};
pub use store::{
    clip_box, ContourSet, Dtype, MeshStore, ShardedStore, Slab, StackStore, StoreRegistry,
    VolumeStore,
};
pub use tile::{DataResponse, DataService, Encoded, RawPayload, ResultCache, Tile, TileEncoder};
