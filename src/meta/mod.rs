//! Specimen metadata registry and region hierarchy resolver.
//!
//! The registry is the authority on what each specimen offers: available
//! modalities, view types, encodings, resolution levels, channel counts,
//! tile geometry, and storage locations. It is loaded eagerly at startup
//! and treated as read-only; a reload builds a complete new snapshot and
//! publishes it atomically, so concurrent readers never observe a
//! half-updated registry.

mod regions;
mod registry;
mod specimen;

pub use regions::{
    resolve_region, BoundingBox, Region, RegionGeometry, RegionHierarchy, ResolveError,
};
pub use registry::{MetadataRegistry, RegistrySnapshot, SPECIMENS_FILE};
pub use specimen::{
    ArrayDatasetEntry, AtlasReference, AtlasSource, MeshDatasetEntry, ResolutionLevel,
    SpecimenEntry, StoreFormat,
};
