//! Serde model of the specimen metadata document.
//!
//! The document is one JSON object mapping specimen id to entry:
//!
//! ```json
//! {
//!   "RM009": {
//!     "name": "Macaque brain RM009",
//!     "species": "Macaca mulatta",
//!     "image": {
//!       "visor_projn": {
//!         "format": "shard3",
//!         "source": "macaque_brain/RM009/image.zarr",
//!         "tile_size_2d": [512, 512],
//!         "channel_count": 4,
//!         "view_types": ["xy", "yz", "xz"],
//!         "encoding_2d_list": ["raw", "zstd_sqrt_v1", "textr", "jpg"],
//!         "resolution_levels": [{"level": 0, "unit_um": 10.0}]
//!       }
//!     },
//!     "region_mask": { ... },
//!     "mesh": {
//!       "civm_meshes": {
//!         "dir_path": "macaque_brain/RM009/meshes",
//!         "source": {"brain_shell": "brain_shell.obj", "v1": "v1.obj"},
//!         "encoding_list": ["obj", "raw"]
//!       }
//!     },
//!     "atlas_reference": {
//!       "dir_path": "macaque_brain/atlas",
//!       "source": {"regions": "regions.json"}
//!     }
//!   }
//! }
//! ```
//!
//! When several datasets exist for one modality, the first in key order is
//! served; alternates remain listed for clients that negotiate out-of-band.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::Modality;

/// Default tile shape when an entry does not declare one.
pub const DEFAULT_TILE_SIZE: [u32; 2] = [512, 512];

/// Physical storage format of an array-backed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFormat {
    /// Sharded chunk store (directory tree)
    Shard3,
    /// Single-file stack container
    Stack,
}

/// One resolution level of a pyramid with its physical unit size.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ResolutionLevel {
    pub level: u32,
    /// Voxel edge length at this level, in micrometers
    pub unit_um: f64,
}

/// An array-backed dataset (image or region mask).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArrayDatasetEntry {
    pub format: StoreFormat,

    /// Storage location, relative to the data root
    pub source: String,

    /// Tile shape `(height, width)` used to bound extraction requests
    #[serde(default = "default_tile_size")]
    pub tile_size_2d: [u32; 2],

    pub channel_count: u32,

    /// View tokens this dataset serves (canonical: xy, yz, xz, 3d)
    #[serde(default)]
    pub view_types: Vec<String>,

    /// Encodings offered for planar (2-D) requests
    #[serde(default)]
    pub encoding_2d_list: Vec<String>,

    /// Encodings offered for volumetric (3-D) requests
    #[serde(default)]
    pub encoding_3d_list: Vec<String>,

    pub resolution_levels: Vec<ResolutionLevel>,
}

fn default_tile_size() -> [u32; 2] {
    DEFAULT_TILE_SIZE
}

impl ArrayDatasetEntry {
    /// Whether a resolution level is declared.
    pub fn has_level(&self, level: u32) -> bool {
        self.resolution_levels.iter().any(|l| l.level == level)
    }

    /// Declared level numbers, for error messages.
    pub fn level_numbers(&self) -> Vec<String> {
        self.resolution_levels
            .iter()
            .map(|l| l.level.to_string())
            .collect()
    }
}

/// A mesh dataset: a directory of OBJ files keyed by region name.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeshDatasetEntry {
    /// Directory holding the mesh files, relative to the data root
    pub dir_path: String,

    /// Region name -> mesh file name
    pub source: BTreeMap<String, String>,

    /// Encodings offered for mesh requests
    #[serde(default)]
    pub encoding_list: Vec<String>,
}

/// Reference to the atlas documents shared by a specimen.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AtlasReference {
    pub dir_path: String,
    pub source: AtlasSource,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AtlasSource {
    /// Region hierarchy file name within `dir_path`
    pub regions: String,
}

/// One specimen's complete metadata entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpecimenEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub species: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub image: BTreeMap<String, ArrayDatasetEntry>,

    #[serde(default)]
    pub region_mask: BTreeMap<String, ArrayDatasetEntry>,

    #[serde(default)]
    pub mesh: BTreeMap<String, MeshDatasetEntry>,

    #[serde(default)]
    pub atlas_reference: Option<AtlasReference>,
}

impl SpecimenEntry {
    /// Whether any dataset exists for a modality.
    pub fn has_modality(&self, modality: Modality) -> bool {
        match modality {
            Modality::Image => !self.image.is_empty(),
            Modality::Mask => !self.region_mask.is_empty(),
            Modality::Mesh => !self.mesh.is_empty(),
        }
    }

    /// Modality tokens this specimen offers, for error messages.
    pub fn available_modalities(&self) -> Vec<String> {
        [Modality::Image, Modality::Mask, Modality::Mesh]
            .into_iter()
            .filter(|m| self.has_modality(*m))
            .map(|m| m.token().to_string())
            .collect()
    }

    /// The served array dataset for a modality: the first entry in key
    /// order, with its dataset name.
    pub fn array_dataset(&self, modality: Modality) -> Option<(&str, &ArrayDatasetEntry)> {
        let map = match modality {
            Modality::Image => &self.image,
            Modality::Mask => &self.region_mask,
            Modality::Mesh => return None,
        };
        map.iter().next().map(|(name, entry)| (name.as_str(), entry))
    }

    /// The served mesh dataset, with its dataset name.
    pub fn mesh_dataset(&self) -> Option<(&str, &MeshDatasetEntry)> {
        self.mesh
            .iter()
            .next()
            .map(|(name, entry)| (name.as_str(), entry))
    }
}
