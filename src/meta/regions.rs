//! Region hierarchy document and name resolution.
//!
//! The hierarchy document is produced alongside the atlas masks and treated
//! as opaque metadata: `regions` and `region_lookup` are modeled, the
//! `hierarchy` tree itself is passed through verbatim to clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::registry::RegistrySnapshot;

/// Axis-aligned bounding box in level-0 voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

/// One named brain region.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Region {
    pub id: i64,
    pub name: String,

    #[serde(default)]
    pub abbreviation: Option<String>,

    /// Depth in the hierarchy (1 = coarsest grouping)
    #[serde(default)]
    pub level: Option<u32>,

    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

/// The full region hierarchy for one specimen.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionHierarchy {
    #[serde(default)]
    pub metadata: serde_json::Value,

    pub regions: Vec<Region>,

    /// Opaque tree structure, passed through to clients verbatim
    #[serde(default)]
    pub hierarchy: serde_json::Value,

    /// Mask voxel value -> region
    #[serde(default)]
    pub region_lookup: BTreeMap<String, Region>,
}

impl RegionHierarchy {
    /// Exact, case-sensitive name lookup.
    pub fn region_by_name(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Look up the region for a mask voxel value.
    pub fn region_by_value(&self, value: u64) -> Option<&Region> {
        self.region_lookup.get(&value.to_string())
    }
}

/// Resolved geometry for a region request.
#[derive(Debug, Clone)]
pub struct RegionGeometry {
    /// Numeric area id, when the hierarchy knows this region
    pub id: Option<i64>,
    pub name: String,
    pub bounding_box: Option<BoundingBox>,
    /// Mesh file name within the specimen's mesh dataset directory
    pub mesh_file: String,
}

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("unknown specimen: {specimen_id}")]
    UnknownSpecimen { specimen_id: String },

    #[error("unknown region '{region}' for specimen {specimen_id}")]
    UnknownRegion { specimen_id: String, region: String },
}

/// Resolve a region name against a specimen's mesh dataset and hierarchy.
///
/// The mesh dataset's source map is authoritative for which regions have
/// servable geometry; the hierarchy contributes the area id and bounding box
/// when it knows the name.
pub fn resolve_region(
    snapshot: &RegistrySnapshot,
    specimen_id: &str,
    region: &str,
) -> Result<RegionGeometry, ResolveError> {
    let entry = snapshot
        .get(specimen_id)
        .ok_or_else(|| ResolveError::UnknownSpecimen {
            specimen_id: specimen_id.to_string(),
        })?;

    let mesh_file = entry
        .mesh_dataset()
        .and_then(|(_, dataset)| dataset.source.get(region))
        .ok_or_else(|| ResolveError::UnknownRegion {
            specimen_id: specimen_id.to_string(),
            region: region.to_string(),
        })?
        .clone();

    let record = snapshot
        .hierarchy(specimen_id)
        .and_then(|h| h.region_by_name(region).cloned());

    Ok(RegionGeometry {
        id: record.as_ref().map(|r| r.id),
        name: region.to_string(),
        bounding_box: record.and_then(|r| r.bounding_box),
        mesh_file,
    })
}
