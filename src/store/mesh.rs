//! Static mesh store.
//!
//! Whole-object requests return the OBJ file bytes verbatim. Plane requests
//! compute the cross-section of the triangulated surface at `z = coordinate`:
//! each triangle crossing the plane contributes one segment, and segments are
//! chained into closed polygons by quantized-endpoint linking. The chaining
//! is deterministic: triangles are processed in file order and walks start
//! from the lexicographically smallest unused endpoint.
//!
//! Mesh vertex coordinates are interpreted in level-0 voxel units, so the
//! plane coordinate from a data identifier intersects directly.

use std::collections::HashMap;
use std::collections::BTreeMap;
use std::path::PathBuf;

use bytes::Bytes;

use crate::error::StoreError;

/// Quantization scale for endpoint matching (1/1024 voxel).
const WELD_SCALE: f64 = 1024.0;

// =============================================================================
// Mesh Store
// =============================================================================

/// Store over a directory of OBJ mesh files, one per named region.
pub struct MeshStore {
    dir: PathBuf,
    /// Region name -> file name within `dir`
    sources: BTreeMap<String, String>,
}

impl MeshStore {
    pub fn new(dir: impl Into<PathBuf>, sources: BTreeMap<String, String>) -> Self {
        Self {
            dir: dir.into(),
            sources,
        }
    }

    /// Whether a mesh file is declared for this region name.
    pub fn has_region(&self, region: &str) -> bool {
        self.sources.contains_key(region)
    }

    fn region_path(&self, region: &str) -> Result<PathBuf, StoreError> {
        let file = self.sources.get(region).ok_or_else(|| StoreError::Io(format!(
            "no mesh source declared for region '{}'",
            region
        )))?;
        Ok(self.dir.join(file))
    }

    /// Read the whole-object mesh bytes verbatim.
    pub async fn read_object(&self, region: &str) -> Result<Bytes, StoreError> {
        let path = self.region_path(region)?;
        let data = tokio::fs::read(&path).await.map_err(|e| {
            StoreError::Io(format!("mesh file {}: {}", path.display(), e))
        })?;
        Ok(Bytes::from(data))
    }

    /// Intersect the region's surface with the plane `z = plane_z`.
    pub async fn cross_section(
        &self,
        region: &str,
        plane_z: f64,
    ) -> Result<ContourSet, StoreError> {
        let path = self.region_path(region)?;
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            StoreError::Io(format!("mesh file {}: {}", path.display(), e))
        })?;

        let mesh = parse_obj(&text).map_err(|reason| StoreError::Corrupt {
            path: path.display().to_string(),
            reason,
        })?;

        Ok(plane_section(&mesh, plane_z))
    }
}

// =============================================================================
// OBJ Parsing
// =============================================================================

/// A triangulated surface parsed from OBJ text.
#[derive(Debug, Clone)]
pub(crate) struct ObjMesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[usize; 3]>,
}

/// Parse the `v` and `f` statements of an OBJ file.
///
/// Faces with more than three vertices are fan-triangulated; `v/vt/vn`
/// reference syntax and negative (relative) indices are handled. Statements
/// other than `v` and `f` are ignored.
pub(crate) fn parse_obj(text: &str) -> Result<ObjMesh, String> {
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("v") => {
                let mut coords = [0f64; 3];
                for coord in coords.iter_mut() {
                    *coord = parts
                        .next()
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| format!("line {}: bad vertex", line_no + 1))?;
                }
                vertices.push(coords);
            }
            Some("f") => {
                let mut indices = Vec::new();
                for token in parts {
                    let index_token = token.split('/').next().unwrap_or(token);
                    let raw: i64 = index_token
                        .parse()
                        .map_err(|_| format!("line {}: bad face index", line_no + 1))?;
                    let index = if raw < 0 {
                        vertices.len() as i64 + raw
                    } else {
                        raw - 1
                    };
                    if index < 0 || index as usize >= vertices.len() {
                        return Err(format!("line {}: face index out of range", line_no + 1));
                    }
                    indices.push(index as usize);
                }
                if indices.len() < 3 {
                    return Err(format!("line {}: face with fewer than 3 vertices", line_no + 1));
                }
                for i in 1..indices.len() - 1 {
                    triangles.push([indices[0], indices[i], indices[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if vertices.is_empty() || triangles.is_empty() {
        return Err("no triangles in mesh".into());
    }

    Ok(ObjMesh {
        vertices,
        triangles,
    })
}

// =============================================================================
// Plane Intersection
// =============================================================================

/// The cross-section of a surface at a fixed z plane: a list of polygons in
/// the (x, y) plane.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourSet {
    pub plane_z: f64,
    pub polygons: Vec<Vec<[f64; 2]>>,
}

impl ContourSet {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

type WeldKey = (i64, i64);

fn weld_key(p: [f64; 2]) -> WeldKey {
    (
        (p[0] * WELD_SCALE).round() as i64,
        (p[1] * WELD_SCALE).round() as i64,
    )
}

/// Intersect every triangle with `z = plane_z` and chain the resulting
/// segments into polygons.
pub(crate) fn plane_section(mesh: &ObjMesh, plane_z: f64) -> ContourSet {
    // Vertices exactly on the plane count as above it, so every crossing
    // edge has a strict sign change and yields exactly one point.
    let side = |v: [f64; 3]| v[2] >= plane_z;

    let mut segments: Vec<[[f64; 2]; 2]> = Vec::new();
    for tri in &mesh.triangles {
        let v = [
            mesh.vertices[tri[0]],
            mesh.vertices[tri[1]],
            mesh.vertices[tri[2]],
        ];

        let mut points = Vec::with_capacity(2);
        for (a, b) in [(0, 1), (1, 2), (2, 0)] {
            if side(v[a]) != side(v[b]) {
                let t = (plane_z - v[a][2]) / (v[b][2] - v[a][2]);
                points.push([
                    v[a][0] + t * (v[b][0] - v[a][0]),
                    v[a][1] + t * (v[b][1] - v[a][1]),
                ]);
            }
        }
        if points.len() == 2 && weld_key(points[0]) != weld_key(points[1]) {
            segments.push([points[0], points[1]]);
        }
    }

    // Chain segments endpoint-to-endpoint. Each endpoint key maps to the
    // segments touching it; a watertight mesh yields exactly two.
    let mut touching: HashMap<WeldKey, Vec<usize>> = HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        touching.entry(weld_key(seg[0])).or_default().push(i);
        touching.entry(weld_key(seg[1])).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut polygons = Vec::new();

    // Deterministic walk order: start from the smallest endpoint key
    let mut start_keys: Vec<WeldKey> = touching.keys().copied().collect();
    start_keys.sort_unstable();

    for start_key in start_keys {
        let Some(&first) = touching[&start_key].iter().find(|&&i| !used[i]) else {
            continue;
        };

        let mut polygon = Vec::new();
        let mut segment = first;
        let mut at = start_key;

        loop {
            used[segment] = true;
            let seg = segments[segment];
            let (here, next) = if weld_key(seg[0]) == at {
                (seg[0], seg[1])
            } else {
                (seg[1], seg[0])
            };
            polygon.push(here);

            let next_key = weld_key(next);
            if next_key == start_key {
                break;
            }
            match touching
                .get(&next_key)
                .and_then(|list| list.iter().find(|&&i| !used[i]))
            {
                Some(&n) => {
                    segment = n;
                    at = next_key;
                }
                None => {
                    // Open chain (non-watertight input): keep the tail point
                    polygon.push(next);
                    break;
                }
            }
        }

        if polygon.len() >= 3 {
            polygons.push(polygon);
        }
    }

    ContourSet { plane_z, polygons }
}
