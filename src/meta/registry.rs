//! Specimen metadata registry.
//!
//! The registry eagerly loads `<data_root>/specimens` (one JSON object
//! mapping specimen id to entry) at process start. A malformed entry is
//! logged and excluded rather than failing the whole load: one bad specimen
//! must not take down the others.
//!
//! Updates require a full reload, which builds a complete new
//! [`RegistrySnapshot`] and publishes it with an atomic swap. Readers hold
//! an `Arc` to the snapshot they started with, so an in-flight request
//! always sees either the old or the new registry, never a mix.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{info, warn};

use super::regions::RegionHierarchy;
use super::specimen::SpecimenEntry;

/// File name of the specimen metadata document under the data root.
pub const SPECIMENS_FILE: &str = "specimens";

// =============================================================================
// Snapshot
// =============================================================================

/// An immutable view of all specimen metadata at one point in time.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    specimens: BTreeMap<String, Arc<SpecimenEntry>>,
    /// Raw entry documents, served verbatim by the metadata listing
    raw: BTreeMap<String, Value>,
    hierarchies: BTreeMap<String, Arc<RegionHierarchy>>,
}

impl RegistrySnapshot {
    /// Build a snapshot from a parsed specimens document, skipping entries
    /// that fail to deserialize. Region hierarchies are attached separately.
    pub fn from_document(doc: &serde_json::Map<String, Value>) -> Self {
        let mut specimens = BTreeMap::new();
        let mut raw = BTreeMap::new();

        for (id, value) in doc {
            match serde_json::from_value::<SpecimenEntry>(value.clone()) {
                Ok(entry) => {
                    specimens.insert(id.clone(), Arc::new(entry));
                    raw.insert(id.clone(), value.clone());
                }
                Err(e) => {
                    warn!(specimen = %id, error = %e, "skipping malformed specimen entry");
                }
            }
        }

        Self {
            specimens,
            raw,
            hierarchies: BTreeMap::new(),
        }
    }

    /// Attach a region hierarchy for a specimen.
    pub fn attach_hierarchy(&mut self, specimen_id: &str, hierarchy: RegionHierarchy) {
        self.hierarchies
            .insert(specimen_id.to_string(), Arc::new(hierarchy));
    }

    /// Look up one specimen's entry.
    pub fn get(&self, specimen_id: &str) -> Option<&Arc<SpecimenEntry>> {
        self.specimens.get(specimen_id)
    }

    /// The region hierarchy for a specimen, if one was loaded.
    pub fn hierarchy(&self, specimen_id: &str) -> Option<&Arc<RegionHierarchy>> {
        self.hierarchies.get(specimen_id)
    }

    /// The full metadata listing, verbatim, for the passthrough endpoint.
    pub fn listing(&self) -> Value {
        Value::Object(self.raw.clone().into_iter().collect())
    }

    pub fn specimen_ids(&self) -> impl Iterator<Item = &str> {
        self.specimens.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.specimens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specimens.is_empty()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Process-wide specimen metadata with atomic snapshot publication.
pub struct MetadataRegistry {
    data_root: PathBuf,
    snapshot: RwLock<Arc<RegistrySnapshot>>,
}

impl MetadataRegistry {
    /// Load the registry from `<data_root>/specimens`.
    ///
    /// Fails only if the specimens document itself is missing or unreadable;
    /// individual malformed entries and broken region hierarchies are
    /// logged and skipped.
    pub fn load(data_root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let data_root = data_root.into();
        let snapshot = read_snapshot(&data_root)?;
        info!(
            specimens = snapshot.len(),
            data_root = %data_root.display(),
            "loaded specimen metadata"
        );
        Ok(Self {
            data_root,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// The current snapshot. Cheap; callers keep the `Arc` for the duration
    /// of one request so all lookups within it are consistent.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        Arc::clone(&self.snapshot.read().unwrap())
    }

    /// Rebuild the snapshot from disk and publish it atomically.
    pub fn reload(&self) -> std::io::Result<()> {
        let fresh = Arc::new(read_snapshot(&self.data_root)?);
        info!(specimens = fresh.len(), "reloaded specimen metadata");
        *self.snapshot.write().unwrap() = fresh;
        Ok(())
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }
}

fn read_snapshot(data_root: &Path) -> std::io::Result<RegistrySnapshot> {
    let path = data_root.join(SPECIMENS_FILE);
    let text = std::fs::read_to_string(&path)?;
    let doc: Value = serde_json::from_str(&text).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("specimens document {}: {}", path.display(), e),
        )
    })?;
    let Some(map) = doc.as_object() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "specimens document must be a JSON object",
        ));
    };

    let mut snapshot = RegistrySnapshot::from_document(map);

    // Region hierarchies are best-effort: a missing or broken document only
    // disables region features for that specimen.
    let ids: Vec<String> = snapshot.specimen_ids().map(String::from).collect();
    for id in ids {
        let Some(entry) = snapshot.get(&id) else { continue };
        let Some(atlas) = entry.atlas_reference.clone() else {
            continue;
        };
        let regions_path = data_root.join(&atlas.dir_path).join(&atlas.source.regions);
        match load_hierarchy(&regions_path) {
            Ok(hierarchy) => snapshot.attach_hierarchy(&id, hierarchy),
            Err(e) => {
                warn!(
                    specimen = %id,
                    path = %regions_path.display(),
                    error = %e,
                    "region hierarchy unavailable"
                );
            }
        }
    }

    Ok(snapshot)
}

fn load_hierarchy(path: &Path) -> Result<RegionHierarchy, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    serde_json::from_str(&text).map_err(|e| e.to_string())
}
