use std::fmt;

/// The kind of asset a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modality {
    /// Raw image volume (`img`)
    Image,
    /// Region mask volume (`msk`)
    Mask,
    /// Surface mesh (`meh`)
    Mesh,
}

impl Modality {
    /// The three-character identifier token.
    pub fn token(&self) -> &'static str {
        match self {
            Modality::Image => "img",
            Modality::Mask => "msk",
            Modality::Mesh => "meh",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "img" => Some(Modality::Image),
            "msk" => Some(Modality::Mask),
            "meh" => Some(Modality::Mesh),
            _ => None,
        }
    }

    /// Default wire encoding when the identifier omits one.
    pub fn default_encoding(&self) -> &'static str {
        match self {
            Modality::Image | Modality::Mask => "raw",
            Modality::Mesh => "obj",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// The sectioning plane of a request, or the volumetric mode.
///
/// Canonical tokens are `xy | yz | xz | 3d`; the legacy single-character
/// set `c | s | h | 3` is accepted as aliases (coronal, sagittal,
/// horizontal, volumetric) and normalized on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewPlane {
    /// `xy`: image data on the xy plane (usually coronal), slicing along z
    Coronal,
    /// `yz`: image data on the yz plane (usually sagittal), slicing along x
    Sagittal,
    /// `xz`: image data on the xz plane (usually horizontal), slicing along y
    Horizontal,
    /// `3d`: volumetric data or whole 3-D mesh
    Volumetric,
}

impl ViewPlane {
    pub fn token(&self) -> &'static str {
        match self {
            ViewPlane::Coronal => "xy",
            ViewPlane::Sagittal => "yz",
            ViewPlane::Horizontal => "xz",
            ViewPlane::Volumetric => "3d",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "xy" | "c" => Some(ViewPlane::Coronal),
            "yz" | "s" => Some(ViewPlane::Sagittal),
            "xz" | "h" => Some(ViewPlane::Horizontal),
            "3d" | "3" => Some(ViewPlane::Volumetric),
            _ => None,
        }
    }

    /// Whether this is a 2-D sectioning plane (as opposed to volumetric).
    pub fn is_planar(&self) -> bool {
        !matches!(self, ViewPlane::Volumetric)
    }
}

impl fmt::Display for ViewPlane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// The spatial or region index of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexRef {
    /// Tile origin in voxel coordinates (image/mask)
    Voxel { z: i64, y: i64, x: i64 },
    /// Named region, optionally intersected at a plane coordinate (mesh)
    Region { name: String, plane_z: Option<i64> },
}

impl fmt::Display for IndexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexRef::Voxel { z, y, x } => write!(f, "{},{},{}", z, y, x),
            IndexRef::Region { name, plane_z: None } => f.write_str(name),
            IndexRef::Region {
                name,
                plane_z: Some(z),
            } => write!(f, "{},{}", name, z),
        }
    }
}

/// A parsed, registry-validated data request.
///
/// Immutable value; every field except the interpretation of `index` is
/// fully determined by `modality`. The defaulted encoding is already
/// resolved, so two identifiers that differ only in spelling out the
/// default produce equal descriptors and equal cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataDescriptor {
    pub specimen_id: String,
    pub modality: Modality,
    pub view: ViewPlane,
    /// Wire encoding, defaults applied
    pub encoding: String,
    /// Resolution level; `None` only for mesh requests
    pub level: Option<u32>,
    /// Channel; `None` only for mesh requests
    pub channel: Option<u32>,
    pub index: IndexRef,
}

impl DataDescriptor {
    /// The canonicalized identifier string: fixed field order, canonical
    /// view token, optional-field defaults applied. Used as the cache key.
    pub fn canonical_id(&self) -> String {
        let level = self.level.map(|l| l.to_string()).unwrap_or_default();
        let channel = self.channel.map(|c| c.to_string()).unwrap_or_default();
        format!(
            "{}:{}{}-{}:{}:{}:{}",
            self.specimen_id, self.modality, self.view, self.encoding, level, channel, self.index
        )
    }
}
