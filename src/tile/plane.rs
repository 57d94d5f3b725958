//! View-plane geometry: tile box construction and slab-to-tile reduction.
//!
//! A 2-D tile request addresses a box of thickness 1 along the slice axis
//! of its view plane. The extracted slab is reduced to a 2-D tile using the
//! dataset's display conventions: coronal and horizontal tiles are flipped
//! on both axes, sagittal tiles are transposed with a vertical flip. The
//! conventions are fixed properties of the acquisition layout and must not
//! change: clients position tiles by them.

use crate::id::ViewPlane;
use crate::store::{Dtype, Slab};

/// A 2-D tile cut from a volume, row-major, little-endian samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub height: usize,
    pub width: usize,
    pub dtype: Dtype,
    pub data: Vec<u8>,
}

impl Tile {
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The volume box addressed by a planar tile request.
///
/// `origin` is the `(z, y, x)` tile origin from the identifier and
/// `tile_size` is `(height, width)` from the dataset metadata. Returns
/// `None` for the volumetric view, which has no planar tile geometry.
pub fn tile_box(
    view: ViewPlane,
    origin: [i64; 3],
    tile_size: [u32; 2],
) -> Option<([i64; 3], [u64; 3])> {
    let h = u64::from(tile_size[0]);
    let w = u64::from(tile_size[1]);
    let shape = match view {
        // In-plane axes: vertical y, horizontal x
        ViewPlane::Coronal => [1, h, w],
        // Vertical y, horizontal z
        ViewPlane::Sagittal => [w, h, 1],
        // Vertical z, horizontal x
        ViewPlane::Horizontal => [h, 1, w],
        ViewPlane::Volumetric => return None,
    };
    Some((origin, shape))
}

/// Reduce an extracted slab to a display-oriented 2-D tile.
///
/// The slab must come from a box built by [`tile_box`] for the same view
/// (thickness 1 along the slice axis). Returns `None` for the volumetric
/// view.
pub fn slab_to_tile(view: ViewPlane, slab: &Slab) -> Option<Tile> {
    let [dz, dy, dx] = slab.shape;
    let es = slab.dtype.size();

    let (height, width) = match view {
        ViewPlane::Coronal => (dy, dx),
        ViewPlane::Sagittal => (dy, dz),
        ViewPlane::Horizontal => (dz, dx),
        ViewPlane::Volumetric => return None,
    };

    let mut data = vec![0u8; height * width * es];
    for r in 0..height {
        for c in 0..width {
            let src = match view {
                // dataset[z, y.., x..] flipped on both axes
                ViewPlane::Coronal => slab.offset(0, dy - 1 - r, dx - 1 - c),
                // dataset[z.., y.., x] flipped on y, then transposed
                ViewPlane::Sagittal => slab.offset(c, dy - 1 - r, 0),
                // dataset[z.., y, x..] flipped on both axes
                ViewPlane::Horizontal => slab.offset(dz - 1 - r, 0, dx - 1 - c),
                ViewPlane::Volumetric => unreachable!(),
            };
            let dst = (r * width + c) * es;
            data[dst..dst + es].copy_from_slice(&slab.data[src..src + es]);
        }
    }

    Some(Tile {
        height,
        width,
        dtype: slab.dtype,
        data,
    })
}
