//! Composite data identifier: descriptor types and parser.
//!
//! Identifier grammar (bit-exact, shared with clients):
//!
//! ```text
//! {specimen_id}:{modality}{view_type}[-{encoding}]:{resolution_level}:{channel}:{index}
//! index := z,y,x            (image/mask)
//!        | region_name      (mesh, whole object)
//!        | region_name,z    (mesh, plane cross-section)
//! ```
//!
//! Parsing is a pure function of the identifier string and the current
//! registry snapshot: structural decomposition first, then validation of
//! every field against what the specimen's metadata actually declares.

mod descriptor;
mod parser;

pub use descriptor::{DataDescriptor, IndexRef, Modality, ViewPlane};
pub use parser::parse;
