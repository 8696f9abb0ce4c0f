//! Pure coordinate-mapping library (component D).
//!
//! Exposes bidirectional conversions between normalized `[0,1]^3`, voxel, and
//! patient coordinate spaces using a slice-orientation matrix. Every other
//! component that needs to reason about geometry (`MeshExtractor`,
//! `MeshPostProcess`, `AnnotationCodec`) goes through this crate rather than
//! re-deriving the orientation math itself.

mod error;
mod map;
mod orientation;

pub use error::{GeometryError, Result};
pub use map::GeometryMap;
pub use orientation::{slice_normal, OrientationMatrix};

pub use nalgebra::Vector3;
