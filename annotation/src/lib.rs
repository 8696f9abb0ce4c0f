//! Serializes/parses annotations as JSON or a DICOM Comprehensive 3D SR
//! against the same volume geometry (component G).

mod error;
mod json;
mod model;
mod sr;

pub use error::{AnnotationError, Result};
pub use json::{export_json, import_json};
pub use model::{Annotation, AnnotationKind};
pub use sr::{export_sr, import_sr, COMPREHENSIVE_3D_SR_SOP_CLASS};
