//! Builds a calibrated scalar field and 8-bit display stack from a `Series`
//! (component C): per-slice rescale calibration, display windowing, and a
//! 512-bin Otsu auto-iso over the whole field.

mod builder;
mod error;
mod model;
mod otsu;

pub use builder::build;
pub use error::{Result, VolumeError};
pub use model::Volume;
pub use otsu::auto_iso;
