use thiserror::Error;

/// Errors raised while mapping between normalized, voxel and patient space.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("orientation matrix is singular (|det| = {0:e}, below the 1e-8 threshold)")]
    SingularOrientation(f64),
    #[error("dimension {axis} has size {size}, expected at least 1")]
    InvalidDimension { axis: &'static str, size: usize },
}

pub type Result<T> = std::result::Result<T, GeometryError>;
