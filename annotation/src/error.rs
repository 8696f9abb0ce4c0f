use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("no volume is loaded to resolve coordinates against")]
    NoVolumeLoaded,
    #[error("malformed report: {0}")]
    MalformedReport(String),
    #[error("no annotations found in report")]
    NoAnnotationsFound,
    #[error(transparent)]
    Geometry(#[from] medvol_geometry::GeometryError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
