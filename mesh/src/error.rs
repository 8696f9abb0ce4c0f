use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("every dimension must be at least 2, got {0:?}")]
    DimensionTooSmall((usize, usize, usize)),
    #[error("iso-value is not finite: {0}")]
    NonFiniteIso(f32),
    #[error("iso-value {iso} is outside the observed range [{min}, {max}]")]
    IsoOutOfRange { iso: f32, min: f32, max: f32 },
    #[error("chunk at {chunk:?} exceeded the {cap} vertex budget")]
    ChunkBudgetExceeded {
        chunk: (usize, usize, usize),
        cap: usize,
    },
    #[error("extraction was cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MeshError>;
