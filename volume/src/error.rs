use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("slice {index} has {got} pixel bytes, expected {expected}")]
    SliceLengthMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, VolumeError>;
