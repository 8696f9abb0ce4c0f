use thiserror::Error;

/// Failure modes for component A, per spec section 4.A / 7. Messages never
/// embed file paths or patient identifiers; callers that want that context
/// attach it themselves.
#[derive(Error, Debug)]
pub enum SliceError {
    #[error("malformed DICOM header: {0}")]
    MalformedHeader(String),
    #[error("missing required tag: {0}")]
    MissingRequiredTag(&'static str),
    #[error("unsupported bits allocated: {0} (only 8 or 16 are supported)")]
    UnsupportedBitsAllocated(u16),
    #[error("unsupported transfer syntax: {0}")]
    UnsupportedTransferSyntax(String),
    #[error("pixel data element is absent")]
    PixelDataAbsent,
    #[error("failed to decode JPEG baseline fragment: {0}")]
    JpegDecode(String),
    #[error("failed to read DICOM stream")]
    Read(#[from] dicom_object::ReadError),
    #[error("failed to access a DICOM element")]
    Access(#[from] dicom_object::AccessError),
}

pub type Result<T> = std::result::Result<T, SliceError>;
