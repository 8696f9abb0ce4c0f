//! Parses a single DICOM Part 10 byte buffer into a [`RawSlice`]: component A
//! of the reconstruction pipeline. Pixel bytes are copied out verbatim for
//! uncompressed transfer syntaxes; JPEG baseline process 1 fragments are
//! decoded to grayscale here, so downstream components never see a
//! compressed bitstream.

mod error;
mod model;
mod reader;

pub use error::{Result, SliceError};
pub use model::{PixelPayload, RawSlice};
pub use reader::read_slice;
