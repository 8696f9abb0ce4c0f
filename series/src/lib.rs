//! Orders `RawSlice`s into a geometrically consistent `Series` (component B):
//! ordering, cross-slice consistency checks, spacing derivation, and
//! study-level metadata extraction.

mod assembler;
mod error;
mod model;

pub use assembler::assemble;
pub use error::{Result, SeriesError};
pub use model::Series;
