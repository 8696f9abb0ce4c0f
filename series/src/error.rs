use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeriesError {
    #[error("no slices were provided")]
    EmptySeries,
    #[error("slices disagree on {field}: {a} vs {b}")]
    InconsistentSeries {
        field: &'static str,
        a: String,
        b: String,
    },
}

pub type Result<T> = std::result::Result<T, SeriesError>;
