//! Maps the library crates' typed errors onto the exit codes spec'd for
//! this binary: 0 success, 2 unsupported transfer syntax, 3 inconsistent
//! series, 4 iso out of range, 5 cancellation, 1 everything else.

use medvol_mesh::MeshError;
use medvol_series::SeriesError;
use medvol_slice::SliceError;

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<SliceError>() {
        if matches!(e, SliceError::UnsupportedTransferSyntax(_)) {
            return 2;
        }
    }
    if let Some(e) = err.downcast_ref::<SeriesError>() {
        if matches!(e, SeriesError::InconsistentSeries { .. }) {
            return 3;
        }
    }
    if let Some(e) = err.downcast_ref::<MeshError>() {
        return match e {
            MeshError::IsoOutOfRange { .. } => 4,
            MeshError::Cancelled => 5,
            _ => 1,
        };
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn unsupported_transfer_syntax_is_exit_code_2() {
        let err = anyhow::Error::new(SliceError::UnsupportedTransferSyntax("1.2.3".to_string()))
            .context("reading slice");
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn inconsistent_series_is_exit_code_3() {
        let err = anyhow::Error::new(SeriesError::InconsistentSeries {
            field: "rows",
            a: "512".to_string(),
            b: "256".to_string(),
        });
        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn iso_out_of_range_is_exit_code_4() {
        let err = anyhow::Error::new(MeshError::IsoOutOfRange {
            iso: 5000.0,
            min: 0.0,
            max: 100.0,
        });
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn cancellation_is_exit_code_5() {
        let err = anyhow::Error::new(MeshError::Cancelled);
        assert_eq!(exit_code(&err), 5);
    }

    #[test]
    fn unrelated_error_is_exit_code_1() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(exit_code(&err), 1);
    }
}
