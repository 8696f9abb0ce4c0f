use std::cmp::Ordering;

use medvol_geometry::{slice_normal, OrientationMatrix, Vector3};
use medvol_slice::RawSlice;
use tracing::{debug, warn};

use crate::error::{Result, SeriesError};
use crate::model::Series;

const ORIENTATION_TOLERANCE: f64 = 1e-4;
const SPACING_EPSILON: f64 = 1e-6;

/// Orders a set of `RawSlice`s into a `Series`, per spec section 4.B:
/// z-then-instance-number ordering, cross-slice consistency checks, and
/// spacing/origin derivation.
pub fn assemble(slices: Vec<RawSlice>) -> Result<Series> {
    if slices.is_empty() {
        return Err(SeriesError::EmptySeries);
    }

    let mut indexed: Vec<(usize, RawSlice)> = slices.into_iter().enumerate().collect();
    indexed.sort_by(cmp_slices);
    let slices: Vec<RawSlice> = indexed.into_iter().map(|(_, s)| s).collect();

    let first = &slices[0];
    let rows = first.rows;
    let columns = first.columns;
    let bits_allocated = first.bits_allocated;
    let signed = first.signed;

    for s in &slices[1..] {
        if s.rows != rows {
            return Err(mismatch("rows", rows, s.rows));
        }
        if s.columns != columns {
            return Err(mismatch("columns", columns, s.columns));
        }
        if s.bits_allocated != bits_allocated {
            return Err(mismatch("bits_allocated", bits_allocated, s.bits_allocated));
        }
        if s.signed != signed {
            return Err(mismatch("signed", signed, s.signed));
        }
    }

    let orientations: Vec<&[f64; 6]> = slices
        .iter()
        .filter_map(|s| s.image_orientation_patient.as_ref())
        .collect();
    for pair in orientations.windows(2) {
        if !orientation_matches(pair[0], pair[1]) {
            return Err(SeriesError::InconsistentSeries {
                field: "image_orientation_patient",
                a: format!("{:?}", pair[0]),
                b: format!("{:?}", pair[1]),
            });
        }
    }

    let (orientation, orientation_approximate) = match orientations.first() {
        Some(iop) => (orientation_from_iop(iop), false),
        None => {
            warn!("no slice in series carries orientation, patient coordinates will be approximate");
            (OrientationMatrix::identity(), true)
        }
    };

    let pixel_spacing = first.pixel_spacing.unwrap_or([1.0, 1.0]);
    let sx = pixel_spacing[1];
    let sy = pixel_spacing[0];
    let sz = derive_sz(&slices, &orientation);

    let origin = first.image_position_patient.unwrap_or([0.0, 0.0, 0.0]);
    let depth = slices.len();

    debug!(rows, columns, depth, sx, sy, sz, "assembled series");

    Ok(Series {
        study_instance_uid: first_present(&slices, |s| s.study_instance_uid.clone()),
        series_instance_uid: first_present(&slices, |s| s.series_instance_uid.clone()),
        patient_id: first_present(&slices, |s| s.patient_id.clone()),
        frame_of_reference_uid: first_present(&slices, |s| s.frame_of_reference_uid.clone()),
        modality: first_present(&slices, |s| s.modality.clone()),
        study_date: first_present(&slices, |s| s.study_date.clone()),
        slices,
        rows,
        columns,
        depth,
        spacing: (sx, sy, sz),
        origin,
        orientation,
        orientation_approximate,
    })
}

fn mismatch<T: std::fmt::Debug>(field: &'static str, a: T, b: T) -> SeriesError {
    SeriesError::InconsistentSeries {
        field,
        a: format!("{a:?}"),
        b: format!("{b:?}"),
    }
}

fn orientation_matches(a: &[f64; 6], b: &[f64; 6]) -> bool {
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - y).abs() <= ORIENTATION_TOLERANCE)
}

fn orientation_from_iop(iop: &[f64; 6]) -> OrientationMatrix {
    let row_dir = Vector3::new(iop[0], iop[1], iop[2]);
    let col_dir = Vector3::new(iop[3], iop[4], iop[5]);
    OrientationMatrix::from_row_col(row_dir, col_dir)
}

fn derive_sz(slices: &[RawSlice], orientation: &OrientationMatrix) -> f64 {
    if slices.len() < 2 {
        return 1.0;
    }
    let (Some(p0), Some(p1)) = (
        slices[0].image_position_patient,
        slices[1].image_position_patient,
    ) else {
        return 1.0;
    };
    let delta = Vector3::new(p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]);
    let iop0 = slices[0].image_orientation_patient;
    let n_hat = match iop0 {
        Some(iop) => slice_normal(
            Vector3::new(iop[0], iop[1], iop[2]),
            Vector3::new(iop[3], iop[4], iop[5]),
        ),
        None => *orientation.as_matrix().column(2),
    };
    let projected = delta.dot(&n_hat).abs();
    if projected > SPACING_EPSILON {
        projected
    } else {
        let mag = delta.norm();
        if mag > 0.0 {
            mag
        } else {
            1.0
        }
    }
}

fn first_present<T>(slices: &[RawSlice], f: impl Fn(&RawSlice) -> Option<T>) -> Option<T> {
    slices.iter().find_map(f)
}

fn cmp_slices(a: &(usize, RawSlice), b: &(usize, RawSlice)) -> Ordering {
    match (
        a.1.image_position_patient,
        b.1.image_position_patient,
    ) {
        (Some(pa), Some(pb)) => pa[2]
            .partial_cmp(&pb[2])
            .unwrap_or(Ordering::Equal)
            .then_with(|| cmp_instance(a, b)),
        _ => cmp_instance(a, b),
    }
}

fn cmp_instance(a: &(usize, RawSlice), b: &(usize, RawSlice)) -> Ordering {
    match (a.1.instance_number, b.1.instance_number) {
        (Some(ia), Some(ib)) => ia.cmp(&ib),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvol_slice::PixelPayload;

    fn blank_slice() -> RawSlice {
        RawSlice {
            rows: 4,
            columns: 4,
            bits_allocated: 16,
            signed: false,
            transfer_syntax: "1.2.840.10008.1.2.1".to_string(),
            payload: PixelPayload::Uncompressed(vec![0u8; 32]),
            uncalibrated: false,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
            window_center: None,
            window_width: None,
            image_position_patient: None,
            image_orientation_patient: None,
            pixel_spacing: None,
            instance_number: None,
            slice_location: None,
            sop_instance_uid: None,
            study_instance_uid: None,
            series_instance_uid: None,
            patient_id: None,
            frame_of_reference_uid: None,
            modality: None,
            study_date: None,
        }
    }

    #[test]
    fn orders_by_z_then_instance_number() {
        let mut s0 = blank_slice();
        s0.image_position_patient = Some([0.0, 0.0, 10.0]);
        s0.instance_number = Some(2);
        let mut s1 = blank_slice();
        s1.image_position_patient = Some([0.0, 0.0, -5.0]);
        s1.instance_number = Some(1);

        let series = assemble(vec![s0, s1]).unwrap();
        assert_eq!(series.slices[0].instance_number, Some(1));
        assert_eq!(series.slices[1].instance_number, Some(2));
    }

    #[test]
    fn missing_orientation_marks_approximate() {
        let s0 = blank_slice();
        let s1 = blank_slice();
        let series = assemble(vec![s0, s1]).unwrap();
        assert!(series.orientation_approximate);
    }

    #[test]
    fn mismatched_rows_is_rejected() {
        let s0 = blank_slice();
        let mut s1 = blank_slice();
        s1.rows = 8;
        let err = assemble(vec![s0, s1]).unwrap_err();
        assert!(matches!(err, SeriesError::InconsistentSeries { field: "rows", .. }));
    }

    #[test]
    fn single_slice_has_unit_sz() {
        let series = assemble(vec![blank_slice()]).unwrap();
        assert_eq!(series.spacing.2, 1.0);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(assemble(vec![]), Err(SeriesError::EmptySeries)));
    }
}
