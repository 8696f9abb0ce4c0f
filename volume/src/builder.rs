use medvol_series::Series;
use medvol_slice::{PixelPayload, RawSlice};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Result, VolumeError};
use crate::model::Volume;
use crate::otsu;

/// Builds a calibrated `Volume` from an assembled `Series`, per spec section
/// 4.C: per-slice rescale calibration (parallelized across slices), an
/// 8-bit display stack, and a 512-bin Otsu auto-iso over the whole field.
pub fn build(series: Series) -> Result<Volume> {
    let w = series.columns as usize;
    let h = series.rows as usize;
    let d = series.depth;
    let slice_len = w * h;

    let per_slice: Vec<(Vec<f32>, Vec<u8>)> = series
        .slices
        .par_iter()
        .enumerate()
        .map(|(i, s)| calibrate_one(i, s, slice_len))
        .collect::<Result<_>>()?;

    let mut scalars = vec![0f32; slice_len * d];
    let mut display = Vec::with_capacity(d);
    for (z, (calibrated, frame)) in per_slice.into_iter().enumerate() {
        scalars[z * slice_len..(z + 1) * slice_len].copy_from_slice(&calibrated);
        display.push(frame);
    }

    let min = scalars.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scalars.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let auto_iso = otsu::auto_iso(&scalars);
    debug!(w, h, d, min, max, auto_iso, "built volume");

    Ok(Volume {
        dims: (w, h, d),
        spacing: series.spacing,
        origin: series.origin,
        orientation: series.orientation,
        orientation_approximate: series.orientation_approximate,
        scalars,
        display,
        min,
        max,
        auto_iso,
        study_instance_uid: series.study_instance_uid,
        series_instance_uid: series.series_instance_uid,
        patient_id: series.patient_id,
        frame_of_reference_uid: series.frame_of_reference_uid,
        modality: series.modality,
        study_date: series.study_date,
    })
}

/// Decodes and calibrates one slice, returning (calibrated scalar row,
/// 8-bit display frame).
fn calibrate_one(index: usize, slice: &RawSlice, slice_len: usize) -> Result<(Vec<f32>, Vec<u8>)> {
    let raw = decode_raw_samples(index, slice, slice_len)?;

    let calibrated: Vec<f32> = if slice.uncalibrated {
        raw.iter().map(|&r| r as f32).collect()
    } else {
        raw.iter()
            .map(|&r| (r * slice.rescale_slope + slice.rescale_intercept) as f32)
            .collect()
    };

    let frame = display_frame(slice, &raw, &calibrated);
    Ok((calibrated, frame))
}

/// Interprets a slice's pixel bytes as raw integer samples. JPEG-decoded
/// payloads are already unsigned 8-bit grayscale and pass straight through.
fn decode_raw_samples(index: usize, slice: &RawSlice, slice_len: usize) -> Result<Vec<f64>> {
    match &slice.payload {
        PixelPayload::JpegDecoded(samples) => {
            if samples.len() != slice_len {
                return Err(VolumeError::SliceLengthMismatch {
                    index,
                    expected: slice_len,
                    got: samples.len(),
                });
            }
            Ok(samples.iter().map(|&b| b as f64).collect())
        }
        PixelPayload::Uncompressed(bytes) => {
            let bytes_per_sample = slice.bytes_per_sample().max(1);
            let expected_bytes = slice_len * bytes_per_sample;
            if bytes.len() != expected_bytes {
                return Err(VolumeError::SliceLengthMismatch {
                    index,
                    expected: expected_bytes,
                    got: bytes.len(),
                });
            }
            let samples = match (slice.bits_allocated, slice.signed) {
                (8, false) => bytes.iter().map(|&b| b as f64).collect(),
                (8, true) => bytes.iter().map(|&b| b as i8 as f64).collect(),
                (16, false) => bytes
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]) as f64)
                    .collect(),
                (16, true) => bytes
                    .chunks_exact(2)
                    .map(|c| i16::from_le_bytes([c[0], c[1]]) as f64)
                    .collect(),
                (bits, _) => {
                    // SliceReader already rejects this at parse time; kept
                    // here only as a defensive fallback.
                    debug!(bits, "unexpected bits_allocated reaching VolumeBuilder");
                    bytes.iter().map(|&b| b as f64).collect()
                }
            };
            Ok(samples)
        }
    }
}

/// Builds one slice's 8-bit preview frame, per spec section 4.C.
fn display_frame(slice: &RawSlice, raw: &[f64], calibrated: &[f32]) -> Vec<u8> {
    if slice.uncalibrated {
        return raw.iter().map(|&r| clamp_u8(r)).collect();
    }
    match (slice.bits_allocated, slice.signed) {
        (8, true) => raw.iter().map(|&r| clamp_u8(r + 128.0)).collect(),
        (8, false) => raw.iter().map(|&r| clamp_u8(r)).collect(),
        _ => window_16bit(slice, calibrated),
    }
}

fn window_16bit(slice: &RawSlice, calibrated: &[f32]) -> Vec<u8> {
    let (wc, ww) = match (slice.window_center, slice.window_width) {
        (Some(wc), Some(ww)) if ww > 0.0 => (wc, ww),
        _ => {
            let min = calibrated.iter().copied().fold(f32::INFINITY, f32::min) as f64;
            let max = calibrated
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max) as f64;
            let range = (max - min).max(f64::EPSILON);
            ((min + max) / 2.0, range)
        }
    };
    let low = wc - ww / 2.0;
    calibrated
        .iter()
        .map(|&v| clamp_u8((v as f64 - low) / ww * 255.0))
        .collect()
}

fn clamp_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvol_geometry::OrientationMatrix;

    fn slice_with(bits: u16, signed: bool, bytes: Vec<u8>) -> RawSlice {
        RawSlice {
            rows: 1,
            columns: bytes.len() as u16 / (bits / 8),
            bits_allocated: bits,
            signed,
            transfer_syntax: "1.2.840.10008.1.2.1".to_string(),
            payload: PixelPayload::Uncompressed(bytes),
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
    fn eight_bit_signed_shifts_by_128() {
        let s = slice_with(8, true, vec![0u8, 127, 128, 255]);
        let raw = decode_raw_samples(0, &s, 4).unwrap();
        assert_eq!(raw, vec![0.0, 127.0, -128.0, -1.0]);
        let frame = display_frame(&s, &raw, &[]);
        assert_eq!(frame, vec![128, 255, 0, 127]);
    }

    #[test]
    fn sixteen_bit_unsigned_little_endian_roundtrips() {
        let s = slice_with(16, false, vec![0x34, 0x12]); // 0x1234 = 4660
        let raw = decode_raw_samples(0, &s, 1).unwrap();
        assert_eq!(raw, vec![4660.0]);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let s = slice_with(16, false, vec![0x00]);
        assert!(decode_raw_samples(0, &s, 1).is_err());
    }

    #[test]
    fn jpeg_decoded_slice_is_uncalibrated_passthrough() {
        let mut s = slice_with(8, false, vec![]);
        s.payload = PixelPayload::JpegDecoded(vec![10, 20, 30, 40]);
        s.uncalibrated = true;
        s.rows = 2;
        s.columns = 2;
        let (calibrated, frame) = calibrate_one(0, &s, 4).unwrap();
        assert_eq!(calibrated, vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(frame, vec![10, 20, 30, 40]);
        let _ = OrientationMatrix::identity();
    }

    /// Scenario S4 from the spec: rescale slope/intercept plus windowing.
    #[test]
    fn s4_rescale_and_window_scenario() {
        let raw_samples: [u16; 4] = [0, 500, 1000, 250];
        let bytes: Vec<u8> = raw_samples.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut s = slice_with(16, false, bytes);
        s.rows = 2;
        s.columns = 2;
        s.rescale_slope = 1.0;
        s.rescale_intercept = -500.0;
        s.window_center = Some(0.0);
        s.window_width = Some(200.0);

        let (calibrated, frame) = calibrate_one(0, &s, 4).unwrap();
        assert_eq!(calibrated, vec![-500.0, 0.0, 500.0, -250.0]);
        for &v in &calibrated {
            assert!((-500.0..=500.0).contains(&v));
        }
        assert_eq!(frame[0], 0); // -500 <= -100
        assert_eq!(frame[2], 255); // 500 >= 100
        assert!(frame[1] > 0 && frame[1] < 255); // 0, linear in between
    }
}
