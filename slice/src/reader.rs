use dicom_core::value::Value;
use dicom_dictionary_std::tags;
use medvol_common::values::{to_f64_opt, to_f64s_opt, to_int_opt, to_string_opt};
use tracing::{debug, trace, warn};

use crate::error::{Result, SliceError};
use crate::model::{PixelPayload, RawSlice};

const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
const JPEG_BASELINE_PROCESS_1: &str = "1.2.840.10008.1.2.4.50";

const JPEG_LUMA_R: f64 = 0.299;
const JPEG_LUMA_G: f64 = 0.587;
const JPEG_LUMA_B: f64 = 0.114;

/// Parses one DICOM Part 10 byte buffer into a [`RawSlice`].
///
/// Dispatches on the file meta group's transfer syntax: uncompressed
/// little-endian datasets are copied out verbatim, JPEG baseline process 1
/// fragments are decoded here (not left for the caller), any other transfer
/// syntax is rejected as unsupported.
pub fn read_slice(bytes: &[u8]) -> Result<RawSlice> {
    let file_obj = medvol_common::dicom::from_reader(bytes)?;
    let transfer_syntax = file_obj.meta().transfer_syntax.trim_end_matches('\0').to_string();
    debug!(%transfer_syntax, "parsed DICOM file meta group");

    let obj = file_obj.into_inner();

    let rows = obj
        .element_opt(tags::ROWS)?
        .ok_or(SliceError::MissingRequiredTag("Rows"))?
        .to_int::<u16>()
        .map_err(|e| SliceError::MalformedHeader(format!("Rows: {e}")))?;
    let columns = obj
        .element_opt(tags::COLUMNS)?
        .ok_or(SliceError::MissingRequiredTag("Columns"))?
        .to_int::<u16>()
        .map_err(|e| SliceError::MalformedHeader(format!("Columns: {e}")))?;
    let bits_allocated = obj
        .element_opt(tags::BITS_ALLOCATED)?
        .ok_or(SliceError::MissingRequiredTag("BitsAllocated"))?
        .to_int::<u16>()
        .map_err(|e| SliceError::MalformedHeader(format!("BitsAllocated: {e}")))?;
    let pixel_representation = obj
        .element_opt(tags::PIXEL_REPRESENTATION)?
        .and_then(|e| e.to_int::<u16>().ok())
        .unwrap_or(0);
    let signed = pixel_representation != 0;

    let pixel_data = obj
        .element_opt(tags::PIXEL_DATA)?
        .ok_or(SliceError::PixelDataAbsent)?;

    let (payload, uncalibrated) = match transfer_syntax.as_str() {
        IMPLICIT_VR_LITTLE_ENDIAN | EXPLICIT_VR_LITTLE_ENDIAN => {
            if bits_allocated != 8 && bits_allocated != 16 {
                return Err(SliceError::UnsupportedBitsAllocated(bits_allocated));
            }
            let bytes = match pixel_data.value() {
                Value::Primitive(p) => p.to_bytes().to_vec(),
                Value::PixelSequence { .. } => {
                    return Err(SliceError::MalformedHeader(
                        "encapsulated pixel data in an uncompressed transfer syntax".to_string(),
                    ))
                }
                Value::Sequence { .. } => {
                    return Err(SliceError::MalformedHeader(
                        "pixel data element holds a sequence, not pixel bytes".to_string(),
                    ))
                }
            };
            (PixelPayload::Uncompressed(bytes), false)
        }
        JPEG_BASELINE_PROCESS_1 => {
            let fragment = match pixel_data.value() {
                Value::PixelSequence { fragments, .. } => fragments
                    .first()
                    .ok_or_else(|| SliceError::JpegDecode("no encapsulated fragments".to_string()))?
                    .clone(),
                Value::Primitive(p) => p.to_bytes().to_vec(),
                Value::Sequence { .. } => {
                    return Err(SliceError::JpegDecode(
                        "pixel data element holds a sequence, not a bitstream".to_string(),
                    ))
                }
            };
            let samples = decode_jpeg_baseline_grayscale(&fragment, rows, columns)?;
            (PixelPayload::JpegDecoded(samples), true)
        }
        other => return Err(SliceError::UnsupportedTransferSyntax(other.to_string())),
    };

    if uncalibrated {
        trace!("slice arrived JPEG-decoded, rescale slope/intercept will not be applied");
    }

    let rescale_slope = to_f64_opt(&obj, tags::RESCALE_SLOPE).unwrap_or(1.0);
    let rescale_intercept = to_f64_opt(&obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0);

    let image_position_patient = to_f64s_opt(&obj, tags::IMAGE_POSITION_PATIENT).and_then(to_array3);
    let image_orientation_patient =
        to_f64s_opt(&obj, tags::IMAGE_ORIENTATION_PATIENT).and_then(to_array6);
    let pixel_spacing = to_f64s_opt(&obj, tags::PIXEL_SPACING).and_then(to_array2);

    if image_orientation_patient.is_none() {
        warn!("slice has no Image Orientation Patient, series assembly will fall back to an assumed axial orientation");
    }

    Ok(RawSlice {
        rows,
        columns,
        bits_allocated,
        signed,
        transfer_syntax,
        payload,
        uncalibrated,
        rescale_slope,
        rescale_intercept,
        window_center: to_f64_opt(&obj, tags::WINDOW_CENTER),
        window_width: to_f64_opt(&obj, tags::WINDOW_WIDTH),
        image_position_patient,
        image_orientation_patient,
        pixel_spacing,
        instance_number: to_int_opt(&obj, tags::INSTANCE_NUMBER),
        slice_location: to_f64_opt(&obj, tags::SLICE_LOCATION),
        sop_instance_uid: to_string_opt(&obj, tags::SOP_INSTANCE_UID),
        study_instance_uid: to_string_opt(&obj, tags::STUDY_INSTANCE_UID),
        series_instance_uid: to_string_opt(&obj, tags::SERIES_INSTANCE_UID),
        patient_id: to_string_opt(&obj, tags::PATIENT_ID),
        frame_of_reference_uid: to_string_opt(&obj, tags::FRAME_OF_REFERENCE_UID),
        modality: to_string_opt(&obj, tags::MODALITY),
        study_date: to_string_opt(&obj, tags::STUDY_DATE),
    })
}

fn to_array2(v: Vec<f64>) -> Option<[f64; 2]> {
    (v.len() == 2).then(|| [v[0], v[1]])
}

fn to_array3(v: Vec<f64>) -> Option<[f64; 3]> {
    (v.len() == 3).then(|| [v[0], v[1], v[2]])
}

fn to_array6(v: Vec<f64>) -> Option<[f64; 6]> {
    (v.len() == 6).then(|| [v[0], v[1], v[2], v[3], v[4], v[5]])
}

/// Decodes a single JPEG baseline process 1 fragment to 8-bit grayscale
/// samples, converting RGB input via ITU-R luminance weights with
/// round-half-away-from-zero rounding (never banker's rounding).
fn decode_jpeg_baseline_grayscale(fragment: &[u8], rows: u16, columns: u16) -> Result<Vec<u8>> {
    let mut decoder = jpeg_decoder::Decoder::new(fragment);
    let pixels = decoder
        .decode()
        .map_err(|e| SliceError::JpegDecode(e.to_string()))?;
    let info = decoder
        .info()
        .ok_or_else(|| SliceError::JpegDecode("decoder produced no frame info".to_string()))?;

    let expected = rows as usize * columns as usize;
    let samples = match info.pixel_format {
        jpeg_decoder::PixelFormat::L8 => pixels,
        jpeg_decoder::PixelFormat::RGB24 => pixels
            .chunks_exact(3)
            .map(|rgb| {
                let luma = JPEG_LUMA_R * rgb[0] as f64
                    + JPEG_LUMA_G * rgb[1] as f64
                    + JPEG_LUMA_B * rgb[2] as f64;
                luma.round().clamp(0.0, 255.0) as u8
            })
            .collect(),
        other => {
            return Err(SliceError::JpegDecode(format!(
                "unsupported JPEG pixel format: {other:?}"
            )))
        }
    };

    if samples.len() != expected {
        return Err(SliceError::JpegDecode(format!(
            "decoded {} samples, expected {expected} ({rows}x{columns})",
            samples.len()
        )));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_conversions_reject_wrong_cardinality() {
        assert_eq!(to_array3(vec![1.0, 2.0, 3.0]), Some([1.0, 2.0, 3.0]));
        assert_eq!(to_array3(vec![1.0, 2.0]), None);
        assert_eq!(to_array2(vec![0.5, 0.5]), Some([0.5, 0.5]));
        assert_eq!(to_array6(vec![1.0; 5]), None);
    }

    #[test]
    fn jpeg_luma_rounding_is_half_away_from_zero() {
        let v: f64 = 2.5;
        assert_eq!(v.round(), 3.0);
        let v: f64 = -2.5;
        assert_eq!(v.round(), -3.0);
    }
}
