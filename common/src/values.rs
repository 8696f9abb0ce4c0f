//! Tag-value accessors that gracefully yield "absent" rather than raising,
//! per the spec's handling of optional numeric/multi-valued DICOM elements
//! (`DS`, `IS`, multi-valued tags): a missing element AND a malformed one
//! both resolve to `None`, so a malformed optional tag never aborts parsing
//! of the rest of a slice.
//!
//! This loosens the teacher's `to_f64_opt`/`to_int_opt` family (which
//! propagate a conversion error for a *present but malformed* element) by one
//! notch: here, malformed is folded into absent. Required tags still use the
//! strict, error-propagating accessors.

use dicom_object::mem::InMemDicomObject;
use dicom_object::AccessError;
use dicom_core::Tag;
use tracing::trace;

/// Reads a required string-valued element. Missing or unreadable is an error.
pub fn to_string(obj: &InMemDicomObject, tag: Tag) -> Result<String, AccessError> {
    Ok(obj.element(tag)?.to_str().unwrap_or_default().to_string())
}

/// Reads an optional string-valued element, absent on any failure.
pub fn to_string_opt(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.element_opt(tag)
        .ok()
        .flatten()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.to_string())
}

/// Reads an optional floating point element, absent if missing or malformed.
pub fn to_f64_opt(obj: &InMemDicomObject, tag: Tag) -> Option<f64> {
    match obj.element_opt(tag) {
        Ok(Some(elem)) => match elem.to_float64() {
            Ok(v) => Some(v),
            Err(e) => {
                trace!(?tag, error = ?e, "numeric tag present but unparsable, treating as absent");
                None
            }
        },
        _ => None,
    }
}

/// Reads an optional multi-valued floating point element (e.g. Image
/// Position Patient, Image Orientation Patient), absent if missing,
/// malformed, or of the wrong cardinality.
pub fn to_f64s_opt(obj: &InMemDicomObject, tag: Tag) -> Option<Vec<f64>> {
    match obj.element_opt(tag) {
        Ok(Some(elem)) => match elem.to_multi_float64() {
            Ok(v) => Some(v),
            Err(e) => {
                trace!(?tag, error = ?e, "multi-valued tag present but unparsable, treating as absent");
                None
            }
        },
        _ => None,
    }
}

/// Reads an optional integer element, absent if missing or malformed.
pub fn to_int_opt(obj: &InMemDicomObject, tag: Tag) -> Option<i32> {
    match obj.element_opt(tag) {
        Ok(Some(elem)) => match elem.to_int::<i32>() {
            Ok(v) => Some(v),
            Err(e) => {
                trace!(?tag, error = ?e, "integer tag present but unparsable, treating as absent");
                None
            }
        },
        _ => None,
    }
}
