//! DICOM Comprehensive 3D SR (SOP class 1.2.840.10008.5.1.4.1.1.88.34)
//! export/import, built from the same sequence-of-`InMemDicomObject`
//! pattern the rest of this workspace uses for nested DICOM content.

use dicom_core::value::DataSetSequence;
use dicom_core::{DataElement, PrimitiveValue, Tag, VR};
use dicom_object::InMemDicomObject;

use medvol_series::Series;
use medvol_volume::Volume;

use crate::error::{AnnotationError, Result};
use crate::model::{Annotation, AnnotationKind};

pub const COMPREHENSIVE_3D_SR_SOP_CLASS: &str = "1.2.840.10008.5.1.4.1.1.88.34";
const CONTENT_TEMPLATE_ID: &str = "1500";

// Tags used here are not re-exported by name from `dicom-dictionary-std` for
// every SR-specific attribute, so the less common ones are addressed by
// literal (group, element) — the keyword each stands for is noted inline.
const VALUE_TYPE: Tag = Tag(0x0040, 0xA040);
const CONCEPT_NAME_CODE_SEQUENCE: Tag = Tag(0x0040, 0xA043);
const CONTENT_SEQUENCE: Tag = Tag(0x0040, 0xA730);
const CONTINUITY_OF_CONTENT: Tag = Tag(0x0040, 0xA050);
const COMPLETION_FLAG: Tag = Tag(0x0040, 0xA491);
const VERIFICATION_FLAG: Tag = Tag(0x0040, 0xA493);
const CONTENT_TEMPLATE_SEQUENCE: Tag = Tag(0x0040, 0xA504);
const TEMPLATE_IDENTIFIER: Tag = Tag(0x0040, 0xDB00);
const MAPPING_RESOURCE: Tag = Tag(0x0008, 0x0105);
const GRAPHIC_TYPE: Tag = Tag(0x0070, 0x0023);
const GRAPHIC_DATA: Tag = Tag(0x0070, 0x0022);
const TEXT_VALUE: Tag = Tag(0x0040, 0xA160);
const CODE_VALUE: Tag = Tag(0x0008, 0x0100);
const CODING_SCHEME_DESIGNATOR: Tag = Tag(0x0008, 0x0102);
const CODE_MEANING: Tag = Tag(0x0008, 0x0104);
const REFERENCED_SOP_SEQUENCE: Tag = Tag(0x0008, 0x1199);
const REFERENCED_SOP_CLASS_UID: Tag = Tag(0x0008, 0x1150);
const REFERENCED_SOP_INSTANCE_UID: Tag = Tag(0x0008, 0x1155);
const SOP_CLASS_UID: Tag = Tag(0x0008, 0x0016);
const MODALITY: Tag = Tag(0x0008, 0x0060);
const STUDY_INSTANCE_UID: Tag = Tag(0x0020, 0x000D);
const SERIES_INSTANCE_UID: Tag = Tag(0x0020, 0x000E);
const PATIENT_ID: Tag = Tag(0x0010, 0x0020);
const STUDY_DATE: Tag = Tag(0x0008, 0x0020);

fn code_item(value: &str, scheme: &str, meaning: &str) -> InMemDicomObject {
    let mut item = InMemDicomObject::new_empty();
    item.put_str(CODE_VALUE, VR::SH, value);
    item.put_str(CODING_SCHEME_DESIGNATOR, VR::SH, scheme);
    item.put_str(CODE_MEANING, VR::LO, meaning);
    item
}

fn concept(item: &mut InMemDicomObject, value: &str, scheme: &str, meaning: &str) {
    let seq = DataSetSequence::from(vec![code_item(value, scheme, meaning)]);
    item.put(DataElement::new(CONCEPT_NAME_CODE_SEQUENCE, VR::SQ, seq));
}

fn referenced_sop_item(sop_class_uid: &str, sop_instance_uid: &str) -> InMemDicomObject {
    let mut item = InMemDicomObject::new_empty();
    item.put_str(REFERENCED_SOP_CLASS_UID, VR::UI, sop_class_uid);
    item.put_str(REFERENCED_SOP_INSTANCE_UID, VR::UI, sop_instance_uid);
    item
}

/// Picks the referenced SOP Instance UID for an annotation: its explicit
/// `slice_index` if present, else the depth bin nearest its normalized z.
fn referenced_slice<'a>(annotation: &Annotation, series: &'a Series) -> Option<&'a str> {
    let depth = series.depth.max(1);
    let index = annotation.slice_index.unwrap_or_else(|| {
        ((annotation.position[2] * (depth.saturating_sub(1)) as f64).round() as usize)
            .min(depth.saturating_sub(1))
    });
    series
        .slices
        .get(index)
        .and_then(|s| s.sop_instance_uid.as_deref())
}

fn graphic_data_item(
    graphic_type: &str,
    coords: Vec<f32>,
    concept_value: &str,
    concept_meaning: &str,
    referenced_sop_class_uid: &str,
    referenced_sop_instance_uid: Option<&str>,
) -> InMemDicomObject {
    let mut item = InMemDicomObject::new_empty();
    item.put_str(VALUE_TYPE, VR::CS, "SCOORD3D");
    concept(&mut item, concept_value, "MEDVOL", concept_meaning);
    item.put(DataElement::new(
        GRAPHIC_TYPE,
        VR::CS,
        PrimitiveValue::from(graphic_type),
    ));
    item.put(DataElement::new(
        GRAPHIC_DATA,
        VR::FL,
        PrimitiveValue::from(coords),
    ));
    if let Some(instance_uid) = referenced_sop_instance_uid {
        let seq = DataSetSequence::from(vec![referenced_sop_item(
            referenced_sop_class_uid,
            instance_uid,
        )]);
        item.put(DataElement::new(REFERENCED_SOP_SEQUENCE, VR::SQ, seq));
    }
    item
}

fn text_item(text: &str) -> InMemDicomObject {
    let mut item = InMemDicomObject::new_empty();
    item.put_str(VALUE_TYPE, VR::CS, "TEXT");
    concept(&mut item, "112039", "DCM", "annotation label");
    item.put_str(TEXT_VALUE, VR::UT, text);
    item
}

/// Exports `annotations` against `volume`'s geometry and `series`'s slice
/// identifiers as a Comprehensive 3D SR document root.
pub fn export_sr(
    annotations: &[Annotation],
    volume: &Volume,
    series: &Series,
) -> Result<InMemDicomObject> {
    let map = volume.geometry_map();
    let mut root = InMemDicomObject::new_empty();
    root.put_str(SOP_CLASS_UID, VR::UI, COMPREHENSIVE_3D_SR_SOP_CLASS);
    root.put_str(VALUE_TYPE, VR::CS, "CONTAINER");
    root.put_str(CONTINUITY_OF_CONTENT, VR::CS, "SEPARATE");
    root.put_str(COMPLETION_FLAG, VR::CS, "COMPLETE");
    root.put_str(VERIFICATION_FLAG, VR::CS, "UNVERIFIED");
    root.put_str(MODALITY, VR::CS, "SR");
    if let Some(v) = &series.patient_id {
        root.put_str(PATIENT_ID, VR::LO, v.as_str());
    }
    if let Some(v) = &series.study_instance_uid {
        root.put_str(STUDY_INSTANCE_UID, VR::UI, v.as_str());
    }
    if let Some(v) = &series.series_instance_uid {
        root.put_str(SERIES_INSTANCE_UID, VR::UI, v.as_str());
    }
    if let Some(v) = &series.study_date {
        root.put_str(STUDY_DATE, VR::DA, v.as_str());
    }

    let mut template_item = InMemDicomObject::new_empty();
    template_item.put_str(MAPPING_RESOURCE, VR::CS, "DCMR");
    template_item.put_str(TEMPLATE_IDENTIFIER, VR::CS, CONTENT_TEMPLATE_ID);
    let template_seq = DataSetSequence::from(vec![template_item]);
    root.put(DataElement::new(
        CONTENT_TEMPLATE_SEQUENCE,
        VR::SQ,
        template_seq,
    ));

    let mut content_items = Vec::with_capacity(annotations.len() * 2);
    for annotation in annotations {
        let p = map.normalized_to_patient(nalgebra::Vector3::new(
            annotation.position[0],
            annotation.position[1],
            annotation.position[2],
        ));
        // RawSlice carries no per-image SOP Class UID, so the referenced
        // image is identified by instance UID only where available; the
        // class UID slot is left to the report's own SOP class, the only
        // one this codec has in hand.
        let referenced_instance = referenced_slice(annotation, series);
        let geometric = match annotation.kind {
            AnnotationKind::Arrow => {
                let endpoint = annotation.arrow_to.ok_or_else(|| {
                    AnnotationError::MalformedReport(
                        "arrow annotation is missing its endpoint".to_string(),
                    )
                })?;
                let q = map.normalized_to_patient(nalgebra::Vector3::new(
                    endpoint[0],
                    endpoint[1],
                    endpoint[2],
                ));
                graphic_data_item(
                    "POLYLINE",
                    vec![
                        p.x as f32, p.y as f32, p.z as f32, q.x as f32, q.y as f32, q.z as f32,
                    ],
                    "112040",
                    "arrow annotation",
                    COMPREHENSIVE_3D_SR_SOP_CLASS,
                    referenced_instance,
                )
            }
            AnnotationKind::Marker | AnnotationKind::Label => graphic_data_item(
                "POINT",
                vec![p.x as f32, p.y as f32, p.z as f32],
                "112039",
                "point annotation",
                COMPREHENSIVE_3D_SR_SOP_CLASS,
                referenced_instance,
            ),
        };
        content_items.push(geometric);
        if let Some(text) = &annotation.label_text {
            content_items.push(text_item(text));
        }
    }

    let content_sequence = DataSetSequence::from(content_items);
    root.put(DataElement::new(
        CONTENT_SEQUENCE,
        VR::SQ,
        content_sequence,
    ));

    Ok(root)
}

/// Parses a Comprehensive 3D SR root back into annotations, resolving
/// patient coordinates through `volume`'s geometry.
pub fn import_sr(report: &InMemDicomObject, volume: &Volume) -> Result<Vec<Annotation>> {
    if !volume.has_geometry() {
        return Err(AnnotationError::NoVolumeLoaded);
    }
    let map = volume.geometry_map();
    let content = report
        .element_opt(CONTENT_SEQUENCE)
        .map_err(|e| AnnotationError::MalformedReport(e.to_string()))?
        .ok_or(AnnotationError::NoAnnotationsFound)?;
    let items = content
        .items()
        .ok_or_else(|| AnnotationError::MalformedReport("content sequence has no items".to_string()))?;

    let mut annotations: Vec<Annotation> = Vec::new();
    let mut counter = 0usize;
    for item in items {
        let value_type = item
            .element_opt(VALUE_TYPE)
            .ok()
            .flatten()
            .and_then(|e| e.to_str().ok())
            .unwrap_or_default();

        match value_type.as_ref() {
            "SCOORD3D" => {
                let graphic_type = item
                    .element_opt(GRAPHIC_TYPE)
                    .ok()
                    .flatten()
                    .and_then(|e| e.to_str().ok())
                    .unwrap_or_default();
                let coords = item
                    .element_opt(GRAPHIC_DATA)
                    .ok()
                    .flatten()
                    .and_then(|e| e.to_multi_float32().ok())
                    .ok_or_else(|| {
                        AnnotationError::MalformedReport("missing graphic data".to_string())
                    })?;
                counter += 1;
                let id = format!("sr-{counter}");
                match graphic_type.as_ref() {
                    "POINT" if coords.len() >= 3 => {
                        let n = map.patient_to_normalized_clamped(nalgebra::Vector3::new(
                            coords[0] as f64,
                            coords[1] as f64,
                            coords[2] as f64,
                        ))?;
                        annotations.push(Annotation {
                            id,
                            kind: AnnotationKind::Marker,
                            position: [n.x, n.y, n.z],
                            arrow_to: None,
                            slice_index: None,
                            label_text: None,
                            linked_to: None,
                            created_at: chrono::Utc::now(),
                        });
                    }
                    "POLYLINE" if coords.len() >= 6 => {
                        let n0 = map.patient_to_normalized_clamped(nalgebra::Vector3::new(
                            coords[0] as f64,
                            coords[1] as f64,
                            coords[2] as f64,
                        ))?;
                        let n1 = map.patient_to_normalized_clamped(nalgebra::Vector3::new(
                            coords[3] as f64,
                            coords[4] as f64,
                            coords[5] as f64,
                        ))?;
                        annotations.push(Annotation {
                            id,
                            kind: AnnotationKind::Arrow,
                            position: [n0.x, n0.y, n0.z],
                            arrow_to: Some([n1.x, n1.y, n1.z]),
                            slice_index: None,
                            label_text: None,
                            linked_to: None,
                            created_at: chrono::Utc::now(),
                        });
                    }
                    _ => {
                        // unrecognized graphic type or malformed coordinate count: ignored
                    }
                }
            }
            "TEXT" => {
                let text = item
                    .element_opt(TEXT_VALUE)
                    .ok()
                    .flatten()
                    .and_then(|e| e.to_str().ok())
                    .unwrap_or_default();
                if let Some(last) = annotations.last_mut() {
                    last.label_text = Some(text.into_owned());
                    last.kind = AnnotationKind::Label;
                }
            }
            _ => {
                // unrecognized value type: ignored
            }
        }
    }

    if annotations.is_empty() {
        return Err(AnnotationError::NoAnnotationsFound);
    }
    Ok(annotations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use medvol_geometry::OrientationMatrix;
    use medvol_slice::{PixelPayload, RawSlice};

    fn raw_slice(sop: &str) -> RawSlice {
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
            image_position_patient: Some([0.0, 0.0, 0.0]),
            image_orientation_patient: Some([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
            pixel_spacing: Some([1.0, 1.0]),
            instance_number: Some(1),
            slice_location: None,
            sop_instance_uid: Some(sop.to_string()),
            study_instance_uid: Some("1.2.3".to_string()),
            series_instance_uid: Some("1.2.3.4".to_string()),
            patient_id: Some("P1".to_string()),
            frame_of_reference_uid: None,
            modality: Some("CT".to_string()),
            study_date: Some("20240101".to_string()),
        }
    }

    fn sample_series() -> Series {
        Series {
            slices: vec![raw_slice("sop-0"), raw_slice("sop-1"), raw_slice("sop-2"), raw_slice("sop-3")],
            rows: 4,
            columns: 4,
            depth: 4,
            spacing: (1.0, 1.0, 1.0),
            origin: [0.0, 0.0, 0.0],
            orientation: OrientationMatrix::identity(),
            orientation_approximate: false,
            study_instance_uid: Some("1.2.3".to_string()),
            series_instance_uid: Some("1.2.3.4".to_string()),
            patient_id: Some("P1".to_string()),
            frame_of_reference_uid: None,
            modality: Some("CT".to_string()),
            study_date: Some("20240101".to_string()),
        }
    }

    fn sample_volume() -> Volume {
        Volume {
            dims: (4, 4, 4),
            spacing: (1.0, 1.0, 1.0),
            origin: [0.0, 0.0, 0.0],
            orientation: OrientationMatrix::identity(),
            orientation_approximate: false,
            scalars: vec![0.0; 64],
            display: vec![vec![0u8; 16]; 4],
            min: 0.0,
            max: 1.0,
            auto_iso: 0.5,
            study_instance_uid: Some("1.2.3".to_string()),
            series_instance_uid: Some("1.2.3.4".to_string()),
            patient_id: Some("P1".to_string()),
            frame_of_reference_uid: None,
            modality: Some("CT".to_string()),
            study_date: Some("20240101".to_string()),
        }
    }

    /// Scenario S6 from the spec: marker with a label plus an arrow, export
    /// then reimport under the same volume.
    #[test]
    fn s6_sr_round_trip() {
        let volume = sample_volume();
        let series = sample_series();
        let annotations = vec![
            Annotation {
                id: "a1".to_string(),
                kind: AnnotationKind::Marker,
                position: [0.25, 0.5, 0.75],
                arrow_to: None,
                slice_index: None,
                label_text: Some("lesion".to_string()),
                linked_to: None,
                created_at: Utc::now(),
            },
            Annotation {
                id: "a2".to_string(),
                kind: AnnotationKind::Arrow,
                position: [0.1, 0.1, 0.5],
                arrow_to: Some([0.4, 0.2, 0.5]),
                slice_index: None,
                label_text: None,
                linked_to: None,
                created_at: Utc::now(),
            },
        ];
        let report = export_sr(&annotations, &volume, &series).unwrap();
        let imported = import_sr(&report, &volume).unwrap();
        assert_eq!(imported.len(), 2);

        assert_eq!(imported[0].kind, AnnotationKind::Label);
        assert_eq!(imported[0].label_text.as_deref(), Some("lesion"));
        for axis in 0..3 {
            assert!((imported[0].position[axis] - annotations[0].position[axis]).abs() < 1e-4);
        }

        assert_eq!(imported[1].kind, AnnotationKind::Arrow);
        let arrow_to = imported[1].arrow_to.unwrap();
        for axis in 0..3 {
            assert!((imported[1].position[axis] - annotations[1].position[axis]).abs() < 1e-4);
            assert!((arrow_to[axis] - annotations[1].arrow_to.unwrap()[axis]).abs() < 1e-4);
        }
    }

    #[test]
    fn import_requires_content_sequence_when_geometry_is_set() {
        let volume = sample_volume();
        let empty_report = InMemDicomObject::new_empty();
        let err = import_sr(&empty_report, &volume).unwrap_err();
        assert!(matches!(err, AnnotationError::NoAnnotationsFound));
    }

    #[test]
    fn import_rejects_a_volume_with_unset_geometry() {
        let mut volume = sample_volume();
        volume.spacing = (0.0, 0.0, 0.0);
        let empty_report = InMemDicomObject::new_empty();
        let err = import_sr(&empty_report, &volume).unwrap_err();
        assert!(matches!(err, AnnotationError::NoVolumeLoaded));
    }
}
