//! The lossless JSON annotation export/import surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medvol_volume::Volume;

use crate::error::{AnnotationError, Result};
use crate::model::{Annotation, AnnotationKind};

const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: String,
    study: StudyMeta,
    volume: VolumeMeta,
    annotations: Vec<AnnotationJson>,
    #[serde(rename = "exportedAt")]
    exported_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StudyMeta {
    #[serde(rename = "patientId", skip_serializing_if = "Option::is_none")]
    patient_id: Option<String>,
    #[serde(rename = "studyInstanceUID", skip_serializing_if = "Option::is_none")]
    study_instance_uid: Option<String>,
    #[serde(
        rename = "seriesInstanceUID",
        skip_serializing_if = "Option::is_none"
    )]
    series_instance_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modality: Option<String>,
    #[serde(rename = "studyDate", skip_serializing_if = "Option::is_none")]
    study_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VolumeMeta {
    dimensions: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    orientation: [f64; 9],
}

#[derive(Debug, Serialize, Deserialize)]
struct AnnotationJson {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    position: [f64; 3],
    #[serde(rename = "arrowTo", skip_serializing_if = "Option::is_none")]
    arrow_to: Option<[f64; 3]>,
    #[serde(rename = "sliceIndex", skip_serializing_if = "Option::is_none")]
    slice_index: Option<usize>,
    #[serde(rename = "labelText", skip_serializing_if = "Option::is_none")]
    label_text: Option<String>,
    #[serde(rename = "linkedToId", skip_serializing_if = "Option::is_none")]
    linked_to_id: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
}

fn kind_to_str(kind: AnnotationKind) -> &'static str {
    match kind {
        AnnotationKind::Marker => "marker",
        AnnotationKind::Arrow => "arrow",
        AnnotationKind::Label => "label",
    }
}

fn kind_from_str(s: &str) -> Result<AnnotationKind> {
    match s {
        "marker" => Ok(AnnotationKind::Marker),
        "arrow" => Ok(AnnotationKind::Arrow),
        "label" => Ok(AnnotationKind::Label),
        other => Err(AnnotationError::MalformedReport(format!(
            "unrecognized annotation type: {other}"
        ))),
    }
}

fn volume_orientation_row_major(volume: &Volume) -> [f64; 9] {
    let m = volume.orientation.as_matrix();
    [
        m.m11, m.m12, m.m13, m.m21, m.m22, m.m23, m.m31, m.m32, m.m33,
    ]
}

/// Serializes `annotations` plus `volume`'s geometry and study metadata into
/// the UTF-8 JSON export format.
pub fn export_json(annotations: &[Annotation], volume: &Volume) -> Result<String> {
    let envelope = Envelope {
        version: FORMAT_VERSION.to_string(),
        study: StudyMeta {
            patient_id: volume.patient_id.clone(),
            study_instance_uid: volume.study_instance_uid.clone(),
            series_instance_uid: volume.series_instance_uid.clone(),
            modality: volume.modality.clone(),
            study_date: volume.study_date.clone(),
        },
        volume: VolumeMeta {
            dimensions: [volume.dims.0, volume.dims.1, volume.dims.2],
            spacing: [volume.spacing.0, volume.spacing.1, volume.spacing.2],
            origin: volume.origin,
            orientation: volume_orientation_row_major(volume),
        },
        annotations: annotations
            .iter()
            .map(|a| AnnotationJson {
                id: a.id.clone(),
                kind: kind_to_str(a.kind).to_string(),
                position: a.position,
                arrow_to: a.arrow_to,
                slice_index: a.slice_index,
                label_text: a.label_text.clone(),
                linked_to_id: a.linked_to.clone(),
                created_at: a.created_at,
            })
            .collect(),
        exported_at: Utc::now(),
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Parses the JSON export format back into a flat list of annotations.
/// Volume/study metadata in the envelope is informational only — the
/// caller's already-loaded `Volume` remains the source of truth.
pub fn import_json(json: &str) -> Result<Vec<Annotation>> {
    let envelope: Envelope = serde_json::from_str(json)?;
    if envelope.annotations.is_empty() {
        return Err(AnnotationError::NoAnnotationsFound);
    }
    envelope
        .annotations
        .into_iter()
        .map(|a| {
            Ok(Annotation {
                id: a.id,
                kind: kind_from_str(&a.kind)?,
                position: a.position,
                arrow_to: a.arrow_to,
                slice_index: a.slice_index,
                label_text: a.label_text,
                linked_to: a.linked_to_id,
                created_at: a.created_at,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvol_geometry::OrientationMatrix;

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

    fn sample_annotation() -> Annotation {
        Annotation {
            id: "a1".to_string(),
            kind: AnnotationKind::Marker,
            position: [0.25, 0.5, 0.75],
            arrow_to: None,
            slice_index: Some(2),
            label_text: Some("lesion".to_string()),
            linked_to: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_through_json() {
        let volume = sample_volume();
        let annotation = sample_annotation();
        let json = export_json(std::slice::from_ref(&annotation), &volume).unwrap();
        let parsed = import_json(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].position, annotation.position);
        assert_eq!(parsed[0].label_text, annotation.label_text);
    }

    #[test]
    fn empty_annotation_list_fails_import() {
        let volume = sample_volume();
        let json = export_json(&[], &volume).unwrap();
        let err = import_json(&json).unwrap_err();
        assert!(matches!(err, AnnotationError::NoAnnotationsFound));
    }

    #[test]
    fn unrecognized_type_is_rejected() {
        let bad = r#"{"version":"1.0","study":{},"volume":{"dimensions":[1,1,1],"spacing":[1,1,1],"origin":[0,0,0],"orientation":[1,0,0,0,1,0,0,0,1]},"annotations":[{"id":"x","type":"circle","position":[0,0,0],"createdAt":"2024-01-01T00:00:00Z"}],"exportedAt":"2024-01-01T00:00:00Z"}"#;
        let err = import_json(bad).unwrap_err();
        assert!(matches!(err, AnnotationError::MalformedReport(_)));
    }
}
