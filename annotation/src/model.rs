use chrono::{DateTime, Utc};
use medvol_common::Validate;

/// One of the three annotation shapes described in the data model. `Label`
/// is distinct from a marker carrying label text: it is the kind import
/// upgrades a geometric annotation to once a trailing TEXT item attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Marker,
    Arrow,
    Label,
}

/// A single annotation in normalized `[0,1]^3` volume coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub id: String,
    pub kind: AnnotationKind,
    pub position: [f64; 3],
    pub arrow_to: Option<[f64; 3]>,
    pub slice_index: Option<usize>,
    pub label_text: Option<String>,
    pub linked_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Validate<bool> for Annotation {
    fn validate(&self) -> bool {
        match self.kind {
            AnnotationKind::Arrow => self.arrow_to.is_some(),
            AnnotationKind::Label => self.label_text.as_ref().is_some_and(|t| !t.is_empty()),
            AnnotationKind::Marker => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker() -> Annotation {
        Annotation {
            id: "a1".to_string(),
            kind: AnnotationKind::Marker,
            position: [0.0, 0.0, 0.0],
            arrow_to: None,
            slice_index: None,
            label_text: None,
            linked_to: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn arrow_without_an_endpoint_fails_validation() {
        let mut arrow = marker();
        arrow.kind = AnnotationKind::Arrow;
        assert!(!arrow.validate());
        arrow.arrow_to = Some([1.0, 0.0, 0.0]);
        assert!(arrow.validate());
    }

    #[test]
    fn label_requires_nonempty_text() {
        let mut label = marker();
        label.kind = AnnotationKind::Label;
        assert!(!label.validate());
        label.label_text = Some("lesion".to_string());
        assert!(label.validate());
    }
}
