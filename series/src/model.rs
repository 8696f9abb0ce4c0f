use medvol_geometry::OrientationMatrix;
use medvol_slice::RawSlice;

/// An ordered, geometrically consistent stack of slices, ready for
/// `VolumeBuilder`. Produced by [`crate::assemble`].
#[derive(Debug)]
pub struct Series {
    pub slices: Vec<RawSlice>,
    pub rows: u16,
    pub columns: u16,
    pub depth: usize,
    pub spacing: (f64, f64, f64),
    pub origin: [f64; 3],
    pub orientation: OrientationMatrix,
    /// Set when no slice supplied an orientation and `orientation` is the
    /// identity fallback: downstream patient-coordinate export is then only
    /// approximate.
    pub orientation_approximate: bool,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub patient_id: Option<String>,
    pub frame_of_reference_uid: Option<String>,
    pub modality: Option<String>,
    pub study_date: Option<String>,
}
