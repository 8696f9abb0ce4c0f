use medvol_geometry::{GeometryMap, OrientationMatrix, Vector3};

/// The calibrated scalar field plus a per-slice 8-bit preview stack, ready
/// for `MeshExtractor`. Produced by [`crate::build`].
#[derive(Debug)]
pub struct Volume {
    pub dims: (usize, usize, usize),
    pub spacing: (f64, f64, f64),
    pub origin: [f64; 3],
    pub orientation: OrientationMatrix,
    pub orientation_approximate: bool,
    /// Flattened scalar field, x-fastest: `index(x,y,z) = x + y*w + z*w*h`.
    pub scalars: Vec<f32>,
    /// One 8-bit preview frame per slice, `rows*columns` bytes each.
    pub display: Vec<Vec<u8>>,
    pub min: f32,
    pub max: f32,
    pub auto_iso: f32,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub patient_id: Option<String>,
    pub frame_of_reference_uid: Option<String>,
    pub modality: Option<String>,
    pub study_date: Option<String>,
}

impl Volume {
    /// Flat index of voxel (x,y,z), x-fastest, matching `GeometryMap`'s
    /// voxel-space axis order.
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        let (w, h, _d) = self.dims;
        x + y * w + z * w * h
    }

    pub fn scalar(&self, x: usize, y: usize, z: usize) -> f32 {
        self.scalars[self.index(x, y, z)]
    }

    /// Whether orientation/spacing/origin describe a real acquisition rather
    /// than an unset placeholder. Spacing of zero on any axis can never come
    /// from a calibrated slice, so it is the tell for "no volume loaded".
    pub fn has_geometry(&self) -> bool {
        self.spacing.0 > 0.0 && self.spacing.1 > 0.0 && self.spacing.2 > 0.0
    }

    /// Builds the `GeometryMap` this volume's dims/spacing/origin/orientation
    /// describe. The single source of truth for voxel<->patient conversions
    /// used by `MeshExtractor`, `MeshPostProcess`, and `AnnotationCodec`.
    pub fn geometry_map(&self) -> GeometryMap {
        GeometryMap::new(
            self.dims,
            Vector3::new(self.spacing.0, self.spacing.1, self.spacing.2),
            Vector3::new(self.origin[0], self.origin[1], self.origin[2]),
            self.orientation,
        )
    }
}
