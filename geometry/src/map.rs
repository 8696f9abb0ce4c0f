use nalgebra::Vector3;
use tracing::trace;

use crate::error::Result;
use crate::orientation::OrientationMatrix;

/// Bidirectional mapping between normalized `[0,1]^3`, voxel, and patient
/// coordinates for one volume.
///
/// This is a pure, stateless (beyond its own immutable fields) library used
/// by `MeshExtractor`, `MeshPostProcess` and `AnnotationCodec` — the single
/// source of truth for coordinate interchange that every other component
/// consumes rather than reimplementing.
#[derive(Copy, Clone, Debug)]
pub struct GeometryMap {
    dims: (usize, usize, usize),
    spacing: Vector3<f64>,
    origin: Vector3<f64>,
    orientation: OrientationMatrix,
}

impl GeometryMap {
    pub fn new(
        dims: (usize, usize, usize),
        spacing: Vector3<f64>,
        origin: Vector3<f64>,
        orientation: OrientationMatrix,
    ) -> Self {
        Self {
            dims,
            spacing,
            origin,
            orientation,
        }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    pub fn origin(&self) -> Vector3<f64> {
        self.origin
    }

    pub fn orientation(&self) -> &OrientationMatrix {
        &self.orientation
    }

    /// normalized -> voxel: multiply the normalized coordinate by (dim-1)
    /// per axis.
    pub fn normalized_to_voxel(&self, n: Vector3<f64>) -> Vector3<f64> {
        let (w, h, d) = self.dims;
        Vector3::new(
            n.x * (w.saturating_sub(1)) as f64,
            n.y * (h.saturating_sub(1)) as f64,
            n.z * (d.saturating_sub(1)) as f64,
        )
    }

    /// voxel -> normalized: divide by (dim-1) per axis, guarding dim=1 to
    /// avoid division by zero (returns 0 on that axis instead).
    pub fn voxel_to_normalized(&self, v: Vector3<f64>) -> Vector3<f64> {
        let (w, h, d) = self.dims;
        Vector3::new(
            div_guarded(v.x, w),
            div_guarded(v.y, h),
            div_guarded(v.z, d),
        )
    }

    /// voxel -> patient: scale by spacing, rotate through the orientation
    /// matrix, translate by origin.
    pub fn voxel_to_patient(&self, v: Vector3<f64>) -> Vector3<f64> {
        let scaled = v.component_mul(&self.spacing);
        self.orientation.apply(scaled) + self.origin
    }

    /// patient -> voxel: the exact inverse of `voxel_to_patient`.
    pub fn patient_to_voxel(&self, p: Vector3<f64>) -> Result<Vector3<f64>> {
        let inv = self.orientation.inverse()?;
        let translated = p - self.origin;
        let rotated = inv.apply(translated);
        Ok(Vector3::new(
            rotated.x / self.spacing.x,
            rotated.y / self.spacing.y,
            rotated.z / self.spacing.z,
        ))
    }

    /// normalized -> patient, composing the two conversions above.
    pub fn normalized_to_patient(&self, n: Vector3<f64>) -> Vector3<f64> {
        self.voxel_to_patient(self.normalized_to_voxel(n))
    }

    /// patient -> normalized, clamped into `[0,1]^3` (used by annotation
    /// import, which must tolerate slightly-out-of-range SR content).
    pub fn patient_to_normalized_clamped(&self, p: Vector3<f64>) -> Result<Vector3<f64>> {
        let v = self.patient_to_voxel(p)?;
        let n = self.voxel_to_normalized(v);
        trace!(?n, "patient_to_normalized_clamped");
        Ok(Vector3::new(
            n.x.clamp(0.0, 1.0),
            n.y.clamp(0.0, 1.0),
            n.z.clamp(0.0, 1.0),
        ))
    }
}

fn div_guarded(value: f64, dim: usize) -> f64 {
    if dim <= 1 {
        0.0
    } else {
        value / (dim - 1) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::OrientationMatrix;

    fn axis_aligned_map() -> GeometryMap {
        let orientation = OrientationMatrix::from_row_col(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        GeometryMap::new(
            (10, 10, 10),
            Vector3::new(0.5, 0.75, 2.0),
            Vector3::new(10.0, 20.0, 30.0),
            orientation,
        )
    }

    /// Scenario S5 from the spec: voxel (2,4,8) -> patient (11,23,46), and
    /// the round trip returns exactly (2,4,8).
    #[test]
    fn s5_geometry_map_consistency() {
        let map = axis_aligned_map();
        let patient = map.voxel_to_patient(Vector3::new(2.0, 4.0, 8.0));
        assert!((patient.x - 11.0).abs() < 1e-9);
        assert!((patient.y - 23.0).abs() < 1e-9);
        assert!((patient.z - 46.0).abs() < 1e-9);

        let back = map.patient_to_voxel(patient).unwrap();
        assert!((back.x - 2.0).abs() < 1e-9);
        assert!((back.y - 4.0).abs() < 1e-9);
        assert!((back.z - 8.0).abs() < 1e-9);
    }

    /// Invariant 3 from the spec: round trip holds for every voxel corner of
    /// a small grid, within 1e-6.
    #[test]
    fn round_trip_holds_across_grid() {
        let map = axis_aligned_map();
        for x in 0..10 {
            for y in 0..10 {
                for z in 0..10 {
                    let v = Vector3::new(x as f64, y as f64, z as f64);
                    let patient = map.voxel_to_patient(v);
                    let back = map.patient_to_voxel(patient).unwrap();
                    assert!((back - v).norm() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn normalized_voxel_round_trip_guards_unit_dim() {
        let orientation = OrientationMatrix::identity();
        let map = GeometryMap::new(
            (1, 5, 5),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(0.0, 0.0, 0.0),
            orientation,
        );
        let n = map.voxel_to_normalized(Vector3::new(0.0, 2.0, 2.0));
        assert_eq!(n.x, 0.0);
        assert!((n.y - 0.5).abs() < 1e-9);
    }
}
