use nalgebra::{Matrix3, Vector3};

use crate::error::{GeometryError, Result};

/// Minimum admissible determinant magnitude before a 3x3 orientation matrix
/// is considered singular and its inverse refused.
const MIN_DETERMINANT: f64 = 1e-8;

/// The 3x3 orientation matrix whose columns are the row direction, the
/// column direction, and the slice normal (row x col, normalized).
///
/// This is the single source of truth `GeometryMap` consumes for voxel <->
/// patient conversions.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OrientationMatrix(Matrix3<f64>);

impl OrientationMatrix {
    /// Builds the orientation matrix from DICOM Image Orientation Patient's
    /// row and column direction cosines (each already unit length per the
    /// standard). The slice normal is the normalized row x col cross product.
    pub fn from_row_col(row_dir: Vector3<f64>, col_dir: Vector3<f64>) -> Self {
        let normal = slice_normal(row_dir, col_dir);
        Self(Matrix3::from_columns(&[row_dir, col_dir, normal]))
    }

    /// The identity orientation (patient space == voxel space, modulo
    /// spacing/origin), used when no slice in a series supplies orientation.
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn as_matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    pub fn apply(&self, v: Vector3<f64>) -> Vector3<f64> {
        self.0 * v
    }

    /// Inverts the matrix via cofactor expansion, as the spec requires,
    /// rather than nalgebra's generic `try_inverse`. Fails if the matrix is
    /// (near-)singular.
    pub fn inverse(&self) -> Result<OrientationMatrix> {
        let m = &self.0;
        let det = determinant_3x3(m);
        if det.abs() < MIN_DETERMINANT {
            return Err(GeometryError::SingularOrientation(det));
        }
        let cof = cofactor_matrix(m);
        // adjugate = transpose of the cofactor matrix
        let adj = cof.transpose();
        Ok(OrientationMatrix(adj / det))
    }
}

/// The normalized row x col cross product: the slice normal used throughout
/// the pipeline as the single source of truth for "through-plane" direction.
pub fn slice_normal(row_dir: Vector3<f64>, col_dir: Vector3<f64>) -> Vector3<f64> {
    let n = row_dir.cross(&col_dir);
    let len = n.norm();
    if len > 0.0 {
        n / len
    } else {
        Vector3::new(0.0, 0.0, 1.0)
    }
}

fn determinant_3x3(m: &Matrix3<f64>) -> f64 {
    m.m11 * (m.m22 * m.m33 - m.m23 * m.m32) - m.m12 * (m.m21 * m.m33 - m.m23 * m.m31)
        + m.m13 * (m.m21 * m.m32 - m.m22 * m.m31)
}

fn cofactor_matrix(m: &Matrix3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        m.m22 * m.m33 - m.m23 * m.m32,
        -(m.m21 * m.m33 - m.m23 * m.m31),
        m.m21 * m.m32 - m.m22 * m.m31,
        -(m.m12 * m.m33 - m.m13 * m.m32),
        m.m11 * m.m33 - m.m13 * m.m31,
        -(m.m11 * m.m32 - m.m12 * m.m31),
        m.m12 * m.m23 - m.m13 * m.m22,
        -(m.m11 * m.m23 - m.m13 * m.m21),
        m.m11 * m.m22 - m.m12 * m.m21,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let o = OrientationMatrix::identity();
        let inv = o.inverse().unwrap();
        let v = Vector3::new(1.0, 2.0, 3.0);
        let back = inv.apply(o.apply(v));
        assert!((back - v).norm() < 1e-9);
    }

    #[test]
    fn axis_aligned_inverse_round_trips() {
        let row = Vector3::new(1.0, 0.0, 0.0);
        let col = Vector3::new(0.0, 1.0, 0.0);
        let o = OrientationMatrix::from_row_col(row, col);
        let inv = o.inverse().unwrap();
        let v = Vector3::new(2.0, 4.0, 8.0);
        let back = inv.apply(o.apply(v));
        assert!((back - v).norm() < 1e-9);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let row = Vector3::new(1.0, 0.0, 0.0);
        let col = Vector3::new(1.0, 0.0, 0.0); // parallel: cross product is zero -> degenerate normal
        let o = OrientationMatrix::from_row_col(row, col);
        // This matrix has two identical columns (row == col direction), so it's singular.
        assert!(o.inverse().is_err());
    }
}
