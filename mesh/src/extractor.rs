//! Chunked marching cubes extraction (component E).
//!
//! The cube grid (one less than the voxel grid per axis) is split into
//! `chunk_size`-wide blocks with a 2-cube overlap so that a cube straddling
//! a chunk boundary is still fully resolved inside at least one chunk.
//! Vertex deduplication happens per chunk only (not globally) — the overlap
//! means the same surface point may be emitted by two neighboring chunks,
//! and that is accepted rather than reconciled.

use nalgebra::Vector3;
use tracing::{debug, trace, warn};

use medvol_geometry::{GeometryMap, OrientationMatrix};

use crate::error::{MeshError, Result};
use crate::model::{ExtractionOutcome, Mesh};
use crate::tables::{tri_table_row, CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE};

/// Cubes bordering a chunk are resolved redundantly in the neighboring
/// chunk too, so no cube is ever split across a dedup boundary.
const CHUNK_OVERLAP: usize = 2;

/// Hard cap on vertices a single chunk may contribute; exceeding it aborts
/// extraction rather than silently truncating the surface.
pub const CHUNK_VERTEX_CAP: usize = 4_000_000;

/// Vertex coordinates are quantized to this many units per patient-space
/// unit for per-chunk dedup bucketing.
const QUANTIZE_SCALE: f64 = 1e5;

/// Two quantized-equal candidates are only merged if they're also within
/// this patient-space distance, guarding against quantization collisions.
const DEDUP_TOLERANCE: f64 = 1e-4;

#[allow(clippy::too_many_arguments)]
pub fn extract(
    scalars: &[f32],
    dims: (usize, usize, usize),
    iso: f32,
    spacing: (f64, f64, f64),
    origin: [f64; 3],
    orientation: OrientationMatrix,
    chunk_size: usize,
    min: f32,
    max: f32,
    mut progress: impl FnMut(f32),
    mut cancelled: impl FnMut() -> bool,
) -> Result<ExtractionOutcome> {
    let (w, h, d) = dims;
    if w < 2 || h < 2 || d < 2 {
        return Err(MeshError::DimensionTooSmall(dims));
    }
    if !iso.is_finite() {
        return Err(MeshError::NonFiniteIso(iso));
    }
    if iso < min || iso > max {
        return Err(MeshError::IsoOutOfRange { iso, min, max });
    }

    let map = GeometryMap::new(
        dims,
        Vector3::new(spacing.0, spacing.1, spacing.2),
        Vector3::new(origin[0], origin[1], origin[2]),
        orientation,
    );

    let cube_dims = (w - 1, h - 1, d - 1);
    let chunk_size = chunk_size.max(1);
    let chunks = chunk_ranges(cube_dims, chunk_size, CHUNK_OVERLAP);
    let total_chunks = chunks.len().max(1);

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals_accum: Vec<Vector3<f64>> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    let index_of = |x: usize, y: usize, z: usize| -> usize { x + y * w + z * w * h };

    for (chunk_i, chunk) in chunks.iter().enumerate() {
        if cancelled() {
            return Err(MeshError::Cancelled);
        }
        let mut dedup: std::collections::HashMap<(i64, i64, i64), Vec<(Vector3<f64>, u32)>> =
            std::collections::HashMap::new();
        let mut chunk_vertex_count = 0usize;

        for cz in chunk.z.0..chunk.z.1 {
            for cy in chunk.y.0..chunk.y.1 {
                for cx in chunk.x.0..chunk.x.1 {
                    let mut case = 0u8;
                    let mut corner_values = [0f32; 8];
                    for (ci, &(ox, oy, oz)) in CORNER_OFFSETS.iter().enumerate() {
                        let v = scalars[index_of(cx + ox, cy + oy, cz + oz)];
                        corner_values[ci] = v;
                        if v < iso {
                            case |= 1 << ci;
                        }
                    }
                    let edge_mask = EDGE_TABLE[case as usize];
                    if edge_mask == 0 {
                        continue;
                    }

                    let mut edge_points: [Option<Vector3<f64>>; 12] = [None; 12];
                    for edge in 0..12 {
                        if edge_mask & (1 << edge) == 0 {
                            continue;
                        }
                        let (a, b) = EDGE_CORNERS[edge];
                        let (ax, ay, az) = CORNER_OFFSETS[a];
                        let (bx, by, bz) = CORNER_OFFSETS[b];
                        let va = corner_values[a];
                        let vb = corner_values[b];
                        let t = interpolate_t(va, vb, iso);
                        let pa = Vector3::new(
                            (cx + ax) as f64,
                            (cy + ay) as f64,
                            (cz + az) as f64,
                        );
                        let pb = Vector3::new(
                            (cx + bx) as f64,
                            (cy + by) as f64,
                            (cz + bz) as f64,
                        );
                        let voxel_point = pa + (pb - pa) * t;
                        edge_points[edge] = Some(map.voxel_to_patient(voxel_point));
                    }

                    let row = tri_table_row(case as usize);
                    let mut i = 0;
                    while i + 2 < row.len() && row[i] != -1 {
                        let mut tri_idx = [0u32; 3];
                        for k in 0..3 {
                            let edge = row[i + k] as usize;
                            let patient_point = edge_points[edge]
                                .expect("edge flagged in mask must have an interpolated point");
                            let idx = dedup_vertex(
                                &mut dedup,
                                &mut positions,
                                patient_point,
                                &mut chunk_vertex_count,
                                (chunk.x.0, chunk.y.0, chunk.z.0),
                            )?;
                            tri_idx[k] = idx;
                        }
                        normals_accum.resize(positions.len(), Vector3::zeros());
                        accumulate_face_normal(&mut normals_accum, &positions, tri_idx);
                        indices.extend_from_slice(&tri_idx);
                        i += 3;
                    }
                }
            }
        }
        trace!(chunk_i, chunk_vertex_count, "chunk extracted");
        progress((chunk_i + 1) as f32 / total_chunks as f32);
    }

    if positions.is_empty() {
        debug!(iso, "marching cubes produced an empty surface");
        return Ok(ExtractionOutcome::Empty);
    }

    let normals = finalize_normals(normals_accum);
    let (bbox_min, bbox_max) = bounding_box(&positions);

    Ok(ExtractionOutcome::Mesh(Mesh {
        positions,
        normals,
        indices,
        bbox_min,
        bbox_max,
    }))
}

fn interpolate_t(va: f32, vb: f32, iso: f32) -> f64 {
    let denom = vb - va;
    if denom.abs() < f32::EPSILON {
        0.5
    } else {
        ((iso - va) / denom).clamp(0.0, 1.0) as f64
    }
}

fn dedup_vertex(
    dedup: &mut std::collections::HashMap<(i64, i64, i64), Vec<(Vector3<f64>, u32)>>,
    positions: &mut Vec<[f32; 3]>,
    patient_point: Vector3<f64>,
    chunk_vertex_count: &mut usize,
    chunk_origin: (usize, usize, usize),
) -> Result<u32> {
    let key = (
        (patient_point.x * QUANTIZE_SCALE).round() as i64,
        (patient_point.y * QUANTIZE_SCALE).round() as i64,
        (patient_point.z * QUANTIZE_SCALE).round() as i64,
    );
    if let Some(bucket) = dedup.get(&key) {
        for (existing, idx) in bucket {
            if (existing - patient_point).norm() < DEDUP_TOLERANCE {
                return Ok(*idx);
            }
        }
    }
    let idx = positions.len() as u32;
    positions.push([
        patient_point.x as f32,
        patient_point.y as f32,
        patient_point.z as f32,
    ]);
    dedup.entry(key).or_default().push((patient_point, idx));
    *chunk_vertex_count += 1;
    if *chunk_vertex_count > CHUNK_VERTEX_CAP {
        return Err(MeshError::ChunkBudgetExceeded {
            chunk: chunk_origin,
            cap: CHUNK_VERTEX_CAP,
        });
    }
    Ok(idx)
}

fn accumulate_face_normal(accum: &mut [Vector3<f64>], positions: &[[f32; 3]], tri: [u32; 3]) {
    let p = |i: u32| -> Vector3<f64> {
        let v = positions[i as usize];
        Vector3::new(v[0] as f64, v[1] as f64, v[2] as f64)
    };
    let a = p(tri[0]);
    let b = p(tri[1]);
    let c = p(tri[2]);
    let face_normal = (b - a).cross(&(c - a));
    for &idx in &tri {
        accum[idx as usize] += face_normal;
    }
}

fn finalize_normals(accum: Vec<Vector3<f64>>) -> Vec<[f32; 3]> {
    accum
        .into_iter()
        .map(|n| {
            let len = n.norm();
            if len > 1e-12 {
                let n = n / len;
                [n.x as f32, n.y as f32, n.z as f32]
            } else {
                [0.0, 0.0, 1.0]
            }
        })
        .collect()
}

fn bounding_box(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut min = positions[0];
    let mut max = positions[0];
    for p in positions {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}

struct ChunkRange {
    x: (usize, usize),
    y: (usize, usize),
    z: (usize, usize),
}

fn chunk_ranges(cube_dims: (usize, usize, usize), chunk_size: usize, overlap: usize) -> Vec<ChunkRange> {
    let axis_ranges = |dim: usize| -> Vec<(usize, usize)> {
        if dim == 0 {
            return Vec::new();
        }
        let mut ranges = Vec::new();
        let mut base_start = 0;
        while base_start < dim {
            let base_end = (base_start + chunk_size).min(dim);
            let ext_start = base_start.saturating_sub(overlap);
            let ext_end = (base_end + overlap).min(dim);
            ranges.push((ext_start, ext_end));
            base_start = base_end;
        }
        ranges
    };

    let (cw, ch, cd) = cube_dims;
    let xs = axis_ranges(cw);
    let ys = axis_ranges(ch);
    let zs = axis_ranges(cd);
    let mut out = Vec::with_capacity(xs.len() * ys.len() * zs.len());
    for &z in &zs {
        for &y in &ys {
            for &x in &xs {
                out.push(ChunkRange { x, y, z });
            }
        }
    }
    if out.is_empty() {
        warn!("marching cubes chunk partition produced zero chunks");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_volume(dim: usize) -> Vec<f32> {
        let center = (dim as f32 - 1.0) / 2.0;
        let mut v = Vec::with_capacity(dim * dim * dim);
        for z in 0..dim {
            for y in 0..dim {
                for x in 0..dim {
                    let dx = x as f32 - center;
                    let dy = y as f32 - center;
                    let dz = z as f32 - center;
                    v.push((dx * dx + dy * dy + dz * dz).sqrt());
                }
            }
        }
        v
    }

    #[test]
    fn sphere_scenario_produces_a_closed_nonempty_mesh() {
        let dim = 16;
        let scalars = sphere_volume(dim);
        let min = *scalars.iter().fold(&f32::MAX, |a, b| if a < b { a } else { b });
        let max = *scalars.iter().fold(&f32::MIN, |a, b| if a > b { a } else { b });
        let iso = (dim as f32 - 1.0) / 2.0 * 0.6;
        let outcome = extract(
            &scalars,
            (dim, dim, dim),
            iso,
            (1.0, 1.0, 1.0),
            [0.0, 0.0, 0.0],
            OrientationMatrix::identity(),
            8,
            min,
            max,
            |_| {},
            || false,
        )
        .unwrap();
        match outcome {
            ExtractionOutcome::Mesh(mesh) => {
                assert!(mesh.vertex_count() > 0);
                assert!(mesh.triangle_count() > 0);
                assert_eq!(mesh.indices.len() % 3, 0);
                for &idx in &mesh.indices {
                    assert!((idx as usize) < mesh.positions.len());
                }
            }
            ExtractionOutcome::Empty => panic!("expected a non-empty sphere surface"),
        }
    }

    #[test]
    fn iso_above_observed_range_is_rejected() {
        let dim = 4;
        let scalars = vec![0.0f32; dim * dim * dim];
        let err = extract(
            &scalars,
            (dim, dim, dim),
            5.0,
            (1.0, 1.0, 1.0),
            [0.0, 0.0, 0.0],
            OrientationMatrix::identity(),
            8,
            0.0,
            1.0,
            |_| {},
            || false,
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::IsoOutOfRange { .. }));
    }

    #[test]
    fn flat_field_at_exact_iso_is_empty() {
        let dim = 4;
        let scalars = vec![0.5f32; dim * dim * dim];
        let outcome = extract(
            &scalars,
            (dim, dim, dim),
            0.5,
            (1.0, 1.0, 1.0),
            [0.0, 0.0, 0.0],
            OrientationMatrix::identity(),
            8,
            0.0,
            1.0,
            |_| {},
            || false,
        )
        .unwrap();
        assert!(matches!(outcome, ExtractionOutcome::Empty));
    }

    #[test]
    fn cancellation_is_observed() {
        let dim = 8;
        let scalars = sphere_volume(dim);
        let err = extract(
            &scalars,
            (dim, dim, dim),
            1.0,
            (1.0, 1.0, 1.0),
            [0.0, 0.0, 0.0],
            OrientationMatrix::identity(),
            2,
            0.0,
            10.0,
            |_| {},
            || true,
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::Cancelled));
    }

    /// Invariant 7: progress values emitted during extraction are
    /// non-decreasing and the final one is exactly 1.0 on success.
    #[test]
    fn progress_is_monotonic_and_ends_at_one() {
        let dim = 16;
        let scalars = sphere_volume(dim);
        let min = *scalars.iter().fold(&f32::MAX, |a, b| if a < b { a } else { b });
        let max = *scalars.iter().fold(&f32::MIN, |a, b| if a > b { a } else { b });
        let iso = (dim as f32 - 1.0) / 2.0 * 0.6;

        let progresses = std::cell::RefCell::new(Vec::new());
        let _outcome = extract(
            &scalars,
            (dim, dim, dim),
            iso,
            (1.0, 1.0, 1.0),
            [0.0, 0.0, 0.0],
            OrientationMatrix::identity(),
            4,
            min,
            max,
            |p| progresses.borrow_mut().push(p),
            || false,
        )
        .unwrap();

        let progresses = progresses.into_inner();
        assert!(!progresses.is_empty());
        for pair in progresses.windows(2) {
            assert!(pair[1] >= pair[0], "progress regressed: {progresses:?}");
        }
        assert_eq!(*progresses.last().unwrap(), 1.0);
    }

    fn cube_volume(dim: usize) -> Vec<f32> {
        let mut v = Vec::with_capacity(dim * dim * dim);
        for z in 0..dim {
            for y in 0..dim {
                for x in 0..dim {
                    let dx = (x as f32 - 7.5).abs();
                    let dy = (y as f32 - 7.5).abs();
                    let dz = (z as f32 - 7.5).abs();
                    let m = dx.max(dy).max(dz);
                    v.push(if m <= 5.0 { 1.0 } else { 0.0 });
                }
            }
        }
        v
    }

    /// Scenario S1 from the spec: a 16x16x16 cube volume at iso=0.5.
    #[test]
    fn s1_cube_scenario_bounding_box_and_vertex_count() {
        let dim = 16;
        let scalars = cube_volume(dim);
        let outcome = extract(
            &scalars,
            (dim, dim, dim),
            0.5,
            (1.0, 1.0, 1.0),
            [0.0, 0.0, 0.0],
            OrientationMatrix::identity(),
            64,
            0.0,
            1.0,
            |_| {},
            || false,
        )
        .unwrap();
        match outcome {
            ExtractionOutcome::Mesh(mesh) => {
                assert!(mesh.vertex_count() > 200);
                for axis in 0..3 {
                    assert!(mesh.bbox_min[axis] >= 2.0 && mesh.bbox_min[axis] <= 3.0);
                    assert!(mesh.bbox_max[axis] >= 13.0 && mesh.bbox_max[axis] <= 14.0);
                }
                for &idx in &mesh.indices {
                    assert!((idx as usize) < mesh.positions.len());
                }
            }
            ExtractionOutcome::Empty => panic!("expected a non-empty cube surface"),
        }
    }

    /// Scenario S2 from the spec: same cube volume, iso above the observed
    /// range (max is 1), expecting `IsoOutOfRange`.
    #[test]
    fn s2_same_volume_iso_above_range_is_rejected() {
        let dim = 16;
        let scalars = cube_volume(dim);
        let err = extract(
            &scalars,
            (dim, dim, dim),
            2.0,
            (1.0, 1.0, 1.0),
            [0.0, 0.0, 0.0],
            OrientationMatrix::identity(),
            64,
            0.0,
            1.0,
            |_| {},
            || false,
        )
        .unwrap_err();
        assert!(matches!(err, MeshError::IsoOutOfRange { .. }));
    }

    #[test]
    fn chunk_ranges_cover_every_cube_with_overlap() {
        let ranges = chunk_ranges((10, 10, 10), 4, 2);
        assert!(!ranges.is_empty());
        for r in &ranges {
            assert!(r.x.1 <= 10 && r.y.1 <= 10 && r.z.1 <= 10);
        }
    }
}
