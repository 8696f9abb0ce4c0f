//! Taubin smoothing and normal recomputation (component F).

use std::collections::HashMap;

use nalgebra::Vector3;

use crate::model::Mesh;

const TAUBIN_LAMBDA: f64 = 0.4;
const TAUBIN_MU: f64 = -0.34;
pub const DEFAULT_TAUBIN_ITERATIONS: usize = 2;

/// Smooths `mesh` in place with the default number of lambda/mu (Taubin)
/// cycles, then recomputes normals from the smoothed geometry.
pub fn smooth(mesh: &mut Mesh) {
    smooth_with_iterations(mesh, DEFAULT_TAUBIN_ITERATIONS);
}

/// Smooths `mesh` in place with `iterations` lambda/mu cycles (each cycle is
/// one positive-then-negative pass), then recomputes normals. `iterations =
/// 0` leaves positions untouched but still recomputes normals.
pub fn smooth_with_iterations(mesh: &mut Mesh, iterations: usize) {
    if mesh.positions.is_empty() || mesh.indices.is_empty() {
        return;
    }
    let neighbors = build_neighbor_weights(mesh);
    for _ in 0..iterations {
        taubin_pass(mesh, &neighbors, TAUBIN_LAMBDA);
        taubin_pass(mesh, &neighbors, TAUBIN_MU);
    }
    recompute_normals(mesh);
}

/// Recomputes `mesh.normals` from its current positions and indices:
/// zeroed, accumulated as unnormalized face-normal cross products per
/// triangle, then L2-normalized (defaulting to `(0,0,1)` where the
/// accumulated normal is near zero, e.g. an isolated degenerate vertex).
pub fn recompute_normals(mesh: &mut Mesh) {
    let mut accum = vec![Vector3::zeros(); mesh.positions.len()];
    for tri in mesh.indices.chunks_exact(3) {
        let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if ia >= mesh.positions.len() || ib >= mesh.positions.len() || ic >= mesh.positions.len() {
            continue;
        }
        let a = to_vec(mesh.positions[ia]);
        let b = to_vec(mesh.positions[ib]);
        let c = to_vec(mesh.positions[ic]);
        let face_normal = (b - a).cross(&(c - a));
        accum[ia] += face_normal;
        accum[ib] += face_normal;
        accum[ic] += face_normal;
    }
    mesh.normals = accum
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
        .collect();
}

/// Edge-occurrence-weighted neighbor lists: `neighbors[v]` holds
/// `(neighbor_index, multiplicity)` pairs, where multiplicity is the number
/// of triangles sharing that edge.
fn build_neighbor_weights(mesh: &Mesh) -> Vec<Vec<(usize, f64)>> {
    let mut counts: Vec<HashMap<usize, u32>> = vec![HashMap::new(); mesh.positions.len()];
    for tri in mesh.indices.chunks_exact(3) {
        let edges = [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
        for (a, b) in edges {
            let (a, b) = (a as usize, b as usize);
            if a >= counts.len() || b >= counts.len() {
                continue;
            }
            *counts[a].entry(b).or_insert(0) += 1;
            *counts[b].entry(a).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|m| {
            m.into_iter()
                .map(|(idx, count)| (idx, count as f64))
                .collect()
        })
        .collect()
}

fn taubin_pass(mesh: &mut Mesh, neighbors: &[Vec<(usize, f64)>], factor: f64) {
    let current: Vec<Vector3<f64>> = mesh.positions.iter().map(|&p| to_vec(p)).collect();
    let mut next = current.clone();
    for (i, neigh) in neighbors.iter().enumerate() {
        if neigh.is_empty() {
            continue;
        }
        let total_weight: f64 = neigh.iter().map(|(_, w)| *w).sum();
        if total_weight <= 0.0 {
            continue;
        }
        let mut average = Vector3::zeros();
        for &(j, w) in neigh {
            average += current[j] * (w / total_weight);
        }
        let laplacian = average - current[i];
        next[i] = current[i] + laplacian * factor;
    }
    for (i, p) in next.into_iter().enumerate() {
        mesh.positions[i] = [p.x as f32, p.y as f32, p.z as f32];
    }
}

fn to_vec(p: [f32; 3]) -> Vector3<f64> {
    Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> Mesh {
        Mesh {
            positions: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            indices: vec![0, 1, 2, 0, 1, 3, 0, 2, 3, 1, 2, 3],
            bbox_min: [0.0, 0.0, 0.0],
            bbox_max: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn smoothing_preserves_vertex_and_triangle_counts() {
        let mut mesh = tetrahedron();
        let vcount = mesh.vertex_count();
        let tcount = mesh.triangle_count();
        smooth(&mut mesh);
        assert_eq!(mesh.vertex_count(), vcount);
        assert_eq!(mesh.triangle_count(), tcount);
    }

    #[test]
    fn smoothing_moves_vertices_toward_their_neighborhood() {
        let mut mesh = tetrahedron();
        let before = mesh.positions.clone();
        smooth(&mut mesh);
        let moved = mesh
            .positions
            .iter()
            .zip(before.iter())
            .any(|(a, b)| a != b);
        assert!(moved);
    }

    #[test]
    fn recompute_normals_gives_unit_length_normals() {
        let mut mesh = tetrahedron();
        recompute_normals(&mut mesh);
        for n in &mesh.normals {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4, "normal not unit length: {n:?}");
        }
    }

    #[test]
    fn empty_mesh_is_left_untouched() {
        let mut mesh = Mesh::default();
        smooth(&mut mesh);
        assert!(mesh.positions.is_empty());
    }
}
