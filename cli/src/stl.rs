//! Writes a `Mesh` as a binary STL file — the concrete, inspectable file
//! format this binary picks for the mesh publication surface, which itself
//! mandates no particular format.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;
use medvol_mesh::Mesh;

pub fn write_stl(mesh: &Mesh, path: &Path) -> anyhow::Result<()> {
    let triangles = mesh.indices.chunks_exact(3).map(|tri| {
        let v0 = mesh.positions[tri[0] as usize];
        let v1 = mesh.positions[tri[1] as usize];
        let v2 = mesh.positions[tri[2] as usize];
        let n0 = mesh.normals[tri[0] as usize];
        let n1 = mesh.normals[tri[1] as usize];
        let n2 = mesh.normals[tri[2] as usize];
        let normal = [
            (n0[0] + n1[0] + n2[0]) / 3.0,
            (n0[1] + n1[1] + n2[1]) / 3.0,
            (n0[2] + n1[2] + n2[2]) / 3.0,
        ];
        stl_io::Triangle {
            normal: stl_io::Normal::new(normal),
            vertices: [
                stl_io::Vertex::new(v0),
                stl_io::Vertex::new(v1),
                stl_io::Vertex::new(v2),
            ],
        }
    });

    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("failed to create STL file: {path:?}"))?,
    );
    stl_io::write_stl(&mut file, triangles)
        .with_context(|| format!("failed to write STL data: {path:?}"))?;
    Ok(())
}
