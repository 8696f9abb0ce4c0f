/// An extracted or post-processed surface: three typed buffers plus a
/// bounding box. No file format is mandated for transport; the CLI picks
/// one concrete encoding at its own boundary.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub bbox_min: [f32; 3],
    pub bbox_max: [f32; 3],
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// `MeshExtractor`'s result: either a non-empty mesh or the explicit
/// zero-triangle marker, per spec section 4.E.
#[derive(Debug)]
pub enum ExtractionOutcome {
    Mesh(Mesh),
    Empty,
}
