use crate::renderer::vertex::{v, Vertex};

/// CPU-side geometry ready to be uploaded with
/// [`GraphicsDevice::create_mesh`](crate::renderer::GraphicsDevice::create_mesh).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Flat quad in the XZ plane spanning -1..1, facing +Y. Water tiles scale it.
    pub fn water_quad() -> Self {
        let up = [0.0, 1.0, 0.0];
        let tangent = [1.0, 0.0, 0.0, 1.0];
        let vertices = vec![
            v([-1.0, 0.0, -1.0], up, [0.0, 0.0], tangent),
            v([-1.0, 0.0, 1.0], up, [0.0, 1.0], tangent),
            v([1.0, 0.0, 1.0], up, [1.0, 1.0], tangent),
            v([1.0, 0.0, -1.0], up, [1.0, 0.0], tangent),
        ];
        Self::new(vertices, vec![0, 1, 3, 3, 1, 2])
    }

    /// Unit cube centred on the origin with per-face normals and tangents.
    pub fn cube() -> Self {
        // (normal, tangent, up-in-face)
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, tangent, up) in faces {
            let base = vertices.len() as u32;
            let corner = |s: f32, t: f32| {
                [
                    0.5 * (normal[0] + s * tangent[0] + t * up[0]),
                    0.5 * (normal[1] + s * tangent[1] + t * up[1]),
                    0.5 * (normal[2] + s * tangent[2] + t * up[2]),
                ]
            };
            let tangent4 = [tangent[0], tangent[1], tangent[2], 1.0];
            vertices.push(v(corner(-1.0, -1.0), normal, [0.0, 1.0], tangent4));
            vertices.push(v(corner(1.0, -1.0), normal, [1.0, 1.0], tangent4));
            vertices.push(v(corner(1.0, 1.0), normal, [1.0, 0.0], tangent4));
            vertices.push(v(corner(-1.0, 1.0), normal, [0.0, 0.0], tangent4));
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(vertices, indices)
    }

    /// Two crossed vertical quads, the classic foliage billboard.
    pub fn crossed_quads(width: f32, height: f32) -> Self {
        let half = width * 0.5;
        let mut vertices = Vec::with_capacity(8);
        let mut indices = Vec::with_capacity(12);
        let planes = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [-1.0, 0.0, 0.0]),
        ];
        for (axis, normal) in planes {
            let base = vertices.len() as u32;
            let tangent = [axis[0], axis[1], axis[2], 1.0];
            let at = |s: f32, y: f32| [axis[0] * s, y, axis[2] * s];
            vertices.push(v(at(-half, 0.0), normal, [0.0, 1.0], tangent));
            vertices.push(v(at(half, 0.0), normal, [1.0, 1.0], tangent));
            vertices.push(v(at(half, height), normal, [1.0, 0.0], tangent));
            vertices.push(v(at(-half, height), normal, [0.0, 0.0], tangent));
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(vertices, indices)
    }
}
