//! Repeatable tile geometry.
//!
//! The tile covers `rows_per_segment` rows of a triangular lattice. Vertex
//! (i, j) samples buffer texel (2i + j % 2, j), so odd rows sit half a cell to
//! the right. Every cell contributes an upward triangle A and a downward
//! triangle B with unshared vertices, giving each face its own normal.

use glam::Vec2;

use crate::api::{Backend, GpuDevice, Submesh};
use crate::error::Result;
use crate::plan::{GeometryPlan, VERTICES_PER_CELL};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileGeometry {
    /// Undeformed lattice coordinates in cell units, y = 0.
    pub positions: Vec<[f32; 3]>,
    /// Position texel of each vertex, normalized by the buffer size.
    pub position_uvs: Vec<[f32; 2]>,
    /// Face normal texel of each vertex, normalized by the buffer size.
    pub normal_uvs: Vec<[f32; 2]>,
    /// Triangle lists for A and B, line list for the edges.
    pub submeshes: [Vec<u32>; 3],
}

impl TileGeometry {
    pub fn build(plan: &GeometryPlan) -> Self {
        let columns = plan.columns;
        let rows = plan.rows_per_segment;
        let texel = Vec2::ONE / plan.buffer_size().as_vec2();

        let cells = (columns * rows) as usize;
        let mut geometry = TileGeometry {
            positions: Vec::with_capacity(cells * VERTICES_PER_CELL as usize),
            position_uvs: Vec::with_capacity(cells * VERTICES_PER_CELL as usize),
            normal_uvs: Vec::with_capacity(cells * VERTICES_PER_CELL as usize),
            submeshes: [
                Vec::with_capacity(cells * 3),
                Vec::with_capacity(cells * 3),
                Vec::with_capacity(cells * 6),
            ],
        };

        for j in 0..rows {
            for i in 0..columns {
                let x0 = 2 * i + (j & 1);
                let anchor = [x0, j];

                let a = geometry.push_face(Submesh::SurfaceA, [[x0, j], [x0 + 1, j + 1], [x0 + 2, j]], anchor, texel);
                geometry.push_face(Submesh::SurfaceB, [[x0 + 1, j + 1], [x0 + 3, j + 1], [x0 + 2, j]], anchor, texel);

                let lines = &mut geometry.submeshes[Submesh::Lines.index()];
                lines.extend_from_slice(&[a, a + 1, a + 1, a + 2, a + 2, a]);
            }
        }

        geometry
    }

    fn push_face(&mut self, submesh: Submesh, texels: [[u32; 2]; 3], anchor: [u32; 2], texel: Vec2) -> u32 {
        let base = self.positions.len() as u32;
        let normal_uv = [anchor[0] as f32 * texel.x, anchor[1] as f32 * texel.y];
        for [x, y] in texels {
            self.positions.push([x as f32 * 0.5, 0.0, y as f32]);
            self.position_uvs.push([x as f32 * texel.x, y as f32 * texel.y]);
            self.normal_uvs.push(normal_uv);
        }
        self.submeshes[submesh.index()].extend_from_slice(&[base, base + 1, base + 2]);
        base
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Provider of the tile that every segment draw reuses.
pub trait MeshTemplate<B: Backend>: Sized {
    fn create<D: GpuDevice<B>>(device: &mut D, plan: &GeometryPlan) -> Result<Self>;
    fn rebuild<D: GpuDevice<B>>(&mut self, device: &mut D, plan: &GeometryPlan) -> Result<()>;
    fn release<D: GpuDevice<B>>(self, device: &mut D);
    fn mesh(&self) -> &B::Mesh;
}

#[derive(Debug)]
pub struct BulkMesh<B: Backend> {
    mesh: B::Mesh,
}

impl<B: Backend> MeshTemplate<B> for BulkMesh<B> {
    fn create<D: GpuDevice<B>>(device: &mut D, plan: &GeometryPlan) -> Result<Self> {
        let mesh = device.upload_mesh(&TileGeometry::build(plan))?;
        Ok(Self { mesh })
    }

    fn rebuild<D: GpuDevice<B>>(&mut self, device: &mut D, plan: &GeometryPlan) -> Result<()> {
        Ok(device.update_mesh(&mut self.mesh, &TileGeometry::build(plan))?)
    }

    fn release<D: GpuDevice<B>>(self, device: &mut D) {
        device.destroy_mesh(self.mesh);
    }

    fn mesh(&self) -> &B::Mesh {
        &self.mesh
    }
}
