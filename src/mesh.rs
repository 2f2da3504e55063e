//! Vertex format, procedural geometry and GPU-resident meshes.
//!
//! Geometry is built on the CPU as [`MeshData`] and uploaded with
//! [`Mesh::from_data`]. Keeping the two apart lets the generators be tested
//! without a device.
//!
//! # Winding
//!
//! Every generator emits triangles whose `(b - a).cross(c - a)` points out of
//! the surface. The renderer uses a left-handed camera, so such triangles show
//! up clockwise on screen and the pipelines declare `FrontFace::Cw`.
//!
//! # Vertex Layout
//!
//! | Attribute | Format    | Offset | Shader Location |
//! |-----------|-----------|--------|-----------------|
//! | position  | Float32x3 | 0      | 0               |
//! | normal    | Float32x3 | 12     | 1               |
//! | uv        | Float32x2 | 24     | 2               |

use std::f32::consts::PI;

use crate::error::{RenderError, Result};
use crate::gpu::GpuContext;

/// A vertex with position, normal, and texture coordinates (32 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex3d {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex3d {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2
    ];

    /// Vertex buffer layout shared by the mesh, marker and sky pipelines.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex3d>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &Self::ATTRIBUTES,
    };

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// CPU-side triangle list.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex3d>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit cube centered at the origin, one quad per face so normals stay flat.
    pub fn cube() -> Self {
        // (normal, right, up): each face spans right x up around its normal.
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];

        let mut data = Self::default();
        for (normal, right, up) in FACES {
            let base = data.vertices.len() as u32;
            for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
                let position = std::array::from_fn(|i| {
                    0.5 * normal[i] + (u - 0.5) * right[i] + (v - 0.5) * up[i]
                });
                data.vertices
                    .push(Vertex3d::new(position, normal, [u, 1.0 - v]));
            }
            data.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        data
    }

    /// UV sphere of radius 0.5.
    ///
    /// `segments` is the number of slices around Y, `rings` the number of
    /// stacks from pole to pole. Both are clamped to sensible minimums.
    pub fn sphere(segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut data = Self::default();

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            let (ring_radius, y) = phi.sin_cos();
            for seg in 0..=segments {
                let theta = 2.0 * PI * seg as f32 / segments as f32;
                let (sin_theta, cos_theta) = theta.sin_cos();
                let normal = [ring_radius * cos_theta, y, ring_radius * sin_theta];
                data.vertices.push(Vertex3d::new(
                    normal.map(|c| c * 0.5),
                    normal,
                    [seg as f32 / segments as f32, ring as f32 / rings as f32],
                ));
            }
        }

        let stride = segments + 1;
        for ring in 0..rings {
            for seg in 0..segments {
                let top = ring * stride + seg;
                let bottom = top + stride;
                data.indices
                    .extend_from_slice(&[top, top + 1, bottom, top + 1, bottom + 1, bottom]);
            }
        }
        data
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// GPU vertex and index buffers for one mesh.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl Mesh {
    /// Uploads geometry. Empty vertex or index lists are a construction error.
    pub fn from_data(gpu: &GpuContext, data: &MeshData, label: &str) -> Result<Self> {
        use wgpu::util::DeviceExt;

        if data.vertices.is_empty() || data.indices.is_empty() {
            return Err(RenderError::EmptyMesh(label.to_string()));
        }

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Vertices")),
                contents: bytemuck::cast_slice(&data.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Indices")),
                contents: bytemuck::cast_slice(&data.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
        })
    }

    pub fn cube(gpu: &GpuContext) -> Result<Self> {
        Self::from_data(gpu, &MeshData::cube(), "Cube")
    }

    pub fn sphere(gpu: &GpuContext, segments: u32, rings: u32) -> Result<Self> {
        Self::from_data(gpu, &MeshData::sphere(segments, rings), "Sphere")
    }

    /// Binds the buffers and issues one indexed draw.
    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn assert_outward(data: &MeshData) {
        for tri in data.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from(data.vertices[i as usize].position));
            let face_normal = (b - a).cross(c - a);
            if face_normal.length_squared() < 1e-12 {
                // Degenerate pole triangles carry no winding.
                continue;
            }
            let centroid = (a + b + c) / 3.0;
            assert!(
                face_normal.dot(centroid) > 0.0,
                "triangle {tri:?} faces inward"
            );
        }
    }

    #[test]
    fn cube_has_flat_faces_and_outward_winding() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for v in &cube.vertices {
            assert!(v.position.iter().all(|c| c.abs() <= 0.5 + 1e-6));
        }
        assert_outward(&cube);
    }

    #[test]
    fn sphere_vertices_sit_on_radius() {
        let sphere = MeshData::sphere(16, 8);
        assert_eq!(sphere.vertices.len(), 17 * 9);
        assert_eq!(sphere.triangle_count(), 16 * 8 * 2);
        for v in &sphere.vertices {
            let r = Vec3::from(v.position).length();
            assert!((r - 0.5).abs() < 1e-5);
        }
        assert_outward(&sphere);
    }

    #[test]
    fn sphere_clamps_degenerate_resolution() {
        let sphere = MeshData::sphere(0, 0);
        assert_eq!(sphere.triangle_count(), 3 * 2 * 2);
    }
}
