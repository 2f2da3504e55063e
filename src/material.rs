//! Surface materials and their GPU bind groups.
//!
//! A [`Material`] names its four textures by [`TextureId`]; the scene turns it
//! into a [`GpuMaterial`] bound at `@group(2)` of the mesh pipelines:
//!
//! | Binding | Resource                |
//! |---------|-------------------------|
//! | 0       | `MaterialUniforms`      |
//! | 1       | albedo (sRGB)           |
//! | 2       | normal map              |
//! | 3       | roughness               |
//! | 4       | metalness               |
//! | 5       | shared repeat sampler   |

use glam::{Vec2, Vec4};

use crate::ecs::TextureId;
use crate::gpu::GpuContext;
use crate::texture::Texture;

/// Lighting model a material is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shading {
    /// Cook-Torrance with image-based ambient.
    Pbr,
    /// Blinn-Phong, ambient from the irradiance cube.
    Basic,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub shading: Shading,
    pub color_tint: Vec4,
    /// Blinn-Phong exponent; only used by [`Shading::Basic`].
    pub shininess: f32,
    pub uv_scale: Vec2,
    pub albedo: TextureId,
    pub normal: TextureId,
    pub roughness: TextureId,
    pub metalness: TextureId,
}

impl Material {
    pub fn new(
        shading: Shading,
        albedo: TextureId,
        normal: TextureId,
        roughness: TextureId,
        metalness: TextureId,
    ) -> Self {
        Self {
            shading,
            color_tint: Vec4::ONE,
            shininess: 64.0,
            uv_scale: Vec2::ONE,
            albedo,
            normal,
            roughness,
            metalness,
        }
    }

    pub fn with_tint(mut self, tint: Vec4) -> Self {
        self.color_tint = tint;
        self
    }

    pub fn with_uv_scale(mut self, scale: Vec2) -> Self {
        self.uv_scale = scale;
        self
    }

    pub fn with_shininess(mut self, shininess: f32) -> Self {
        self.shininess = shininess;
        self
    }

    pub fn uniforms(&self) -> MaterialUniforms {
        MaterialUniforms {
            color_tint: self.color_tint.to_array(),
            uv_scale: self.uv_scale.to_array(),
            shininess: self.shininess,
            _padding: 0.0,
        }
    }
}

/// `@group(2) @binding(0)` in `mesh.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniforms {
    pub color_tint: [f32; 4],
    pub uv_scale: [f32; 2],
    pub shininess: f32,
    pub _padding: f32,
}

/// Bind group layout and sampler shared by every material.
pub struct MaterialLayout {
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

impl MaterialLayout {
    pub fn new(gpu: &GpuContext) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Material Bind Group Layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                        texture_entry(1),
                        texture_entry(2),
                        texture_entry(3),
                        texture_entry(4),
                        wgpu::BindGroupLayoutEntry {
                            binding: 5,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                    ],
                });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: 16,
            ..Default::default()
        });

        Self {
            bind_group_layout,
            sampler,
        }
    }
}

/// Textures a material samples, already resolved from their ids.
pub struct MaterialTextures<'a> {
    pub albedo: &'a Texture,
    pub normal: &'a Texture,
    pub roughness: &'a Texture,
    pub metalness: &'a Texture,
}

/// A material's uniform buffer and bind group.
pub struct GpuMaterial {
    pub(crate) shading: Shading,
    uniform_buffer: wgpu::Buffer,
    pub(crate) bind_group: wgpu::BindGroup,
}

impl GpuMaterial {
    pub fn new(
        gpu: &GpuContext,
        layout: &MaterialLayout,
        material: &Material,
        textures: MaterialTextures<'_>,
    ) -> Self {
        use wgpu::util::DeviceExt;

        let uniform_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Material Uniforms"),
                contents: bytemuck::bytes_of(&material.uniforms()),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Bind Group"),
            layout: &layout.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&textures.albedo.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&textures.normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&textures.roughness.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&textures.metalness.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&layout.sampler),
                },
            ],
        });

        Self {
            shading: material.shading,
            uniform_buffer,
            bind_group,
        }
    }

    /// Rewrites shading, tint, UV scale and shininess. Texture bindings are fixed.
    pub fn update(&mut self, gpu: &GpuContext, material: &Material) {
        self.shading = material.shading;
        gpu.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&material.uniforms()),
        );
    }
}
