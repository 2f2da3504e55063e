//! Environment sky and its baked image-based lighting.
//!
//! [`Sky::new`] uploads the six environment faces, runs the [`IblBaker`] on
//! the device and builds the pipeline that draws the environment behind the
//! scene. The baked maps are read-only afterwards and are sampled by every
//! PBR draw.
//!
//! ```ignore
//! let faces = CubeFaces::gradient(256, Vec3::new(0.3, 0.6, 0.4))?;
//! let sky = Sky::new(&gpu, &faces, BakeSettings::default(), &mut renderer)?;
//! ```

mod bake;
mod cubemap;
mod gpu_backend;
mod state;

pub use bake::{
    BakeBackend, BakeProgram, BakeSettings, BakeUniforms, IblBaker, IblTextures, mip_face_size,
    roughness_for_mip, specular_mip_count,
};
pub use cubemap::{
    CubeFace, CubeFaces, ENVIRONMENT_FORMAT, EnvironmentMap, FACE_COUNT, check_face_limit, validate_faces,
};
pub use gpu_backend::{GpuBakeBackend, GpuBakeTexture, IBL_FORMAT};
pub use state::{RenderState, RenderStateHost, StateScope, TargetId, Viewport};

use crate::camera::Camera;
use crate::error::Result;
use crate::gpu::{DEPTH_FORMAT, GpuContext};
use crate::mesh::{Mesh, Vertex3d};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyUniforms {
    view_projection: [[f32; 4]; 4],
}

/// The environment cube, its baked IBL maps, and the sky draw.
pub struct Sky {
    environment: EnvironmentMap,
    irradiance: wgpu::TextureView,
    specular: wgpu::TextureView,
    brdf_lut: wgpu::TextureView,
    specular_mip_count: u32,
    settings: BakeSettings,
    _baked: IblTextures<GpuBakeTexture>,
    cube: Mesh,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl Sky {
    /// Uploads `faces` and bakes the IBL maps.
    ///
    /// `host` supplies the render state the bake must leave untouched; it is
    /// read before the first pass and rebound after the last.
    pub fn new(
        gpu: &GpuContext,
        faces: &CubeFaces,
        settings: BakeSettings,
        host: &mut impl RenderStateHost,
    ) -> Result<Self> {
        let environment = EnvironmentMap::upload(gpu, faces)?;
        log::info!("Environment cube uploaded ({}px faces)", environment.size());

        let ambient = host.render_state();
        let mut backend = GpuBakeBackend::new(gpu, &environment, ambient);
        let baked = IblBaker::new(settings).bake(&mut backend)?;
        let restored = backend.render_state();
        debug_assert_eq!(restored, ambient);
        host.bind_render_state(restored);

        let irradiance = baked.irradiance.sampling_view("IBL Irradiance View");
        let specular = baked.specular.sampling_view("IBL Specular View");
        let brdf_lut = baked.brdf_lut.sampling_view("IBL BRDF LUT View");

        let cube = Mesh::cube(gpu)?;
        let (pipeline, uniform_buffer, bind_group) = Self::create_pipeline(gpu, &environment);

        Ok(Self {
            environment,
            irradiance,
            specular,
            brdf_lut,
            specular_mip_count: baked.specular_mip_count,
            settings,
            _baked: baked,
            cube,
            pipeline,
            uniform_buffer,
            bind_group,
        })
    }

    fn create_pipeline(
        gpu: &GpuContext,
        environment: &EnvironmentMap,
    ) -> (wgpu::RenderPipeline, wgpu::Buffer, wgpu::BindGroup) {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sky Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/sky.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Sky Uniforms"),
            size: std::mem::size_of::<SkyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Sky Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Sky Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&environment.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&environment.sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sky Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sky Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_sky"),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_sky"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            // The camera sits inside the cube, so keep the inner faces.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Cw,
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        (pipeline, uniform_buffer, bind_group)
    }

    /// Diffuse irradiance cube (one mip).
    pub fn irradiance(&self) -> &wgpu::TextureView {
        &self.irradiance
    }

    /// Prefiltered specular cube; mip `i` holds roughness `i / (count - 1)`.
    pub fn specular(&self) -> &wgpu::TextureView {
        &self.specular
    }

    /// Split-sum BRDF table indexed by `(n.v, roughness)`.
    pub fn brdf_lut(&self) -> &wgpu::TextureView {
        &self.brdf_lut
    }

    /// Number of mips actually allocated in the specular cube.
    pub fn specular_mip_count(&self) -> u32 {
        self.specular_mip_count
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    pub fn environment(&self) -> &EnvironmentMap {
        &self.environment
    }

    /// Uploads the camera rotation for this frame's sky draw.
    pub fn prepare(&self, gpu: &GpuContext, camera: &Camera) {
        let uniforms = SkyUniforms {
            view_projection: (camera.projection() * camera.rotation_only_view()).to_cols_array_2d(),
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Draws the sky. Call after opaque geometry so depth rejects covered pixels.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        self.cube.draw(pass);
    }
}
