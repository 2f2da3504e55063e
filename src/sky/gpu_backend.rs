//! wgpu implementation of [`BakeBackend`].
//!
//! Every bake target is an `Rgba16Float` texture so the convolutions keep
//! their dynamic range. Draws are recorded into their own command buffer and
//! submitted immediately; the baker decides when to wait on them.

use std::collections::HashMap;

use super::bake::{BakeBackend, BakeProgram, BakeUniforms};
use super::cubemap::{CubeFace, EnvironmentMap, FACE_COUNT};
use super::state::{RenderState, RenderStateHost, TargetId};
use crate::error::SkyError;
use crate::gpu::GpuContext;

/// Storage format of the baked IBL textures.
pub const IBL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// A texture produced by the GPU bake.
#[derive(Debug)]
pub struct GpuBakeTexture {
    pub(crate) texture: wgpu::Texture,
    size: u32,
    mip_levels: u32,
    layers: u32,
}

impl GpuBakeTexture {
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Sampling view over the whole texture: a cube for cube targets, 2D otherwise.
    pub fn sampling_view(&self, label: &str) -> wgpu::TextureView {
        let dimension = if self.layers == FACE_COUNT as u32 {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        };
        self.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(dimension),
            array_layer_count: Some(self.layers),
            mip_level_count: Some(self.mip_levels),
            ..Default::default()
        })
    }
}

/// Bakes on the device behind a [`GpuContext`].
pub struct GpuBakeBackend<'a> {
    gpu: &'a GpuContext,
    state: RenderState,
    targets: HashMap<TargetId, wgpu::TextureView>,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    irradiance_pipeline: wgpu::RenderPipeline,
    specular_pipeline: wgpu::RenderPipeline,
    brdf_pipeline: wgpu::RenderPipeline,
}

impl<'a> GpuBakeBackend<'a> {
    /// Builds the bake pipelines around `environment`.
    ///
    /// `ambient` is the state the backend reports before anything is bound;
    /// the bake hands it back when done.
    pub fn new(gpu: &'a GpuContext, environment: &EnvironmentMap, ambient: RenderState) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("IBL Bake Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/ibl.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("IBL Bake Uniforms"),
            size: std::mem::size_of::<BakeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("IBL Bake Bind Group Layout"),
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
            label: Some("IBL Bake Bind Group"),
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
            label: Some("IBL Bake Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str, fragment: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(fragment),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: IBL_FORMAT,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        Self {
            gpu,
            state: ambient,
            targets: HashMap::new(),
            irradiance_pipeline: pipeline("IBL Irradiance Pipeline", "fs_irradiance"),
            specular_pipeline: pipeline("IBL Specular Pipeline", "fs_specular"),
            brdf_pipeline: pipeline("IBL BRDF Pipeline", "fs_brdf"),
            uniform_buffer,
            bind_group,
        }
    }

    /// Runs `f` inside validation and out-of-memory error scopes.
    fn checked<T>(&self, what: &str, f: impl FnOnce() -> T) -> Result<T, SkyError> {
        match self.gpu.capture_errors(f) {
            (_, Some(error)) => Err(SkyError::Device(format!("{what}: {error}"))),
            (value, None) => Ok(value),
        }
    }

    fn create_target_texture(
        &self,
        label: &str,
        size: u32,
        mip_levels: u32,
        layers: u32,
    ) -> Result<GpuBakeTexture, SkyError> {
        if size == 0 {
            return Err(SkyError::ZeroSized);
        }
        let texture = self.checked(label, || {
            self.gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: layers,
                },
                mip_level_count: mip_levels,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: IBL_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;
        Ok(GpuBakeTexture {
            texture,
            size,
            mip_levels,
            layers,
        })
    }

    /// Creates a single-subresource view, clears it and registers it.
    fn register_target(
        &mut self,
        texture: &GpuBakeTexture,
        layer: u32,
        mip: u32,
    ) -> Result<TargetId, SkyError> {
        if layer >= texture.layers || mip >= texture.mip_levels {
            return Err(SkyError::Device(format!(
                "target layer {layer} mip {mip} outside a {}-layer, {}-mip texture",
                texture.layers, texture.mip_levels
            )));
        }

        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("IBL Bake Target"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        });

        self.checked("clear bake target", || {
            let mut encoder =
                self.gpu
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("IBL Clear Encoder"),
                    });
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("IBL Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.gpu.queue.submit(Some(encoder.finish()));
        })?;

        let id = TargetId::next();
        self.targets.insert(id, view);
        Ok(id)
    }
}

impl RenderStateHost for GpuBakeBackend<'_> {
    fn render_state(&self) -> RenderState {
        self.state
    }

    fn bind_render_state(&mut self, state: RenderState) {
        self.state = state;
    }
}

impl BakeBackend for GpuBakeBackend<'_> {
    type Texture = GpuBakeTexture;

    fn create_cube_target(
        &mut self,
        label: &str,
        face_size: u32,
        mip_levels: u32,
    ) -> Result<GpuBakeTexture, SkyError> {
        self.create_target_texture(label, face_size, mip_levels.max(1), FACE_COUNT as u32)
    }

    fn create_2d_target(&mut self, label: &str, size: u32) -> Result<GpuBakeTexture, SkyError> {
        self.create_target_texture(label, size, 1, 1)
    }

    fn cube_face_target(
        &mut self,
        texture: &GpuBakeTexture,
        face: CubeFace,
        mip: u32,
    ) -> Result<TargetId, SkyError> {
        self.register_target(texture, face.index(), mip)
    }

    fn texture_target(&mut self, texture: &GpuBakeTexture) -> Result<TargetId, SkyError> {
        self.register_target(texture, 0, 0)
    }

    fn draw_fullscreen(
        &mut self,
        program: BakeProgram,
        uniforms: &BakeUniforms,
    ) -> Result<(), SkyError> {
        let color = self.state.color.ok_or(SkyError::NoTarget)?;
        let view = self
            .targets
            .get(&color)
            .ok_or(SkyError::UnknownTarget(color))?;
        let pipeline = match program {
            BakeProgram::Irradiance => &self.irradiance_pipeline,
            BakeProgram::Specular => &self.specular_pipeline,
            BakeProgram::BrdfLut => &self.brdf_pipeline,
        };

        self.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        self.checked("bake draw", || {
            let mut encoder =
                self.gpu
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("IBL Bake Encoder"),
                    });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("IBL Bake Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                self.state.viewport.apply(&mut pass);
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &self.bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            self.gpu.queue.submit(Some(encoder.finish()));
        })
    }

    fn flush(&mut self) -> Result<(), SkyError> {
        self.gpu
            .flush()
            .map_err(|e| SkyError::Device(format!("flush: {e}")))
    }

    fn release_targets(&mut self) {
        self.targets.clear();
    }
}
