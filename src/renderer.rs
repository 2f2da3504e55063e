//! Per-frame orchestration: clear, entities, light markers, sky, overlay, present.
//!
//! # Bind groups
//!
//! - **Group 0** (per frame): camera, light storage buffer, IBL maps.
//! - **Group 1** (per draw): model matrices, one 256-byte-aligned slot per
//!   draw, selected with a dynamic offset.
//! - **Group 2** (per material): see [`material`](crate::material).

use std::num::NonZeroU64;

use crate::camera::Camera;
use crate::error::Result;
use crate::gpu::{DEPTH_FORMAT, GpuContext};
use crate::lights::{GpuLight, LightSet};
use crate::material::{MaterialLayout, Shading};
use crate::mesh::{Mesh, Vertex3d};
use crate::scene::Scene;
use crate::sky::{RenderState, RenderStateHost, Sky, TargetId, Viewport};

/// `@group(0) @binding(0)` in `mesh.wgsl` and `solid.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub light_count: u32,
    pub specular_mip_count: u32,
    pub _padding: [u32; 3],
}

/// One dynamic-offset slot of `@group(1)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub world: [[f32; 4]; 4],
    pub world_inverse_transpose: [[f32; 4]; 4],
    /// Emissive color of light markers; unused by material draws.
    pub color: [f32; 4],
}

const MODEL_UNIFORM_SIZE: u64 = std::mem::size_of::<ModelUniforms>() as u64;

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// What a frame does when the surface refuses to hand out a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SurfaceRecovery {
    /// The swapchain no longer matches the window.
    Reconfigure,
    /// Transient, e.g. an occluded or minimized window.
    SkipFrame,
    Fatal,
}

impl SurfaceRecovery {
    fn for_error(err: &wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => Self::Reconfigure,
            wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => Self::SkipFrame,
            _ => Self::Fatal,
        }
    }
}

/// Draws a [`Scene`] with lights and sky into the window surface.
pub struct Renderer {
    state: RenderState,
    depth_view: wgpu::TextureView,

    frame_layout: wgpu::BindGroupLayout,
    frame_buffer: wgpu::Buffer,
    light_buffer: wgpu::Buffer,
    light_capacity: usize,
    ibl_sampler: wgpu::Sampler,

    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_capacity: usize,
    model_stride: u64,

    material_layout: MaterialLayout,
    pbr_pipeline: wgpu::RenderPipeline,
    basic_pipeline: wgpu::RenderPipeline,
    marker_pipeline: wgpu::RenderPipeline,
    marker_mesh: Mesh,
}

impl Renderer {
    pub fn new(gpu: &GpuContext) -> Result<Self> {
        let device = &gpu.device;

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
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
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                cube_entry(2),
                cube_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let light_capacity = 64;
        let light_buffer = create_light_buffer(gpu, light_capacity);

        let ibl_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("IBL Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(MODEL_UNIFORM_SIZE),
                },
                count: None,
            }],
        });

        let model_stride = align_to(
            MODEL_UNIFORM_SIZE,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );
        let model_capacity = 64;
        let (model_buffer, model_bind_group) =
            create_model_slots(gpu, &model_layout, model_capacity, model_stride);

        let material_layout = MaterialLayout::new(gpu);

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });
        let solid_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Solid Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/solid.wgsl").into()),
        });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[
                &frame_layout,
                &model_layout,
                &material_layout.bind_group_layout,
            ],
            push_constant_ranges: &[],
        });
        let solid_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Solid Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout],
            push_constant_ranges: &[],
        });

        let format = gpu.config.format;
        let pbr_pipeline = create_mesh_pipeline(
            gpu,
            "PBR Pipeline",
            &mesh_layout,
            &mesh_shader,
            "vs_main",
            "fs_pbr",
            format,
        );
        let basic_pipeline = create_mesh_pipeline(
            gpu,
            "Basic Pipeline",
            &mesh_layout,
            &mesh_shader,
            "vs_main",
            "fs_basic",
            format,
        );
        let marker_pipeline = create_mesh_pipeline(
            gpu,
            "Light Marker Pipeline",
            &solid_layout,
            &solid_shader,
            "vs_solid",
            "fs_solid",
            format,
        );

        Ok(Self {
            state: RenderState::new(
                TargetId::next(),
                Some(TargetId::next()),
                Viewport::new(gpu.width(), gpu.height()),
            ),
            depth_view: create_depth_view(gpu, gpu.width(), gpu.height()),
            frame_layout,
            frame_buffer,
            light_buffer,
            light_capacity,
            ibl_sampler,
            model_layout,
            model_buffer,
            model_bind_group,
            model_capacity,
            model_stride,
            material_layout,
            pbr_pipeline,
            basic_pipeline,
            marker_pipeline,
            marker_mesh: Mesh::sphere(gpu, 16, 8)?,
        })
    }

    /// Layout materials must be created against.
    pub fn material_layout(&self) -> &MaterialLayout {
        &self.material_layout
    }

    /// Rebuilds the depth buffer and viewport after the surface was resized.
    ///
    /// The back buffer and depth buffer get fresh target ids, so any state
    /// captured before the resize no longer matches.
    pub fn post_resize(&mut self, gpu: &GpuContext, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.depth_view = create_depth_view(gpu, width, height);
        self.state = RenderState::new(
            TargetId::next(),
            Some(TargetId::next()),
            Viewport::new(width, height),
        );
        log::info!("Renderer resized to {width}x{height}");
    }

    /// Draws one frame and presents it.
    ///
    /// Order: clear, scene entities in draw order, point-light markers, sky,
    /// then `overlay` in the same pass, then present. A lost or outdated
    /// surface is reconfigured and the frame skipped.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        scene: &mut Scene,
        camera: &Camera,
        lights: &LightSet,
        sky: &Sky,
        overlay: impl FnOnce(&mut wgpu::RenderPass<'_>),
    ) -> Result<()> {
        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => match SurfaceRecovery::for_error(&err) {
                SurfaceRecovery::Reconfigure => {
                    log::warn!("Surface unusable ({err}); reconfiguring");
                    gpu.reconfigure();
                    return Ok(());
                }
                SurfaceRecovery::SkipFrame => {
                    log::warn!("Surface unavailable ({err}); skipping frame");
                    return Ok(());
                }
                SurfaceRecovery::Fatal => return Err(err.into()),
            },
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let items = scene.draw_items();
        let markers = lights.markers();

        let gpu_lights = lights.to_gpu();
        self.ensure_light_capacity(gpu, gpu_lights.len());
        if !gpu_lights.is_empty() {
            gpu.queue
                .write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&gpu_lights));
        }

        let frame_uniforms = FrameUniforms {
            view_projection: camera.view_projection().to_cols_array_2d(),
            camera_position: camera.position().to_array(),
            light_count: gpu_lights.len() as u32,
            specular_mip_count: sky.specular_mip_count(),
            _padding: [0; 3],
        };
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame_uniforms));

        let slots = items
            .iter()
            .map(|item| ModelUniforms {
                world: item.world.to_cols_array_2d(),
                world_inverse_transpose: item.world_inverse_transpose.to_cols_array_2d(),
                color: [1.0; 4],
            })
            .chain(markers.iter().map(|marker| ModelUniforms {
                world: marker.world.to_cols_array_2d(),
                world_inverse_transpose: marker.world.inverse().transpose().to_cols_array_2d(),
                color: marker.color.extend(1.0).to_array(),
            }))
            .collect::<Vec<_>>();
        self.write_model_slots(gpu, &slots);

        sky.prepare(gpu, camera);
        let frame_bind_group = self.frame_bind_group(gpu, sky);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.state.viewport.apply(&mut pass);

            let mut bound: Option<Shading> = None;
            for (slot, item) in items.iter().enumerate() {
                let (Some(mesh), Some(material)) = (
                    scene.mesh(item.renderable.mesh),
                    scene.gpu_material(item.renderable.material),
                ) else {
                    continue;
                };
                if bound != Some(material.shading) {
                    pass.set_pipeline(match material.shading {
                        Shading::Pbr => &self.pbr_pipeline,
                        Shading::Basic => &self.basic_pipeline,
                    });
                    pass.set_bind_group(0, &frame_bind_group, &[]);
                    bound = Some(material.shading);
                }
                pass.set_bind_group(1, &self.model_bind_group, &[self.slot_offset(slot)]);
                pass.set_bind_group(2, &material.bind_group, &[]);
                mesh.draw(&mut pass);
            }

            if !markers.is_empty() {
                pass.set_pipeline(&self.marker_pipeline);
                pass.set_bind_group(0, &frame_bind_group, &[]);
                for slot in items.len()..slots.len() {
                    pass.set_bind_group(1, &self.model_bind_group, &[self.slot_offset(slot)]);
                    self.marker_mesh.draw(&mut pass);
                }
            }

            sky.draw(&mut pass);
            overlay(&mut pass);
        }

        gpu.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn slot_offset(&self, slot: usize) -> u32 {
        (slot as u64 * self.model_stride) as u32
    }

    fn ensure_light_capacity(&mut self, gpu: &GpuContext, count: usize) {
        if count > self.light_capacity {
            self.light_capacity = count.next_power_of_two();
            self.light_buffer = create_light_buffer(gpu, self.light_capacity);
            log::debug!("Light buffer grown to {} lights", self.light_capacity);
        }
    }

    fn write_model_slots(&mut self, gpu: &GpuContext, slots: &[ModelUniforms]) {
        if slots.is_empty() {
            return;
        }
        if slots.len() > self.model_capacity {
            self.model_capacity = slots.len().next_power_of_two();
            let (buffer, bind_group) =
                create_model_slots(gpu, &self.model_layout, self.model_capacity, self.model_stride);
            self.model_buffer = buffer;
            self.model_bind_group = bind_group;
            log::debug!("Model buffer grown to {} slots", self.model_capacity);
        }

        let stride = self.model_stride as usize;
        let mut bytes = vec![0u8; stride * slots.len()];
        for (chunk, slot) in bytes.chunks_exact_mut(stride).zip(slots) {
            chunk[..MODEL_UNIFORM_SIZE as usize].copy_from_slice(bytemuck::bytes_of(slot));
        }
        gpu.queue.write_buffer(&self.model_buffer, 0, &bytes);
    }

    fn frame_bind_group(&self, gpu: &GpuContext, sky: &Sky) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.frame_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(sky.irradiance()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(sky.specular()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(sky.brdf_lut()),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.ibl_sampler),
                },
            ],
        })
    }
}

impl RenderStateHost for Renderer {
    fn render_state(&self) -> RenderState {
        self.state
    }

    fn bind_render_state(&mut self, state: RenderState) {
        self.state = state;
    }
}

fn cube_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::Cube,
            multisampled: false,
        },
        count: None,
    }
}

fn create_light_buffer(gpu: &GpuContext, capacity: usize) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Light Buffer"),
        size: (capacity.max(1) * std::mem::size_of::<GpuLight>()) as u64,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_model_slots(
    gpu: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    capacity: usize,
    stride: u64,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Model Uniform Slots"),
        size: capacity.max(1) as u64 * stride,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Model Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(MODEL_UNIFORM_SIZE),
            }),
        }],
    });
    (buffer, bind_group)
}

fn create_depth_view(gpu: &GpuContext, width: u32, height: u32) -> wgpu::TextureView {
    gpu.device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_mesh_pipeline(
    gpu: &GpuContext,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    vertex_entry: &str,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    gpu.device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some(vertex_entry),
                buffers: &[Vertex3d::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Cw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
}
