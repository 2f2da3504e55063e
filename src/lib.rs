//! # Vesper
//!
//! **A real-time 3D scene renderer with a lazily cached transform hierarchy
//! and baked image-based lighting.**
//!
//! Entities live in a [`SceneGraph`]; each carries a [`Transform`] whose world
//! matrix is recomputed only when it or an ancestor changed. A [`Sky`] bakes
//! irradiance, prefiltered specular and BRDF lookup maps from an environment
//! cube once at startup, and every PBR draw samples them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vesper::*;
//!
//! fn main() -> Result<()> {
//!     run(|ctx| {
//!         let faces = CubeFaces::gradient(128, Vec3::new(0.3, 0.6, 0.4))?;
//!         let sky = Sky::new(ctx.gpu, &faces, BakeSettings::default(), ctx.renderer)?;
//!
//!         let mut scene = Scene::new();
//!         let sphere = scene.add_mesh(Mesh::sphere(ctx.gpu, 32, 16)?);
//!         let white = scene.add_texture(Texture::solid(ctx.gpu, [255; 4], TextureKind::Color, "white")?);
//!         let flat = scene.add_texture(Texture::solid(
//!             ctx.gpu,
//!             texture::procedural::FLAT_NORMAL,
//!             TextureKind::Data,
//!             "flat",
//!         )?);
//!         let material = scene.add_material(
//!             ctx.gpu,
//!             ctx.renderer.material_layout(),
//!             Material::new(Shading::Pbr, white, flat, white, white),
//!         )?;
//!         scene.spawn_entity(Transform::new(), sphere, material)?;
//!
//!         let mut camera = Camera::new(Vec3::new(0.0, 0.0, -5.0), ctx.gpu.aspect());
//!         let lights = LightSet::generate(8, &mut rand::thread_rng());
//!
//!         Ok(move |frame: &mut Frame| {
//!             camera.update(frame.input, frame.dt);
//!             frame.renderer.render(frame.gpu, &mut scene, &camera, &lights, &sky, |_| {})
//!         })
//!     })
//! }
//! ```

mod app;
mod camera;
mod config;
mod ecs;
mod error;
mod gpu;
mod hierarchy;
mod input;
mod lights;
mod material;
mod mesh;
mod renderer;
mod scene;
pub mod sky;
pub mod texture;
mod transform;

pub use app::{AppConfig, Frame, SetupContext, run, run_with_config};
pub use camera::{Camera, Lens};
pub use config::{CameraConfig, Config, LightsConfig, SkySource, WindowConfig};
pub use ecs::{MaterialId, MeshId, Renderable, TextureId};
pub use error::{ConfigError, RenderError, Result, SkyError};
pub use gpu::{DEPTH_FORMAT, GpuContext};
pub use hierarchy::SceneGraph;
pub use input::Input;
pub use lights::{FIXED_LIGHT_COUNT, GpuLight, Light, LightKind, LightMarker, LightSet};
pub use material::{GpuMaterial, Material, MaterialLayout, MaterialTextures, MaterialUniforms, Shading};
pub use mesh::{Mesh, MeshData, Vertex3d};
pub use renderer::{FrameUniforms, ModelUniforms, Renderer};
pub use scene::Scene;
pub use sky::{BakeSettings, CubeFace, CubeFaces, IblBaker, Sky};
pub use texture::{Texture, TextureKind};
pub use transform::Transform;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

pub use hecs::{Entity, World};
