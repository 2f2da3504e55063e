//! Error types for scene construction, the IBL bake, and configuration.

use std::path::PathBuf;

use crate::sky::TargetId;

/// Errors raised while assembling the environment cubemap or baking IBL maps.
///
/// Every variant is fatal for the environment: a partially baked cubemap
/// lights the scene wrongly without any visible failure, so the bake stops at
/// the first error instead.
#[derive(Debug, thiserror::Error)]
pub enum SkyError {
    #[error("cube faces must not be zero-sized")]
    ZeroSized,

    #[error("cube face {face} is {width}x{height}; faces must be square")]
    NonSquareFace { face: usize, width: u32, height: u32 },

    #[error("cube face {face} is {actual}x{actual}, expected {expected}x{expected}")]
    FaceSizeMismatch {
        face: usize,
        expected: u32,
        actual: u32,
    },

    #[error("cube face {face} has color type {actual:?}, expected {expected:?}")]
    FaceFormatMismatch {
        face: usize,
        expected: image::ColorType,
        actual: image::ColorType,
    },

    #[error("strip image is {width}x{height}; expected six square faces stacked vertically")]
    InvalidStrip { width: u32, height: u32 },

    #[error("failed to load cube face {path:?}: {source}")]
    FaceLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{size}px cube faces exceed the device limit of {max}px")]
    FaceTooLarge { size: u32, max: u32 },

    #[error("bake draw issued with no color target bound")]
    NoTarget,

    #[error("render target {0:?} is not owned by this bake backend")]
    UnknownTarget(TargetId),

    #[error("graphics device error during IBL bake: {0}")]
    Device(String),
}

/// Errors raised while parsing or validating a [`Config`](crate::Config).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level error for device bootstrap, resource creation and rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    RequestAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("surface does not support any texture format")]
    NoSurfaceFormat,

    #[error("mesh {0:?} has no vertices or no indices")]
    EmptyMesh(String),

    #[error("texture {0:?} is zero-sized")]
    EmptyTexture(String),

    #[error("texture data for {label:?} is {actual} bytes, expected {expected}")]
    TextureSize {
        label: String,
        expected: usize,
        actual: usize,
    },

    #[error("texture {label:?} is {width}x{height}, above the device limit of {max}px")]
    TextureTooLarge {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("failed to create texture {label:?}: {message}")]
    TextureCreate { label: String, message: String },

    #[error("failed to load texture {path:?}: {source}")]
    TextureLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: usize },

    #[error(transparent)]
    Sky(#[from] SkyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
}

pub type Result<T> = std::result::Result<T, RenderError>;
