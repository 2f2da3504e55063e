//! 2D material textures and procedural image generators.

use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::{RenderError, Result};
use crate::gpu::GpuContext;

/// How texel values are interpreted by the shaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    /// sRGB-encoded color (albedo). Sampling returns linear values.
    Color,
    /// Linear data (normals, roughness, metalness).
    Data,
}

impl TextureKind {
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            Self::Color => wgpu::TextureFormat::Rgba8UnormSrgb,
            Self::Data => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

/// An RGBA8 texture bound through a material.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub kind: TextureKind,
}

impl Texture {
    /// Uploads tightly packed RGBA8 data.
    ///
    /// Zero dimensions, dimensions above the device limit and a byte count
    /// other than `width * height * 4` are construction errors.
    pub fn from_rgba(
        gpu: &GpuContext,
        data: &[u8],
        width: u32,
        height: u32,
        kind: TextureKind,
        label: &str,
    ) -> Result<Self> {
        use wgpu::util::DeviceExt;

        check_rgba_upload(label, data.len(), width, height, gpu.max_texture_size())?;

        let (texture, error) = gpu.capture_errors(|| {
            gpu.device.create_texture_with_data(
                &gpu.queue,
                &wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: kind.format(),
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                data,
            )
        });
        if let Some(error) = error {
            return Err(RenderError::TextureCreate {
                label: label.to_string(),
                message: error.to_string(),
            });
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            width,
            height,
            kind,
        })
    }

    pub fn from_image(
        gpu: &GpuContext,
        image: &RgbaImage,
        kind: TextureKind,
        label: &str,
    ) -> Result<Self> {
        Self::from_rgba(gpu, image.as_raw(), image.width(), image.height(), kind, label)
    }

    /// Loads any format the `image` crate decodes.
    pub fn from_file(gpu: &GpuContext, path: impl AsRef<Path>, kind: TextureKind) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|source| RenderError::TextureLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        Self::from_image(gpu, &image, kind, &path.display().to_string())
    }

    /// A 1x1 texture of one value.
    pub fn solid(gpu: &GpuContext, rgba: [u8; 4], kind: TextureKind, label: &str) -> Result<Self> {
        Self::from_rgba(gpu, &rgba, 1, 1, kind, label)
    }
}

/// Rejects uploads the device would refuse before any GPU call is made.
fn check_rgba_upload(label: &str, bytes: usize, width: u32, height: u32, max: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(RenderError::EmptyTexture(label.to_string()));
    }
    if width > max || height > max {
        return Err(RenderError::TextureTooLarge {
            label: label.to_string(),
            width,
            height,
            max,
        });
    }
    let expected = width as usize * height as usize * 4;
    if bytes != expected {
        return Err(RenderError::TextureSize {
            label: label.to_string(),
            expected,
            actual: bytes,
        });
    }
    Ok(())
}

/// CPU-side image generators for scenes that ship no texture assets.
pub mod procedural {
    use super::*;

    /// Normal-map texel for a surface facing straight out.
    pub const FLAT_NORMAL: [u8; 4] = [128, 128, 255, 255];

    /// Square grid of alternating cells.
    pub fn checker(size: u32, cells: u32, a: [u8; 3], b: [u8; 3]) -> RgbaImage {
        let cell = (size / cells.max(1)).max(1);
        RgbaImage::from_fn(size, size, |x, y| {
            let [r, g, bl] = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
            Rgba([r, g, bl, 255])
        })
    }

    /// Per-texel jitter of `base` by up to `variation` in each channel.
    pub fn noise(size: u32, seed: u32, base: [u8; 3], variation: u8) -> RgbaImage {
        let span = u32::from(variation) * 2 + 1;
        RgbaImage::from_fn(size, size, |x, y| {
            let offset = (hash(x, y, seed) % span) as i32 - i32::from(variation);
            let [r, g, b] = base.map(|c| (i32::from(c) + offset).clamp(0, 255) as u8);
            Rgba([r, g, b, 255])
        })
    }

    /// Tangent-space normal map of a sinusoidal egg-crate surface.
    ///
    /// `bumps` is the number of periods across the image; `strength` scales
    /// the slope.
    pub fn bumps(size: u32, bumps: u32, strength: f32) -> RgbaImage {
        let frequency = std::f32::consts::TAU * bumps as f32 / size.max(1) as f32;
        RgbaImage::from_fn(size, size, |x, y| {
            let (sx, cx) = (x as f32 * frequency).sin_cos();
            let (sy, cy) = (y as f32 * frequency).sin_cos();
            let normal = glam::Vec3::new(
                -cx * sy * strength,
                -sx * cy * strength,
                1.0,
            )
            .normalize();
            let [r, g, b] = normal
                .to_array()
                .map(|c| ((c * 0.5 + 0.5) * 255.0).round() as u8);
            Rgba([r, g, b, 255])
        })
    }

    pub fn solid(size: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba(rgba))
    }

    fn hash(x: u32, y: u32, seed: u32) -> u32 {
        let mut h = seed;
        h = h.wrapping_add(x.wrapping_mul(374_761_393));
        h = h.wrapping_add(y.wrapping_mul(668_265_263));
        h ^= h >> 13;
        h = h.wrapping_mul(1_274_126_177);
        h ^ (h >> 16)
    }
}

#[cfg(test)]
mod tests {
    use super::procedural::*;
    use super::check_rgba_upload;
    use crate::error::RenderError;

    #[test]
    fn uploads_above_the_device_limit_are_rejected() {
        let data = vec![0u8; 8 * 4 * 4];
        assert!(check_rgba_upload("ok", data.len(), 8, 4, 8).is_ok());

        match check_rgba_upload("wide", data.len(), 8, 4, 4) {
            Err(RenderError::TextureTooLarge {
                width: 8,
                height: 4,
                max: 4,
                ..
            }) => {}
            other => panic!("expected TextureTooLarge, got {other:?}"),
        }
        assert!(matches!(
            check_rgba_upload("tall", 4 * 16 * 4, 4, 16, 8),
            Err(RenderError::TextureTooLarge { .. })
        ));
    }

    #[test]
    fn empty_or_short_uploads_are_rejected() {
        assert!(matches!(
            check_rgba_upload("empty", 0, 0, 4, 8),
            Err(RenderError::EmptyTexture(_))
        ));
        assert!(matches!(
            check_rgba_upload("short", 10, 2, 2, 8),
            Err(RenderError::TextureSize {
                expected: 16,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn checker_alternates_cells() {
        let image = checker(8, 2, [255, 0, 0], [0, 0, 255]);
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(image.get_pixel(4, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(4, 4).0, [255, 0, 0, 255]);
    }

    #[test]
    fn noise_stays_within_variation_and_is_seeded() {
        let a = noise(16, 7, [100, 100, 100], 10);
        for pixel in a.pixels() {
            assert!((90..=110).contains(&pixel[0]));
        }
        assert_eq!(a, noise(16, 7, [100, 100, 100], 10));
        assert_ne!(a, noise(16, 8, [100, 100, 100], 10));
    }

    #[test]
    fn bump_normals_point_out_of_the_surface() {
        let image = bumps(32, 4, 0.8);
        for pixel in image.pixels() {
            assert!(pixel[2] > 128);
        }
        let flat = bumps(32, 4, 0.0);
        assert!(flat.pixels().all(|p| p.0 == FLAT_NORMAL));
    }
}
