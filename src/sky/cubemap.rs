//! Environment cube faces: loading, validation and upload.
//!
//! Faces are always ordered +X, -X, +Y, -Y, +Z, -Z, which is also the array
//! layer order of a wgpu cube texture.

use std::path::Path;

use glam::Vec3;
use image::{DynamicImage, RgbaImage};

use crate::error::SkyError;
use crate::gpu::GpuContext;

pub const FACE_COUNT: usize = 6;

/// Format of the uploaded environment cube.
pub const ENVIRONMENT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// One face of a cube map, in layer order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; FACE_COUNT] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Array layer of this face.
    pub fn index(self) -> u32 {
        self as u32
    }

    /// Unnormalized direction through texel coordinate `(u, v)` in `[0, 1]`.
    ///
    /// `u` runs right and `v` runs down the face image. Matches the cube
    /// sampling convention used by wgpu and by `ibl.wgsl`.
    pub fn direction(self, u: f32, v: f32) -> Vec3 {
        let s = 2.0 * u - 1.0;
        let t = 2.0 * v - 1.0;
        match self {
            CubeFace::PositiveX => Vec3::new(1.0, -t, -s),
            CubeFace::NegativeX => Vec3::new(-1.0, -t, s),
            CubeFace::PositiveY => Vec3::new(s, 1.0, t),
            CubeFace::NegativeY => Vec3::new(s, -1.0, -t),
            CubeFace::PositiveZ => Vec3::new(s, -t, 1.0),
            CubeFace::NegativeZ => Vec3::new(-s, -t, -1.0),
        }
    }
}

/// Six validated, equally sized, square RGBA faces.
#[derive(Clone, Debug)]
pub struct CubeFaces {
    size: u32,
    faces: [RgbaImage; FACE_COUNT],
}

impl CubeFaces {
    /// Builds a cube from six independent images.
    ///
    /// All faces must share one color type and one square, non-zero size.
    pub fn from_images(images: [DynamicImage; FACE_COUNT]) -> Result<Self, SkyError> {
        let size = validate_faces(&images)?;
        Ok(Self {
            size,
            faces: images.map(|image| image.to_rgba8()),
        })
    }

    /// Loads six face files in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn from_files<P: AsRef<Path>>(paths: &[P; FACE_COUNT]) -> Result<Self, SkyError> {
        let [px, nx, py, ny, pz, nz] = paths;
        Self::from_images([
            open_face(px.as_ref())?,
            open_face(nx.as_ref())?,
            open_face(py.as_ref())?,
            open_face(ny.as_ref())?,
            open_face(pz.as_ref())?,
            open_face(nz.as_ref())?,
        ])
    }

    /// Splits a single image holding all six faces stacked top to bottom.
    pub fn from_strip(strip: &DynamicImage) -> Result<Self, SkyError> {
        let (width, height) = (strip.width(), strip.height());
        if width == 0 || height != width * FACE_COUNT as u32 {
            return Err(SkyError::InvalidStrip { width, height });
        }
        let images = std::array::from_fn(|i| strip.crop_imm(0, i as u32 * width, width, width));
        Self::from_images(images)
    }

    pub fn from_strip_file(path: impl AsRef<Path>) -> Result<Self, SkyError> {
        Self::from_strip(&open_face(path.as_ref())?)
    }

    /// A procedural sky: zenith-to-horizon gradient, darker ground, and a
    /// soft sun toward `sun_direction`.
    pub fn gradient(size: u32, sun_direction: Vec3) -> Result<Self, SkyError> {
        if size == 0 {
            return Err(SkyError::ZeroSized);
        }
        const ZENITH: Vec3 = Vec3::new(0.10, 0.22, 0.55);
        const HORIZON: Vec3 = Vec3::new(0.65, 0.72, 0.80);
        const GROUND: Vec3 = Vec3::new(0.12, 0.10, 0.09);
        let sun = sun_direction.normalize_or(Vec3::Y);

        let faces = CubeFace::ALL.map(|face| {
            RgbaImage::from_fn(size, size, |x, y| {
                let u = (x as f32 + 0.5) / size as f32;
                let v = (y as f32 + 0.5) / size as f32;
                let dir = face.direction(u, v).normalize();
                let mut color = if dir.y >= 0.0 {
                    HORIZON.lerp(ZENITH, dir.y.sqrt())
                } else {
                    HORIZON.lerp(GROUND, (-dir.y).sqrt())
                };
                color += Vec3::splat(dir.dot(sun).max(0.0).powf(64.0) * 2.0);
                let rgb = color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
                image::Rgba([rgb.x as u8, rgb.y as u8, rgb.z as u8, 255])
            })
        });
        Ok(Self { size, faces })
    }

    /// Edge length of every face in texels.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn face(&self, face: CubeFace) -> &RgbaImage {
        &self.faces[face.index() as usize]
    }

    /// All faces' texels concatenated in layer order.
    pub fn layer_major_bytes(&self) -> Vec<u8> {
        self.faces
            .iter()
            .flat_map(|face| face.as_raw().iter().copied())
            .collect()
    }
}

fn open_face(path: &Path) -> Result<DynamicImage, SkyError> {
    image::open(path).map_err(|source| SkyError::FaceLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Checks six images for a shared color type and a shared square, non-zero size.
///
/// Returns the face size.
pub fn validate_faces(images: &[DynamicImage; FACE_COUNT]) -> Result<u32, SkyError> {
    let expected_color = images[0].color();
    let expected_size = images[0].width();

    for (face, image) in images.iter().enumerate() {
        let (width, height) = (image.width(), image.height());
        if image.color() != expected_color {
            return Err(SkyError::FaceFormatMismatch {
                face,
                expected: expected_color,
                actual: image.color(),
            });
        }
        if width == 0 || height == 0 {
            return Err(SkyError::ZeroSized);
        }
        if width != height {
            return Err(SkyError::NonSquareFace {
                face,
                width,
                height,
            });
        }
        if width != expected_size {
            return Err(SkyError::FaceSizeMismatch {
                face,
                expected: expected_size,
                actual: width,
            });
        }
    }
    Ok(expected_size)
}

/// Fails when `size` is above the device's 2D texture limit `max`.
pub fn check_face_limit(size: u32, max: u32) -> Result<(), SkyError> {
    if size > max {
        return Err(SkyError::FaceTooLarge { size, max });
    }
    Ok(())
}

/// The base environment cube on the GPU.
pub struct EnvironmentMap {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    size: u32,
}

impl EnvironmentMap {
    /// Uploads the six faces as one cube texture.
    ///
    /// Faces wider than the device allows fail before any GPU call; anything
    /// else the device rejects is caught in an error scope.
    pub fn upload(gpu: &GpuContext, faces: &CubeFaces) -> Result<Self, SkyError> {
        use wgpu::util::DeviceExt;

        check_face_limit(faces.size(), gpu.max_texture_size())?;

        let (texture, error) = gpu.capture_errors(|| {
            gpu.device.create_texture_with_data(
                &gpu.queue,
                &wgpu::TextureDescriptor {
                    label: Some("Environment Cube"),
                    size: wgpu::Extent3d {
                        width: faces.size(),
                        height: faces.size(),
                        depth_or_array_layers: FACE_COUNT as u32,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: ENVIRONMENT_FORMAT,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &faces.layer_major_bytes(),
            )
        });
        if let Some(error) = error {
            return Err(SkyError::Device(format!("environment cube upload: {error}")));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Environment Cube View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(FACE_COUNT as u32),
            ..Default::default()
        });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            size: faces.size(),
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Rgba};

    fn solid(size: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(size, size, Rgba([value, 0, 0, 255])))
    }

    fn six(size: u32) -> [DynamicImage; FACE_COUNT] {
        std::array::from_fn(|i| solid(size, i as u8 * 40))
    }

    #[test]
    fn accepts_matching_faces() {
        let cube = CubeFaces::from_images(six(8)).unwrap();
        assert_eq!(cube.size(), 8);
        assert_eq!(cube.face(CubeFace::NegativeY).get_pixel(0, 0)[0], 120);
        assert_eq!(cube.layer_major_bytes().len(), 8 * 8 * 4 * FACE_COUNT);
    }

    #[test]
    fn faces_above_device_limit_are_rejected() {
        assert!(check_face_limit(2048, 2048).is_ok());
        match check_face_limit(4096, 2048) {
            Err(SkyError::FaceTooLarge { size, max }) => {
                assert_eq!(size, 4096);
                assert_eq!(max, 2048);
            }
            other => panic!("expected FaceTooLarge, got {other:?}"),
        }

        let cube = CubeFaces::gradient(16, Vec3::Y).unwrap();
        assert!(matches!(
            check_face_limit(cube.size(), 8),
            Err(SkyError::FaceTooLarge { size: 16, max: 8 })
        ));
    }

    #[test]
    fn rejects_mismatched_size() {
        let mut faces = six(8);
        faces[4] = solid(16, 0);
        match CubeFaces::from_images(faces) {
            Err(SkyError::FaceSizeMismatch {
                face: 4,
                expected: 8,
                actual: 16,
            }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_mismatched_format() {
        let mut faces = six(8);
        faces[2] = DynamicImage::ImageLuma8(GrayImage::new(8, 8));
        assert!(matches!(
            CubeFaces::from_images(faces),
            Err(SkyError::FaceFormatMismatch { face: 2, .. })
        ));
    }

    #[test]
    fn rejects_non_square_and_empty_faces() {
        let mut faces = six(8);
        faces[1] = DynamicImage::ImageRgba8(RgbaImage::new(8, 4));
        assert!(matches!(
            CubeFaces::from_images(faces),
            Err(SkyError::NonSquareFace { face: 1, .. })
        ));

        assert!(matches!(
            CubeFaces::from_images(six(0)),
            Err(SkyError::ZeroSized)
        ));
    }

    #[test]
    fn strip_splits_into_ordered_faces() {
        let strip = RgbaImage::from_fn(4, 24, |_, y| Rgba([(y / 4) as u8, 0, 0, 255]));
        let cube = CubeFaces::from_strip(&DynamicImage::ImageRgba8(strip)).unwrap();
        assert_eq!(cube.size(), 4);
        for face in CubeFace::ALL {
            assert_eq!(cube.face(face).get_pixel(3, 3)[0], face.index() as u8);
        }
    }

    #[test]
    fn strip_with_wrong_aspect_is_rejected() {
        let strip = DynamicImage::ImageRgba8(RgbaImage::new(4, 20));
        assert!(matches!(
            CubeFaces::from_strip(&strip),
            Err(SkyError::InvalidStrip {
                width: 4,
                height: 20
            })
        ));
    }

    #[test]
    fn face_centers_point_along_axes() {
        let expected = [Vec3::X, -Vec3::X, Vec3::Y, -Vec3::Y, Vec3::Z, -Vec3::Z];
        for (face, axis) in CubeFace::ALL.into_iter().zip(expected) {
            assert_eq!(face.direction(0.5, 0.5), axis);
        }
        // Top of the +Z face leans up.
        assert!(CubeFace::PositiveZ.direction(0.5, 0.0).y > 0.0);
    }

    #[test]
    fn gradient_sky_is_brighter_above() {
        let cube = CubeFaces::gradient(16, Vec3::new(-1.0, 1.0, -1.0)).unwrap();
        let up = cube.face(CubeFace::PositiveY).get_pixel(8, 8);
        let down = cube.face(CubeFace::NegativeY).get_pixel(8, 8);
        assert!(up[2] > down[2]);
        assert!(CubeFaces::gradient(0, Vec3::Y).is_err());
    }
}
