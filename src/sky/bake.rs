//! Image-based-lighting precomputation.
//!
//! [`IblBaker`] turns an environment cube into three textures:
//!
//! 1. an irradiance cube (diffuse convolution, one mip),
//! 2. a specular cube whose mip levels hold increasing roughness,
//! 3. a 2D BRDF lookup table.
//!
//! Each texel is produced by a full-screen triangle draw into a face (or mip,
//! or LUT) render target. The baker only sequences those draws: it talks to
//! the device through [`BakeBackend`], so the same code drives the wgpu
//! backend at runtime and a recording backend in tests.
//!
//! Every pass captures the backend's [`RenderState`] before it binds anything
//! and hands it back on exit through [`StateScope`], including when a draw
//! fails halfway. The device is flushed after every draw; large mip chains
//! made of many tiny submissions otherwise risk device timeouts.

use serde::{Deserialize, Serialize};

use super::cubemap::CubeFace;
use super::state::{RenderState, RenderStateHost, StateScope, TargetId};
use crate::error::SkyError;

/// Sizes and sampling constants for the bake.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeSettings {
    /// Edge length of the irradiance cube and of mip 0 of the specular cube.
    pub face_size: u32,
    /// Edge length of the BRDF lookup table.
    pub lut_size: u32,
    /// Number of smallest specular mips left out of the chain.
    pub mips_to_skip: u32,
    /// Azimuth step of the irradiance integral, in radians.
    pub sample_step_phi: f32,
    /// Elevation step of the irradiance integral, in radians.
    pub sample_step_theta: f32,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            face_size: 256,
            lut_size: 256,
            mips_to_skip: 3,
            sample_step_phi: 0.025,
            sample_step_theta: 0.025,
        }
    }
}

impl BakeSettings {
    pub fn specular_mip_count(&self) -> u32 {
        specular_mip_count(self.face_size, self.mips_to_skip)
    }

    fn validate(&self) -> Result<(), SkyError> {
        if self.face_size == 0 || self.lut_size == 0 {
            return Err(SkyError::ZeroSized);
        }
        Ok(())
    }
}

/// Length of the specular mip chain: `max(log2(face_size) + 1 - skip, 1)`.
pub fn specular_mip_count(face_size: u32, mips_to_skip: u32) -> u32 {
    if face_size == 0 {
        return 1;
    }
    (face_size.ilog2() + 1).saturating_sub(mips_to_skip).max(1)
}

/// Edge length of `mip` in a chain whose mip 0 is `face_size`.
pub fn mip_face_size(face_size: u32, mip: u32) -> u32 {
    face_size.checked_shr(mip).unwrap_or(0).max(1)
}

/// Roughness encoded by `mip`: 0 at mip 0, 1 at the last mip.
pub fn roughness_for_mip(mip: u32, mip_count: u32) -> f32 {
    if mip_count <= 1 {
        0.0
    } else {
        mip as f32 / (mip_count - 1) as f32
    }
}

/// Per-draw parameters, laid out to match `BakeParams` in `ibl.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BakeUniforms {
    pub face_index: u32,
    pub mip_level: u32,
    pub roughness: f32,
    pub target_size: f32,
    pub sample_step_phi: f32,
    pub sample_step_theta: f32,
    pub _padding: [f32; 2],
}

/// Which fragment program a bake draw runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BakeProgram {
    Irradiance,
    Specular,
    BrdfLut,
}

/// Device operations the bake needs.
///
/// Implementors own the render targets they hand out; a [`TargetId`] is only
/// meaningful to the backend that created it.
pub trait BakeBackend: RenderStateHost {
    type Texture;

    /// Allocates a renderable cube texture with `mip_levels` levels.
    fn create_cube_target(
        &mut self,
        label: &str,
        face_size: u32,
        mip_levels: u32,
    ) -> Result<Self::Texture, SkyError>;

    /// Allocates a renderable square 2D texture.
    fn create_2d_target(&mut self, label: &str, size: u32) -> Result<Self::Texture, SkyError>;

    /// A target over one face and mip of a cube texture, cleared to black.
    fn cube_face_target(
        &mut self,
        texture: &Self::Texture,
        face: CubeFace,
        mip: u32,
    ) -> Result<TargetId, SkyError>;

    /// A target over mip 0 of a 2D texture, cleared to black.
    fn texture_target(&mut self, texture: &Self::Texture) -> Result<TargetId, SkyError>;

    /// One full-screen triangle into the bound color target and viewport.
    fn draw_fullscreen(
        &mut self,
        program: BakeProgram,
        uniforms: &BakeUniforms,
    ) -> Result<(), SkyError>;

    /// Waits for the device to finish all submitted work.
    fn flush(&mut self) -> Result<(), SkyError>;

    /// Forgets the targets handed out so far.
    fn release_targets(&mut self) {}
}

/// The three baked resources.
#[derive(Debug)]
pub struct IblTextures<T> {
    pub irradiance: T,
    pub specular: T,
    pub brdf_lut: T,
    pub specular_mip_count: u32,
}

/// Runs the three bake passes in order.
#[derive(Clone, Copy, Debug)]
pub struct IblBaker {
    settings: BakeSettings,
}

impl IblBaker {
    pub fn new(settings: BakeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BakeSettings {
        &self.settings
    }

    /// Irradiance, then specular, then BRDF LUT. Stops at the first error.
    pub fn bake<B: BakeBackend>(&self, backend: &mut B) -> Result<IblTextures<B::Texture>, SkyError> {
        self.settings.validate()?;
        log::info!(
            "Baking IBL maps: {}px faces, {} specular mips, {}px BRDF LUT",
            self.settings.face_size,
            self.settings.specular_mip_count(),
            self.settings.lut_size
        );

        let irradiance = self.bake_irradiance(backend)?;
        let specular = self.bake_specular(backend)?;
        let brdf_lut = self.bake_brdf_lut(backend)?;

        log::info!("IBL bake finished");
        Ok(IblTextures {
            irradiance,
            specular,
            brdf_lut,
            specular_mip_count: self.settings.specular_mip_count(),
        })
    }

    /// Diffuse convolution: one draw per face into a single-mip cube.
    pub fn bake_irradiance<B: BakeBackend>(&self, backend: &mut B) -> Result<B::Texture, SkyError> {
        self.settings.validate()?;
        let size = self.settings.face_size;
        let texture = backend.create_cube_target("IBL Irradiance", size, 1)?;

        let mut scope = StateScope::new(backend);
        for face in CubeFace::ALL {
            let target = scope.cube_face_target(&texture, face, 0)?;
            scope.bind_render_state(RenderState::offscreen(target, size, size));
            scope.draw_fullscreen(BakeProgram::Irradiance, &self.uniforms(face, 0, 0.0, size))?;
            scope.flush()?;
        }
        scope.release_targets();
        log::debug!("Irradiance cube baked ({size}px)");
        Ok(texture)
    }

    /// Specular convolution: every face of every mip, roughness rising with mip.
    pub fn bake_specular<B: BakeBackend>(&self, backend: &mut B) -> Result<B::Texture, SkyError> {
        self.settings.validate()?;
        let mip_count = self.settings.specular_mip_count();
        let texture =
            backend.create_cube_target("IBL Specular", self.settings.face_size, mip_count)?;

        let mut scope = StateScope::new(backend);
        for mip in 0..mip_count {
            let size = mip_face_size(self.settings.face_size, mip);
            let roughness = roughness_for_mip(mip, mip_count);
            for face in CubeFace::ALL {
                let target = scope.cube_face_target(&texture, face, mip)?;
                scope.bind_render_state(RenderState::offscreen(target, size, size));
                scope.draw_fullscreen(
                    BakeProgram::Specular,
                    &self.uniforms(face, mip, roughness, size),
                )?;
                scope.flush()?;
            }
            log::debug!("Specular mip {mip} baked ({size}px, roughness {roughness:.3})");
        }
        scope.release_targets();
        Ok(texture)
    }

    /// Split-sum BRDF integration into a square 2D table.
    pub fn bake_brdf_lut<B: BakeBackend>(&self, backend: &mut B) -> Result<B::Texture, SkyError> {
        self.settings.validate()?;
        let size = self.settings.lut_size;
        let texture = backend.create_2d_target("IBL BRDF LUT", size)?;

        let mut scope = StateScope::new(backend);
        let target = scope.texture_target(&texture)?;
        scope.bind_render_state(RenderState::offscreen(target, size, size));
        scope.draw_fullscreen(
            BakeProgram::BrdfLut,
            &self.uniforms(CubeFace::PositiveX, 0, 0.0, size),
        )?;
        scope.flush()?;
        scope.release_targets();
        log::debug!("BRDF LUT baked ({size}px)");
        Ok(texture)
    }

    fn uniforms(&self, face: CubeFace, mip: u32, roughness: f32, size: u32) -> BakeUniforms {
        BakeUniforms {
            face_index: face.index(),
            mip_level: mip,
            roughness,
            target_size: size as f32,
            sample_step_phi: self.settings.sample_step_phi,
            sample_step_theta: self.settings.sample_step_theta,
            _padding: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::state::Viewport;
    use std::collections::HashMap;

    #[derive(Clone, Debug, PartialEq)]
    enum Event {
        Bind(RenderState),
        Draw {
            program: BakeProgram,
            face: u32,
            mip: u32,
            roughness: f32,
            viewport: Viewport,
        },
        Flush,
    }

    #[derive(Clone, Copy, Debug)]
    struct CpuTexture {
        index: usize,
        size: u32,
        mips: u32,
        layers: u32,
    }

    /// CPU stand-in for the device.
    ///
    /// New textures are filled with junk that differs between backends, so
    /// any texel the bake forgets to clear or draw shows up as a mismatch.
    struct RecordingBackend {
        state: RenderState,
        junk: f32,
        environment: [[f32; 3]; 6],
        texels: Vec<Vec<Vec<[f32; 4]>>>,
        targets: HashMap<TargetId, (usize, usize, u32)>,
        events: Vec<Event>,
        fail_on_draw: Option<usize>,
        draws: usize,
    }

    impl RecordingBackend {
        fn new(ambient: RenderState, junk: f32) -> Self {
            Self {
                state: ambient,
                junk,
                environment: std::array::from_fn(|i| [i as f32 * 0.1, 0.5, 1.0 - i as f32 * 0.1]),
                texels: Vec::new(),
                targets: HashMap::new(),
                events: Vec::new(),
                fail_on_draw: None,
                draws: 0,
            }
        }

        fn allocate(&mut self, size: u32, mips: u32, layers: u32) -> CpuTexture {
            let index = self.texels.len();
            let subresources = (0..layers)
                .flat_map(|_| 0..mips)
                .map(|mip| {
                    let edge = mip_face_size(size, mip) as usize;
                    vec![[self.junk; 4]; edge * edge]
                })
                .collect();
            self.texels.push(subresources);
            CpuTexture {
                index,
                size,
                mips,
                layers,
            }
        }

        fn register(&mut self, texture: &CpuTexture, layer: u32, mip: u32) -> Result<TargetId, SkyError> {
            if layer >= texture.layers || mip >= texture.mips {
                return Err(SkyError::Device(format!("no layer {layer} mip {mip}")));
            }
            let subresource = (layer * texture.mips + mip) as usize;
            self.texels[texture.index][subresource].fill([0.0; 4]);
            let id = TargetId::next();
            self.targets.insert(
                id,
                (texture.index, subresource, mip_face_size(texture.size, mip)),
            );
            Ok(id)
        }

        fn subresource(&self, texture: &CpuTexture, layer: u32, mip: u32) -> &[[f32; 4]] {
            &self.texels[texture.index][(layer * texture.mips + mip) as usize]
        }

        fn draw_events(&self) -> Vec<&Event> {
            self.events
                .iter()
                .filter(|e| matches!(e, Event::Draw { .. }))
                .collect()
        }
    }

    impl RenderStateHost for RecordingBackend {
        fn render_state(&self) -> RenderState {
            self.state
        }

        fn bind_render_state(&mut self, state: RenderState) {
            self.state = state;
            self.events.push(Event::Bind(state));
        }
    }

    impl BakeBackend for RecordingBackend {
        type Texture = CpuTexture;

        fn create_cube_target(
            &mut self,
            _label: &str,
            face_size: u32,
            mip_levels: u32,
        ) -> Result<CpuTexture, SkyError> {
            Ok(self.allocate(face_size, mip_levels, 6))
        }

        fn create_2d_target(&mut self, _label: &str, size: u32) -> Result<CpuTexture, SkyError> {
            Ok(self.allocate(size, 1, 1))
        }

        fn cube_face_target(
            &mut self,
            texture: &CpuTexture,
            face: CubeFace,
            mip: u32,
        ) -> Result<TargetId, SkyError> {
            self.register(texture, face.index(), mip)
        }

        fn texture_target(&mut self, texture: &CpuTexture) -> Result<TargetId, SkyError> {
            self.register(texture, 0, 0)
        }

        fn draw_fullscreen(
            &mut self,
            program: BakeProgram,
            uniforms: &BakeUniforms,
        ) -> Result<(), SkyError> {
            self.draws += 1;
            if self.fail_on_draw == Some(self.draws) {
                return Err(SkyError::Device("injected failure".into()));
            }
            let color = self.state.color.ok_or(SkyError::NoTarget)?;
            let &(texture, subresource, edge) =
                self.targets.get(&color).ok_or(SkyError::UnknownTarget(color))?;

            let viewport = self.state.viewport;
            let env = self.environment[uniforms.face_index as usize];
            let texels = &mut self.texels[texture][subresource];
            let width = (viewport.width as u32).min(edge);
            let height = (viewport.height as u32).min(edge);
            for y in 0..height {
                for x in 0..width {
                    let u = (x as f32 + 0.5) / viewport.width;
                    let v = (y as f32 + 0.5) / viewport.height;
                    texels[(y * edge + x) as usize] = match program {
                        BakeProgram::Irradiance => [env[0], env[1], env[2], 1.0],
                        BakeProgram::Specular => {
                            let k = 1.0 - uniforms.roughness * 0.5;
                            [env[0] * k, env[1] * k * u, env[2] * k * v, 1.0]
                        }
                        BakeProgram::BrdfLut => [u, v, 0.0, 1.0],
                    };
                }
            }

            self.events.push(Event::Draw {
                program,
                face: uniforms.face_index,
                mip: uniforms.mip_level,
                roughness: uniforms.roughness,
                viewport,
            });
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SkyError> {
            self.events.push(Event::Flush);
            Ok(())
        }

        fn release_targets(&mut self) {
            self.targets.clear();
        }
    }

    fn ambient() -> RenderState {
        RenderState::new(TargetId::next(), Some(TargetId::next()), Viewport::new(1280, 720))
    }

    fn small_settings() -> BakeSettings {
        BakeSettings {
            face_size: 32,
            lut_size: 16,
            ..BakeSettings::default()
        }
    }

    #[test]
    fn mip_count_follows_formula() {
        assert_eq!(specular_mip_count(64, 3), 4);
        assert_eq!(specular_mip_count(128, 3), 5);
        assert_eq!(specular_mip_count(256, 3), 6);
        assert_eq!(BakeSettings::default().specular_mip_count(), 6);

        // Never fewer than one level.
        assert_eq!(specular_mip_count(4, 3), 1);
        assert_eq!(specular_mip_count(1, 3), 1);
        assert_eq!(specular_mip_count(256, 0), 9);
    }

    #[test]
    fn mip_sizes_halve_and_roughness_spans_unit_range() {
        assert_eq!(mip_face_size(256, 0), 256);
        assert_eq!(mip_face_size(256, 5), 8);
        assert_eq!(mip_face_size(2, 4), 1);

        assert_eq!(roughness_for_mip(0, 6), 0.0);
        assert_eq!(roughness_for_mip(5, 6), 1.0);
        assert_eq!(roughness_for_mip(2, 5), 0.5);
        assert_eq!(roughness_for_mip(0, 1), 0.0);
    }

    #[test]
    fn uniforms_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<BakeUniforms>(), 32);
    }

    #[test]
    fn irradiance_draws_each_face_once() {
        let mut backend = RecordingBackend::new(ambient(), 7.0);
        IblBaker::new(small_settings())
            .bake_irradiance(&mut backend)
            .unwrap();

        let draws = backend.draw_events();
        assert_eq!(draws.len(), 6);
        for (i, event) in draws.iter().enumerate() {
            let Event::Draw {
                program,
                face,
                mip,
                viewport,
                ..
            } = event
            else {
                unreachable!()
            };
            assert_eq!(*program, BakeProgram::Irradiance);
            assert_eq!(*face, i as u32);
            assert_eq!(*mip, 0);
            assert_eq!(*viewport, Viewport::square(32));
        }
    }

    #[test]
    fn specular_walks_mips_with_shrinking_viewports() {
        let settings = small_settings();
        let mut backend = RecordingBackend::new(ambient(), 7.0);
        IblBaker::new(settings).bake_specular(&mut backend).unwrap();

        let mip_count = settings.specular_mip_count();
        assert_eq!(mip_count, 3);
        let draws = backend.draw_events();
        assert_eq!(draws.len(), 6 * mip_count as usize);

        for (i, event) in draws.iter().enumerate() {
            let Event::Draw {
                mip,
                face,
                roughness,
                viewport,
                ..
            } = event
            else {
                unreachable!()
            };
            let expected_mip = (i / 6) as u32;
            assert_eq!(*mip, expected_mip);
            assert_eq!(*face, (i % 6) as u32);
            assert_eq!(*roughness, roughness_for_mip(expected_mip, mip_count));
            assert_eq!(*viewport, Viewport::square(32 >> expected_mip));
        }
    }

    #[test]
    fn every_draw_is_followed_by_a_flush() {
        let mut backend = RecordingBackend::new(ambient(), 7.0);
        IblBaker::new(small_settings()).bake(&mut backend).unwrap();

        let mut draws = 0;
        for pair in backend.events.windows(2) {
            if let Event::Draw { .. } = pair[0] {
                draws += 1;
                assert_eq!(pair[1], Event::Flush);
            }
        }
        // 6 irradiance + 18 specular + 1 LUT.
        assert_eq!(draws, 25);
    }

    #[test]
    fn each_pass_restores_render_state() {
        let before = ambient();
        let mut backend = RecordingBackend::new(before, 7.0);
        let baker = IblBaker::new(small_settings());

        baker.bake_irradiance(&mut backend).unwrap();
        assert_eq!(backend.render_state(), before);
        assert_eq!(backend.events.last(), Some(&Event::Bind(before)));

        baker.bake_specular(&mut backend).unwrap();
        assert_eq!(backend.render_state(), before);

        baker.bake_brdf_lut(&mut backend).unwrap();
        assert_eq!(backend.render_state(), before);
        assert_eq!(backend.events.last(), Some(&Event::Bind(before)));
    }

    #[test]
    fn failed_draw_stops_bake_and_restores_state() {
        let before = ambient();
        let mut backend = RecordingBackend::new(before, 7.0);
        // Third specular draw, after the six irradiance draws.
        backend.fail_on_draw = Some(9);

        let result = IblBaker::new(small_settings()).bake(&mut backend);
        assert!(matches!(result, Err(SkyError::Device(_))));
        assert_eq!(backend.render_state(), before);
        assert_eq!(backend.draws, 9);
    }

    #[test]
    fn bake_is_deterministic_across_runs() {
        let settings = small_settings();
        let baker = IblBaker::new(settings);

        let mut first = RecordingBackend::new(ambient(), 3.0);
        let a = baker.bake(&mut first).unwrap();
        let mut second = RecordingBackend::new(ambient(), -11.0);
        let b = baker.bake(&mut second).unwrap();

        for face in CubeFace::ALL {
            let layer = face.index();
            assert_eq!(
                first.subresource(&a.irradiance, layer, 0),
                second.subresource(&b.irradiance, layer, 0)
            );
            for mip in 0..a.specular_mip_count {
                let texels = first.subresource(&a.specular, layer, mip);
                assert_eq!(texels, second.subresource(&b.specular, layer, mip));
                assert!(texels.iter().all(|t| t[0] != 3.0));
            }
        }
        assert_eq!(
            first.subresource(&a.brdf_lut, 0, 0),
            second.subresource(&b.brdf_lut, 0, 0)
        );
    }

    #[test]
    fn zero_sized_settings_are_rejected_before_any_work() {
        let mut backend = RecordingBackend::new(ambient(), 0.0);
        let settings = BakeSettings {
            face_size: 0,
            ..BakeSettings::default()
        };
        assert!(matches!(
            IblBaker::new(settings).bake(&mut backend),
            Err(SkyError::ZeroSized)
        ));
        assert!(backend.events.is_empty());
        assert!(backend.texels.is_empty());
    }

    #[test]
    fn draw_without_target_fails() {
        let mut backend = RecordingBackend::new(ambient(), 0.0);
        backend.bind_render_state(RenderState {
            color: None,
            depth: None,
            viewport: Viewport::square(4),
        });
        let uniforms = IblBaker::new(small_settings()).uniforms(CubeFace::PositiveX, 0, 0.0, 4);
        assert!(matches!(
            backend.draw_fullscreen(BakeProgram::BrdfLut, &uniforms),
            Err(SkyError::NoTarget)
        ));
    }
}
