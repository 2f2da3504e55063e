//! Light records and the generated light set.

use glam::{Mat4, Vec3};
use rand::Rng;

/// Shader-side light type tags; must match `mesh.wgsl`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

/// One light. Which fields matter depends on [`kind`](Self::kind):
/// `direction` for directional and spot lights, `position` and `range` for
/// point and spot lights, `spot_falloff` for spot lights only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub direction: Vec3,
    pub position: Vec3,
    pub range: f32,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    pub spot_falloff: f32,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            direction: direction.normalize_or_zero(),
            position: Vec3::ZERO,
            range: 0.0,
            color,
            intensity,
            spot_falloff: 0.0,
        }
    }

    pub fn point(position: Vec3, range: f32, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            direction: Vec3::ZERO,
            position,
            range,
            color,
            intensity,
            spot_falloff: 0.0,
        }
    }

    pub fn spot(
        position: Vec3,
        direction: Vec3,
        range: f32,
        spot_falloff: f32,
        color: Vec3,
        intensity: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            direction: direction.normalize_or_zero(),
            position,
            range,
            color,
            intensity,
            spot_falloff,
        }
    }

    pub fn to_gpu(&self) -> GpuLight {
        GpuLight {
            kind: self.kind as u32,
            range: self.range,
            intensity: self.intensity,
            spot_falloff: self.spot_falloff,
            direction: self.direction.to_array(),
            _pad0: 0.0,
            position: self.position.to_array(),
            _pad1: 0.0,
            color: self.color.to_array(),
            _pad2: 0.0,
        }
    }
}

/// Storage-buffer mirror of [`Light`] (64 bytes).
///
/// ```wgsl
/// struct Light {
///     kind: u32,
///     range: f32,
///     intensity: f32,
///     spot_falloff: f32,
///     direction: vec3f,
///     position: vec3f,
///     color: vec3f,
/// }
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLight {
    pub kind: u32,
    pub range: f32,
    pub intensity: f32,
    pub spot_falloff: f32,
    pub direction: [f32; 3],
    pub _pad0: f32,
    pub position: [f32; 3],
    pub _pad1: f32,
    pub color: [f32; 3],
    pub _pad2: f32,
}

/// World transform and emissive color of the marker drawn for a point light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightMarker {
    pub world: Mat4,
    pub color: Vec3,
}

/// Number of fixed directional lights at the head of a generated set.
pub const FIXED_LIGHT_COUNT: usize = 3;

/// Flat list of lights, rebuilt wholesale on regeneration.
#[derive(Clone, Debug, Default)]
pub struct LightSet {
    lights: Vec<Light>,
}

impl LightSet {
    pub fn new(lights: Vec<Light>) -> Self {
        Self { lights }
    }

    /// Three fixed directional lights followed by random point lights, `count` in all.
    ///
    /// Point lights are placed in x in [-10, 10], y in [-5, 5], z in [-10, 10]
    /// with color in [0, 1]^3, range in [5, 10] and intensity in [0.1, 3].
    /// A `count` below three keeps only the first `count` directionals.
    pub fn generate(count: usize, rng: &mut impl Rng) -> Self {
        let fixed = [
            Light::directional(Vec3::new(1.0, -1.0, 1.0), Vec3::splat(0.8), 1.0),
            Light::directional(Vec3::new(-1.0, -0.25, 0.0), Vec3::splat(0.2), 1.0),
            Light::directional(Vec3::new(0.0, -1.0, 1.0), Vec3::splat(0.2), 1.0),
        ];

        let mut lights: Vec<Light> = fixed.into_iter().take(count).collect();
        while lights.len() < count {
            let position = Vec3::new(
                rng.gen_range(-10.0..=10.0),
                rng.gen_range(-5.0..=5.0),
                rng.gen_range(-10.0..=10.0),
            );
            let color = Vec3::new(
                rng.gen_range(0.0..=1.0),
                rng.gen_range(0.0..=1.0),
                rng.gen_range(0.0..=1.0),
            );
            lights.push(Light::point(
                position,
                rng.gen_range(5.0..=10.0),
                color,
                rng.gen_range(0.1..=3.0),
            ));
        }

        log::info!("Generated {} lights", lights.len());
        Self { lights }
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Light> {
        self.lights.get(index)
    }

    /// Mutable access for live editing; out-of-range indices yield `None`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    pub fn to_gpu(&self) -> Vec<GpuLight> {
        self.lights.iter().map(Light::to_gpu).collect()
    }

    /// One marker per point light: scaled by `range / 10`, tinted `color * intensity`.
    pub fn markers(&self) -> Vec<LightMarker> {
        self.lights
            .iter()
            .filter(|light| light.kind == LightKind::Point)
            .map(|light| LightMarker {
                world: Mat4::from_scale_rotation_translation(
                    Vec3::splat(light.range / 10.0),
                    glam::Quat::IDENTITY,
                    light.position,
                ),
                color: light.color * light.intensity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn gpu_light_is_64_bytes() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 64);
    }

    #[test]
    fn generated_set_starts_with_fixed_directionals() {
        let set = LightSet::generate(64, &mut StdRng::seed_from_u64(1));
        assert_eq!(set.len(), 64);

        let first = set.get(0).unwrap();
        assert_eq!(first.kind, LightKind::Directional);
        assert_eq!(first.color, Vec3::splat(0.8));
        assert!(first.direction.abs_diff_eq(Vec3::new(1.0, -1.0, 1.0).normalize(), 1e-6));
        for light in set.iter().take(FIXED_LIGHT_COUNT) {
            assert_eq!(light.kind, LightKind::Directional);
            assert_eq!(light.intensity, 1.0);
        }
        assert_eq!(set.get(1).unwrap().color, Vec3::splat(0.2));
        assert_eq!(set.get(2).unwrap().color, Vec3::splat(0.2));
    }

    #[test]
    fn random_lights_respect_ranges() {
        let set = LightSet::generate(200, &mut StdRng::seed_from_u64(99));
        for light in set.iter().skip(FIXED_LIGHT_COUNT) {
            assert_eq!(light.kind, LightKind::Point);
            assert!((-10.0..=10.0).contains(&light.position.x));
            assert!((-5.0..=5.0).contains(&light.position.y));
            assert!((-10.0..=10.0).contains(&light.position.z));
            assert!(light.color.cmpge(Vec3::ZERO).all() && light.color.cmple(Vec3::ONE).all());
            assert!((5.0..=10.0).contains(&light.range));
            assert!((0.1..=3.0).contains(&light.intensity));
        }
    }

    #[test]
    fn same_seed_same_lights() {
        let a = LightSet::generate(16, &mut StdRng::seed_from_u64(5));
        let b = LightSet::generate(16, &mut StdRng::seed_from_u64(5));
        assert_eq!(a.to_gpu(), b.to_gpu());
    }

    #[test]
    fn small_counts_truncate_fixed_lights() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(LightSet::generate(0, &mut rng).is_empty());
        let two = LightSet::generate(2, &mut rng);
        assert_eq!(two.len(), 2);
        assert!(two.iter().all(|l| l.kind == LightKind::Directional));
    }

    #[test]
    fn markers_cover_point_lights_only() {
        let set = LightSet::new(vec![
            Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0),
            Light::point(Vec3::new(1.0, 2.0, 3.0), 5.0, Vec3::new(1.0, 0.5, 0.0), 2.0),
        ]);
        let markers = set.markers();
        assert_eq!(markers.len(), 1);
        let (scale, _, translation) = markers[0].world.to_scale_rotation_translation();
        assert!(scale.abs_diff_eq(Vec3::splat(0.5), 1e-6));
        assert!(translation.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        assert_eq!(markers[0].color, Vec3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn spot_light_packs_kind_and_falloff() {
        let spot = Light::spot(
            Vec3::new(0.0, 4.0, 0.0),
            Vec3::new(0.0, -2.0, 0.0),
            8.0,
            12.0,
            Vec3::new(1.0, 0.9, 0.7),
            1.5,
        );
        let set = LightSet::new(vec![Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0), spot]);

        let packed = set.to_gpu();
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[1].kind, LightKind::Spot as u32);
        assert_eq!(packed[1].kind, 2);
        assert_eq!(packed[1].spot_falloff, 12.0);
        assert_eq!(packed[1].range, 8.0);
        assert_eq!(packed[1].intensity, 1.5);
        assert_eq!(packed[1].position, [0.0, 4.0, 0.0]);
        assert_eq!(packed[1].direction, [0.0, -1.0, 0.0]);
        assert_eq!(packed[1].color, [1.0, 0.9, 0.7]);

        assert_eq!(packed[0].kind, LightKind::Directional as u32);
        assert_eq!(packed[0].spot_falloff, 0.0);
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut set = LightSet::generate(4, &mut StdRng::seed_from_u64(3));
        set.get_mut(3).unwrap().intensity = 0.5;
        assert_eq!(set.get(3).unwrap().intensity, 0.5);
        assert!(set.get_mut(4).is_none());
    }
}
