//! TOML configuration for the window, lights, IBL bake, sky and camera.
//!
//! Every section falls back to its defaults, so an empty file (or none at
//! all) reproduces the stock scene:
//!
//! ```toml
//! [window]
//! title = "vesper"
//! width = 1280
//! height = 720
//!
//! [lights]
//! count = 64
//! seed = 7
//!
//! [ibl]
//! face_size = 128
//!
//! [sky]
//! kind = "strip"
//! path = "assets/sky_strip.png"
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SkyError};
use crate::sky::{BakeSettings, CubeFaces, FACE_COUNT};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub lights: LightsConfig,
    pub ibl: BakeSettings,
    pub sky: SkySource,
    pub camera: CameraConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vesper".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    /// Total lights, the three fixed directionals included.
    pub count: usize,
    /// Seed for reproducible placement; entropy-seeded when absent.
    pub seed: Option<u64>,
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self {
            count: 64,
            seed: None,
        }
    }
}

/// Where the environment cube comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkySource {
    /// Procedural gradient with a sun highlight.
    Gradient {
        #[serde(default = "default_gradient_size")]
        size: u32,
        #[serde(default = "default_sun_direction")]
        sun_direction: [f32; 3],
    },
    /// One image with the six faces stacked vertically.
    Strip { path: PathBuf },
    /// Six images in +X, -X, +Y, -Y, +Z, -Z order.
    Faces { paths: [PathBuf; FACE_COUNT] },
}

fn default_gradient_size() -> u32 {
    256
}

fn default_sun_direction() -> [f32; 3] {
    [0.3, 0.6, 0.4]
}

impl Default for SkySource {
    fn default() -> Self {
        Self::Gradient {
            size: default_gradient_size(),
            sun_direction: default_sun_direction(),
        }
    }
}

impl SkySource {
    pub fn load(&self) -> Result<CubeFaces, SkyError> {
        match self {
            Self::Gradient {
                size,
                sun_direction,
            } => CubeFaces::gradient(*size, Vec3::from_array(*sun_direction)),
            Self::Strip { path } => CubeFaces::from_strip_file(path),
            Self::Faces { paths } => CubeFaces::from_files(paths),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Units per second before Shift/Ctrl modifiers.
    pub move_speed: f32,
    /// Multiplier on mouse-look sensitivity.
    pub look_speed: f32,
    pub fov_degrees: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, -10.0],
            move_speed: 3.0,
            look_speed: 1.0,
            fov_degrees: 45.0,
        }
    }
}

impl Config {
    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                log::info!(
                    "No config at {}; using defaults",
                    path.as_ref().display()
                );
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Parses and validates TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(msg.to_string()))
        };

        if self.window.width == 0 || self.window.height == 0 {
            return invalid("window size must be non-zero");
        }
        if self.ibl.face_size == 0 || self.ibl.lut_size == 0 {
            return invalid("ibl face_size and lut_size must be non-zero");
        }
        let steps = [self.ibl.sample_step_phi, self.ibl.sample_step_theta];
        if steps.iter().any(|step| !step.is_finite() || *step <= 0.0) {
            return invalid("ibl sample steps must be positive");
        }
        if let SkySource::Gradient { size: 0, .. } = self.sky {
            return invalid("sky gradient size must be non-zero");
        }
        if !(self.camera.fov_degrees > 0.0 && self.camera.fov_degrees < 180.0) {
            return invalid("camera fov_degrees must be in (0, 180)");
        }
        if self.camera.move_speed < 0.0 || self.camera.look_speed < 0.0 {
            return invalid("camera speeds must not be negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.lights.count, 64);
        assert_eq!(config.ibl.face_size, 256);
        assert_eq!(config.ibl.lut_size, 256);
        assert_eq!(config.ibl.mips_to_skip, 3);
        assert_eq!(config.camera.position, [0.0, 0.0, -10.0]);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
[lights]
count = 10
seed = 42

[ibl]
face_size = 64
"#,
        )
        .unwrap();

        assert_eq!(config.lights.count, 10);
        assert_eq!(config.lights.seed, Some(42));
        assert_eq!(config.ibl.face_size, 64);
        assert_eq!(config.ibl.specular_mip_count(), 4);
        assert_eq!(config.ibl.sample_step_phi, 0.025);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn sky_source_is_tagged_by_kind() {
        let config = Config::parse(
            r#"
[sky]
kind = "faces"
paths = ["px.png", "nx.png", "py.png", "ny.png", "pz.png", "nz.png"]
"#,
        )
        .unwrap();
        let SkySource::Faces { paths } = &config.sky else {
            panic!("expected faces, got {:?}", config.sky);
        };
        assert_eq!(paths[3], PathBuf::from("ny.png"));

        let config = Config::parse("[sky]\nkind = \"strip\"\npath = \"sky.png\"\n").unwrap();
        assert_eq!(
            config.sky,
            SkySource::Strip {
                path: PathBuf::from("sky.png")
            }
        );
    }

    #[test]
    fn bare_gradient_kind_uses_default_fields() {
        let config = Config::parse("[sky]\nkind = \"gradient\"").unwrap();
        assert_eq!(config.sky, SkySource::default());

        let config = Config::parse("[sky]\nkind = \"gradient\"\nsize = 64").unwrap();
        assert_eq!(
            config.sky,
            SkySource::Gradient {
                size: 64,
                sun_direction: [0.3, 0.6, 0.4],
            }
        );
    }

    #[test]
    fn rejects_zero_sizes_and_bad_steps() {
        for toml in [
            "[window]\nwidth = 0",
            "[ibl]\nface_size = 0",
            "[ibl]\nlut_size = 0",
            "[ibl]\nsample_step_phi = 0.0",
            "[ibl]\nsample_step_theta = -0.1",
            "[sky]\nkind = \"gradient\"\nsize = 0\nsun_direction = [0.0, 1.0, 0.0]",
            "[camera]\nfov_degrees = 180.0",
        ] {
            assert!(
                matches!(Config::parse(toml), Err(ConfigError::Invalid(_))),
                "accepted {toml:?}"
            );
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Config::parse("[window\nwidth = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::parse("[window]\nwidth = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_only_in_load_or_default() {
        let path = std::env::temp_dir().join("vesper-config-that-does-not-exist.toml");
        assert!(matches!(Config::load(&path), Err(ConfigError::Io { .. })));
        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("vesper-config-{}.toml", std::process::id()));
        fs::write(&path, "[camera]\nmove_speed = 6.0\n").unwrap();
        let config = Config::load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(config.unwrap().camera.move_speed, 6.0);
    }

    #[test]
    fn gradient_source_loads_without_assets() {
        let faces = SkySource::Gradient {
            size: 8,
            sun_direction: [0.0, 1.0, 0.0],
        }
        .load()
        .unwrap();
        assert_eq!(faces.size(), 8);
    }
}
