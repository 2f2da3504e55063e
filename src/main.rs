use rand::SeedableRng;
use rand::rngs::StdRng;

use vesper::texture::procedural;
use vesper::*;

/// Procedural stand-ins for the seven surface sets: name, albedo base color,
/// albedo variation, bump periods, bump strength, roughness, metalness.
const SURFACES: [(&str, [u8; 3], u8, u32, f32, u8, u8); 7] = [
    ("cobblestone", [128, 124, 118], 30, 8, 0.6, 210, 0),
    ("floor", [170, 150, 120], 12, 0, 0.0, 150, 0),
    ("paint", [30, 90, 170], 8, 16, 0.15, 90, 0),
    ("scratched", [185, 185, 190], 20, 32, 0.3, 110, 255),
    ("bronze", [175, 120, 70], 12, 0, 0.0, 70, 255),
    ("rough", [140, 100, 80], 40, 4, 1.0, 255, 0),
    ("wood", [130, 85, 45], 25, 2, 0.2, 170, 0),
];

const TEXTURE_SIZE: u32 = 256;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("vesper=info"))
        .init();

    if let Err(err) = run_demo() {
        log::error!("{err}");
        std::process::exit(1);
    }
}

fn run_demo() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default("vesper.toml")?,
    };

    log::info!("Controls:");
    log::info!("  (WASD, X, Space) Move camera");
    log::info!("  (Left Click & Drag) Rotate camera");
    log::info!("  (Left Shift) Hold to speed up camera");
    log::info!("  (Left Ctrl) Hold to slow down camera");
    log::info!("  (TAB) Randomize lights");
    log::info!("Top row: PBR materials. Bottom row: non-PBR materials.");

    run_with_config(config.window.clone().into(), move |ctx| {
        let faces = config.sky.load()?;
        let sky = Sky::new(ctx.gpu, &faces, config.ibl, &mut *ctx.renderer)?;

        let mut scene = Scene::new();
        let sphere = scene.add_mesh(Mesh::sphere(ctx.gpu, 32, 16)?);

        let mut pbr = Vec::with_capacity(SURFACES.len());
        let mut basic = Vec::with_capacity(SURFACES.len());
        for (seed, surface) in SURFACES.iter().enumerate() {
            let (name, base, variation, periods, strength, roughness, metalness) = *surface;

            let albedo = procedural::noise(TEXTURE_SIZE, seed as u32, base, variation);
            let normal = if periods == 0 {
                procedural::solid(1, procedural::FLAT_NORMAL)
            } else {
                procedural::bumps(TEXTURE_SIZE, periods, strength)
            };

            let albedo = scene.add_texture(Texture::from_image(
                ctx.gpu,
                &albedo,
                TextureKind::Color,
                &format!("{name} albedo"),
            )?);
            let normal = scene.add_texture(Texture::from_image(
                ctx.gpu,
                &normal,
                TextureKind::Data,
                &format!("{name} normals"),
            )?);
            let roughness = scene.add_texture(Texture::solid(
                ctx.gpu,
                [roughness, roughness, roughness, 255],
                TextureKind::Data,
                &format!("{name} roughness"),
            )?);
            let metalness = scene.add_texture(Texture::solid(
                ctx.gpu,
                [metalness, metalness, metalness, 255],
                TextureKind::Data,
                &format!("{name} metal"),
            )?);

            for (shading, out) in [(Shading::Pbr, &mut pbr), (Shading::Basic, &mut basic)] {
                let material = Material::new(shading, albedo, normal, roughness, metalness)
                    .with_uv_scale(Vec2::splat(2.0))
                    .with_shininess(256.0);
                out.push(scene.add_material(ctx.gpu, ctx.renderer.material_layout(), material)?);
            }
        }

        let mut entities = Vec::with_capacity(SURFACES.len() * 2);
        for material in &pbr {
            entities.push(scene.spawn_entity(Transform::new(), sphere, *material)?);
        }
        for (i, material) in basic.iter().enumerate() {
            let transform = Transform::from_position(Vec3::new(-6.0 + 2.0 * i as f32, -2.0, 0.0))
                .with_scale(Vec3::splat(2.0));
            entities.push(scene.spawn_entity(transform, sphere, *material)?);
        }

        let graph = scene.graph_mut();
        graph.add_child(entities[0], entities[1]);
        graph.add_child(entities[3], entities[2]);
        graph.add_child(entities[3], entities[4]);
        graph.add_child(entities[6], entities[5]);

        // Roots are placed in world space, children relative to their parent.
        let top_row = [
            Vec3::new(-6.0, 2.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(6.0, 2.0, 0.0),
        ];
        for (&entity, position) in entities.iter().zip(top_row) {
            let is_parent = graph.child_count(entity) > 0 && graph.parent(entity).is_none();
            if let Some(transform) = graph.transform_mut(entity) {
                transform.set_position(position);
                if is_parent {
                    transform.set_scale(Vec3::splat(2.0));
                }
            }
        }

        let mut rng = match config.lights.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut lights = LightSet::generate(config.lights.count, &mut rng);

        let camera_config = &config.camera;
        let mut camera = Camera::new(Vec3::from_array(camera_config.position), ctx.gpu.aspect())
            .with_speeds(camera_config.move_speed, camera_config.look_speed)
            .with_lens(Lens {
                fov: camera_config.fov_degrees.to_radians(),
                ..Lens::default()
            });

        Ok(move |frame: &mut Frame| {
            if let Some((width, height)) = frame.resized {
                camera.update_projection(width as f32 / height as f32);
            }
            camera.update(frame.input, frame.dt);

            if frame.input.key_down(KeyCode::Escape) {
                frame.exit();
                return Ok(());
            }
            if frame.input.key_pressed(KeyCode::Tab) {
                lights = LightSet::generate(config.lights.count, &mut rng);
            }

            let spin = frame.dt.sin();
            let graph = scene.graph_mut();
            for (index, rotation) in [
                (0, Vec3::new(0.0, spin, 0.0)),
                (6, Vec3::new(0.0, spin, 0.0)),
                (3, Vec3::new(0.0, 0.0, spin)),
            ] {
                if let Some(transform) = graph.transform_mut(entities[index]) {
                    transform.rotate(rotation);
                }
            }

            frame
                .renderer
                .render(frame.gpu, &mut scene, &camera, &lights, &sky, |_| {})
        })
    })
}
