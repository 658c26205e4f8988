//! Headless GI demo
//!
//! Builds a small scene, bakes the distance fields, then runs the GI
//! pipeline for a fixed number of frames. Runs CPU-only when no GPU
//! adapter is available.

use engine_core::{EngineConfig, GiEngine, Light, LightKind, MeshAsset, SceneObject};
use glam::{Mat4, Vec3};
use std::path::Path;

const FRAMES: u64 = 120;

fn main() {
    env_logger::init();

    let config = EngineConfig::load_or_default(Path::new("config/settings.json"));
    let mut engine = GiEngine::new(config);
    log::info!(
        "gi engine up (gpu: {}), systems: {:?}",
        engine.has_gpu(),
        engine.system_names()
    );

    build_scene(&mut engine);

    let baked = engine.trigger_bake_all_pending_fields();
    log::info!("{baked} fields baked");

    engine.set_view_target(960, 540);
    engine.trigger_run_gi();

    for frame in 0..FRAMES {
        // Slow orbit so cascade re-anchoring gets exercised.
        let angle = frame as f32 * 0.01;
        engine.state.camera.position = Vec3::new(angle.cos() * 8.0, 3.0, angle.sin() * 8.0);
        engine.update();

        if frame % 30 == 0 {
            let cascade = &engine.state.field.cascades()[0];
            log::info!(
                "frame {frame}: {} occupied chunks, {} static, {} atlas objects, probes {}",
                cascade.non_empty_chunks.len(),
                cascade.static_chunks.len(),
                engine.state.atlas.object_count(),
                engine.state.volume.probe_count(),
            );
        }
    }

    engine.stop_gi();
    log::info!("done after {FRAMES} frames");
}

fn build_scene(engine: &mut GiEngine) {
    let scene = &mut engine.state.scene;

    let ground = scene.add_mesh(box_mesh("ground", Vec3::new(12.0, 0.5, 12.0)));
    let crate_mesh = scene.add_mesh(box_mesh("crate", Vec3::splat(1.0)));
    let slab = scene.add_mesh(box_mesh("slab", Vec3::new(2.0, 4.0, 0.5)));

    scene.spawn(SceneObject::new(
        ground,
        Mat4::from_translation(Vec3::new(0.0, -0.5, 0.0)),
    ));
    for i in 0..4 {
        let angle = i as f32 * std::f32::consts::FRAC_PI_2;
        let mut object = SceneObject::new(
            crate_mesh,
            Mat4::from_translation(Vec3::new(angle.cos() * 4.0, 1.0, angle.sin() * 4.0)),
        );
        object.albedo = [0.6, 0.3 + i as f32 * 0.15, 0.2, 1.0];
        scene.spawn(object);
    }
    let mut wall = SceneObject::new(slab, Mat4::from_translation(Vec3::new(0.0, 4.0, -6.0)));
    wall.emissive = 2.0;
    scene.spawn(wall);

    scene.lights.push(Light {
        kind: LightKind::Directional,
        position: Vec3::new(-0.4, -1.0, -0.3).normalize(),
        color: Vec3::new(1.0, 0.96, 0.88),
        radius: 0.0,
        revision: 0,
    });
    scene.lights.push(Light {
        kind: LightKind::Point,
        position: Vec3::new(0.0, 3.0, 0.0),
        color: Vec3::new(0.9, 0.4, 0.2),
        radius: 12.0,
        revision: 0,
    });
}

fn box_mesh(name: &str, half: Vec3) -> MeshAsset {
    let positions = vec![
        Vec3::new(-half.x, -half.y, -half.z),
        Vec3::new(half.x, -half.y, -half.z),
        Vec3::new(half.x, half.y, -half.z),
        Vec3::new(-half.x, half.y, -half.z),
        Vec3::new(-half.x, -half.y, half.z),
        Vec3::new(half.x, -half.y, half.z),
        Vec3::new(half.x, half.y, half.z),
        Vec3::new(-half.x, half.y, half.z),
    ];
    let indices = vec![
        0, 2, 1, 0, 3, 2, // -Z
        4, 5, 6, 4, 6, 7, // +Z
        0, 1, 5, 0, 5, 4, // -Y
        3, 6, 2, 3, 7, 6, // +Y
        0, 4, 7, 0, 7, 3, // -X
        1, 2, 6, 1, 6, 5, // +X
    ];
    MeshAsset::new(name, positions, indices)
}
