use glam::{Mat4, Vec3};

use wgpu_lakeside::asset::{MeshData, VisualResource};
use wgpu_lakeside::error::RenderError;
use wgpu_lakeside::renderer::uniforms::OPENGL_TO_WGPU_MATRIX;
use wgpu_lakeside::renderer::{
    DeviceCommand, FrameOrchestrator, FrameTarget, GraphicsDevice, ProgramKind, RecordingDevice,
    TextureUnit, WaterTextures,
};
use wgpu_lakeside::scene::{
    Camera, Entity, HeightField, Light, Scene, Terrain, TerrainTexturePack, WaterTile,
};
use wgpu_lakeside::settings::RenderSettings;

fn blank(device: &mut RecordingDevice, label: &str) -> wgpu_lakeside::renderer::TextureHandle {
    device
        .create_texture(label, &image::RgbaImage::new(4, 4))
        .expect("texture")
}

fn water_textures(device: &mut RecordingDevice) -> WaterTextures {
    WaterTextures {
        dudv: blank(device, "DuDv"),
        normal: blank(device, "WaterNormal"),
    }
}

fn flat_terrain(device: &mut RecordingDevice) -> Terrain {
    let textures = TerrainTexturePack {
        background: blank(device, "Grass"),
        r: blank(device, "Mud"),
        g: blank(device, "Flowers"),
        b: blank(device, "Path"),
    };
    let blend_map = blank(device, "BlendMap");
    let heights = HeightField::from_fn(4, |_, _| 0.0).expect("heights");
    Terrain::new(device, 0, -1, textures, blend_map, heights).expect("terrain")
}

/// One entity, one terrain tile, the sun, and optionally one water tile.
fn small_scene(device: &mut RecordingDevice, with_water: bool) -> Scene {
    let sun = Light::new(Vec3::new(10000.0, 10000.0, -10000.0), Vec3::splat(1.3));
    let mut scene = Scene::new(sun, Camera::new(Vec3::new(40.0, 15.0, -20.0), 15.0, 0.0));
    let resource = VisualResource::new(
        device.create_mesh("Crate", &MeshData::cube()).expect("mesh"),
        blank(device, "Crate"),
    );
    let handle = scene.add_resource(resource);
    scene.add_entity(Entity::new(handle, Vec3::new(40.0, 2.0, -40.0)));
    scene.terrains.push(flat_terrain(device));
    if with_water {
        scene.water_tiles.push(WaterTile::new(60.0, -60.0, -1.0));
    }
    scene
}

fn orchestrator(device: &mut RecordingDevice) -> FrameOrchestrator {
    let textures = water_textures(device);
    FrameOrchestrator::new(device, &RenderSettings::default(), 16.0 / 9.0, textures)
        .expect("orchestrator")
}

fn target_labeled(device: &RecordingDevice, label: &str) -> FrameTarget {
    device
        .commands()
        .iter()
        .find_map(|command| match command {
            DeviceCommand::CreateTarget { target, descriptor } if descriptor.label == label => {
                Some(FrameTarget::Offscreen(*target))
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("no target labeled {label}"))
}

#[test]
fn single_entity_frame_issues_one_draw_per_pass() {
    let mut device = RecordingDevice::new();
    let scene = small_scene(&mut device, false);
    let mut renderer = orchestrator(&mut device);

    let stats = renderer
        .render_frame(&mut device, &scene.frame_input(0.016))
        .expect("frame");

    assert_eq!(stats.shadow_draws, 1);
    assert_eq!(stats.main.entity_draws, 1);
    assert_eq!(stats.main.terrain_draws, 1);
    assert_eq!(stats.water_draws, 0);
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.entities, 1);

    assert_eq!(device.draws_with(ProgramKind::Shadow), 1);
    assert_eq!(device.draws_with(ProgramKind::Entity), 1);
    assert_eq!(device.draws_with(ProgramKind::Terrain), 1);
    assert_eq!(device.draws_with(ProgramKind::Water), 0);
    assert_eq!(device.draws_into(FrameTarget::Default), 2);

    renderer.cleanup(&mut device);
}

#[test]
fn passes_run_in_dependency_order() {
    let mut device = RecordingDevice::new();
    let scene = small_scene(&mut device, true);
    let mut renderer = orchestrator(&mut device);
    let shadow = target_labeled(&device, "ShadowMap");
    let reflection = target_labeled(&device, "WaterReflection");
    let refraction = target_labeled(&device, "WaterRefraction");
    device.clear_commands();

    let stats = renderer
        .render_frame(&mut device, &scene.frame_input(0.016))
        .expect("frame");
    assert_eq!(stats.reflection.draws(), 2);
    assert_eq!(stats.refraction.draws(), 2);
    assert_eq!(stats.water_draws, 1);

    let stage = |draw: &wgpu_lakeside::renderer::DrawCall| match draw.target {
        t if t == shadow => 0,
        t if t == reflection => 1,
        t if t == refraction => 2,
        FrameTarget::Default if draw.program != ProgramKind::Water => 3,
        FrameTarget::Default => 4,
        other => panic!("draw into unexpected target {other:?}"),
    };
    let stages: Vec<u32> = device.draws().map(stage).collect();
    assert!(stages.windows(2).all(|w| w[0] <= w[1]), "{stages:?}");
    for expected in 0..=4 {
        assert!(stages.contains(&expected), "stage {expected} missing: {stages:?}");
    }

    renderer.cleanup(&mut device);
}

#[test]
fn consecutive_frames_repeat_the_same_work() {
    let mut device = RecordingDevice::new();
    let scene = small_scene(&mut device, true);
    let mut renderer = orchestrator(&mut device);
    let shadow = target_labeled(&device, "ShadowMap");
    let reflection = target_labeled(&device, "WaterReflection");
    let refraction = target_labeled(&device, "WaterRefraction");

    let stage = |draw: &wgpu_lakeside::renderer::DrawCall| match draw.target {
        t if t == shadow => 0,
        t if t == reflection => 1,
        t if t == refraction => 2,
        FrameTarget::Default if draw.program != ProgramKind::Water => 3,
        _ => 4,
    };

    let mut frames = Vec::new();
    for _ in 0..3 {
        device.clear_commands();
        let stats = renderer
            .render_frame(&mut device, &scene.frame_input(0.016))
            .expect("frame");
        let stages: Vec<u32> = device.draws().map(&stage).collect();
        assert!(stages.windows(2).all(|w| w[0] <= w[1]), "{stages:?}");
        frames.push((stats, stages));
    }

    let (first_stats, first_stages) = &frames[0];
    assert_eq!(first_stats.shadow_draws, 1);
    assert_eq!(first_stats.main.entity_draws, 1);
    assert_eq!(first_stats.batches, 1);
    for (stats, stages) in &frames[1..] {
        assert_eq!(stats, first_stats);
        assert_eq!(stages, first_stages);
    }

    renderer.cleanup(&mut device);
}

#[test]
fn main_pass_samples_the_shadow_map_it_follows() {
    let mut device = RecordingDevice::new();
    let scene = small_scene(&mut device, false);
    let mut renderer = orchestrator(&mut device);

    renderer
        .render_frame(&mut device, &scene.frame_input(0.016))
        .expect("frame");

    assert_eq!(
        device.bound_texture(TextureUnit::SHADOW_MAP),
        Some(renderer.shadow_pass().shadow_map_texture())
    );
    let entity = device.program_of(ProgramKind::Entity).expect("entity program");
    let globals = device.program_globals(entity).expect("globals");
    assert_eq!(
        globals.light_space,
        renderer.shadow_pass().light_space_matrix().to_cols_array_2d()
    );

    renderer.cleanup(&mut device);
}

#[test]
fn frame_leaves_window_surface_bound() {
    let mut device = RecordingDevice::new();
    let scene = small_scene(&mut device, true);
    let mut renderer = orchestrator(&mut device);

    let mut overlay_ran = false;
    renderer
        .render_frame_with_overlay(&mut device, &scene.frame_input(0.016), |_| {
            overlay_ran = true;
            Ok(())
        })
        .expect("frame");

    assert!(overlay_ran);
    assert_eq!(device.current_target(), FrameTarget::Default);
    assert_eq!(device.current_program(), None);
    assert!(device.culling_enabled());

    renderer.cleanup(&mut device);
}

#[test]
fn cleanup_is_idempotent() {
    let mut device = RecordingDevice::new();
    let mut renderer = orchestrator(&mut device);
    assert_eq!(device.live_programs(), 4);
    assert_eq!(device.live_targets(), 3);

    renderer.cleanup(&mut device);
    renderer.cleanup(&mut device);

    assert!(renderer.is_released());
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_targets(), 0);
    assert_eq!(device.double_releases(), 0);
}

#[test]
fn rendering_after_cleanup_is_rejected() {
    let mut device = RecordingDevice::new();
    let scene = small_scene(&mut device, false);
    let mut renderer = orchestrator(&mut device);
    renderer.cleanup(&mut device);
    device.clear_commands();

    let err = renderer
        .render_frame(&mut device, &scene.frame_input(0.016))
        .unwrap_err();
    assert!(matches!(err, RenderError::Released));
    assert_eq!(device.draw_count(), 0);
    assert!(matches!(
        renderer.resize(&mut device, 1.0),
        Err(RenderError::Released)
    ));
}

#[test]
fn target_exhaustion_propagates_without_leaks() {
    let mut device = RecordingDevice::new();
    device.fail_target_creation = true;
    let textures = water_textures(&mut device);

    let result = FrameOrchestrator::new(&mut device, &RenderSettings::default(), 1.0, textures);

    assert!(matches!(result, Err(RenderError::ResourceExhausted { .. })));
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.live_targets(), 0);
    assert_eq!(device.double_releases(), 0);
}

#[test]
fn program_exhaustion_propagates() {
    let mut device = RecordingDevice::new();
    device.fail_program_creation = true;
    let textures = water_textures(&mut device);

    let result = FrameOrchestrator::new(&mut device, &RenderSettings::default(), 1.0, textures);

    assert!(matches!(result, Err(RenderError::ResourceExhausted { .. })));
    assert_eq!(device.live_targets(), 0);
}

#[test]
fn entity_with_unknown_resource_fails_fast() {
    let mut device = RecordingDevice::new();
    let mut scene = small_scene(&mut device, false);
    let stray = wgpu_lakeside::asset::Handle::new(42);
    scene.add_entity(Entity::new(stray, Vec3::ZERO));
    let mut renderer = orchestrator(&mut device);

    let err = renderer
        .render_frame(&mut device, &scene.frame_input(0.016))
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidGeometry(_)), "{err:?}");

    renderer.cleanup(&mut device);
}

#[test]
fn zero_atlas_rows_fail_fast() {
    let mut device = RecordingDevice::new();
    let mut scene = small_scene(&mut device, false);
    let mut broken = VisualResource::new(
        device.create_mesh("Fern", &MeshData::crossed_quads(1.0, 1.0)).expect("mesh"),
        blank(&mut device, "Fern"),
    );
    broken.number_of_rows = 0;
    let handle = scene.add_resource(broken);
    scene.add_entity(Entity::new(handle, Vec3::new(10.0, 0.0, -10.0)));
    let mut renderer = orchestrator(&mut device);

    let err = renderer
        .render_frame(&mut device, &scene.frame_input(0.016))
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidGeometry(_)), "{err:?}");

    renderer.cleanup(&mut device);
}

#[test]
fn resize_reloads_projection_into_programs() {
    let mut device = RecordingDevice::new();
    let mut renderer = orchestrator(&mut device);

    renderer.resize(&mut device, 2.0).expect("resize");

    assert_eq!(renderer.projection().aspect, 2.0);
    let expected: Mat4 = OPENGL_TO_WGPU_MATRIX * renderer.projection().compute();
    for kind in [ProgramKind::Entity, ProgramKind::Terrain, ProgramKind::Water] {
        let program = device.program_of(kind).expect("program");
        let globals = device.program_globals(program).expect("globals");
        assert_eq!(globals.projection, expected.to_cols_array_2d(), "{kind:?}");
    }

    renderer.cleanup(&mut device);
}

#[test]
fn degenerate_resize_keeps_previous_projection() {
    let mut device = RecordingDevice::new();
    let mut renderer = orchestrator(&mut device);
    let before = *renderer.projection();

    renderer.resize(&mut device, 0.0).expect("resize");
    renderer.resize(&mut device, f32::NAN).expect("resize");

    assert_eq!(*renderer.projection(), before);
    renderer.cleanup(&mut device);
}
