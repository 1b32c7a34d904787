use glam::{Mat4, Vec3};

use wgpu_lakeside::asset::{MeshData, Resources, VisualResource};
use wgpu_lakeside::renderer::shadow::{light_space_matrix, MIN_SHADOW_RADIUS};
use wgpu_lakeside::renderer::{
    ClearFlags, DeviceCommand, EntityBatcher, FrameTarget, GraphicsDevice, ProgramKind,
    RecordingDevice, ShadowPass,
};
use wgpu_lakeside::scene::{Entity, Light};
use wgpu_lakeside::settings::RenderSettings;

const EPSILON: f32 = 1e-5;

fn sun() -> Light {
    Light::new(Vec3::new(10000.0, 10000.0, -10000.0), Vec3::ONE)
}

fn crates_at(device: &mut RecordingDevice, positions: &[Vec3]) -> (Resources, Vec<Entity>) {
    let mut resources = Resources::new();
    let handle = resources.insert(VisualResource::new(
        device.create_mesh("Crate", &MeshData::cube()).expect("mesh"),
        device
            .create_texture("Crate", &image::RgbaImage::new(2, 2))
            .expect("texture"),
    ));
    let entities = positions.iter().map(|&p| Entity::new(handle, p)).collect();
    (resources, entities)
}

fn compute_ndc(matrix: Mat4, world: Vec3) -> Vec3 {
    let clip = matrix * world.extend(1.0);
    clip.truncate() / clip.w
}

#[test]
fn every_caster_lands_inside_the_shadow_map() {
    let mut device = RecordingDevice::new();
    let positions = [
        Vec3::new(380.0, 3.0, -420.0),
        Vec3::new(520.0, 12.0, -560.0),
        Vec3::new(470.0, -2.0, -470.0),
        Vec3::new(410.0, 25.0, -530.0),
    ];
    let (resources, entities) = crates_at(&mut device, &positions);
    let mut pass = ShadowPass::new(&mut device, &RenderSettings::default()).expect("shadow pass");

    let mut batcher = EntityBatcher::new();
    batcher.extend(entities.iter());
    let batches = batcher.drain();
    let state = pass
        .render(&mut device, &batches, &resources, &sun())
        .expect("shadow render");

    assert_eq!(state.draws(), positions.len() as u32);
    assert_eq!(state.map_size(), 4096);
    assert!(state.radius() >= MIN_SHADOW_RADIUS);
    assert_eq!(state.light_space_matrix(), pass.light_space_matrix());

    for p in positions {
        let projected = state.project(p);
        assert!(
            projected.cmpge(Vec3::splat(-EPSILON)).all()
                && projected.cmple(Vec3::splat(1.0 + EPSILON)).all(),
            "{p:?} projects to {projected:?}"
        );
    }

    pass.cleanup(&mut device);
}

#[test]
fn shadow_pass_clears_then_draws_only_depth() {
    let mut device = RecordingDevice::new();
    let (resources, entities) = crates_at(&mut device, &[Vec3::ZERO, Vec3::X * 5.0]);
    let mut pass = ShadowPass::new(&mut device, &RenderSettings::default()).expect("shadow pass");
    device.clear_commands();

    let mut batcher = EntityBatcher::new();
    batcher.extend(entities.iter());
    let batches = batcher.drain();
    pass.render(&mut device, &batches, &resources, &sun())
        .expect("shadow render");

    let first_clear = device
        .commands()
        .iter()
        .position(|c| matches!(c, DeviceCommand::Clear { .. }))
        .expect("clear");
    let first_draw = device
        .commands()
        .iter()
        .position(|c| matches!(c, DeviceCommand::Draw(_)))
        .expect("draw");
    assert!(first_clear < first_draw);
    assert!(matches!(
        device.commands()[first_clear],
        DeviceCommand::Clear { flags, .. } if flags == ClearFlags::DEPTH
    ));

    assert!(device.draws().all(|d| d.program == ProgramKind::Shadow
        && matches!(d.target, FrameTarget::Offscreen(_))));
    assert_eq!(device.current_target(), FrameTarget::Default);

    pass.cleanup(&mut device);
}

#[test]
fn lone_caster_uses_minimum_radius() {
    let mut device = RecordingDevice::new();
    let (resources, entities) = crates_at(&mut device, &[Vec3::new(10.0, 0.0, -10.0)]);
    let mut pass = ShadowPass::new(&mut device, &RenderSettings::default()).expect("shadow pass");

    let mut batcher = EntityBatcher::new();
    batcher.extend(entities.iter());
    let batches = batcher.drain();
    let state = pass
        .render(&mut device, &batches, &resources, &sun())
        .expect("shadow render");

    assert_eq!(state.radius(), MIN_SHADOW_RADIUS);
    assert!(state.center().abs_diff_eq(Vec3::new(10.0, 0.0, -10.0), EPSILON));
    let centre = state.project(state.center());
    assert!((centre.x - 0.5).abs() < 1e-4 && (centre.y - 0.5).abs() < 1e-4);

    pass.cleanup(&mut device);
}

#[test]
fn scattered_casters_clamp_to_shadow_distance() {
    let mut device = RecordingDevice::new();
    let (resources, entities) = crates_at(
        &mut device,
        &[Vec3::new(-900.0, 0.0, 0.0), Vec3::new(900.0, 0.0, 0.0)],
    );
    let settings = RenderSettings::default();
    let mut pass = ShadowPass::new(&mut device, &settings).expect("shadow pass");

    let mut batcher = EntityBatcher::new();
    batcher.extend(entities.iter());
    let batches = batcher.drain();
    let state = pass
        .render(&mut device, &batches, &resources, &sun())
        .expect("shadow render");

    assert_eq!(state.radius(), settings.shadow_distance);
    assert_eq!(state.shadow_distance(), settings.shadow_distance);

    pass.cleanup(&mut device);
}

#[test]
fn texture_axis_is_flipped_from_clip_space() {
    let center = Vec3::ZERO;
    let matrix = light_space_matrix(Vec3::new(0.0, 100.0, 0.0), center, 30.0);

    // Looking straight down, up is +Z.
    let top = Vec3::Z * 5.0;
    let bottom = -Vec3::Z * 5.0;
    let ndc_top = compute_ndc(matrix, top);
    let ndc_bottom = compute_ndc(matrix, bottom);
    assert!(ndc_top.y > ndc_bottom.y);

    let project = |world: Vec3| {
        let ndc = compute_ndc(matrix, world);
        Vec3::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5, ndc.z)
    };
    assert!(project(top).y < project(bottom).y);
    assert!((project(top).z - ndc_top.z).abs() < EPSILON);
}

#[test]
fn depth_grows_along_the_light_direction() {
    let sun_position = Vec3::new(10000.0, 10000.0, -10000.0);
    let matrix = light_space_matrix(sun_position, Vec3::ZERO, 40.0);
    let towards_sun = sun_position.normalize() * 10.0;

    let near = compute_ndc(matrix, towards_sun);
    let far = compute_ndc(matrix, -towards_sun);
    assert!(near.z < far.z);
    assert!(near.z > 0.0 && far.z < 1.0);
}
