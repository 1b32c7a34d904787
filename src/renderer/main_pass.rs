//! Lit forward pass for entities and terrain.

use glam::{Vec2, Vec3};

use crate::asset::{Resources, VisualResource};
use crate::error::{RenderError, RenderResult};
use crate::renderer::batch::RenderBatches;
use crate::renderer::clip::ClipPlane;
use crate::renderer::device::{
    ClearFlags, GraphicsDevice, ProgramHandle, ProgramKind, TextureUnit, Uniform,
};
use crate::renderer::lights::LightArray;
use crate::renderer::projection::Projection;
use crate::renderer::shadow::ShadowMapState;
use crate::scene::{Camera, Entity, Light, Terrain};
use crate::settings::RenderSettings;

/// What the main pass draws. Borrowed for the duration of one render.
pub struct SceneView<'a> {
    pub batches: &'a RenderBatches<'a>,
    pub terrains: &'a [Terrain],
    pub lights: &'a [Light],
    pub resources: &'a Resources,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub entity_draws: u32,
    pub batches: u32,
    pub terrain_draws: u32,
}

impl PassStats {
    pub fn draws(&self) -> u32 {
        self.entity_draws + self.terrain_draws
    }
}

pub struct MainPass {
    entity_program: ProgramHandle,
    terrain_program: ProgramHandle,
    sky_color: Vec3,
}

impl MainPass {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        settings: &RenderSettings,
        projection: &Projection,
    ) -> RenderResult<Self> {
        let entity_program = device.create_program(ProgramKind::Entity)?;
        let terrain_program = match device.create_program(ProgramKind::Terrain) {
            Ok(program) => program,
            Err(err) => {
                device.release_program(entity_program);
                return Err(err);
            }
        };
        let pass = Self {
            entity_program,
            terrain_program,
            sky_color: settings.sky_color(),
        };
        pass.set_projection(device, projection)?;
        Ok(pass)
    }

    pub fn set_projection(
        &self,
        device: &mut dyn GraphicsDevice,
        projection: &Projection,
    ) -> RenderResult<()> {
        let matrix = projection.compute();
        for program in [self.entity_program, self.terrain_program] {
            device.use_program(program)?;
            device.set_uniform(Uniform::Projection(matrix));
            device.stop_program();
        }
        Ok(())
    }

    /// Draw entities then terrain into whatever target is bound.
    pub fn render(
        &self,
        device: &mut dyn GraphicsDevice,
        scene: &SceneView<'_>,
        camera: &Camera,
        clip_plane: ClipPlane,
        shadow: &ShadowMapState,
    ) -> RenderResult<PassStats> {
        device.clear(ClearFlags::COLOR | ClearFlags::DEPTH, self.sky_color);
        device.bind_texture(TextureUnit::SHADOW_MAP, shadow.texture())?;

        let lights = LightArray::from_lights(scene.lights);
        let mut stats = PassStats::default();

        device.use_program(self.entity_program)?;
        self.load_globals(device, &lights, camera, clip_plane, shadow);
        let entities = draw_entities(device, scene, &mut stats);
        device.stop_program();
        entities?;

        device.use_program(self.terrain_program)?;
        self.load_globals(device, &lights, camera, clip_plane, shadow);
        device.set_uniform(Uniform::Material {
            shine_damper: 1.0,
            reflectivity: 0.0,
        });
        for terrain in scene.terrains {
            let pack = &terrain.textures;
            device.bind_texture(TextureUnit::BACKGROUND, pack.background)?;
            device.bind_texture(TextureUnit::BLEND_R, pack.r)?;
            device.bind_texture(TextureUnit::BLEND_G, pack.g)?;
            device.bind_texture(TextureUnit::BLEND_B, pack.b)?;
            device.bind_texture(TextureUnit::BLEND_MAP, terrain.blend_map)?;
            device.set_uniform(Uniform::Model(terrain.transformation_matrix()));
            device.draw(terrain.mesh)?;
            stats.terrain_draws += 1;
        }
        device.stop_program();

        Ok(stats)
    }

    fn load_globals(
        &self,
        device: &mut dyn GraphicsDevice,
        lights: &LightArray,
        camera: &Camera,
        clip_plane: ClipPlane,
        shadow: &ShadowMapState,
    ) {
        device.set_uniform(Uniform::ClipPlane(clip_plane.as_vec4()));
        device.set_uniform(Uniform::SkyColor(self.sky_color));
        device.set_uniform(Uniform::Lights(*lights));
        device.set_uniform(Uniform::View(camera.view_matrix()));
        device.set_uniform(Uniform::CameraPosition(camera.position));
        device.set_uniform(Uniform::LightSpace(shadow.light_space_matrix()));
        device.set_uniform(Uniform::ShadowParams {
            map_size: shadow.map_size() as f32,
            distance: shadow.shadow_distance(),
        });
    }

    pub fn cleanup(&self, device: &mut dyn GraphicsDevice) {
        device.release_program(self.entity_program);
        device.release_program(self.terrain_program);
    }
}

fn draw_entities(
    device: &mut dyn GraphicsDevice,
    scene: &SceneView<'_>,
    stats: &mut PassStats,
) -> RenderResult<()> {
    for (handle, entities) in scene.batches.iter() {
        let resource = scene.resources.get(handle).ok_or_else(|| {
            RenderError::InvalidGeometry(format!(
                "entity references unknown visual resource {}",
                handle.index()
            ))
        })?;
        resource.validate()?;
        prepare_resource(device, resource)?;

        let drawn = draw_batch(device, resource, entities);
        // Culling comes back on even when a draw failed.
        if resource.has_transparency {
            device.set_culling(true);
        }
        stats.entity_draws += drawn?;
        stats.batches += 1;
    }
    Ok(())
}

fn draw_batch(
    device: &mut dyn GraphicsDevice,
    resource: &VisualResource,
    entities: &[&Entity],
) -> RenderResult<u32> {
    let mut draws = 0;
    for entity in entities {
        device.set_uniform(Uniform::Model(entity.transformation_matrix()));
        if resource.has_atlas() {
            device.set_uniform(Uniform::AtlasOffset(
                entity.atlas_offset(resource.number_of_rows),
            ));
        }
        device.draw(resource.mesh)?;
        draws += 1;
    }
    Ok(draws)
}

/// Per-batch state: textures, material, atlas layout and culling.
fn prepare_resource(
    device: &mut dyn GraphicsDevice,
    resource: &VisualResource,
) -> RenderResult<()> {
    device.bind_texture(TextureUnit::DIFFUSE, resource.texture)?;
    if let Some(normal_map) = resource.normal_map {
        device.bind_texture(TextureUnit::NORMAL_MAP, normal_map)?;
    }
    device.set_uniform(Uniform::NormalMapping(resource.normal_map.is_some()));
    device.set_uniform(Uniform::AtlasRows(resource.number_of_rows));
    if !resource.has_atlas() {
        device.set_uniform(Uniform::AtlasOffset(Vec2::ZERO));
    }
    device.set_uniform(Uniform::FakeLighting(resource.use_fake_lighting));
    device.set_uniform(Uniform::Material {
        shine_damper: resource.shine_damper,
        reflectivity: resource.reflectivity,
    });
    if resource.has_transparency {
        device.set_culling(false);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MeshData;
    use crate::renderer::batch::EntityBatcher;
    use crate::renderer::device::MeshHandle;
    use crate::renderer::recording::RecordingDevice;
    use crate::renderer::shadow::ShadowPass;

    fn empty_shadow(device: &mut RecordingDevice) -> (ShadowPass, ShadowMapState) {
        let mut pass = ShadowPass::new(device, &RenderSettings::default()).unwrap();
        let sun = Light::new(Vec3::splat(100.0), Vec3::ONE);
        let state = pass
            .render(device, &EntityBatcher::new().drain(), &Resources::new(), &sun)
            .unwrap();
        (pass, state)
    }

    fn render_entities(
        device: &mut RecordingDevice,
        resources: &Resources,
        entities: &[Entity],
    ) -> RenderResult<PassStats> {
        let (shadow_pass, shadow) = empty_shadow(device);
        let projection = Projection::new(70.0, 0.1, 1000.0, 1.0);
        let pass = MainPass::new(device, &RenderSettings::default(), &projection).unwrap();

        let mut batcher = EntityBatcher::new();
        batcher.extend(entities.iter());
        let batches = batcher.drain();
        let view = SceneView {
            batches: &batches,
            terrains: &[],
            lights: &[],
            resources,
        };
        let result = pass.render(device, &view, &Camera::default(), ClipPlane::NONE, &shadow);

        pass.cleanup(device);
        shadow_pass.cleanup(device);
        result
    }

    #[test]
    fn failed_transparent_draw_restores_culling_and_program() {
        let mut device = RecordingDevice::new();
        let texture = device
            .create_texture("Fern", &image::RgbaImage::new(2, 2))
            .unwrap();
        let mut resources = Resources::new();
        let fern = VisualResource::new(MeshHandle(999), texture).with_transparency();
        let fern = resources.insert(fern);

        let result = render_entities(&mut device, &resources, &[Entity::new(fern, Vec3::ZERO)]);

        assert!(matches!(
            result,
            Err(RenderError::UnknownHandle { kind: "mesh", .. })
        ));
        assert!(device.culling_enabled());
        assert_eq!(device.current_program(), None);
        assert_eq!(device.draw_count(), 0);
    }

    #[test]
    fn transparent_batch_draws_unculled_then_restores() {
        let mut device = RecordingDevice::new();
        let mesh = device
            .create_mesh("Fern", &MeshData::crossed_quads(1.0, 1.0))
            .unwrap();
        let texture = device
            .create_texture("Fern", &image::RgbaImage::new(2, 2))
            .unwrap();
        let mut resources = Resources::new();
        let fern = resources.insert(VisualResource::new(mesh, texture).with_transparency());
        let entities = [Entity::new(fern, Vec3::ZERO), Entity::new(fern, Vec3::X)];

        let stats = render_entities(&mut device, &resources, &entities).unwrap();

        assert_eq!(stats.entity_draws, 2);
        assert_eq!(stats.batches, 1);
        assert_eq!(device.draw_count(), 2);
        assert!(device.draws().all(|d| !d.culling));
        assert!(device.culling_enabled());
    }
}
