use crate::asset::{Handle, Resources, VisualResource};
use crate::renderer::{ClipPlane, FrameInput};

use super::{Camera, Entity, Light, Terrain, WaterTile};

/// Everything that gets drawn, owned in one place. The renderer only ever
/// borrows it through [`Scene::frame_input`].
pub struct Scene {
    pub resources: Resources,
    pub entities: Vec<Entity>,
    pub terrains: Vec<Terrain>,
    pub water_tiles: Vec<WaterTile>,
    pub camera: Camera,
    lights: Vec<Light>,
}

impl Scene {
    /// The sun is the first light and the one shadows are cast from.
    pub fn new(sun: Light, camera: Camera) -> Self {
        Self {
            resources: Resources::new(),
            entities: Vec::new(),
            terrains: Vec::new(),
            water_tiles: Vec::new(),
            camera,
            lights: vec![sun],
        }
    }

    pub fn add_resource(&mut self, resource: VisualResource) -> Handle<VisualResource> {
        self.resources.insert(resource)
    }

    pub fn add_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn sun(&self) -> &Light {
        &self.lights[0]
    }

    pub fn sun_mut(&mut self) -> &mut Light {
        &mut self.lights[0]
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Ground height under a world position, taken from whichever tile covers it.
    pub fn height_at(&self, world_x: f32, world_z: f32) -> f32 {
        self.terrains
            .iter()
            .find(|t| {
                world_x >= t.x
                    && world_z >= t.z
                    && world_x < t.x + super::terrain::TERRAIN_SIZE
                    && world_z < t.z + super::terrain::TERRAIN_SIZE
            })
            .map(|t| t.height_at(world_x, world_z))
            .unwrap_or(0.0)
    }

    pub fn frame_input(&self, delta_seconds: f32) -> FrameInput<'_> {
        FrameInput {
            entities: &self.entities,
            terrains: &self.terrains,
            lights: &self.lights,
            sun: self.sun(),
            camera: &self.camera,
            water_tiles: &self.water_tiles,
            resources: &self.resources,
            clip_plane: ClipPlane::NONE,
            delta_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::device::{MeshHandle, TextureHandle};
    use glam::Vec3;

    #[test]
    fn sun_is_first_light() {
        let sun = Light::new(Vec3::new(10_000.0, 10_000.0, -10_000.0), Vec3::splat(1.3));
        let mut scene = Scene::new(sun, Camera::default());
        scene.add_light(Light::new(Vec3::ZERO, Vec3::X));
        assert_eq!(*scene.sun(), sun);
        assert_eq!(scene.lights().len(), 2);
    }

    #[test]
    fn frame_input_borrows_scene_contents() {
        let mut scene = Scene::new(Light::new(Vec3::Y, Vec3::ONE), Camera::default());
        let res = scene.add_resource(VisualResource::new(MeshHandle(0), TextureHandle(0)));
        scene.add_entity(Entity::new(res, Vec3::ZERO));
        scene.water_tiles.push(WaterTile::new(0.0, 0.0, 0.0));

        let input = scene.frame_input(0.016);
        assert_eq!(input.entities.len(), 1);
        assert_eq!(input.water_tiles.len(), 1);
        assert_eq!(input.clip_plane, ClipPlane::NONE);
        assert!(std::ptr::eq(input.sun, scene.sun()));
    }
}
