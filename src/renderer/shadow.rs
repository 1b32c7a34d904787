//! Depth-only pass that renders the scene from the sun.

use glam::{Mat4, Vec3};

use crate::asset::Resources;
use crate::error::{RenderError, RenderResult};
use crate::renderer::batch::RenderBatches;
use crate::renderer::device::{
    ClearFlags, FrameTarget, GraphicsDevice, ProgramHandle, ProgramKind, TargetDescriptor,
    TargetHandle, TextureHandle, Uniform,
};
use crate::scene::Light;
use crate::settings::RenderSettings;

/// Smallest half-extent of the shadow frustum, so a lone entity still casts
/// a sharp shadow.
pub const MIN_SHADOW_RADIUS: f32 = 25.0;
/// Extra room behind the framed scene for casters just outside it.
const LIGHT_OFFSET: f32 = 10.0;

/// Result of a shadow pass; the main pass samples it. Only
/// [`ShadowPass::render`] produces one, so a main pass always runs after
/// the shadow map it reads has been drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMapState {
    light_space: Mat4,
    texture: TextureHandle,
    map_size: u32,
    distance: f32,
    center: Vec3,
    radius: f32,
    draws: u32,
}

impl ShadowMapState {
    /// World to light clip space with 0..1 depth.
    pub fn light_space_matrix(&self) -> Mat4 {
        self.light_space
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn map_size(&self) -> u32 {
        self.map_size
    }

    pub fn shadow_distance(&self) -> f32 {
        self.distance
    }

    pub fn center(&self) -> Vec3 {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn draws(&self) -> u32 {
        self.draws
    }

    /// Shadow-map texture coordinates (y down) and depth of a world point.
    /// Points behind the light come back as `(-1, -1, -1)`.
    pub fn project(&self, world: Vec3) -> Vec3 {
        let clip = self.light_space * world.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        if ndc.z < 0.0 {
            return Vec3::splat(-1.0);
        }
        Vec3::new(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5, ndc.z)
    }
}

pub struct ShadowPass {
    program: ProgramHandle,
    target: TargetHandle,
    texture: TextureHandle,
    map_size: u32,
    shadow_distance: f32,
    light_space: Mat4,
}

impl ShadowPass {
    pub fn new(device: &mut dyn GraphicsDevice, settings: &RenderSettings) -> RenderResult<Self> {
        let program = device.create_program(ProgramKind::Shadow)?;
        let target = match device
            .create_target(&TargetDescriptor::depth("ShadowMap", settings.shadow_map_size))
        {
            Ok(target) => target,
            Err(err) => {
                device.release_program(program);
                return Err(err);
            }
        };
        let texture = device.target_texture(target)?;
        log::info!(
            "Shadow map {}x{} ready (distance {})",
            settings.shadow_map_size,
            settings.shadow_map_size,
            settings.shadow_distance
        );

        Ok(Self {
            program,
            target,
            texture,
            map_size: settings.shadow_map_size,
            shadow_distance: settings.shadow_distance,
            light_space: Mat4::IDENTITY,
        })
    }

    /// Light-space matrix of the most recent render, identity before the first.
    pub fn light_space_matrix(&self) -> Mat4 {
        self.light_space
    }

    pub fn shadow_map_texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        batches: &RenderBatches<'_>,
        resources: &Resources,
        sun: &Light,
    ) -> RenderResult<ShadowMapState> {
        let (center, radius) = self.frame_casters(batches);
        let light_space = light_space_matrix(sun.position, center, radius);
        self.light_space = light_space;

        device.bind_target(FrameTarget::Offscreen(self.target))?;
        device.clear(ClearFlags::DEPTH, Vec3::ZERO);
        device.use_program(self.program)?;
        device.set_uniform(Uniform::LightSpace(light_space));

        let mut draws = 0;
        for (handle, entities) in batches.iter() {
            let resource = resources.get(handle).ok_or_else(|| {
                RenderError::InvalidGeometry(format!(
                    "entity references unknown visual resource {}",
                    handle.index()
                ))
            })?;
            for entity in entities {
                device.set_uniform(Uniform::Model(entity.transformation_matrix()));
                device.draw(resource.mesh)?;
                draws += 1;
            }
        }

        device.stop_program();
        device.bind_target(FrameTarget::Default)?;

        Ok(ShadowMapState {
            light_space,
            texture: self.texture,
            map_size: self.map_size,
            distance: self.shadow_distance,
            center,
            radius,
            draws,
        })
    }

    fn frame_casters(&self, batches: &RenderBatches<'_>) -> (Vec3, f32) {
        let mut positions = batches
            .iter()
            .flat_map(|(_, entities)| entities.iter().map(|e| e.position));
        let Some(first) = positions.next() else {
            return (Vec3::ZERO, MIN_SHADOW_RADIUS);
        };
        let (min, max) = positions.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        let radius = ((max - min).length() * 0.5)
            .max(MIN_SHADOW_RADIUS)
            .min(self.shadow_distance.max(MIN_SHADOW_RADIUS));
        ((min + max) * 0.5, radius)
    }

    pub fn cleanup(&self, device: &mut dyn GraphicsDevice) {
        device.release_program(self.program);
        device.release_target(self.target);
    }
}

/// Orthographic view of a sphere of `radius` around `center`, looking along
/// the direction light travels from `sun_position`.
pub fn light_space_matrix(sun_position: Vec3, center: Vec3, radius: f32) -> Mat4 {
    let direction = (-sun_position).try_normalize().unwrap_or(Vec3::NEG_Y);
    let up = if direction.dot(Vec3::Y).abs() > 0.95 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let eye = center - direction * (radius + LIGHT_OFFSET);
    let view = Mat4::look_to_rh(eye, direction, up);
    let projection =
        Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.0, 2.0 * (radius + LIGHT_OFFSET));
    projection * view
}
