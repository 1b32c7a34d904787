//! Planar water: reflection and refraction captures plus the composite pass.

use crate::asset::MeshData;
use crate::error::RenderResult;
use crate::renderer::clip::ClipPlane;
use crate::renderer::device::{
    FrameTarget, GraphicsDevice, MeshHandle, ProgramHandle, ProgramKind, TargetDescriptor,
    TargetHandle, TextureHandle, TextureUnit, Uniform,
};
use crate::renderer::lights::LightArray;
use crate::renderer::projection::Projection;
use crate::scene::{Camera, Light, WaterTile};
use crate::settings::{RenderSettings, Resolution};

/// Surface textures the water program distorts and lights with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterTextures {
    pub dudv: TextureHandle,
    pub normal: TextureHandle,
}

/// Off-screen targets the water composite samples.
pub struct WaterFrameBuffers {
    reflection: TargetHandle,
    refraction: TargetHandle,
    reflection_texture: TextureHandle,
    refraction_texture: TextureHandle,
    refraction_depth: TextureHandle,
}

impl WaterFrameBuffers {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        reflection: Resolution,
        refraction: Resolution,
    ) -> RenderResult<Self> {
        let reflection_target = device.create_target(&TargetDescriptor::color(
            "WaterReflection",
            reflection.width,
            reflection.height,
        ))?;
        let refraction_target = match device.create_target(&TargetDescriptor::color(
            "WaterRefraction",
            refraction.width,
            refraction.height,
        )) {
            Ok(target) => target,
            Err(err) => {
                device.release_target(reflection_target);
                return Err(err);
            }
        };

        Ok(Self {
            reflection: reflection_target,
            refraction: refraction_target,
            reflection_texture: device.target_texture(reflection_target)?,
            refraction_texture: device.target_texture(refraction_target)?,
            refraction_depth: device.target_depth_texture(refraction_target)?,
        })
    }

    pub fn bind_reflection(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        device.bind_target(FrameTarget::Offscreen(self.reflection))
    }

    pub fn bind_refraction(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        device.bind_target(FrameTarget::Offscreen(self.refraction))
    }

    /// Return to the window surface.
    pub fn unbind(&self, device: &mut dyn GraphicsDevice) -> RenderResult<()> {
        device.bind_target(FrameTarget::Default)
    }

    pub fn reflection_texture(&self) -> TextureHandle {
        self.reflection_texture
    }

    pub fn refraction_texture(&self) -> TextureHandle {
        self.refraction_texture
    }

    pub fn refraction_depth_texture(&self) -> TextureHandle {
        self.refraction_depth
    }

    pub fn cleanup(&self, device: &mut dyn GraphicsDevice) {
        device.release_target(self.reflection);
        device.release_target(self.refraction);
    }
}

pub struct WaterPass {
    program: ProgramHandle,
    quad: MeshHandle,
    buffers: WaterFrameBuffers,
    textures: WaterTextures,
    wave_speed: f32,
    move_factor: f32,
}

impl WaterPass {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        settings: &RenderSettings,
        projection: &Projection,
        textures: WaterTextures,
    ) -> RenderResult<Self> {
        let program = device.create_program(ProgramKind::Water)?;
        let (quad, buffers) = match create_surfaces(device, settings) {
            Ok(parts) => parts,
            Err(err) => {
                device.release_program(program);
                return Err(err);
            }
        };

        let pass = Self {
            program,
            quad,
            buffers,
            textures,
            wave_speed: settings.wave_speed,
            move_factor: 0.0,
        };
        if let Err(err) = pass.set_projection(device, projection) {
            pass.cleanup(device);
            return Err(err);
        }
        Ok(pass)
    }

    pub fn set_projection(
        &self,
        device: &mut dyn GraphicsDevice,
        projection: &Projection,
    ) -> RenderResult<()> {
        device.use_program(self.program)?;
        device.set_uniform(Uniform::Projection(projection.compute()));
        device.set_uniform(Uniform::DepthRange {
            near: projection.near,
            far: projection.far,
        });
        device.stop_program();
        Ok(())
    }

    pub fn frame_buffers(&self) -> &WaterFrameBuffers {
        &self.buffers
    }

    pub fn move_factor(&self) -> f32 {
        self.move_factor
    }

    /// Render the scene mirrored about the water plane into the reflection
    /// target. `draw` receives a reflected copy of `camera`, so the caller's
    /// camera is the same afterwards whether or not `draw` fails.
    pub fn render_reflection<R>(
        &self,
        device: &mut dyn GraphicsDevice,
        camera: &Camera,
        water_height: f32,
        draw: impl FnOnce(&mut dyn GraphicsDevice, &Camera, ClipPlane) -> RenderResult<R>,
    ) -> RenderResult<R> {
        self.buffers.bind_reflection(device)?;
        let mirrored = camera.reflected(water_height);
        draw(device, &mirrored, ClipPlane::reflection(water_height))
    }

    /// Render what lies below the water plane into the refraction target.
    pub fn render_refraction<R>(
        &self,
        device: &mut dyn GraphicsDevice,
        camera: &Camera,
        water_height: f32,
        draw: impl FnOnce(&mut dyn GraphicsDevice, &Camera, ClipPlane) -> RenderResult<R>,
    ) -> RenderResult<R> {
        self.buffers.bind_refraction(device)?;
        draw(device, camera, ClipPlane::refraction(water_height))
    }

    /// Draw every tile onto the window surface. Returns the number of tiles drawn.
    pub fn composite(
        &mut self,
        device: &mut dyn GraphicsDevice,
        tiles: &[WaterTile],
        camera: &Camera,
        sun: &Light,
        delta_seconds: f32,
    ) -> RenderResult<u32> {
        if tiles.is_empty() {
            return Ok(0);
        }
        self.buffers.unbind(device)?;

        self.move_factor = (self.move_factor + self.wave_speed * delta_seconds).rem_euclid(1.0);

        device.use_program(self.program)?;
        device.set_uniform(Uniform::View(camera.view_matrix()));
        device.set_uniform(Uniform::CameraPosition(camera.position));
        device.set_uniform(Uniform::MoveFactor(self.move_factor));
        device.set_uniform(Uniform::Lights(LightArray::single(sun)));

        device.bind_texture(TextureUnit::REFLECTION, self.buffers.reflection_texture())?;
        device.bind_texture(TextureUnit::REFRACTION, self.buffers.refraction_texture())?;
        device.bind_texture(TextureUnit::DUDV_MAP, self.textures.dudv)?;
        device.bind_texture(TextureUnit::WATER_NORMAL_MAP, self.textures.normal)?;
        device.bind_texture(
            TextureUnit::REFRACTION_DEPTH,
            self.buffers.refraction_depth_texture(),
        )?;

        let mut draws = 0;
        for tile in tiles {
            device.set_uniform(Uniform::Model(tile.transformation_matrix()));
            device.draw(self.quad)?;
            draws += 1;
        }
        device.stop_program();
        Ok(draws)
    }

    pub fn cleanup(&self, device: &mut dyn GraphicsDevice) {
        device.release_program(self.program);
        device.release_mesh(self.quad);
        self.buffers.cleanup(device);
    }
}

fn create_surfaces(
    device: &mut dyn GraphicsDevice,
    settings: &RenderSettings,
) -> RenderResult<(MeshHandle, WaterFrameBuffers)> {
    let quad = device.create_mesh("WaterQuad", &MeshData::water_quad())?;
    match WaterFrameBuffers::new(device, settings.reflection, settings.refraction) {
        Ok(buffers) => Ok((quad, buffers)),
        Err(err) => {
            device.release_mesh(quad);
            Err(err)
        }
    }
}
