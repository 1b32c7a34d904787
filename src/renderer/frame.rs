//! Per-frame sequencing of the shadow, water and main passes.

use crate::asset::Resources;
use crate::error::{RenderError, RenderResult};
use crate::renderer::batch::EntityBatcher;
use crate::renderer::clip::ClipPlane;
use crate::renderer::device::{FrameTarget, GraphicsDevice};
use crate::renderer::main_pass::{MainPass, PassStats, SceneView};
use crate::renderer::projection::Projection;
use crate::renderer::shadow::ShadowPass;
use crate::renderer::water::{WaterPass, WaterTextures};
use crate::scene::{Camera, Entity, Light, Terrain, WaterTile};
use crate::settings::RenderSettings;

/// Everything a frame reads. Nothing here is modified by rendering.
#[derive(Clone, Copy)]
pub struct FrameInput<'a> {
    pub entities: &'a [Entity],
    pub terrains: &'a [Terrain],
    pub lights: &'a [Light],
    /// Shadow caster and water highlight source.
    pub sun: &'a Light,
    pub camera: &'a Camera,
    pub water_tiles: &'a [WaterTile],
    pub resources: &'a Resources,
    /// Clip plane for the on-screen main pass.
    pub clip_plane: ClipPlane,
    pub delta_seconds: f32,
}

impl<'a> FrameInput<'a> {
    /// An empty scene lit only by `sun`.
    pub fn new(camera: &'a Camera, sun: &'a Light, resources: &'a Resources) -> Self {
        Self {
            entities: &[],
            terrains: &[],
            lights: std::slice::from_ref(sun),
            sun,
            camera,
            water_tiles: &[],
            resources,
            clip_plane: ClipPlane::NONE,
            delta_seconds: 0.0,
        }
    }

    pub fn with_entities(mut self, entities: &'a [Entity]) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_terrains(mut self, terrains: &'a [Terrain]) -> Self {
        self.terrains = terrains;
        self
    }

    pub fn with_lights(mut self, lights: &'a [Light]) -> Self {
        self.lights = lights;
        self
    }

    pub fn with_water_tiles(mut self, tiles: &'a [WaterTile]) -> Self {
        self.water_tiles = tiles;
        self
    }

    pub fn with_clip_plane(mut self, clip_plane: ClipPlane) -> Self {
        self.clip_plane = clip_plane;
        self
    }

    pub fn with_delta_seconds(mut self, delta_seconds: f32) -> Self {
        self.delta_seconds = delta_seconds;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub shadow_draws: u32,
    /// Zero when the frame had no water.
    pub reflection: PassStats,
    pub refraction: PassStats,
    pub main: PassStats,
    pub water_draws: u32,
    pub batches: u32,
    pub entities: u32,
}

impl FrameStats {
    pub fn total_draws(&self) -> u32 {
        self.shadow_draws
            + self.reflection.draws()
            + self.refraction.draws()
            + self.main.draws()
            + self.water_draws
    }
}

/// Owns every pass and runs them in dependency order each frame.
pub struct FrameOrchestrator {
    projection: Projection,
    shadow: ShadowPass,
    main: MainPass,
    water: WaterPass,
    released: bool,
    warned_uneven_water: bool,
}

impl FrameOrchestrator {
    pub fn new(
        device: &mut dyn GraphicsDevice,
        settings: &RenderSettings,
        aspect: f32,
        water_textures: WaterTextures,
    ) -> RenderResult<Self> {
        let projection = Projection::new(
            settings.fov_degrees,
            settings.near_plane,
            settings.far_plane,
            aspect,
        );

        let shadow = ShadowPass::new(device, settings)?;
        let main = match MainPass::new(device, settings, &projection) {
            Ok(main) => main,
            Err(err) => {
                shadow.cleanup(device);
                return Err(err);
            }
        };
        let water = match WaterPass::new(device, settings, &projection, water_textures) {
            Ok(water) => water,
            Err(err) => {
                main.cleanup(device);
                shadow.cleanup(device);
                return Err(err);
            }
        };

        log::info!(
            "Frame orchestrator ready: fov {}°, planes {}..{}, aspect {:.3}",
            projection.fov_degrees,
            projection.near,
            projection.far,
            projection.aspect
        );

        Ok(Self {
            projection,
            shadow,
            main,
            water,
            released: false,
            warned_uneven_water: false,
        })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn shadow_pass(&self) -> &ShadowPass {
        &self.shadow
    }

    pub fn water_pass(&self) -> &WaterPass {
        &self.water
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn render_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        input: &FrameInput<'_>,
    ) -> RenderResult<FrameStats> {
        self.render_frame_with_overlay(device, input, |_| Ok(()))
    }

    /// Render one frame, then hand the device to `overlay` with the window
    /// surface bound.
    pub fn render_frame_with_overlay(
        &mut self,
        device: &mut dyn GraphicsDevice,
        input: &FrameInput<'_>,
        overlay: impl FnOnce(&mut dyn GraphicsDevice) -> RenderResult<()>,
    ) -> RenderResult<FrameStats> {
        if self.released {
            return Err(RenderError::Released);
        }

        let mut batcher = EntityBatcher::new();
        batcher.extend(input.entities.iter());
        let batches = batcher.drain();

        let shadow = self
            .shadow
            .render(device, &batches, input.resources, input.sun)?;

        let view = SceneView {
            batches: &batches,
            terrains: input.terrains,
            lights: input.lights,
            resources: input.resources,
        };
        let mut stats = FrameStats {
            shadow_draws: shadow.draws(),
            batches: batches.len() as u32,
            entities: batches.entity_count() as u32,
            ..FrameStats::default()
        };

        if let Some(height) = self.water_height(input.water_tiles) {
            let main = &self.main;
            stats.reflection =
                self.water
                    .render_reflection(device, input.camera, height, |device, camera, clip| {
                        main.render(device, &view, camera, clip, &shadow)
                    })?;
            stats.refraction =
                self.water
                    .render_refraction(device, input.camera, height, |device, camera, clip| {
                        main.render(device, &view, camera, clip, &shadow)
                    })?;
        }

        device.bind_target(FrameTarget::Default)?;
        stats.main = self
            .main
            .render(device, &view, input.camera, input.clip_plane, &shadow)?;

        stats.water_draws = self.water.composite(
            device,
            input.water_tiles,
            input.camera,
            input.sun,
            input.delta_seconds,
        )?;

        overlay(device)?;
        Ok(stats)
    }

    /// Height the water captures are taken at: the first tile's.
    fn water_height(&mut self, tiles: &[WaterTile]) -> Option<f32> {
        let height = tiles.first()?.height;
        if !self.warned_uneven_water && tiles.iter().any(|tile| tile.height != height) {
            log::warn!(
                "Water tiles sit at different heights; reflecting about the first tile's height {}",
                height
            );
            self.warned_uneven_water = true;
        }
        Some(height)
    }

    /// Rebuild the projection for a new aspect ratio. A zero-sized window is
    /// ignored until it has an area again.
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, aspect: f32) -> RenderResult<()> {
        if self.released {
            return Err(RenderError::Released);
        }
        if !(aspect > 0.0 && aspect.is_finite()) {
            log::debug!("Ignoring resize to degenerate aspect ratio {}", aspect);
            return Ok(());
        }
        self.projection = self.projection.with_aspect(aspect);
        self.main.set_projection(device, &self.projection)?;
        self.water.set_projection(device, &self.projection)?;
        Ok(())
    }

    /// Release every program and target. Safe to call more than once.
    pub fn cleanup(&mut self, device: &mut dyn GraphicsDevice) {
        if self.released {
            return;
        }
        self.main.cleanup(device);
        self.water.cleanup(device);
        self.shadow.cleanup(device);
        self.released = true;
        log::info!("Renderer resources released");
    }
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("FrameOrchestrator dropped without cleanup; GPU resources were not released");
        }
    }
}
