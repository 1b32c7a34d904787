// app.rs
use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use crate::error::{RenderError, RenderResult};
use crate::renderer::{FrameOrchestrator, GraphicsDevice, WaterTextures, WgpuDevice};
use crate::scene::Scene;
use crate::settings::RenderSettings;

/// Builds the scene once the device exists and advances it every frame.
pub trait SceneSetup {
    fn build(&mut self, device: &mut dyn GraphicsDevice) -> RenderResult<(Scene, WaterTextures)>;

    fn update(&mut self, _scene: &mut Scene, _delta_seconds: f32) {}
}

struct RenderState {
    device: WgpuDevice,
    renderer: FrameOrchestrator,
    scene: Scene,
}

impl RenderState {
    fn new(
        window: Arc<Window>,
        settings: &RenderSettings,
        setup: &mut impl SceneSetup,
    ) -> RenderResult<Self> {
        let mut device = WgpuDevice::new(window, settings)?;
        let (scene, water_textures) = setup.build(&mut device)?;
        let aspect = device.aspect();
        let renderer = FrameOrchestrator::new(&mut device, settings, aspect, water_textures)?;
        Ok(Self {
            device,
            renderer,
            scene,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) -> RenderResult<()> {
        self.device.resize(size);
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        let aspect = self.device.aspect();
        self.renderer.resize(&mut self.device, aspect)
    }

    /// Render one frame. Returns `Ok(false)` when the surface was not ready
    /// and the frame was skipped.
    fn render(&mut self, delta_seconds: f32) -> RenderResult<bool> {
        match self.device.begin_frame() {
            Ok(()) => {}
            Err(RenderError::Surface(
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Timeout,
            )) => return Ok(false),
            Err(err) => return Err(err),
        }
        let input = self.scene.frame_input(delta_seconds);
        let stats = self.renderer.render_frame(&mut self.device, &input)?;
        log::trace!(
            "Frame: {} draws in {} batches ({} entities)",
            stats.total_draws(),
            stats.batches,
            stats.entities
        );
        self.device.present()?;
        Ok(true)
    }

    fn shutdown(&mut self) {
        self.renderer.cleanup(&mut self.device);
    }
}

pub struct App<S: SceneSetup> {
    settings: RenderSettings,
    setup: S,
    window: Option<Arc<Window>>,
    window_id: Option<WindowId>,
    state: Option<RenderState>,
    last_frame: Instant,
}

impl<S: SceneSetup> App<S> {
    pub fn new(settings: RenderSettings, setup: S) -> Self {
        Self {
            settings,
            setup,
            window: None,
            window_id: None,
            state: None,
            last_frame: Instant::now(),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RenderError) {
        log::error!("Rendering failed: {}", err);
        if let Some(state) = self.state.as_mut() {
            state.shutdown();
        }
        event_loop.exit();
    }
}

impl<S: SceneSetup> ApplicationHandler for App<S> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let resolution = self.settings.resolution;
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("wgpu lakeside")
                    .with_inner_size(PhysicalSize::new(resolution.width, resolution.height)),
            )
            .expect("create window");
        let window = Arc::new(window);
        self.window_id = Some(window.id());

        match RenderState::new(window.clone(), &self.settings, &mut self.setup) {
            Ok(state) => {
                self.state = Some(state);
                self.last_frame = Instant::now();
                window.request_redraw();
            }
            Err(err) => {
                log::error!("Failed to initialize renderer: {}", err);
                event_loop.exit();
            }
        }
        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if Some(id) != self.window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                let result = self.state.as_mut().map_or(Ok(()), |state| state.resize(size));
                if let Err(err) = result {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let Some(size) = self.window.as_ref().map(|w| w.inner_size()) else {
                    return;
                };
                let result = self.state.as_mut().map_or(Ok(()), |state| state.resize(size));
                if let Err(err) = result {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let delta_seconds = (now - self.last_frame).as_secs_f32();
                self.last_frame = now;

                let Some(state) = self.state.as_mut() else {
                    return;
                };
                self.setup.update(&mut state.scene, delta_seconds);
                if let Err(err) = state.render(delta_seconds) {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.as_mut() {
            state.shutdown();
        }
    }
}
