//! wgpu implementation of [`GraphicsDevice`].
//!
//! Commands are recorded per target binding during the frame and replayed as
//! wgpu render passes, in recording order, when [`WgpuDevice::present`] runs.
//! Every draw snapshots the active program's [`ShaderGlobals`] into a dynamic
//! uniform buffer, so uniform writes between draws behave immediately.

mod context;
mod pipeline;
mod targets;
mod textures;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec3;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::asset::MeshData;
use crate::error::{RenderError, RenderResult};
use crate::renderer::device::{
    ClearFlags, FrameTarget, GraphicsDevice, MeshHandle, ProgramHandle, ProgramKind,
    TargetDescriptor, TargetHandle, TargetKind, TextureHandle, TextureUnit, Uniform,
};
use crate::renderer::uniforms::ShaderGlobals;
use crate::settings::RenderSettings;

use context::GpuContext;
use pipeline::{uniform_stride, PipelineCache, ProgramLayouts, ProgramPipelines};
use targets::{GpuTarget, PassOps};
use textures::{FallbackTextures, GpuTexture, MipmapGenerator, Samplers, DEPTH_FORMAT};

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct GpuProgram {
    pipelines: Rc<ProgramPipelines>,
    globals: ShaderGlobals,
}

struct GpuDraw {
    pipeline: wgpu::RenderPipeline,
    uniform_offset: u32,
    textures: Option<wgpu::BindGroup>,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct RecordedPass {
    target: FrameTarget,
    ops: PassOps,
    draws: Vec<GpuDraw>,
}

type TextureSlots = [Option<TextureHandle>; TextureUnit::COUNT];

pub struct WgpuDevice {
    context: GpuContext,
    layouts: ProgramLayouts,
    pipelines: PipelineCache,
    samplers: Samplers,
    mipmaps: MipmapGenerator,
    fallback: FallbackTextures,

    meshes: HashMap<MeshHandle, GpuMesh>,
    textures: HashMap<TextureHandle, GpuTexture>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    targets: HashMap<TargetHandle, GpuTarget>,
    next_id: u32,

    units: TextureSlots,
    current_program: Option<ProgramHandle>,
    current_target: FrameTarget,
    culling: bool,

    passes: Vec<RecordedPass>,
    texture_groups: HashMap<TextureSlots, wgpu::BindGroup>,
    uniform_data: Vec<u8>,
    uniform_stride: u64,
    uniform_buffer: wgpu::Buffer,
    uniform_group: wgpu::BindGroup,
    frame: Option<wgpu::SurfaceTexture>,
}

impl WgpuDevice {
    pub fn new(window: Arc<Window>, settings: &RenderSettings) -> RenderResult<Self> {
        let context = pollster::block_on(GpuContext::new(window, settings))?;
        let device = &context.device;

        let layouts = ProgramLayouts::new(device);
        let samplers = Samplers::new(device);
        let mipmaps = MipmapGenerator::new(device);
        let fallback = FallbackTextures::new(device, &context.queue);
        let uniform_stride = uniform_stride(device);
        let (uniform_buffer, uniform_group) =
            Self::create_uniform_buffer(device, &layouts, uniform_stride * 64);

        Ok(Self {
            layouts,
            pipelines: PipelineCache::default(),
            samplers,
            mipmaps,
            fallback,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            targets: HashMap::new(),
            next_id: 0,
            units: [None; TextureUnit::COUNT],
            current_program: None,
            current_target: FrameTarget::Default,
            culling: true,
            passes: Vec::new(),
            texture_groups: HashMap::new(),
            uniform_data: Vec::new(),
            uniform_stride,
            uniform_buffer,
            uniform_group,
            frame: None,
            context,
        })
    }

    fn create_uniform_buffer(
        device: &wgpu::Device,
        layouts: &ProgramLayouts,
        size: u64,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("GlobalsBuffer"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GlobalsBindGroup"),
            layout: &layouts.globals,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ShaderGlobals>() as u64),
                }),
            }],
        });
        (buffer, group)
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub fn aspect(&self) -> f32 {
        self.context.size.width.max(1) as f32 / self.context.size.height.max(1) as f32
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
    }

    /// Acquire the next surface texture and start recording a frame.
    pub fn begin_frame(&mut self) -> RenderResult<()> {
        self.passes.clear();
        self.uniform_data.clear();
        self.current_target = FrameTarget::Default;
        match self.context.surface.get_current_texture() {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::debug!("Surface {:?}; reconfiguring", err);
                self.context.reconfigure();
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Replay the recorded passes and present the frame.
    pub fn present(&mut self) -> RenderResult<()> {
        let passes = std::mem::take(&mut self.passes);
        let Some(frame) = self.frame.take() else {
            log::warn!("present called without begin_frame; dropping {} passes", passes.len());
            return Ok(());
        };

        self.upload_uniforms();
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("FrameEncoder"),
                });

        for pass in &passes {
            let (color_view, depth_view) = match pass.target {
                FrameTarget::Default => (Some(&surface_view), &self.context.depth.view),
                FrameTarget::Offscreen(handle) => {
                    let Some(target) = self.targets.get(&handle) else {
                        log::warn!("Skipping pass into released target {}", handle.index());
                        continue;
                    };
                    let color = match target.kind {
                        TargetKind::Color => target
                            .color
                            .and_then(|color| self.textures.get(&color))
                            .map(|texture| &texture.view),
                        TargetKind::Depth => None,
                    };
                    let Some(depth) = self.textures.get(&target.depth) else {
                        continue;
                    };
                    (color, &depth.view)
                }
            };

            let color_attachments: Vec<_> = color_view
                .map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: pass.ops.color,
                        store: wgpu::StoreOp::Store,
                    },
                })
                .into_iter()
                .map(Some)
                .collect();
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("RecordedPass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: pass.ops.depth,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                rpass.set_pipeline(&draw.pipeline);
                rpass.set_bind_group(0, &self.uniform_group, &[draw.uniform_offset]);
                if let Some(textures) = &draw.textures {
                    rpass.set_bind_group(1, textures, &[]);
                }
                rpass.set_vertex_buffer(0, draw.vertex_buffer.slice(..));
                rpass.set_index_buffer(draw.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        self.uniform_data.clear();
        Ok(())
    }

    fn upload_uniforms(&mut self) {
        if self.uniform_data.is_empty() {
            return;
        }
        let needed = self.uniform_data.len() as u64;
        if needed > self.uniform_buffer.size() {
            let size = needed.next_power_of_two();
            log::debug!("Growing globals buffer to {} bytes", size);
            let (buffer, group) =
                Self::create_uniform_buffer(&self.context.device, &self.layouts, size);
            self.uniform_buffer = buffer;
            self.uniform_group = group;
        }
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, &self.uniform_data);
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Run `create` inside out-of-memory and validation error scopes and turn
    /// any captured error into `ResourceExhausted`.
    fn scoped<T>(&self, what: &str, create: impl FnOnce(&wgpu::Device) -> T) -> RenderResult<T> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(device);
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        match out_of_memory.or(validation) {
            Some(err) => {
                log::error!("Failed to create {}: {}", what, err);
                Err(RenderError::exhausted(what, err.to_string()))
            }
            None => Ok(value),
        }
    }

    fn current_pass(&mut self) -> &mut RecordedPass {
        let target = self.current_target;
        let needs_pass = self.passes.last().map_or(true, |pass| pass.target != target);
        if needs_pass {
            self.passes.push(RecordedPass {
                target,
                ops: PassOps::LOAD,
                draws: Vec::new(),
            });
        }
        let last = self.passes.len() - 1;
        &mut self.passes[last]
    }

    fn target_owns(&self, texture: TextureHandle) -> bool {
        match self.current_target {
            FrameTarget::Default => false,
            FrameTarget::Offscreen(handle) => self
                .targets
                .get(&handle)
                .is_some_and(|target| target.owns(texture)),
        }
    }

    /// Textures the active program will actually see, with `None` standing
    /// in for the matching fallback.
    fn resolve_units(&self, kind: ProgramKind) -> TextureSlots {
        let mut slots: TextureSlots = [None; TextureUnit::COUNT];
        for unit in kind.sampled_units() {
            let Some(texture) = self.units[unit.slot()] else {
                continue;
            };
            let wants_depth = *unit == TextureUnit::SHADOW_MAP;
            let usable = self
                .textures
                .get(&texture)
                .is_some_and(|gpu| gpu.is_depth == wants_depth);
            if usable && !self.target_owns(texture) {
                slots[unit.slot()] = Some(texture);
            }
        }
        slots
    }

    fn texture_group(&mut self, slots: TextureSlots) -> wgpu::BindGroup {
        if let Some(group) = self.texture_groups.get(&slots) {
            return group.clone();
        }
        let views: [&wgpu::TextureView; TextureUnit::COUNT] = std::array::from_fn(|slot| {
            let fallback = if slot == TextureUnit::SHADOW_MAP.slot() {
                &self.fallback.depth
            } else {
                &self.fallback.color
            };
            let texture = slots[slot]
                .and_then(|handle| self.textures.get(&handle))
                .unwrap_or(fallback);
            &texture.view
        });
        let group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("TextureUnits"),
                layout: &self.layouts.textures,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(views[0]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(views[1]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(views[2]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(views[3]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(views[4]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(views[5]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::Sampler(&self.samplers.repeat),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::Sampler(&self.samplers.shadow),
                    },
                ],
            });
        self.texture_groups.insert(slots, group.clone());
        group
    }

    fn unknown_target(target: TargetHandle) -> RenderError {
        RenderError::UnknownHandle {
            kind: "target",
            index: target.index(),
        }
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> RenderResult<MeshHandle> {
        if mesh.is_empty() {
            return Err(RenderError::InvalidGeometry(format!(
                "mesh '{label}' has no vertices or indices"
            )));
        }
        let (vertex_buffer, index_buffer) = self.scoped(label, |device| {
            let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            (vertices, indices)
        })?;
        let handle = MeshHandle(self.next_id());
        self.meshes.insert(
            handle,
            GpuMesh {
                vertex_buffer,
                index_buffer,
                index_count: mesh.index_count(),
            },
        );
        Ok(handle)
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh).is_none() {
            log::warn!("Mesh {} released twice or never created", mesh.index());
        }
    }

    fn create_texture(
        &mut self,
        label: &str,
        image: &image::RgbaImage,
    ) -> RenderResult<TextureHandle> {
        let texture = {
            let context = &self.context;
            let mipmaps = &self.mipmaps;
            self.scoped(label, |device| {
                GpuTexture::from_image(device, &context.queue, mipmaps, label, image)
            })??
        };
        let (width, height) = texture.size();
        let handle = TextureHandle(self.next_id());
        self.textures.insert(handle, texture);
        log::debug!("Texture '{}' {}x{} uploaded as {}", label, width, height, handle.index());
        Ok(handle)
    }

    fn create_program(&mut self, kind: ProgramKind) -> RenderResult<ProgramHandle> {
        let format = self.context.format();
        let pipelines = {
            let layouts = &self.layouts;
            let cache = &mut self.pipelines;
            let device = &self.context.device;
            device.push_error_scope(wgpu::ErrorFilter::Validation);
            let pipelines = cache.get_or_build(device, layouts, kind, format);
            if let Some(err) = pollster::block_on(device.pop_error_scope()) {
                log::error!("Failed to compile {}: {}", kind.label(), err);
                return Err(RenderError::exhausted(kind.label(), err.to_string()));
            }
            pipelines
        };
        let handle = ProgramHandle(self.next_id());
        self.programs.insert(
            handle,
            GpuProgram {
                pipelines,
                globals: ShaderGlobals::new(),
            },
        );
        Ok(handle)
    }

    fn release_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            log::warn!("Program {} released twice or never created", program.index());
            return;
        }
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn create_target(&mut self, descriptor: &TargetDescriptor) -> RenderResult<TargetHandle> {
        let limit = self.context.device.limits().max_texture_dimension_2d;
        if descriptor.width == 0
            || descriptor.height == 0
            || descriptor.width > limit
            || descriptor.height > limit
        {
            return Err(RenderError::exhausted(
                descriptor.label.clone(),
                format!(
                    "{}x{} is outside 1..={} texels",
                    descriptor.width, descriptor.height, limit
                ),
            ));
        }

        let format = self.context.format();
        let (color, depth) = self.scoped(&descriptor.label, |device| {
            let depth = GpuTexture::attachment(
                device,
                &format!("{}Depth", descriptor.label),
                descriptor.width,
                descriptor.height,
                DEPTH_FORMAT,
            );
            let color = match descriptor.kind {
                TargetKind::Color => Some(GpuTexture::attachment(
                    device,
                    &format!("{}Color", descriptor.label),
                    descriptor.width,
                    descriptor.height,
                    format,
                )),
                TargetKind::Depth => None,
            };
            (color, depth)
        })?;

        let depth_handle = TextureHandle(self.next_id());
        self.textures.insert(depth_handle, depth);
        let color_handle = color.map(|texture| {
            let handle = TextureHandle(self.next_id());
            self.textures.insert(handle, texture);
            handle
        });

        let handle = TargetHandle(self.next_id());
        self.targets.insert(
            handle,
            GpuTarget {
                kind: descriptor.kind,
                color: color_handle,
                depth: depth_handle,
            },
        );
        log::info!(
            "Created {:?} target '{}' {}x{}",
            descriptor.kind,
            descriptor.label,
            descriptor.width,
            descriptor.height
        );
        Ok(handle)
    }

    fn release_target(&mut self, target: TargetHandle) {
        let Some(released) = self.targets.remove(&target) else {
            log::warn!("Target {} released twice or never created", target.index());
            return;
        };
        if let Some(color) = released.color {
            self.textures.remove(&color);
        }
        self.textures.remove(&released.depth);
        self.texture_groups
            .retain(|slots, _| !slots.iter().flatten().any(|t| released.owns(*t)));
        for unit in self.units.iter_mut() {
            if unit.is_some_and(|t| released.owns(t)) {
                *unit = None;
            }
        }
        if self.current_target == FrameTarget::Offscreen(target) {
            self.current_target = FrameTarget::Default;
        }
    }

    fn target_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle> {
        self.targets
            .get(&target)
            .map(GpuTarget::primary)
            .ok_or_else(|| Self::unknown_target(target))
    }

    fn target_depth_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle> {
        self.targets
            .get(&target)
            .map(|t| t.depth)
            .ok_or_else(|| Self::unknown_target(target))
    }

    fn bind_target(&mut self, target: FrameTarget) -> RenderResult<()> {
        if let FrameTarget::Offscreen(handle) = target {
            if !self.targets.contains_key(&handle) {
                return Err(Self::unknown_target(handle));
            }
        }
        self.current_target = target;
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, color: Vec3) {
        let target = self.current_target;
        let clear_color = wgpu::Color {
            r: color.x as f64,
            g: color.y as f64,
            b: color.z as f64,
            a: 1.0,
        };
        let pass = self.current_pass();
        let fresh = pass.draws.is_empty();
        let mut ops = if fresh { pass.ops } else { PassOps::LOAD };
        if flags.contains(ClearFlags::COLOR) {
            ops.color = wgpu::LoadOp::Clear(clear_color);
        }
        if flags.contains(ClearFlags::DEPTH) {
            ops.depth = wgpu::LoadOp::Clear(1.0);
        }
        if fresh {
            pass.ops = ops;
        } else {
            self.passes.push(RecordedPass {
                target,
                ops,
                draws: Vec::new(),
            });
        }
    }

    fn set_culling(&mut self, enabled: bool) {
        self.culling = enabled;
    }

    fn use_program(&mut self, program: ProgramHandle) -> RenderResult<()> {
        if !self.programs.contains_key(&program) {
            return Err(RenderError::UnknownHandle {
                kind: "program",
                index: program.index(),
            });
        }
        self.current_program = Some(program);
        Ok(())
    }

    fn stop_program(&mut self) {
        self.current_program = None;
    }

    fn set_uniform(&mut self, uniform: Uniform) {
        let Some(program) = self
            .current_program
            .and_then(|handle| self.programs.get_mut(&handle))
        else {
            log::debug!("Uniform {:?} set with no active program", uniform);
            return;
        };
        program.globals.apply(&uniform);
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureHandle) -> RenderResult<()> {
        if !self.textures.contains_key(&texture) {
            return Err(RenderError::UnknownHandle {
                kind: "texture",
                index: texture.index(),
            });
        }
        let slot = self
            .units
            .get_mut(unit.slot())
            .ok_or(RenderError::UnknownHandle {
                kind: "texture unit",
                index: unit.0,
            })?;
        *slot = Some(texture);
        Ok(())
    }

    fn draw(&mut self, mesh: MeshHandle) -> RenderResult<()> {
        let program = self
            .current_program
            .and_then(|handle| self.programs.get(&handle))
            .ok_or(RenderError::NoActiveProgram)?;
        let gpu_mesh = self.meshes.get(&mesh).ok_or(RenderError::UnknownHandle {
            kind: "mesh",
            index: mesh.index(),
        })?;

        let kind = program.pipelines.kind;
        let depth_target = match self.current_target {
            FrameTarget::Default => false,
            FrameTarget::Offscreen(handle) => self
                .targets
                .get(&handle)
                .is_some_and(|target| target.kind == TargetKind::Depth),
        };
        if kind.is_depth_only() != depth_target {
            return Err(RenderError::IncompatibleTarget {
                program: kind,
                target: self.current_target,
            });
        }

        let pipeline = program.pipelines.pipeline(self.culling).clone();
        let globals = program.globals;
        let vertex_buffer = gpu_mesh.vertex_buffer.clone();
        let index_buffer = gpu_mesh.index_buffer.clone();
        let index_count = gpu_mesh.index_count;

        let textures = if kind.is_depth_only() {
            None
        } else {
            let slots = self.resolve_units(kind);
            Some(self.texture_group(slots))
        };

        let offset = self.uniform_data.len() as u64;
        self.uniform_data.extend_from_slice(bytemuck::bytes_of(&globals));
        self.uniform_data
            .resize((offset + self.uniform_stride) as usize, 0);

        self.current_pass().draws.push(GpuDraw {
            pipeline,
            uniform_offset: offset as u32,
            textures,
            vertex_buffer,
            index_buffer,
            index_count,
        });
        Ok(())
    }
}
