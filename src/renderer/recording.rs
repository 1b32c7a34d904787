//! Headless [`GraphicsDevice`] that logs every command instead of drawing.
//!
//! Used by the tests and for dry runs without a window. It keeps enough state
//! (live handles, the active program and target, per-program uniforms) to
//! reject the same misuse a GPU backend would.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::asset::MeshData;
use crate::error::{RenderError, RenderResult};
use crate::renderer::device::{
    ClearFlags, FrameTarget, GraphicsDevice, MeshHandle, ProgramHandle, ProgramKind,
    TargetDescriptor, TargetHandle, TargetKind, TextureHandle, TextureUnit, Uniform,
};
use crate::renderer::uniforms::ShaderGlobals;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    CreateMesh {
        mesh: MeshHandle,
        label: String,
        index_count: u32,
    },
    ReleaseMesh(MeshHandle),
    CreateTexture {
        texture: TextureHandle,
        label: String,
        width: u32,
        height: u32,
    },
    CreateProgram {
        program: ProgramHandle,
        kind: ProgramKind,
    },
    ReleaseProgram(ProgramHandle),
    CreateTarget {
        target: TargetHandle,
        descriptor: TargetDescriptor,
    },
    ReleaseTarget(TargetHandle),
    BindTarget(FrameTarget),
    Clear {
        flags: ClearFlags,
        color: Vec3,
    },
    SetCulling(bool),
    UseProgram(ProgramHandle),
    StopProgram,
    SetUniform {
        program: Option<ProgramHandle>,
        uniform: Uniform,
    },
    BindTexture {
        unit: TextureUnit,
        texture: TextureHandle,
    },
    Draw(DrawCall),
}

/// A recorded draw with the state it was issued under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCall {
    pub mesh: MeshHandle,
    pub program: ProgramKind,
    pub target: FrameTarget,
    pub culling: bool,
}

struct RecordedTarget {
    descriptor: TargetDescriptor,
    color: TextureHandle,
    depth: TextureHandle,
}

pub struct RecordingDevice {
    /// When set, every `create_target` fails with `ResourceExhausted`.
    pub fail_target_creation: bool,
    /// When set, every `create_program` fails with `ResourceExhausted`.
    pub fail_program_creation: bool,
    commands: Vec<DeviceCommand>,
    meshes: HashMap<MeshHandle, u32>,
    textures: HashSet<TextureHandle>,
    programs: HashMap<ProgramHandle, ProgramKind>,
    targets: HashMap<TargetHandle, RecordedTarget>,
    double_releases: u32,
    globals: HashMap<ProgramHandle, ShaderGlobals>,
    units: [Option<TextureHandle>; TextureUnit::COUNT],
    current_program: Option<ProgramHandle>,
    current_target: FrameTarget,
    culling: bool,
    next_id: u32,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            fail_target_creation: false,
            fail_program_creation: false,
            commands: Vec::new(),
            meshes: HashMap::new(),
            textures: HashSet::new(),
            programs: HashMap::new(),
            targets: HashMap::new(),
            double_releases: 0,
            globals: HashMap::new(),
            units: [None; TextureUnit::COUNT],
            current_program: None,
            current_target: FrameTarget::Default,
            culling: true,
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn new_texture(&mut self) -> TextureHandle {
        let texture = TextureHandle(self.next_id());
        self.textures.insert(texture);
        texture
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Forget recorded commands but keep every live resource.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            DeviceCommand::Draw(call) => Some(call),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    pub fn draws_with(&self, kind: ProgramKind) -> usize {
        self.draws().filter(|call| call.program == kind).count()
    }

    pub fn draws_into(&self, target: FrameTarget) -> usize {
        self.draws().filter(|call| call.target == target).count()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_targets(&self) -> usize {
        self.targets.len()
    }

    /// Releases of handles that were already released or never existed.
    pub fn double_releases(&self) -> u32 {
        self.double_releases
    }

    pub fn program_kind(&self, program: ProgramHandle) -> Option<ProgramKind> {
        self.programs.get(&program).copied()
    }

    /// First live program of `kind`.
    pub fn program_of(&self, kind: ProgramKind) -> Option<ProgramHandle> {
        let mut matching: Vec<_> = self
            .programs
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(handle, _)| *handle)
            .collect();
        matching.sort_by_key(|handle| handle.index());
        matching.first().copied()
    }

    /// Uniform state a program would draw with right now.
    pub fn program_globals(&self, program: ProgramHandle) -> Option<&ShaderGlobals> {
        self.globals.get(&program)
    }

    pub fn target_descriptor(&self, target: TargetHandle) -> Option<&TargetDescriptor> {
        self.targets.get(&target).map(|t| &t.descriptor)
    }

    pub fn bound_texture(&self, unit: TextureUnit) -> Option<TextureHandle> {
        self.units[unit.slot()]
    }

    pub fn current_target(&self) -> FrameTarget {
        self.current_target
    }

    pub fn current_program(&self) -> Option<ProgramHandle> {
        self.current_program
    }

    pub fn culling_enabled(&self) -> bool {
        self.culling
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> RenderResult<MeshHandle> {
        if mesh.is_empty() {
            return Err(RenderError::InvalidGeometry(format!(
                "mesh '{label}' has no vertices or indices"
            )));
        }
        let handle = MeshHandle(self.next_id());
        self.meshes.insert(handle, mesh.index_count());
        self.commands.push(DeviceCommand::CreateMesh {
            mesh: handle,
            label: label.to_owned(),
            index_count: mesh.index_count(),
        });
        Ok(handle)
    }

    fn release_mesh(&mut self, mesh: MeshHandle) {
        if self.meshes.remove(&mesh).is_none() {
            log::error!("Mesh {} released twice or never created", mesh.index());
            self.double_releases += 1;
            return;
        }
        self.commands.push(DeviceCommand::ReleaseMesh(mesh));
    }

    fn create_texture(
        &mut self,
        label: &str,
        image: &image::RgbaImage,
    ) -> RenderResult<TextureHandle> {
        let texture = self.new_texture();
        self.commands.push(DeviceCommand::CreateTexture {
            texture,
            label: label.to_owned(),
            width: image.width(),
            height: image.height(),
        });
        Ok(texture)
    }

    fn create_program(&mut self, kind: ProgramKind) -> RenderResult<ProgramHandle> {
        if self.fail_program_creation {
            return Err(RenderError::exhausted(kind.label(), "program creation disabled"));
        }
        let program = ProgramHandle(self.next_id());
        self.programs.insert(program, kind);
        self.globals.insert(program, ShaderGlobals::new());
        self.commands
            .push(DeviceCommand::CreateProgram { program, kind });
        Ok(program)
    }

    fn release_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_none() {
            log::error!("Program {} released twice or never created", program.index());
            self.double_releases += 1;
            return;
        }
        self.globals.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
        self.commands.push(DeviceCommand::ReleaseProgram(program));
    }

    fn create_target(&mut self, descriptor: &TargetDescriptor) -> RenderResult<TargetHandle> {
        if self.fail_target_creation {
            return Err(RenderError::exhausted(
                descriptor.label.clone(),
                "target allocation disabled",
            ));
        }
        if descriptor.width == 0 || descriptor.height == 0 {
            return Err(RenderError::exhausted(
                descriptor.label.clone(),
                "zero-sized target",
            ));
        }
        let target = TargetHandle(self.next_id());
        let depth = self.new_texture();
        let color = match descriptor.kind {
            TargetKind::Depth => depth,
            TargetKind::Color => self.new_texture(),
        };
        self.targets.insert(
            target,
            RecordedTarget {
                descriptor: descriptor.clone(),
                color,
                depth,
            },
        );
        self.commands.push(DeviceCommand::CreateTarget {
            target,
            descriptor: descriptor.clone(),
        });
        Ok(target)
    }

    fn release_target(&mut self, target: TargetHandle) {
        let Some(recorded) = self.targets.remove(&target) else {
            log::error!("Target {} released twice or never created", target.index());
            self.double_releases += 1;
            return;
        };
        self.textures.remove(&recorded.color);
        self.textures.remove(&recorded.depth);
        if self.current_target == FrameTarget::Offscreen(target) {
            self.current_target = FrameTarget::Default;
        }
        self.commands.push(DeviceCommand::ReleaseTarget(target));
    }

    fn target_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle> {
        self.targets
            .get(&target)
            .map(|t| t.color)
            .ok_or(RenderError::UnknownHandle {
                kind: "target",
                index: target.index(),
            })
    }

    fn target_depth_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle> {
        self.targets
            .get(&target)
            .map(|t| t.depth)
            .ok_or(RenderError::UnknownHandle {
                kind: "target",
                index: target.index(),
            })
    }

    fn bind_target(&mut self, target: FrameTarget) -> RenderResult<()> {
        if let FrameTarget::Offscreen(handle) = target {
            if !self.targets.contains_key(&handle) {
                return Err(RenderError::UnknownHandle {
                    kind: "target",
                    index: handle.index(),
                });
            }
        }
        self.current_target = target;
        self.commands.push(DeviceCommand::BindTarget(target));
        Ok(())
    }

    fn clear(&mut self, flags: ClearFlags, color: Vec3) {
        self.commands.push(DeviceCommand::Clear { flags, color });
    }

    fn set_culling(&mut self, enabled: bool) {
        self.culling = enabled;
        self.commands.push(DeviceCommand::SetCulling(enabled));
    }

    fn use_program(&mut self, program: ProgramHandle) -> RenderResult<()> {
        if !self.programs.contains_key(&program) {
            return Err(RenderError::UnknownHandle {
                kind: "program",
                index: program.index(),
            });
        }
        self.current_program = Some(program);
        self.commands.push(DeviceCommand::UseProgram(program));
        Ok(())
    }

    fn stop_program(&mut self) {
        self.current_program = None;
        self.commands.push(DeviceCommand::StopProgram);
    }

    fn set_uniform(&mut self, uniform: Uniform) {
        match self.current_program {
            Some(program) => {
                if let Some(globals) = self.globals.get_mut(&program) {
                    globals.apply(&uniform);
                }
            }
            None => log::debug!("Uniform {:?} set with no active program", uniform),
        }
        self.commands.push(DeviceCommand::SetUniform {
            program: self.current_program,
            uniform,
        });
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureHandle) -> RenderResult<()> {
        if !self.textures.contains(&texture) {
            return Err(RenderError::UnknownHandle {
                kind: "texture",
                index: texture.index(),
            });
        }
        if unit.slot() >= TextureUnit::COUNT {
            return Err(RenderError::UnknownHandle {
                kind: "texture unit",
                index: unit.0,
            });
        }
        self.units[unit.slot()] = Some(texture);
        self.commands
            .push(DeviceCommand::BindTexture { unit, texture });
        Ok(())
    }

    fn draw(&mut self, mesh: MeshHandle) -> RenderResult<()> {
        if !self.meshes.contains_key(&mesh) {
            return Err(RenderError::UnknownHandle {
                kind: "mesh",
                index: mesh.index(),
            });
        }
        let program = self
            .current_program
            .and_then(|handle| self.programs.get(&handle).copied())
            .ok_or(RenderError::NoActiveProgram)?;
        let depth_target = match self.current_target {
            FrameTarget::Default => false,
            FrameTarget::Offscreen(handle) => self
                .targets
                .get(&handle)
                .is_some_and(|t| t.descriptor.kind == TargetKind::Depth),
        };
        if program.is_depth_only() != depth_target {
            return Err(RenderError::IncompatibleTarget {
                program,
                target: self.current_target,
            });
        }
        self.commands.push(DeviceCommand::Draw(DrawCall {
            mesh,
            program,
            target: self.current_target,
            culling: self.culling,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_release_is_counted_not_applied() {
        let mut device = RecordingDevice::new();
        let program = device.create_program(ProgramKind::Entity).unwrap();
        device.release_program(program);
        device.release_program(program);
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.double_releases(), 1);
    }

    #[test]
    fn draw_records_active_state() {
        let mut device = RecordingDevice::new();
        let mesh = device.create_mesh("cube", &MeshData::cube()).unwrap();
        let program = device.create_program(ProgramKind::Terrain).unwrap();
        let target = device
            .create_target(&TargetDescriptor::color("offscreen", 8, 8))
            .unwrap();
        device.bind_target(FrameTarget::Offscreen(target)).unwrap();
        device.use_program(program).unwrap();
        device.set_culling(false);
        device.draw(mesh).unwrap();

        let call = device.draws().next().copied().unwrap();
        assert_eq!(call.program, ProgramKind::Terrain);
        assert_eq!(call.target, FrameTarget::Offscreen(target));
        assert!(!call.culling);
    }

    #[test]
    fn uniforms_persist_per_program() {
        let mut device = RecordingDevice::new();
        let a = device.create_program(ProgramKind::Entity).unwrap();
        let b = device.create_program(ProgramKind::Water).unwrap();
        device.use_program(a).unwrap();
        device.set_uniform(Uniform::MoveFactor(0.25));
        device.use_program(b).unwrap();
        device.set_uniform(Uniform::MoveFactor(0.75));
        assert_eq!(device.program_globals(a).unwrap().water[0], 0.25);
        assert_eq!(device.program_globals(b).unwrap().water[0], 0.75);
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let mut device = RecordingDevice::new();
        assert!(matches!(
            device.draw(MeshHandle(9)),
            Err(RenderError::UnknownHandle { kind: "mesh", .. })
        ));
        assert!(matches!(
            device.bind_target(FrameTarget::Offscreen(TargetHandle(3))),
            Err(RenderError::UnknownHandle { kind: "target", .. })
        ));
        assert!(matches!(
            device.create_mesh("empty", &MeshData::default()),
            Err(RenderError::InvalidGeometry(_))
        ));
        let mesh = device.create_mesh("quad", &MeshData::water_quad()).unwrap();
        assert!(matches!(device.draw(mesh), Err(RenderError::NoActiveProgram)));
    }

    #[test]
    fn programs_only_draw_into_matching_targets() {
        let mut device = RecordingDevice::new();
        let mesh = device.create_mesh("cube", &MeshData::cube()).unwrap();
        let shadow = device.create_program(ProgramKind::Shadow).unwrap();
        let entity = device.create_program(ProgramKind::Entity).unwrap();
        let depth = device
            .create_target(&TargetDescriptor::depth("shadow", 16))
            .unwrap();

        device.use_program(shadow).unwrap();
        assert!(matches!(
            device.draw(mesh),
            Err(RenderError::IncompatibleTarget {
                program: ProgramKind::Shadow,
                target: FrameTarget::Default,
            })
        ));

        device.bind_target(FrameTarget::Offscreen(depth)).unwrap();
        device.use_program(entity).unwrap();
        assert!(matches!(
            device.draw(mesh),
            Err(RenderError::IncompatibleTarget {
                program: ProgramKind::Entity,
                ..
            })
        ));
        assert_eq!(device.draw_count(), 0);

        device.use_program(shadow).unwrap();
        device.draw(mesh).unwrap();
        assert_eq!(device.draw_count(), 1);
    }

    #[test]
    fn depth_target_samples_its_only_attachment() {
        let mut device = RecordingDevice::new();
        let target = device
            .create_target(&TargetDescriptor::depth("shadow", 16))
            .unwrap();
        assert_eq!(
            device.target_texture(target).unwrap(),
            device.target_depth_texture(target).unwrap()
        );
    }
}
