//! The seam between the passes and the GPU.
//!
//! Passes talk to a [`GraphicsDevice`] in an immediate-mode style: bind a
//! target, activate a program, set uniforms, bind textures, draw. Uniform
//! values persist per program and texture units persist across programs, the
//! same way a classic graphics context behaves.

use bitflags::bitflags;
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::asset::MeshData;
use crate::error::RenderResult;
use crate::renderer::lights::LightArray;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn index(self) -> u32 {
                self.0
            }
        }
    };
}

device_handle!(
    /// GPU-resident vertex and index buffers.
    MeshHandle
);
device_handle!(
    /// A sampled texture: uploaded image or render-target attachment.
    TextureHandle
);
device_handle!(
    /// A compiled shading program.
    ProgramHandle
);
device_handle!(
    /// An off-screen render target.
    TargetHandle
);

/// The shading programs the core knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Entity,
    Terrain,
    Water,
    Shadow,
}

impl ProgramKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Entity => "EntityProgram",
            Self::Terrain => "TerrainProgram",
            Self::Water => "WaterProgram",
            Self::Shadow => "ShadowProgram",
        }
    }

    /// Texture units read by the program's shaders.
    pub fn sampled_units(self) -> &'static [TextureUnit] {
        match self {
            Self::Entity => &[
                TextureUnit::DIFFUSE,
                TextureUnit::NORMAL_MAP,
                TextureUnit::SHADOW_MAP,
            ],
            Self::Terrain => &[
                TextureUnit::BACKGROUND,
                TextureUnit::BLEND_R,
                TextureUnit::BLEND_G,
                TextureUnit::BLEND_B,
                TextureUnit::BLEND_MAP,
                TextureUnit::SHADOW_MAP,
            ],
            Self::Water => &[
                TextureUnit::REFLECTION,
                TextureUnit::REFRACTION,
                TextureUnit::DUDV_MAP,
                TextureUnit::WATER_NORMAL_MAP,
                TextureUnit::REFRACTION_DEPTH,
            ],
            Self::Shadow => &[],
        }
    }

    /// Depth-only programs render into targets without a color attachment.
    pub fn is_depth_only(self) -> bool {
        matches!(self, Self::Shadow)
    }
}

/// Texture unit slot. Several names alias the same slot because each program
/// gives the slots its own meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUnit(pub u32);

impl TextureUnit {
    pub const COUNT: usize = 6;

    pub const DIFFUSE: Self = Self(0);
    pub const NORMAL_MAP: Self = Self(1);

    pub const BACKGROUND: Self = Self(0);
    pub const BLEND_R: Self = Self(1);
    pub const BLEND_G: Self = Self(2);
    pub const BLEND_B: Self = Self(3);
    pub const BLEND_MAP: Self = Self(4);

    pub const REFLECTION: Self = Self(0);
    pub const REFRACTION: Self = Self(1);
    pub const DUDV_MAP: Self = Self(2);
    pub const WATER_NORMAL_MAP: Self = Self(3);

    /// The only depth-sampled slot.
    pub const SHADOW_MAP: Self = Self(5);
    pub const REFRACTION_DEPTH: Self = Self(5);

    pub fn slot(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Depth attachment only, sampled later with a comparison sampler.
    Depth,
    /// Color attachment plus a private depth buffer.
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub kind: TargetKind,
}

impl TargetDescriptor {
    pub fn depth(label: impl Into<String>, size: u32) -> Self {
        Self {
            label: label.into(),
            width: size,
            height: size,
            kind: TargetKind::Depth,
        }
    }

    pub fn color(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            kind: TargetKind::Color,
        }
    }
}

/// Where subsequent draws land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameTarget {
    /// The window surface.
    Default,
    Offscreen(TargetHandle),
}

/// A single uniform write into the active program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    /// OpenGL-convention projection; devices remap depth as needed.
    Projection(Mat4),
    View(Mat4),
    Model(Mat4),
    /// World to light clip space, already in 0..1 depth convention.
    LightSpace(Mat4),
    ClipPlane(Vec4),
    SkyColor(Vec3),
    CameraPosition(Vec3),
    Lights(LightArray),
    Material { shine_damper: f32, reflectivity: f32 },
    FakeLighting(bool),
    NormalMapping(bool),
    AtlasRows(u32),
    AtlasOffset(Vec2),
    ShadowParams { map_size: f32, distance: f32 },
    MoveFactor(f32),
    DepthRange { near: f32, far: f32 },
}

/// Immediate-mode graphics context driven by the render passes.
///
/// Creation calls return [`RenderError::ResourceExhausted`] when the device
/// cannot satisfy them; commands that take a handle return
/// [`RenderError::UnknownHandle`] for handles the device never issued.
///
/// [`RenderError::ResourceExhausted`]: crate::error::RenderError::ResourceExhausted
/// [`RenderError::UnknownHandle`]: crate::error::RenderError::UnknownHandle
pub trait GraphicsDevice {
    fn create_mesh(&mut self, label: &str, mesh: &MeshData) -> RenderResult<MeshHandle>;
    fn release_mesh(&mut self, mesh: MeshHandle);
    fn create_texture(&mut self, label: &str, image: &image::RgbaImage)
        -> RenderResult<TextureHandle>;
    fn create_program(&mut self, kind: ProgramKind) -> RenderResult<ProgramHandle>;
    fn release_program(&mut self, program: ProgramHandle);
    fn create_target(&mut self, descriptor: &TargetDescriptor) -> RenderResult<TargetHandle>;
    fn release_target(&mut self, target: TargetHandle);
    /// Texture that samples the target's primary attachment.
    fn target_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle>;
    /// Texture that samples the target's depth attachment.
    fn target_depth_texture(&self, target: TargetHandle) -> RenderResult<TextureHandle>;

    fn bind_target(&mut self, target: FrameTarget) -> RenderResult<()>;
    fn clear(&mut self, flags: ClearFlags, color: Vec3);
    fn set_culling(&mut self, enabled: bool);
    fn use_program(&mut self, program: ProgramHandle) -> RenderResult<()>;
    fn stop_program(&mut self);
    fn set_uniform(&mut self, uniform: Uniform);
    fn bind_texture(&mut self, unit: TextureUnit, texture: TextureHandle) -> RenderResult<()>;
    fn draw(&mut self, mesh: MeshHandle) -> RenderResult<()>;
}
