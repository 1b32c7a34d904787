use thiserror::Error;

use crate::renderer::{FrameTarget, ProgramKind};

/// Errors surfaced by the rendering core and its graphics devices.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to create {what}: {reason}")]
    ResourceExhausted { what: String, reason: String },
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: u32 },
    #[error("draw issued with no active program")]
    NoActiveProgram,
    #[error("{} program cannot draw into {target:?}", program.label())]
    IncompatibleTarget {
        program: ProgramKind,
        target: FrameTarget,
    },
    #[error("renderer resources have already been released")]
    Released,
    #[error("no suitable graphics adapter: {0}")]
    Adapter(String),
    #[error("failed to acquire graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

impl RenderError {
    pub fn exhausted(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
