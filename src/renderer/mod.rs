pub mod batch;
pub mod clip;
pub mod device;
pub mod frame;
pub mod gpu;
pub mod lights;
pub mod main_pass;
pub mod projection;
pub mod recording;
pub mod shadow;
pub mod uniforms;
pub mod vertex;
pub mod water;

pub use batch::{EntityBatcher, RenderBatches};
pub use clip::ClipPlane;
pub use device::{
    ClearFlags, FrameTarget, GraphicsDevice, MeshHandle, ProgramHandle, ProgramKind,
    TargetDescriptor, TargetHandle, TargetKind, TextureHandle, TextureUnit, Uniform,
};
pub use frame::{FrameInput, FrameOrchestrator, FrameStats};
pub use gpu::WgpuDevice;
pub use lights::{LightArray, MAX_LIGHTS};
pub use main_pass::{MainPass, PassStats, SceneView};
pub use projection::Projection;
pub use recording::{DeviceCommand, DrawCall, RecordingDevice};
pub use shadow::{ShadowMapState, ShadowPass};
pub use vertex::Vertex;
pub use water::{WaterFrameBuffers, WaterPass, WaterTextures};
