use crate::renderer::device::{TargetKind, TextureHandle};

/// Attachments of an off-screen target, registered as sampled textures.
pub(crate) struct GpuTarget {
    pub(crate) kind: TargetKind,
    pub(crate) color: Option<TextureHandle>,
    pub(crate) depth: TextureHandle,
}

impl GpuTarget {
    /// Texture the target's consumers sample: color if present, else depth.
    pub(crate) fn primary(&self) -> TextureHandle {
        self.color.unwrap_or(self.depth)
    }

    pub(crate) fn owns(&self, texture: TextureHandle) -> bool {
        self.color == Some(texture) || self.depth == texture
    }
}

/// Load operations for one recorded pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PassOps {
    pub(crate) color: wgpu::LoadOp<wgpu::Color>,
    pub(crate) depth: wgpu::LoadOp<f32>,
}

impl PassOps {
    pub(crate) const LOAD: Self = Self {
        color: wgpu::LoadOp::Load,
        depth: wgpu::LoadOp::Load,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_target_samples_depth() {
        let target = GpuTarget {
            kind: TargetKind::Depth,
            color: None,
            depth: TextureHandle(4),
        };
        assert_eq!(target.primary(), TextureHandle(4));
        assert!(target.owns(TextureHandle(4)));
        assert!(!target.owns(TextureHandle(5)));
    }
}
