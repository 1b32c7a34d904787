use crate::error::{RenderError, RenderResult};
use crate::renderer::device::{MeshHandle, TextureHandle};

/// Geometry plus the material parameters used to shade it.
///
/// Several entities usually share one resource; the renderer batches them by
/// the resource's handle so texture state is bound once per batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualResource {
    pub mesh: MeshHandle,
    pub texture: TextureHandle,
    pub normal_map: Option<TextureHandle>,
    pub shine_damper: f32,
    pub reflectivity: f32,
    pub has_transparency: bool,
    pub use_fake_lighting: bool,
    /// Rows (and columns) of the texture atlas; 1 means no atlas.
    pub number_of_rows: u32,
}

impl VisualResource {
    pub fn new(mesh: MeshHandle, texture: TextureHandle) -> Self {
        Self {
            mesh,
            texture,
            normal_map: None,
            shine_damper: 1.0,
            reflectivity: 0.0,
            has_transparency: false,
            use_fake_lighting: false,
            number_of_rows: 1,
        }
    }

    pub fn with_normal_map(mut self, normal_map: TextureHandle) -> Self {
        self.normal_map = Some(normal_map);
        self
    }

    pub fn with_specular(mut self, shine_damper: f32, reflectivity: f32) -> Self {
        self.shine_damper = shine_damper;
        self.reflectivity = reflectivity;
        self
    }

    pub fn with_transparency(mut self) -> Self {
        self.has_transparency = true;
        self
    }

    pub fn with_fake_lighting(mut self) -> Self {
        self.use_fake_lighting = true;
        self
    }

    pub fn with_atlas_rows(mut self, rows: u32) -> Self {
        self.number_of_rows = rows;
        self
    }

    pub fn has_atlas(&self) -> bool {
        self.number_of_rows > 1
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.number_of_rows == 0 {
            return Err(RenderError::InvalidGeometry(format!(
                "visual resource for mesh {} has a zero-row texture atlas",
                self.mesh.index()
            )));
        }
        Ok(())
    }
}
