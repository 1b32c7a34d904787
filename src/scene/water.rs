use glam::{Mat4, Vec3};

/// Half-extent of a water tile in world units.
pub const TILE_SIZE: f32 = 60.0;

/// A horizontal water quad centred on (`x`, `z`) at `height`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WaterTile {
    pub x: f32,
    pub z: f32,
    pub height: f32,
}

impl WaterTile {
    pub fn new(x: f32, z: f32, height: f32) -> Self {
        Self { x, z, height }
    }

    pub fn transformation_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(self.x, self.height, self.z))
            * Mat4::from_scale(Vec3::splat(TILE_SIZE))
    }
}
