use glam::{Mat4, Vec2, Vec3};

use crate::asset::{Handle, VisualResource};

/// A placed instance of a [`VisualResource`]. Rotation is in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entity {
    pub resource: Handle<VisualResource>,
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
    /// Cell of the resource's texture atlas, counted row by row.
    pub atlas_index: u32,
}

impl Entity {
    pub fn new(resource: Handle<VisualResource>, position: Vec3) -> Self {
        Self {
            resource,
            position,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            atlas_index: 0,
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn with_non_uniform_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_atlas_index(mut self, index: u32) -> Self {
        self.atlas_index = index;
        self
    }

    pub fn increase_position(&mut self, delta: Vec3) {
        self.position += delta;
    }

    pub fn increase_rotation(&mut self, delta: Vec3) {
        self.rotation += delta;
    }

    pub fn transformation_matrix(&self) -> Mat4 {
        let r = self.rotation;
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_x(r.x.to_radians())
            * Mat4::from_rotation_y(r.y.to_radians())
            * Mat4::from_rotation_z(r.z.to_radians())
            * Mat4::from_scale(self.scale)
    }

    /// UV offset of this entity's atlas cell for an atlas of `rows`×`rows` cells.
    pub fn atlas_offset(&self, rows: u32) -> Vec2 {
        atlas_offset(self.atlas_index, rows)
    }
}

pub fn atlas_offset(index: u32, rows: u32) -> Vec2 {
    if rows == 0 {
        return Vec2::ZERO;
    }
    let column = index % rows;
    let row = index / rows;
    Vec2::new(column as f32 / rows as f32, row as f32 / rows as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> Entity {
        Entity::new(Handle::new(0), Vec3::new(1.0, 2.0, 3.0))
    }

    #[test]
    fn atlas_cells_walk_row_major() {
        assert_eq!(atlas_offset(0, 2), Vec2::new(0.0, 0.0));
        assert_eq!(atlas_offset(1, 2), Vec2::new(0.5, 0.0));
        assert_eq!(atlas_offset(2, 2), Vec2::new(0.0, 0.5));
        assert_eq!(atlas_offset(3, 2), Vec2::new(0.5, 0.5));
        assert_eq!(atlas_offset(5, 4), Vec2::new(0.25, 0.25));
        // Indices past the last cell are not wrapped.
        assert_eq!(atlas_offset(7, 1), Vec2::new(0.0, 7.0));
    }

    #[test]
    fn matrix_applies_scale_then_rotation_then_translation() {
        let e = entity()
            .with_rotation(Vec3::new(0.0, 90.0, 0.0))
            .with_scale(2.0);
        let p = e.transformation_matrix().transform_point3(Vec3::X);
        // scale to (2,0,0), rotate 90° about Y to (0,0,-2), then translate
        assert!(p.abs_diff_eq(Vec3::new(1.0, 2.0, 1.0), 1e-5));
    }

    #[test]
    fn rotation_order_is_x_then_y_then_z_outermost_first() {
        let e = Entity::new(Handle::new(0), Vec3::ZERO).with_rotation(Vec3::new(30.0, 45.0, 60.0));
        let expected = Mat4::from_rotation_x(30f32.to_radians())
            * Mat4::from_rotation_y(45f32.to_radians())
            * Mat4::from_rotation_z(60f32.to_radians());
        assert!(e.transformation_matrix().abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn increments_accumulate() {
        let mut e = entity();
        e.increase_position(Vec3::new(1.0, 0.0, 0.0));
        e.increase_rotation(Vec3::new(0.0, 1.5, 0.0));
        e.increase_rotation(Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(e.position, Vec3::new(2.0, 2.0, 3.0));
        assert_eq!(e.rotation.y, 3.0);
    }
}
