use glam::{Mat4, Vec3};

/// Free camera described by a position and Euler angles in degrees.
///
/// Positive pitch looks down; yaw turns about +Y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Camera {
    pub fn new(position: Vec3, pitch: f32, yaw: f32) -> Self {
        Self {
            position,
            pitch,
            yaw,
            roll: 0.0,
        }
    }

    /// Place the camera `distance` away from `target`, raised by `pitch`
    /// degrees and swung `angle` degrees around it, looking back at it.
    pub fn orbiting(target: Vec3, distance: f32, pitch: f32, angle: f32) -> Self {
        let horizontal = distance * pitch.to_radians().cos();
        let vertical = distance * pitch.to_radians().sin();
        let offset_x = horizontal * angle.to_radians().sin();
        let offset_z = horizontal * angle.to_radians().cos();
        Self::new(
            Vec3::new(target.x - offset_x, target.y + vertical, target.z - offset_z),
            pitch,
            180.0 - angle,
        )
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_rotation_z(self.roll.to_radians())
            * Mat4::from_rotation_x(self.pitch.to_radians())
            * Mat4::from_rotation_y(self.yaw.to_radians())
            * Mat4::from_translation(-self.position)
    }

    /// Mirror image of this camera below a horizontal plane at `water_height`.
    pub fn reflected(&self, water_height: f32) -> Self {
        let distance = 2.0 * (self.position.y - water_height);
        Self {
            position: Vec3::new(self.position.x, self.position.y - distance, self.position.z),
            pitch: -self.pitch,
            ..*self
        }
    }

    /// Unit vector the camera looks along, in world space.
    pub fn forward(&self) -> Vec3 {
        let rotation = Mat4::from_rotation_x(self.pitch.to_radians())
            * Mat4::from_rotation_y(self.yaw.to_radians());
        rotation.inverse().transform_vector3(Vec3::NEG_Z).normalize()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 10.0, 0.0), 10.0, 0.0)
    }
}
