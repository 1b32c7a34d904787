use glam::{Mat4, Vec4};

/// Perspective projection in OpenGL clip conventions (depth -1..1, right handed).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
}

impl Projection {
    /// Panics on a degenerate frustum: these come from configuration, which
    /// is validated before a renderer is built.
    pub fn new(fov_degrees: f32, near: f32, far: f32, aspect: f32) -> Self {
        assert!(near > 0.0, "near plane must be positive, got {near}");
        assert!(far > near, "far plane {far} must lie beyond near plane {near}");
        assert!(aspect > 0.0, "aspect ratio must be positive, got {aspect}");
        assert!(
            fov_degrees > 0.0 && fov_degrees < 180.0,
            "field of view must be within (0, 180) degrees, got {fov_degrees}"
        );
        Self {
            fov_degrees,
            near,
            far,
            aspect,
        }
    }

    pub fn with_aspect(self, aspect: f32) -> Self {
        Self::new(self.fov_degrees, self.near, self.far, aspect)
    }

    pub fn compute(&self) -> Mat4 {
        let y_scale = 1.0 / (self.fov_degrees.to_radians() / 2.0).tan();
        let x_scale = y_scale / self.aspect;
        let frustum_length = self.far - self.near;

        let m22 = -((self.far + self.near) / frustum_length);
        let m32 = -((2.0 * self.near * self.far) / frustum_length);

        Mat4::from_cols(
            Vec4::new(x_scale, 0.0, 0.0, 0.0),
            Vec4::new(0.0, y_scale, 0.0, 0.0),
            Vec4::new(0.0, 0.0, m22, -1.0),
            Vec4::new(0.0, 0.0, m32, 0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn matrix_follows_gl_layout() {
        let proj = Projection::new(80.0, 0.1, 1000.0, 16.0 / 9.0).compute();
        assert_eq!(proj.z_axis.w, -1.0);
        assert_eq!(proj.w_axis.w, 0.0);
        let expected_m32 = -(2.0 * 0.1 * 1000.0) / (1000.0 - 0.1);
        assert!((proj.w_axis.z - expected_m32).abs() < 1e-5);
        let y_scale = 1.0 / 40f32.to_radians().tan();
        assert!((proj.y_axis.y - y_scale).abs() < 1e-6);
        assert!((proj.x_axis.x - y_scale * 9.0 / 16.0).abs() < 1e-6);
    }

    #[test]
    fn matches_glam_gl_perspective() {
        let ours = Projection::new(70.0, 0.5, 300.0, 1.5).compute();
        let glam = Mat4::perspective_rh_gl(70f32.to_radians(), 1.5, 0.5, 300.0);
        assert!(ours.abs_diff_eq(glam, 1e-5));
    }

    #[test]
    fn near_and_far_map_to_clip_bounds() {
        let proj = Projection::new(80.0, 0.1, 1000.0, 1.0).compute();
        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.1));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -1000.0));
        assert!((near.z + 1.0).abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn compute_is_deterministic() {
        let proj = Projection::new(80.0, 0.1, 1000.0, 1.25);
        assert_eq!(proj.compute(), proj.compute());
    }

    #[test]
    fn with_aspect_keeps_other_parameters() {
        let proj = Projection::new(80.0, 0.1, 1000.0, 1.0).with_aspect(2.0);
        assert_eq!(proj.aspect, 2.0);
        assert_eq!(proj.fov_degrees, 80.0);
    }

    #[test]
    #[should_panic]
    fn rejects_inverted_planes() {
        Projection::new(80.0, 10.0, 1.0, 1.0);
    }

    #[test]
    #[should_panic]
    fn rejects_zero_aspect() {
        Projection::new(80.0, 0.1, 10.0, 0.0);
    }
}
