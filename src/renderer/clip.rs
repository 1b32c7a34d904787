use glam::{Vec3, Vec4};

/// World-space clip plane `(a, b, c, d)`; a point `p` survives when
/// `a·x + b·y + c·z + d >= 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlane(pub Vec4);

impl ClipPlane {
    /// Far enough below any scene that nothing is discarded.
    pub const NONE: Self = Self(Vec4::new(0.0, -1.0, 0.0, 100_000.0));

    /// Keeps geometry above the water, with a small overlap to hide the seam.
    pub fn reflection(water_height: f32) -> Self {
        Self(Vec4::new(0.0, 1.0, 0.0, -water_height + 1.0))
    }

    /// Keeps geometry below the water surface.
    pub fn refraction(water_height: f32) -> Self {
        Self(Vec4::new(0.0, -1.0, 0.0, water_height))
    }

    pub fn as_vec4(self) -> Vec4 {
        self.0
    }

    pub fn keeps(self, point: Vec3) -> bool {
        self.0.dot(point.extend(1.0)) >= 0.0
    }
}

impl Default for ClipPlane {
    fn default() -> Self {
        Self::NONE
    }
}
