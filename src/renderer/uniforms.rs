use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use super::device::Uniform;
use super::lights::LightsRaw;

/// Maps OpenGL clip-space depth (-1..1) into wgpu's 0..1 range.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

/// Uniform block shared by every program (`Globals` in `common.wgsl`).
///
/// Each program keeps its own copy; [`ShaderGlobals::apply`] folds a single
/// [`Uniform`] write into it.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct ShaderGlobals {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub light_space: [[f32; 4]; 4],
    pub clip_plane: [f32; 4],
    pub sky_color: [f32; 4],
    pub camera_position: [f32; 4],
    pub lights: LightsRaw,
    /// shine damper, reflectivity, fake lighting, normal mapping
    pub material: [f32; 4],
    /// rows, offset x, offset y, unused
    pub atlas: [f32; 4],
    /// map size, shadow distance, unused, unused
    pub shadow: [f32; 4],
    /// move factor, near, far, unused
    pub water: [f32; 4],
}

impl ShaderGlobals {
    pub fn new() -> Self {
        let identity = Mat4::IDENTITY.to_cols_array_2d();
        let mut globals = Self::zeroed();
        globals.projection = identity;
        globals.view = identity;
        globals.model = identity;
        globals.light_space = identity;
        globals.clip_plane = Vec4::new(0.0, -1.0, 0.0, 100_000.0).to_array();
        globals.material = [1.0, 0.0, 0.0, 0.0];
        globals.atlas = [1.0, 0.0, 0.0, 0.0];
        globals.shadow = [1.0, 1.0, 0.0, 0.0];
        globals.water = [0.0, 0.1, 1000.0, 0.0];
        for attenuation in &mut globals.lights.attenuations {
            *attenuation = [1.0, 0.0, 0.0, 0.0];
        }
        globals
    }

    pub fn apply(&mut self, uniform: &Uniform) {
        match *uniform {
            Uniform::Projection(m) => {
                self.projection = (OPENGL_TO_WGPU_MATRIX * m).to_cols_array_2d()
            }
            Uniform::View(m) => self.view = m.to_cols_array_2d(),
            Uniform::Model(m) => self.model = m.to_cols_array_2d(),
            Uniform::LightSpace(m) => self.light_space = m.to_cols_array_2d(),
            Uniform::ClipPlane(plane) => self.clip_plane = plane.to_array(),
            Uniform::SkyColor(color) => self.sky_color = color.extend(1.0).to_array(),
            Uniform::CameraPosition(pos) => self.camera_position = pos.extend(1.0).to_array(),
            Uniform::Lights(ref lights) => self.lights = LightsRaw::from_array(lights),
            Uniform::Material {
                shine_damper,
                reflectivity,
            } => {
                self.material[0] = shine_damper;
                self.material[1] = reflectivity;
            }
            Uniform::FakeLighting(on) => self.material[2] = flag(on),
            Uniform::NormalMapping(on) => self.material[3] = flag(on),
            Uniform::AtlasRows(rows) => self.atlas[0] = rows as f32,
            Uniform::AtlasOffset(offset) => {
                self.atlas[1] = offset.x;
                self.atlas[2] = offset.y;
            }
            Uniform::ShadowParams { map_size, distance } => {
                self.shadow[0] = map_size;
                self.shadow[1] = distance;
            }
            Uniform::MoveFactor(factor) => self.water[0] = factor,
            Uniform::DepthRange { near, far } => {
                self.water[1] = near;
                self.water[2] = far;
            }
        }
    }
}

impl Default for ShaderGlobals {
    fn default() -> Self {
        Self::new()
    }
}

fn flag(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    #[test]
    fn globals_block_is_vec4_aligned() {
        // 4 mat4 + 3 vec4 + 12 light vec4 + 4 packed vec4
        assert_eq!(std::mem::size_of::<ShaderGlobals>(), 4 * 64 + 3 * 16 + 12 * 16 + 4 * 16);
        assert_eq!(std::mem::size_of::<ShaderGlobals>() % 16, 0);
    }

    #[test]
    fn projection_depth_is_remapped() {
        let mut globals = ShaderGlobals::new();
        let gl = Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0);
        globals.apply(&Uniform::Projection(gl));
        let stored = Mat4::from_cols_array_2d(&globals.projection);
        let wgpu = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        assert!(stored.abs_diff_eq(wgpu, 1e-5));
    }

    #[test]
    fn packed_fields_land_in_their_lanes() {
        let mut globals = ShaderGlobals::new();
        globals.apply(&Uniform::Material {
            shine_damper: 10.0,
            reflectivity: 0.5,
        });
        globals.apply(&Uniform::NormalMapping(true));
        globals.apply(&Uniform::AtlasRows(2));
        globals.apply(&Uniform::AtlasOffset(Vec2::new(0.5, 0.5)));
        globals.apply(&Uniform::SkyColor(Vec3::splat(0.5)));
        assert_eq!(globals.material, [10.0, 0.5, 0.0, 1.0]);
        assert_eq!(globals.atlas, [2.0, 0.5, 0.5, 0.0]);
        assert_eq!(globals.sky_color, [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn defaults_disable_clipping() {
        let globals = ShaderGlobals::default();
        assert_eq!(globals.clip_plane, [0.0, -1.0, 0.0, 100_000.0]);
        assert_eq!(globals.lights.attenuations[3], [1.0, 0.0, 0.0, 0.0]);
    }
}
