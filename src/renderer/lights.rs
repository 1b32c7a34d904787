use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::scene::Light;

pub const MAX_LIGHTS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSlot {
    pub position: Vec3,
    pub color: Vec3,
    pub attenuation: Vec3,
}

impl LightSlot {
    /// A black light that contributes nothing but keeps the attenuation
    /// divisor non-zero.
    pub const EMPTY: Self = Self {
        position: Vec3::ZERO,
        color: Vec3::ZERO,
        attenuation: Vec3::X,
    };
}

impl From<&Light> for LightSlot {
    fn from(light: &Light) -> Self {
        Self {
            position: light.position,
            color: light.color,
            attenuation: light.attenuation,
        }
    }
}

/// Fixed-size light table uploaded to the lit programs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightArray {
    slots: [LightSlot; MAX_LIGHTS],
    count: usize,
}

impl LightArray {
    pub fn from_lights(lights: &[Light]) -> Self {
        if lights.len() > MAX_LIGHTS {
            log::debug!(
                "{} lights supplied, only the first {} are shaded",
                lights.len(),
                MAX_LIGHTS
            );
        }
        let mut slots = [LightSlot::EMPTY; MAX_LIGHTS];
        let count = lights.len().min(MAX_LIGHTS);
        for (dst, src) in slots.iter_mut().zip(lights.iter()) {
            *dst = LightSlot::from(src);
        }
        Self { slots, count }
    }

    pub fn single(light: &Light) -> Self {
        Self::from_lights(std::slice::from_ref(light))
    }

    pub fn slots(&self) -> &[LightSlot; MAX_LIGHTS] {
        &self.slots
    }

    /// Number of slots filled from real lights.
    pub fn count(&self) -> usize {
        self.count
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct LightsRaw {
    pub positions: [[f32; 4]; MAX_LIGHTS],
    pub colors: [[f32; 4]; MAX_LIGHTS],
    pub attenuations: [[f32; 4]; MAX_LIGHTS],
}

impl LightsRaw {
    pub fn from_array(lights: &LightArray) -> Self {
        let mut raw = Self::zeroed();
        for (index, slot) in lights.slots().iter().enumerate() {
            raw.positions[index] = slot.position.extend(1.0).to_array();
            raw.colors[index] = slot.color.extend(1.0).to_array();
            raw.attenuations[index] = slot.attenuation.extend(0.0).to_array();
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_slots_are_black_with_unit_attenuation() {
        let sun = Light::new(Vec3::new(10.0, 20.0, 30.0), Vec3::ONE);
        let array = LightArray::single(&sun);
        assert_eq!(array.count(), 1);
        assert_eq!(array.slots()[0].position, sun.position);
        for slot in &array.slots()[1..] {
            assert_eq!(*slot, LightSlot::EMPTY);
        }
    }

    #[test]
    fn excess_lights_are_truncated() {
        let lights: Vec<Light> = (0..6)
            .map(|i| Light::new(Vec3::splat(i as f32), Vec3::ONE))
            .collect();
        let array = LightArray::from_lights(&lights);
        assert_eq!(array.count(), MAX_LIGHTS);
        assert_eq!(array.slots()[3].position, Vec3::splat(3.0));
    }

    #[test]
    fn raw_layout_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<LightsRaw>(), 3 * MAX_LIGHTS * 16);
        let raw = LightsRaw::from_array(&LightArray::from_lights(&[]));
        assert_eq!(raw.attenuations[0], [1.0, 0.0, 0.0, 0.0]);
    }
}
