use glam::Vec3;

/// Point light. `attenuation` holds the constant, linear and quadratic terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    pub attenuation: Vec3,
}

impl Light {
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            color,
            attenuation: Vec3::X,
        }
    }

    pub fn with_attenuation(mut self, attenuation: Vec3) -> Self {
        self.attenuation = attenuation;
        self
    }

    /// Attenuation factor at `distance`, as the lit shaders compute it.
    pub fn falloff(&self, distance: f32) -> f32 {
        let a = self.attenuation;
        a.x + a.y * distance + a.z * distance * distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_attenuation_does_not_fade() {
        let light = Light::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(light.falloff(0.0), 1.0);
        assert_eq!(light.falloff(500.0), 1.0);
    }

    #[test]
    fn quadratic_attenuation_grows() {
        let lamp = Light::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0))
            .with_attenuation(Vec3::new(1.0, 0.01, 0.002));
        assert!(lamp.falloff(10.0) > lamp.falloff(1.0));
        assert!((lamp.falloff(10.0) - 1.3).abs() < 1e-6);
    }
}
