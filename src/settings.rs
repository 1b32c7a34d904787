use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    #[serde(default = "RenderSettings::default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "RenderSettings::default_near_plane")]
    pub near_plane: f32,
    #[serde(default = "RenderSettings::default_far_plane")]
    pub far_plane: f32,
    #[serde(default = "RenderSettings::default_sky_color")]
    pub sky_color: [f32; 3],
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "RenderSettings::default_shadow_distance")]
    pub shadow_distance: f32,
    #[serde(default = "Resolution::reflection")]
    pub reflection: Resolution,
    #[serde(default = "Resolution::refraction")]
    pub refraction: Resolution,
    #[serde(default = "RenderSettings::default_wave_speed")]
    pub wave_speed: f32,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fov_degrees: Self::default_fov_degrees(),
            near_plane: Self::default_near_plane(),
            far_plane: Self::default_far_plane(),
            sky_color: Self::default_sky_color(),
            shadow_map_size: Self::default_shadow_map_size(),
            shadow_distance: Self::default_shadow_distance(),
            reflection: Resolution::reflection(),
            refraction: Resolution::refraction(),
            wave_speed: Self::default_wave_speed(),
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RenderSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded render settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default render settings.",
                        path, err
                    );
                    RenderSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "Render settings file {:?} not found. Using default settings.",
                    path
                );
                RenderSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default render settings.",
                    path, err
                );
                RenderSettings::default()
            }
        }
    }

    fn validate(mut self) -> Self {
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            warn!(
                "Field of view {} is outside (0, 180). Using default value.",
                self.fov_degrees
            );
            self.fov_degrees = Self::default_fov_degrees();
        }

        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            warn!(
                "Clip planes near={} far={} are invalid. Using default planes.",
                self.near_plane, self.far_plane
            );
            self.near_plane = Self::default_near_plane();
            self.far_plane = Self::default_far_plane();
        }

        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if !(self.shadow_distance > 0.0) {
            warn!("Shadow distance must be positive. Using default value.");
            self.shadow_distance = Self::default_shadow_distance();
        }

        if !self.wave_speed.is_finite() {
            warn!("Wave speed must be finite. Using default value.");
            self.wave_speed = Self::default_wave_speed();
        }

        if self.resolution.is_empty() {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.reflection.is_empty() {
            warn!("Reflection target must be greater than zero. Using default size.");
            self.reflection = Resolution::reflection();
        }

        if self.refraction.is_empty() {
            warn!("Refraction target must be greater than zero. Using default size.");
            self.refraction = Resolution::refraction();
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    pub fn sky_color(&self) -> glam::Vec3 {
        glam::Vec3::from_array(self.sky_color)
    }

    const fn default_fov_degrees() -> f32 {
        80.0
    }

    const fn default_near_plane() -> f32 {
        0.1
    }

    const fn default_far_plane() -> f32 {
        1000.0
    }

    const fn default_sky_color() -> [f32; 3] {
        [0.5, 0.5, 0.5]
    }

    const fn default_shadow_map_size() -> u32 {
        4096
    }

    const fn default_shadow_distance() -> f32 {
        150.0
    }

    const fn default_wave_speed() -> f32 {
        0.03
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    const fn reflection() -> Self {
        Self {
            width: 320,
            height: 180,
        }
    }

    const fn refraction() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

impl Default for PresentModeSetting {
    fn default() -> Self {
        PresentModeSetting::Fifo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> RenderSettings {
        RenderSettings {
            fov_degrees: 180.0,
            near_plane: 5.0,
            far_plane: 1.0,
            shadow_map_size: 0,
            shadow_distance: -3.0,
            reflection: Resolution {
                width: 0,
                height: 10,
            },
            refraction: Resolution {
                width: 10,
                height: 0,
            },
            wave_speed: f32::NAN,
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            ..RenderSettings::default()
        }
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = RenderSettings::default();

        assert_eq!(validated.fov_degrees, defaults.fov_degrees);
        assert_eq!(validated.near_plane, defaults.near_plane);
        assert_eq!(validated.far_plane, defaults.far_plane);
        assert_eq!(validated.shadow_map_size, defaults.shadow_map_size);
        assert_eq!(validated.shadow_distance, defaults.shadow_distance);
        assert_eq!(validated.wave_speed, defaults.wave_speed);
        assert_eq!(validated.resolution, Resolution::default());
        assert_eq!(validated.reflection, Resolution::reflection());
        assert_eq!(validated.refraction, Resolution::refraction());
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = RenderSettings {
            fov_degrees: 70.0,
            near_plane: 0.5,
            far_plane: 500.0,
            shadow_map_size: 2048,
            reflection: Resolution {
                width: 640,
                height: 360,
            },
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.fov_degrees, valid.fov_degrees);
        assert_eq!(validated.near_plane, valid.near_plane);
        assert_eq!(validated.far_plane, valid.far_plane);
        assert_eq!(validated.shadow_map_size, valid.shadow_map_size);
        assert_eq!(validated.reflection, valid.reflection);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let parsed: RenderSettings =
            serde_json::from_str(r#"{ "shadow_map_size": 1024, "sky_color": [0.1, 0.2, 0.3] }"#)
                .unwrap();
        assert_eq!(parsed.shadow_map_size, 1024);
        assert_eq!(parsed.sky_color(), glam::Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(parsed.fov_degrees, 80.0);
        assert_eq!(parsed.reflection, Resolution::reflection());
        assert_eq!(parsed.refraction, Resolution::refraction());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let settings = RenderSettings::load_from_path("does/not/exist/settings.json");
        assert_eq!(settings.far_plane, 1000.0);
        assert_eq!(settings.shadow_distance, 150.0);
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Mailbox
        );
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn present_mode_uses_first_available_when_fifo_missing() {
        let settings = RenderSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..RenderSettings::default()
        };

        let available = [wgpu::PresentMode::Immediate];

        assert_eq!(
            settings.present_mode(&available),
            wgpu::PresentMode::Immediate
        );
    }
}
