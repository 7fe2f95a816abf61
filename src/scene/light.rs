use glam::Vec3;

/// Infinitely distant light. `direction` is the direction light travels.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction,
            color,
            intensity,
        }
    }

    /// Unit vector from a surface towards the light.
    #[inline]
    pub fn to_light(&self) -> Vec3 {
        (-self.direction).normalize_or_zero()
    }

    #[inline]
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}
