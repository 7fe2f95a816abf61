/// Orbit camera
/// Circles a target point at a fixed distance; yaw around Y, pitch towards the poles.
use glam::{Mat4, Vec3};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

const PITCH_LIMIT: f32 = FRAC_PI_2 - 1e-4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,   // Rotation around Y axis (radians), 0 looks down -Z
    pub pitch: f32, // Elevation above the XZ plane (radians)
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub aspect_ratio: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 5.0, 1.0)
    }
}

impl OrbitCamera {
    pub fn new(target: Vec3, distance: f32, aspect_ratio: f32) -> Self {
        Self {
            target,
            distance,
            yaw: 0.0,
            pitch: 0.0,
            fov: 60.0f32.to_radians(),
            near: 0.1,
            far: 100.0,
            aspect_ratio,
        }
    }

    pub fn set_distance(&mut self, distance: f32) {
        self.distance = distance;
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Add yaw/pitch deltas. Pitch stays just short of the poles and yaw
    /// is folded back into [-2π, 2π] once it leaves [-π, π].
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        self.yaw += yaw;
        self.pitch = (self.pitch + pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        if self.yaw > PI || self.yaw < -PI {
            self.yaw %= TAU;
        }
    }

    /// World-space eye position on the orbit sphere.
    pub fn position(&self) -> Vec3 {
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        self.target
            + Vec3::new(
                self.distance * cos_pitch * sin_yaw,
                self.distance * sin_pitch,
                self.distance * cos_pitch * cos_yaw,
            )
    }

    /// Get view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    /// Right-handed projection with depth mapped to [0, 1].
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (call when the viewport resizes)
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }
}
