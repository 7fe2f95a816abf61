/// Per-frame read-only state shared by every pipeline stage.
use super::light::DirectionalLight;
use crate::camera::OrbitCamera;
use crate::rendering::environment::EnvironmentMap;
use crate::rendering::texture::{Sampler, TextureImage};
use glam::{Mat4, Vec3};

/// Camera, lighting and resource tables for one frame.
/// Built once, then only read while the frame renders.
#[derive(Clone, Debug)]
pub struct FrameContext<'a> {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub ambient: Vec3,
    pub lights: Vec<DirectionalLight>,
    pub images: &'a [TextureImage],
    pub samplers: &'a [Sampler],
    pub environment: Option<&'a EnvironmentMap>,
    /// Scale of the image-based lighting term; 0 disables it.
    pub ibl_intensity: f32,
}

impl<'a> FrameContext<'a> {
    pub fn new(view: Mat4, projection: Mat4, camera_position: Vec3) -> Self {
        Self {
            view,
            projection,
            camera_position,
            ambient: Vec3::ZERO,
            lights: Vec::new(),
            images: &[],
            samplers: &[],
            environment: None,
            ibl_intensity: 0.0,
        }
    }

    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    #[inline]
    pub fn inverse_view_projection(&self) -> Mat4 {
        self.view_projection().inverse()
    }

    /// Environment map, only when its precomputation finished.
    #[inline]
    pub fn loaded_environment(&self) -> Option<&'a EnvironmentMap> {
        self.environment.filter(|env| env.is_loaded())
    }
}

/// Defaults applied when building a frame context from camera state.
#[derive(Copy, Clone, Debug)]
pub struct FrameContextOptions {
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub ambient: Vec3,
    pub default_light_direction: Vec3,
    pub default_light_color: Vec3,
    pub default_light_intensity: f32,
}

impl Default for FrameContextOptions {
    fn default() -> Self {
        Self {
            fov_y: 60.0f32.to_radians(),
            z_near: 0.1,
            z_far: 100.0,
            ambient: Vec3::splat(0.03),
            default_light_direction: Vec3::new(-0.3, -1.0, -0.2),
            default_light_color: Vec3::ONE,
            default_light_intensity: 1.2,
        }
    }
}

/// Assembles a `FrameContext` from an orbit camera and scene resources.
pub struct FrameContextBuilder<'a> {
    options: FrameContextOptions,
    lights: Vec<DirectionalLight>,
    images: &'a [TextureImage],
    samplers: &'a [Sampler],
    environment: Option<&'a EnvironmentMap>,
    ibl_intensity: f32,
}

impl<'a> FrameContextBuilder<'a> {
    pub fn new(options: FrameContextOptions) -> Self {
        Self {
            options,
            lights: Vec::new(),
            images: &[],
            samplers: &[],
            environment: None,
            ibl_intensity: 1.0,
        }
    }

    pub fn lights(mut self, lights: &[DirectionalLight]) -> Self {
        self.lights = lights.to_vec();
        self
    }

    pub fn textures(mut self, images: &'a [TextureImage], samplers: &'a [Sampler]) -> Self {
        self.images = images;
        self.samplers = samplers;
        self
    }

    pub fn environment(mut self, environment: Option<&'a EnvironmentMap>, intensity: f32) -> Self {
        self.environment = environment;
        self.ibl_intensity = intensity;
        self
    }

    /// Build for a viewport of `width` x `height` pixels.
    /// A scene without lights receives the configured default light.
    pub fn build(self, camera: &OrbitCamera, width: usize, height: usize) -> FrameContext<'a> {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let projection = Mat4::perspective_rh(
            self.options.fov_y,
            aspect,
            self.options.z_near,
            self.options.z_far,
        );

        let mut lights = self.lights;
        if lights.is_empty() {
            lights.push(DirectionalLight::new(
                self.options.default_light_direction,
                self.options.default_light_color,
                self.options.default_light_intensity,
            ));
        }

        FrameContext {
            view: camera.view_matrix(),
            projection,
            camera_position: camera.position(),
            ambient: self.options.ambient,
            lights,
            images: self.images,
            samplers: self.samplers,
            environment: self.environment,
            ibl_intensity: self.ibl_intensity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scene_gets_default_light() {
        let camera = OrbitCamera::default();
        let frame = FrameContextBuilder::new(FrameContextOptions::default()).build(&camera, 64, 64);
        assert_eq!(frame.lights.len(), 1);
        assert_eq!(frame.lights[0].intensity, 1.2);
        assert_eq!(frame.ambient, Vec3::splat(0.03));
    }

    #[test]
    fn explicit_lights_are_kept() {
        let camera = OrbitCamera::default();
        let light = DirectionalLight::new(Vec3::NEG_Z, Vec3::ONE, 3.0);
        let frame = FrameContextBuilder::new(FrameContextOptions::default())
            .lights(&[light])
            .build(&camera, 64, 32);
        assert_eq!(frame.lights, vec![light]);
    }

    #[test]
    fn unloaded_environment_is_hidden() {
        let env = EnvironmentMap::new();
        let camera = OrbitCamera::default();
        let frame = FrameContextBuilder::new(FrameContextOptions::default())
            .environment(Some(&env), 1.0)
            .build(&camera, 8, 8);
        assert!(frame.environment.is_some());
        assert!(frame.loaded_environment().is_none());
    }
}
