/// Metallic-roughness fragment shading.
///
/// Cook-Torrance specular (GGX distribution, Smith-Schlick geometry,
/// Schlick Fresnel) plus Lambert diffuse for each directional light,
/// a constant ambient term, optional image-based lighting from a loaded
/// environment map and emission. Output is linear and unclamped.
use super::environment::EnvironmentMap;
use super::texture::{Sampler, TextureImage};
use crate::scene::{DirectionalLight, PbrMaterial, TextureBinding};
use glam::{Vec2, Vec3, Vec4};
use std::f32::consts::PI;

const DIELECTRIC_F0: f32 = 0.04;
const MIN_ROUGHNESS: f32 = 0.04;
const EPSILON: f32 = 1e-12;

/// Light reduced to what the shader needs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PreparedLight {
    /// Unit vector from the surface towards the light.
    pub direction: Vec3,
    /// color * intensity
    pub radiance: Vec3,
}

impl From<&DirectionalLight> for PreparedLight {
    fn from(light: &DirectionalLight) -> Self {
        Self {
            direction: light.to_light(),
            radiance: light.radiance(),
        }
    }
}

/// Everything constant across one triangle.
#[derive(Copy, Clone)]
pub struct FragmentContext<'a> {
    pub camera_position: Vec3,
    pub material: &'a PbrMaterial,
    pub lights: &'a [PreparedLight],
    pub ambient: Vec3,
    pub images: &'a [TextureImage],
    pub samplers: &'a [Sampler],
    /// Only set when the map finished loading.
    pub environment: Option<&'a EnvironmentMap>,
    pub ibl_intensity: f32,
}

impl<'a> FragmentContext<'a> {
    /// Sample a bound texture. Missing images or samplers skip the texture.
    #[inline]
    fn sample(&self, binding: Option<&TextureBinding>, uv: Vec2, srgb: bool) -> Option<Vec4> {
        let binding = binding?;
        let image = self.images.get(binding.image)?;
        let sampler = match binding.sampler {
            Some(index) => *self.samplers.get(index)?,
            None => Sampler::default(),
        };
        image.sample(&sampler, uv, srgb)
    }
}

/// Interpolated surface attributes at one pixel.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FragmentVarying {
    pub normal: Vec3,
    pub world_position: Vec3,
    pub uv: Vec2,
    /// Zero when the material has no normal map.
    pub tangent: Vec4,
}

/// GGX / Trowbridge-Reitz normal distribution with `a = roughness²`.
#[inline]
pub fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * d * d + EPSILON)
}

#[inline]
pub fn geometry_schlick_ggx(n_dot_x: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    n_dot_x / (n_dot_x * (1.0 - k) + k + EPSILON)
}

/// Smith shadowing-masking from the view and light terms.
#[inline]
pub fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

#[inline]
pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta.clamp(0.0, 1.0)).powi(5)
}

/// Schlick Fresnel with the grazing term damped by roughness.
#[inline]
pub fn fresnel_schlick_roughness(cos_theta: f32, f0: Vec3, roughness: f32) -> Vec3 {
    let grazing = Vec3::splat(1.0 - roughness).max(f0);
    f0 + (grazing - f0) * (1.0 - cos_theta.clamp(0.0, 1.0)).powi(5)
}

pub struct FragmentShader;

impl FragmentShader {
    /// Base color factor times the decoded base color texture.
    /// RGB is clamped to [0, 1]; alpha is factor alpha times texture alpha.
    #[inline]
    pub fn base_color(ctx: &FragmentContext, uv: Vec2) -> Vec4 {
        let material = ctx.material;
        let mut base = material.base_color;
        if let Some(texel) = ctx.sample(material.base_color_texture.as_ref(), uv, true) {
            base *= texel;
        }
        base.truncate().clamp(Vec3::ZERO, Vec3::ONE).extend(base.w)
    }

    /// Shade one fragment.
    pub fn shade(ctx: &FragmentContext, varying: &FragmentVarying) -> Vec3 {
        let base = Self::base_color(ctx, varying.uv);
        Self::shade_surface(ctx, varying, base)
    }

    /// Shade with a base color the caller already sampled (the alpha test needs it first).
    pub fn shade_surface(ctx: &FragmentContext, varying: &FragmentVarying, base: Vec4) -> Vec3 {
        let material = ctx.material;
        let uv = varying.uv;
        let albedo = base.truncate();

        let mut metallic = material.metallic;
        let mut roughness = material.roughness;
        if let Some(mr) = ctx.sample(material.metallic_roughness_texture.as_ref(), uv, false) {
            metallic *= mr.z;
            roughness *= mr.y;
        }
        let metallic = metallic.clamp(0.0, 1.0);
        let roughness = roughness.clamp(MIN_ROUGHNESS, 1.0);

        let v = (ctx.camera_position - varying.world_position).normalize_or_zero();
        let mut n = varying.normal.normalize_or_zero();
        if n == Vec3::ZERO {
            n = v;
        }
        if material.double_sided && n.dot(v) < 0.0 {
            n = -n;
        }
        n = Self::perturb_normal(ctx, varying, n);

        let n_dot_v = n.dot(v).max(0.0);
        let f0 = Vec3::splat(DIELECTRIC_F0).lerp(albedo, metallic);

        let mut color = Vec3::ZERO;
        for light in ctx.lights {
            let l = light.direction;
            let n_dot_l = n.dot(l);
            if n_dot_l <= 0.0 {
                continue;
            }
            let h = (v + l).normalize_or_zero();
            let n_dot_h = n.dot(h).max(0.0);
            let h_dot_v = h.dot(v).max(0.0);

            let d = distribution_ggx(n_dot_h, roughness);
            let g = geometry_smith(n_dot_v, n_dot_l, roughness);
            let f = fresnel_schlick(h_dot_v, f0);

            let specular = f * (d * g / (4.0 * n_dot_v * n_dot_l + EPSILON));
            let k_d = (Vec3::ONE - f) * (1.0 - metallic);
            let diffuse = k_d * albedo / PI;

            color += (diffuse + specular) * light.radiance * n_dot_l;
        }

        let occlusion = match material.occlusion_texture.as_ref() {
            Some(binding) => ctx
                .sample(Some(binding), uv, false)
                .map_or(1.0, |ao| 1.0 + binding.scale * (ao.x - 1.0)),
            None => 1.0,
        };

        color += ctx.ambient * albedo * occlusion;

        if let Some(env) = ctx.environment.filter(|_| ctx.ibl_intensity > 0.0) {
            let k_s = fresnel_schlick_roughness(n_dot_v, f0, roughness);
            let k_d = (Vec3::ONE - k_s) * (1.0 - metallic);
            let diffuse = k_d * albedo * env.eval_diffuse_sh(n);

            let r = (2.0 * n.dot(v)) * n - v;
            let prefiltered = env.sample_specular(r, roughness);
            let brdf = env.lookup_brdf(n_dot_v, roughness);
            let specular = prefiltered * (f0 * brdf.x + Vec3::splat(brdf.y));

            color += (diffuse + specular) * occlusion * ctx.ibl_intensity;
        }

        let mut emissive = material.emissive;
        if let Some(texel) = ctx.sample(material.emissive_texture.as_ref(), uv, true) {
            emissive *= texel.truncate();
        }

        color + emissive
    }

    /// Tangent-space normal mapping. Leaves `n` untouched without a normal
    /// texture or with a degenerate tangent.
    fn perturb_normal(ctx: &FragmentContext, varying: &FragmentVarying, n: Vec3) -> Vec3 {
        let Some(binding) = ctx.material.normal_texture.as_ref() else {
            return n;
        };
        let Some(texel) = ctx.sample(Some(binding), varying.uv, false) else {
            return n;
        };

        let t = varying.tangent.truncate();
        // Gram-Schmidt against the (possibly flipped) normal.
        let t = t - n * n.dot(t);
        if t.length_squared() < 1e-12 {
            return n;
        }
        let t = t.normalize();
        let handedness = if varying.tangent.w < 0.0 { -1.0 } else { 1.0 };
        let b = n.cross(t) * handedness;

        let mut sample = texel.truncate() * 2.0 - Vec3::ONE;
        sample.x *= binding.scale;
        sample.y *= binding.scale;

        (t * sample.x + b * sample.y + n * sample.z).normalize_or(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn context<'a>(material: &'a PbrMaterial, lights: &'a [PreparedLight]) -> FragmentContext<'a> {
        FragmentContext {
            camera_position: Vec3::new(0.0, 0.0, 5.0),
            material,
            lights,
            ambient: Vec3::ZERO,
            images: &[],
            samplers: &[],
            environment: None,
            ibl_intensity: 0.0,
        }
    }

    fn facing() -> FragmentVarying {
        FragmentVarying {
            normal: Vec3::Z,
            ..Default::default()
        }
    }

    #[test]
    fn head_on_light_matches_closed_form() {
        let material = PbrMaterial::new(Vec3::ONE, 0.0, 1.0);
        let lights = [PreparedLight {
            direction: Vec3::Z,
            radiance: Vec3::ONE,
        }];
        let c = FragmentShader::shade(&context(&material, &lights), &facing());
        // 0.96 / π diffuse + 0.04 * (1/π) / 4 specular
        assert_relative_eq!(c.x, 0.97 / PI, epsilon = 1e-4);
        assert_relative_eq!(c.x, c.z, epsilon = 1e-6);
    }

    #[test]
    fn light_behind_surface_contributes_nothing() {
        let material = PbrMaterial::new(Vec3::ONE, 0.0, 0.5);
        let lights = [PreparedLight {
            direction: Vec3::NEG_Z,
            radiance: Vec3::splat(10.0),
        }];
        let c = FragmentShader::shade(&context(&material, &lights), &facing());
        assert_eq!(c, Vec3::ZERO);
    }

    #[test]
    fn ambient_and_emissive_are_added() {
        let material = PbrMaterial::new(Vec3::splat(0.5), 0.0, 0.5).with_emissive(Vec3::new(0.0, 0.0, 2.0));
        let mut ctx = context(&material, &[]);
        ctx.ambient = Vec3::splat(0.2);
        let c = FragmentShader::shade(&ctx, &facing());
        assert_relative_eq!(c.x, 0.1, epsilon = 1e-6);
        assert_relative_eq!(c.z, 2.1, epsilon = 1e-6);
    }

    #[test]
    fn base_color_texture_modulates_alpha() {
        let images = [TextureImage::solid([255, 255, 255, 128], true)];
        let mut material = PbrMaterial::new(Vec3::ONE, 0.0, 0.5);
        material.base_color.w = 0.5;
        material.base_color_texture = Some(TextureBinding::new(0));
        let mut ctx = context(&material, &[]);
        ctx.images = &images;
        let base = FragmentShader::base_color(&ctx, Vec2::ZERO);
        assert_relative_eq!(base.w, 0.5 * 128.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(base.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_texture_is_skipped() {
        let mut material = PbrMaterial::new(Vec3::splat(0.25), 0.0, 0.5);
        material.base_color_texture = Some(TextureBinding::new(3));
        let ctx = context(&material, &[]);
        assert_eq!(FragmentShader::base_color(&ctx, Vec2::ZERO), Vec4::new(0.25, 0.25, 0.25, 1.0));
    }

    #[test]
    fn flat_normal_map_keeps_geometric_normal() {
        // (128, 128, 255) decodes to roughly +Z in tangent space.
        let images = [TextureImage::solid([128, 128, 255, 255], false)];
        let mut material = PbrMaterial::new(Vec3::ONE, 0.0, 0.5);
        material.normal_texture = Some(TextureBinding::new(0));
        let mut ctx = context(&material, &[]);
        ctx.images = &images;
        let varying = FragmentVarying {
            normal: Vec3::Z,
            tangent: Vec4::new(1.0, 0.0, 0.0, 1.0),
            ..Default::default()
        };
        let n = FragmentShader::perturb_normal(&ctx, &varying, Vec3::Z);
        assert!(n.dot(Vec3::Z) > 0.999);
    }

    #[test]
    fn ggx_terms_are_normalised_at_normal_incidence() {
        assert_relative_eq!(distribution_ggx(1.0, 1.0), 1.0 / PI, epsilon = 1e-6);
        assert_relative_eq!(geometry_smith(1.0, 1.0, 1.0), 1.0, epsilon = 1e-6);
        assert_eq!(fresnel_schlick(1.0, Vec3::splat(0.04)), Vec3::splat(0.04));
        assert_eq!(fresnel_schlick(0.0, Vec3::splat(0.04)), Vec3::ONE);
    }
}
