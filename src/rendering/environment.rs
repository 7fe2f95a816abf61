/// Image-based lighting from one equirectangular HDR image.
///
/// Loading precomputes everything the shader needs:
/// - 9 spherical-harmonic coefficients of the radiance (diffuse irradiance)
/// - a 6-level GGX-prefiltered specular chain, one roughness per level
/// - a split-sum BRDF lookup table of (scale, bias) pairs
///
/// Until loading succeeds every query answers with a neutral default.
use crate::error::EnvironmentError;
use crate::perf_scope;
use glam::{Vec2, Vec3};
use rayon::prelude::*;
use std::f32::consts::{PI, TAU};
use std::path::Path;

use super::fragment::geometry_smith;

pub const SPECULAR_MIP_COUNT: usize = 6;
const UNLOADED_IRRADIANCE: f32 = 0.03;

const SH_C0: f32 = 0.282095;
const SH_C1: f32 = 0.488603;
const SH_C2: f32 = 1.092548;
const SH_C3: f32 = 0.315392;
const SH_C4: f32 = 0.546274;

// Ramamoorthi-Hanrahan irradiance constants
const RH_C1: f32 = 0.429043;
const RH_C2: f32 = 0.511664;
const RH_C3: f32 = 0.743125;
const RH_C4: f32 = 0.886227;
const RH_C5: f32 = 0.247708;

/// Linear RGB float image, rows stored top first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HdrImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Vec3>,
}

impl HdrImage {
    /// Validates that the pixel count matches the size.
    pub fn new(width: usize, height: usize, pixels: Vec<Vec3>) -> Result<Self, EnvironmentError> {
        if width == 0 || height == 0 {
            return Err(EnvironmentError::Empty { width, height });
        }
        if pixels.len() != width * height {
            return Err(EnvironmentError::InvalidImage {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn solid(width: usize, height: usize, color: Vec3) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    #[inline(always)]
    pub fn texel(&self, x: usize, y: usize) -> Vec3 {
        self.pixels[y * self.width + x]
    }

    /// Bilinear sample; x wraps around, y clamps at the poles.
    pub fn sample_bilinear(&self, uv: Vec2) -> Vec3 {
        if self.pixels.is_empty() {
            return Vec3::ZERO;
        }
        let fx = uv.x * self.width as f32 - 0.5;
        let fy = uv.y * self.height as f32 - 0.5;
        let x0f = fx.floor();
        let y0f = fy.floor();
        let tx = fx - x0f;
        let ty = fy - y0f;

        let w = self.width as i64;
        let h = self.height as i64;
        let x0 = (x0f as i64).rem_euclid(w) as usize;
        let x1 = (x0f as i64 + 1).rem_euclid(w) as usize;
        let y0 = (y0f as i64).clamp(0, h - 1) as usize;
        let y1 = (y0f as i64 + 1).clamp(0, h - 1) as usize;

        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), tx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), tx);
        top.lerp(bottom, ty)
    }

    /// Radiance arriving from `direction`.
    #[inline]
    pub fn sample_direction(&self, direction: Vec3) -> Vec3 {
        self.sample_bilinear(direction_to_equirect_uv(direction))
    }
}

/// Precomputation sizes. The defaults match the shipped quality level;
/// tests use smaller ones.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EnvironmentConfig {
    /// Width of specular mip 0; each level halves it down to 16.
    pub specular_base_width: usize,
    pub prefilter_samples: u32,
    pub brdf_lut_size: usize,
    pub brdf_samples: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            specular_base_width: 256,
            prefilter_samples: 256,
            brdf_lut_size: 128,
            brdf_samples: 512,
        }
    }
}

#[derive(Debug, Default)]
pub struct EnvironmentMap {
    config: EnvironmentConfig,
    source: HdrImage,
    sh: [Vec3; 9],
    specular_mips: Vec<HdrImage>,
    brdf_lut: Vec<Vec2>,
    loaded: bool,
    last_error: Option<String>,
}

impl EnvironmentMap {
    pub fn new() -> Self {
        Self::with_config(EnvironmentConfig::default())
    }

    pub fn with_config(config: EnvironmentConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Decode and load in one step.
    pub fn from_image(image: HdrImage, config: EnvironmentConfig) -> Result<Self, EnvironmentError> {
        let mut env = Self::with_config(config);
        env.load_from_image(image)?;
        Ok(env)
    }

    /// Decode an EXR or Radiance HDR file and run all precomputation.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), EnvironmentError> {
        let path = path.as_ref();
        log::info!("Loading environment map {}", path.display());

        let decoded = image::open(path).map_err(|source| EnvironmentError::Decode {
            path: path.to_path_buf(),
            source,
        });
        let decoded = match decoded {
            Ok(img) => img,
            Err(err) => return Err(self.fail(err)),
        };

        let rgb = decoded.into_rgb32f();
        let (width, height) = rgb.dimensions();
        let pixels = rgb
            .pixels()
            .map(|p| Vec3::new(p[0], p[1], p[2]))
            .collect::<Vec<_>>();

        match HdrImage::new(width as usize, height as usize, pixels) {
            Ok(image) => self.load_from_image(image),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Load already-decoded radiance and run all precomputation.
    pub fn load_from_image(&mut self, image: HdrImage) -> Result<(), EnvironmentError> {
        // Re-validate; the fields are public.
        let image = match HdrImage::new(image.width, image.height, image.pixels) {
            Ok(image) => image,
            Err(err) => return Err(self.fail(err)),
        };

        self.loaded = false;
        self.last_error = None;

        {
            perf_scope!("environment_precompute");
            let start = std::time::Instant::now();

            self.sh = compute_sh9(&image);
            self.specular_mips = prefilter_specular(&image, &self.config);
            self.brdf_lut = integrate_brdf_lut(self.config.brdf_lut_size, self.config.brdf_samples);

            log::info!(
                "Environment {}x{} precomputed in {:.1}ms ({} specular mips, {}x{} BRDF LUT)",
                image.width,
                image.height,
                start.elapsed().as_secs_f64() * 1000.0,
                self.specular_mips.len(),
                self.config.brdf_lut_size,
                self.config.brdf_lut_size
            );
        }

        self.source = image;
        self.loaded = true;
        Ok(())
    }

    fn fail(&mut self, err: EnvironmentError) -> EnvironmentError {
        log::warn!("Environment map unavailable: {err}");
        self.loaded = false;
        self.source = HdrImage::default();
        self.sh = [Vec3::ZERO; 9];
        self.specular_mips.clear();
        self.brdf_lut.clear();
        self.last_error = Some(err.to_string());
        err
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Message of the last failed load, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn sh_coefficients(&self) -> &[Vec3; 9] {
        &self.sh
    }

    pub fn specular_mip(&self, level: usize) -> Option<&HdrImage> {
        self.specular_mips.get(level)
    }

    /// Source radiance towards `direction`; black until loaded.
    pub fn sample_direction(&self, direction: Vec3) -> Vec3 {
        if !self.loaded {
            return Vec3::ZERO;
        }
        self.source.sample_direction(direction)
    }

    /// Diffuse irradiance around `normal` divided by π, i.e. the outgoing
    /// radiance of a white Lambertian surface. A constant environment
    /// evaluates to itself. Neutral gray until loaded.
    pub fn eval_diffuse_sh(&self, normal: Vec3) -> Vec3 {
        if !self.loaded {
            return Vec3::splat(UNLOADED_IRRADIANCE);
        }
        let n = normal.normalize_or_zero();
        let (x, y, z) = (n.x, n.y, n.z);
        let l = &self.sh;

        let irradiance = RH_C1 * l[8] * (x * x - y * y)
            + RH_C3 * l[6] * z * z
            + RH_C4 * l[0]
            - RH_C5 * l[6]
            + 2.0 * RH_C1 * (l[4] * x * y + l[7] * x * z + l[5] * y * z)
            + 2.0 * RH_C2 * (l[3] * x + l[1] * y + l[2] * z);

        (irradiance / PI).max(Vec3::ZERO)
    }

    /// Prefiltered radiance along `reflection`, blending the two mips that
    /// bracket `roughness`. Black until loaded.
    pub fn sample_specular(&self, reflection: Vec3, roughness: f32) -> Vec3 {
        if !self.loaded || self.specular_mips.is_empty() {
            return Vec3::ZERO;
        }
        let last = self.specular_mips.len() - 1;
        let t = roughness.clamp(0.0, 1.0) * last as f32;
        let mip0 = (t as usize).min(last);
        let mip1 = (mip0 + 1).min(last);
        let frac = t - mip0 as f32;

        let uv = direction_to_equirect_uv(reflection);
        let a = self.specular_mips[mip0].sample_bilinear(uv);
        if mip1 == mip0 || frac <= 0.0 {
            return a;
        }
        a.lerp(self.specular_mips[mip1].sample_bilinear(uv), frac)
    }

    /// Split-sum (scale, bias) for `n_dot_v` and `roughness`, nearest cell.
    /// (1, 0) until loaded or when no table exists.
    pub fn lookup_brdf(&self, n_dot_v: f32, roughness: f32) -> Vec2 {
        let size = self.config.brdf_lut_size;
        if !self.loaded || self.brdf_lut.len() != size * size || size == 0 {
            return Vec2::new(1.0, 0.0);
        }
        let max = (size - 1) as f32;
        let x = (n_dot_v.clamp(0.0, 1.0) * max + 0.5) as usize;
        let y = (roughness.clamp(0.0, 1.0) * max + 0.5) as usize;
        self.brdf_lut[y.min(size - 1) * size + x.min(size - 1)]
    }
}

/// Equirectangular mapping: +Z at the horizontal center, +Y at the top row.
#[inline]
pub fn direction_to_equirect_uv(direction: Vec3) -> Vec2 {
    let d = direction.normalize_or_zero();
    let u = d.x.atan2(d.z) / TAU + 0.5;
    let v = 1.0 - (d.y.clamp(-1.0, 1.0).asin() / PI + 0.5);
    Vec2::new(u, v)
}

/// Unit direction through the center of pixel (x, y) of a `width` x `height`
/// equirectangular image. Also returns the elevation angle.
#[inline]
pub fn equirect_pixel_direction(x: usize, y: usize, width: usize, height: usize) -> (Vec3, f32) {
    let u = (x as f32 + 0.5) / width as f32;
    let v = (y as f32 + 0.5) / height as f32;
    let azimuth = (u - 0.5) * TAU;
    let elevation = (0.5 - v) * PI;
    let (sin_e, cos_e) = elevation.sin_cos();
    let (sin_a, cos_a) = azimuth.sin_cos();
    (Vec3::new(cos_e * sin_a, sin_e, cos_e * cos_a), elevation)
}

#[inline]
fn sh9_basis(d: Vec3) -> [f32; 9] {
    let (x, y, z) = (d.x, d.y, d.z);
    [
        SH_C0,
        SH_C1 * y,
        SH_C1 * z,
        SH_C1 * x,
        SH_C2 * x * y,
        SH_C2 * y * z,
        SH_C3 * (3.0 * z * z - 1.0),
        SH_C2 * x * z,
        SH_C4 * (x * x - y * y),
    ]
}

/// Project the radiance onto the first nine real SH basis functions,
/// weighting each pixel by its solid angle.
pub fn compute_sh9(image: &HdrImage) -> [Vec3; 9] {
    let (w, h) = (image.width, image.height);
    if w == 0 || h == 0 {
        return [Vec3::ZERO; 9];
    }
    let pixel_area = (TAU / w as f32) * (PI / h as f32);

    (0..h)
        .into_par_iter()
        .fold(
            || [Vec3::ZERO; 9],
            |mut acc, y| {
                for x in 0..w {
                    let (dir, elevation) = equirect_pixel_direction(x, y, w, h);
                    let weight = pixel_area * elevation.cos();
                    let radiance = image.texel(x, y) * weight;
                    for (c, b) in acc.iter_mut().zip(sh9_basis(dir)) {
                        *c += radiance * b;
                    }
                }
                acc
            },
        )
        .reduce(
            || [Vec3::ZERO; 9],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

/// Van der Corput radical inverse in base 2.
#[inline]
pub fn radical_inverse(i: u32) -> f32 {
    i.reverse_bits() as f32 * 2.328_306_4e-10
}

#[inline]
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse(i))
}

/// GGX-distributed half vector around `n` for the sample point `xi`.
pub fn importance_sample_ggx(xi: Vec2, n: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).max(0.0).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let h = Vec3::new(cos_phi * sin_theta, sin_phi * sin_theta, cos_theta);

    let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent_x = up.cross(n).normalize();
    let tangent_y = n.cross(tangent_x);
    (tangent_x * h.x + tangent_y * h.y + n * h.z).normalize()
}

/// Roughness assigned to specular level `mip`.
#[inline]
pub fn mip_roughness(mip: usize) -> f32 {
    mip as f32 / (SPECULAR_MIP_COUNT - 1) as f32
}

fn prefilter_specular(source: &HdrImage, config: &EnvironmentConfig) -> Vec<HdrImage> {
    (0..SPECULAR_MIP_COUNT)
        .map(|mip| {
            let width = (config.specular_base_width >> mip).max(16);
            let height = (width / 2).max(1);
            let roughness = mip_roughness(mip);
            let mut pixels = vec![Vec3::ZERO; width * height];

            pixels
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, out) in row.iter_mut().enumerate() {
                        let (n, _) = equirect_pixel_direction(x, y, width, height);
                        *out = if mip == 0 {
                            source.sample_direction(n)
                        } else {
                            prefilter_direction(source, n, roughness, config.prefilter_samples)
                        };
                    }
                });

            log::debug!("Specular mip {mip}: {width}x{height}, roughness {roughness:.1}");
            HdrImage {
                width,
                height,
                pixels,
            }
        })
        .collect()
}

/// GGX-weighted average of the radiance around `n`, taking V = N.
fn prefilter_direction(source: &HdrImage, n: Vec3, roughness: f32, samples: u32) -> Vec3 {
    let v = n;
    let mut color = Vec3::ZERO;
    let mut weight = 0.0f32;
    for i in 0..samples {
        let h = importance_sample_ggx(hammersley(i, samples), n, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize_or_zero();
        let n_dot_l = n.dot(l);
        if n_dot_l > 0.0 {
            color += source.sample_direction(l) * n_dot_l;
            weight += n_dot_l;
        }
    }
    if weight > 0.0 {
        color / weight
    } else {
        Vec3::ZERO
    }
}

/// Split-sum BRDF table: row = roughness, column = N·V, both at cell centers.
pub fn integrate_brdf_lut(size: usize, samples: u32) -> Vec<Vec2> {
    if size == 0 || samples == 0 {
        return Vec::new();
    }
    let mut lut = vec![Vec2::ZERO; size * size];
    lut.par_chunks_mut(size).enumerate().for_each(|(iy, row)| {
        let roughness = ((iy as f32 + 0.5) / size as f32).max(0.01);
        for (ix, out) in row.iter_mut().enumerate() {
            let n_dot_v = ((ix as f32 + 0.5) / size as f32).max(1e-4);
            *out = integrate_brdf(n_dot_v, roughness, samples);
        }
    });
    lut
}

fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: u32) -> Vec2 {
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let n = Vec3::Z;
    let mut scale = 0.0f32;
    let mut bias = 0.0f32;

    for i in 0..samples {
        let h = importance_sample_ggx(hammersley(i, samples), n, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize_or_zero();
        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);

        if n_dot_l > 0.0 {
            let g = geometry_smith(n_dot_v, n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v).max(1e-12);
            let fc = (1.0 - v_dot_h).powi(5);
            scale += (1.0 - fc) * g_vis;
            bias += fc * g_vis;
        }
    }

    Vec2::new(scale, bias) / samples as f32
}
