/// Material textures: RGBA8 images, glTF-style samplers and the sRGB decode table.
use glam::{Vec2, Vec4};
use lazy_static::lazy_static;

lazy_static! {
    /// 8-bit sRGB -> linear, exact piecewise curve.
    pub static ref SRGB_TO_LINEAR: [f32; 256] = {
        let mut table = [0.0f32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *entry = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    };
}

const GL_NEAREST: u32 = 9728;
const GL_LINEAR: u32 = 9729;
const GL_LINEAR_MIPMAP_LINEAR: u32 = 9987;
const GL_NEAREST_MIPMAP_NEAREST: u32 = 9984;
const GL_REPEAT: u32 = 10497;
const GL_CLAMP_TO_EDGE: u32 = 33071;
const GL_MIRRORED_REPEAT: u32 = 33648;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

impl WrapMode {
    /// Unknown codes fall back to repeat.
    pub fn from_gl(code: u32) -> Self {
        match code {
            GL_CLAMP_TO_EDGE => WrapMode::ClampToEdge,
            GL_MIRRORED_REPEAT => WrapMode::MirroredRepeat,
            GL_REPEAT => WrapMode::Repeat,
            _ => WrapMode::Repeat,
        }
    }

    /// Fold a texture coordinate into [0, 1].
    #[inline(always)]
    pub fn apply(self, t: f32) -> f32 {
        match self {
            WrapMode::Repeat => t - t.floor(),
            WrapMode::ClampToEdge => t.clamp(0.0, 1.0),
            WrapMode::MirroredRepeat => {
                let m = t.rem_euclid(2.0);
                if m > 1.0 {
                    2.0 - m
                } else {
                    m
                }
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sampler {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub filter: FilterMode,
}

impl Sampler {
    pub fn new(wrap_s: WrapMode, wrap_t: WrapMode, filter: FilterMode) -> Self {
        Self {
            wrap_s,
            wrap_t,
            filter,
        }
    }

    /// Build from glTF sampler codes. Bilinear when either filter asks for
    /// linear magnification or any linear/mipmapped minification.
    pub fn from_gl(mag_filter: Option<u32>, min_filter: Option<u32>, wrap_s: u32, wrap_t: u32) -> Self {
        let linear_mag = mag_filter == Some(GL_LINEAR);
        let linear_min = matches!(
            min_filter,
            Some(GL_LINEAR) | Some(GL_NEAREST_MIPMAP_NEAREST..=GL_LINEAR_MIPMAP_LINEAR)
        );
        let filter = if linear_mag || linear_min {
            FilterMode::Linear
        } else {
            FilterMode::Nearest
        };
        Self::new(WrapMode::from_gl(wrap_s), WrapMode::from_gl(wrap_t), filter)
    }

    pub fn nearest() -> Self {
        Self::from_gl(Some(GL_NEAREST), Some(GL_NEAREST), GL_REPEAT, GL_REPEAT)
    }
}

/// Decoded RGBA8 image, rows stored top first.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<[u8; 4]>,
    /// Color data encoded in sRGB (base color, emissive).
    pub is_srgb: bool,
}

impl TextureImage {
    pub fn new(width: usize, height: usize, pixels: Vec<[u8; 4]>, is_srgb: bool) -> Self {
        Self {
            width,
            height,
            pixels,
            is_srgb,
        }
    }

    /// One-texel image.
    pub fn solid(rgba: [u8; 4], is_srgb: bool) -> Self {
        Self::new(1, 1, vec![rgba], is_srgb)
    }

    /// Pixel storage matches the declared size and is non-empty.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.pixels.len() == self.width * self.height
    }

    #[inline(always)]
    fn texel(&self, x: usize, y: usize, srgb: bool) -> Vec4 {
        let [r, g, b, a] = self.pixels[y * self.width + x];
        let alpha = a as f32 / 255.0;
        if srgb {
            let table = &*SRGB_TO_LINEAR;
            Vec4::new(table[r as usize], table[g as usize], table[b as usize], alpha)
        } else {
            Vec4::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, alpha)
        }
    }

    /// Sample at `uv` with (0, 0) at the top-left texel.
    /// Color channels are decoded to linear before filtering when either the
    /// caller asks for `srgb` or the image itself is flagged sRGB; alpha is
    /// always linear. Invalid images return `None`.
    pub fn sample(&self, sampler: &Sampler, uv: Vec2, srgb: bool) -> Option<Vec4> {
        if !self.is_valid() {
            return None;
        }
        let srgb = srgb || self.is_srgb;
        let u = sampler.wrap_s.apply(uv.x);
        let v = sampler.wrap_t.apply(uv.y);
        let max_x = self.width - 1;
        let max_y = self.height - 1;

        let sample = match sampler.filter {
            FilterMode::Nearest => {
                let x = ((u * self.width as f32) as usize).min(max_x);
                let y = ((v * self.height as f32) as usize).min(max_y);
                self.texel(x, y, srgb)
            }
            FilterMode::Linear => {
                let fx = u * max_x as f32;
                let fy = v * max_y as f32;
                let x0 = (fx as usize).min(max_x);
                let y0 = (fy as usize).min(max_y);
                let x1 = (x0 + 1).min(max_x);
                let y1 = (y0 + 1).min(max_y);
                let tx = fx - x0 as f32;
                let ty = fy - y0 as f32;

                let top = self.texel(x0, y0, srgb).lerp(self.texel(x1, y0, srgb), tx);
                let bottom = self.texel(x0, y1, srgb).lerp(self.texel(x1, y1, srgb), tx);
                top.lerp(bottom, ty)
            }
        };
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> TextureImage {
        // 2x2: top row black/white, bottom row white/black
        TextureImage::new(
            2,
            2,
            vec![[0, 0, 0, 255], [255, 255, 255, 255], [255, 255, 255, 0], [0, 0, 0, 0]],
            false,
        )
    }

    #[test]
    fn srgb_table_endpoints_and_midpoint() {
        assert_eq!(SRGB_TO_LINEAR[0], 0.0);
        assert!((SRGB_TO_LINEAR[255] - 1.0).abs() < 1e-6);
        assert!((SRGB_TO_LINEAR[128] - 0.2158605).abs() < 1e-4);
    }

    #[test]
    fn uv_origin_is_top_left() {
        let image = checker();
        let s = image.sample(&Sampler::nearest(), Vec2::new(0.9, 0.1), false).unwrap();
        assert_eq!(s, Vec4::ONE);
        let s = image.sample(&Sampler::nearest(), Vec2::new(0.1, 0.9), false).unwrap();
        assert_eq!(s, Vec4::new(1.0, 1.0, 1.0, 0.0));
    }

    #[test]
    fn bilinear_center_averages_all_texels() {
        let image = checker();
        let s = image.sample(&Sampler::default(), Vec2::splat(0.5), false).unwrap();
        assert!((s - Vec4::new(0.5, 0.5, 0.5, 0.5)).length() < 1e-6);
    }

    #[test]
    fn wrap_modes_fold_coordinates() {
        assert!((WrapMode::Repeat.apply(1.25) - 0.25).abs() < 1e-6);
        assert!((WrapMode::Repeat.apply(-0.25) - 0.75).abs() < 1e-6);
        assert_eq!(WrapMode::ClampToEdge.apply(3.0), 1.0);
        assert!((WrapMode::MirroredRepeat.apply(1.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn gl_codes_select_filter_and_wrap() {
        let s = Sampler::from_gl(Some(9728), Some(9986), 33071, 33648);
        assert_eq!(s.filter, FilterMode::Linear);
        assert_eq!(s.wrap_s, WrapMode::ClampToEdge);
        assert_eq!(s.wrap_t, WrapMode::MirroredRepeat);
        assert_eq!(Sampler::from_gl(None, None, 10497, 10497).filter, FilterMode::Nearest);
    }

    #[test]
    fn srgb_flagged_image_decodes_on_linear_binding() {
        let flagged = TextureImage::solid([128, 128, 128, 255], true);
        let s = flagged.sample(&Sampler::default(), Vec2::splat(0.5), false).unwrap();
        assert!((s.x - SRGB_TO_LINEAR[128]).abs() < 1e-6);
        assert_eq!(s.w, 1.0);

        let plain = TextureImage::solid([128, 128, 128, 255], false);
        let s = plain.sample(&Sampler::default(), Vec2::splat(0.5), false).unwrap();
        assert!((s.x - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn malformed_image_is_not_sampled() {
        let image = TextureImage::new(4, 4, vec![[0; 4]; 3], false);
        assert!(image.sample(&Sampler::default(), Vec2::ZERO, false).is_none());
    }
}
