/// Post-processing on the linear plane and the resolve to BGRA8.
use super::framebuffer::Framebuffer;
use glam::Vec3;
use lazy_static::lazy_static;
use rayon::prelude::*;

const LUT_SIZE: usize = 1024;

lazy_static! {
    /// Linear [0, 1] -> 8-bit display value through a 1/2.2 gamma curve.
    pub static ref LINEAR_TO_SRGB: [u8; LUT_SIZE] = {
        let mut table = [0u8; LUT_SIZE];
        for (i, entry) in table.iter_mut().enumerate() {
            let v = i as f32 / (LUT_SIZE - 1) as f32;
            *entry = (v.powf(1.0 / 2.2) * 255.0 + 0.5) as u8;
        }
        table
    };
}

/// 2x2 ordered dither offsets, indexed by `(y & 1) << 1 | (x & 1)`.
const DITHER: [f32; 4] = [-0.375 / 255.0, -0.125 / 255.0, 0.125 / 255.0, 0.375 / 255.0];

// FXAA tuning
const REDUCE_MIN: f32 = 1.0 / 128.0;
const REDUCE_MUL: f32 = 1.0 / 8.0;
const SPAN_MAX: f32 = 8.0;
const EDGE_THRESHOLD_MIN: f32 = 1.0 / 24.0;
const EDGE_THRESHOLD: f32 = 1.0 / 12.0;

/// Force every lookup table used by shading and resolve.
pub fn init_color_tables() {
    lazy_static::initialize(&LINEAR_TO_SRGB);
    lazy_static::initialize(&super::texture::SRGB_TO_LINEAR);
}

#[inline(always)]
pub fn linear_to_srgb_u8(v: f32) -> u8 {
    if v <= 0.0 || v.is_nan() {
        return 0;
    }
    if v >= 1.0 {
        return 255;
    }
    LINEAR_TO_SRGB[(v * (LUT_SIZE - 1) as f32 + 0.5) as usize]
}

/// Narkowicz fit of the ACES filmic curve, clamped to [0, 1].
#[inline(always)]
pub fn aces_filmic(x: f32) -> f32 {
    if x <= 0.0 {
        return 0.0;
    }
    const A: f32 = 2.51;
    const B: f32 = 0.03;
    const C: f32 = 2.43;
    const D: f32 = 0.59;
    const E: f32 = 0.14;
    ((x * (A * x + B)) / (x * (C * x + D) + E)).clamp(0.0, 1.0)
}

#[inline(always)]
pub fn pack_bgra(r: u8, g: u8, b: u8) -> u32 {
    b as u32 | (g as u32) << 8 | (r as u32) << 16 | 0xFF00_0000
}

#[inline(always)]
fn luma(c: Vec3) -> f32 {
    0.299 * c.x + 0.587 * c.y + 0.114 * c.z
}

/// Luma-based edge anti-aliasing on the linear plane. Rows are filtered in
/// parallel into `scratch`, then copied back.
pub fn apply_fxaa(fb: &mut Framebuffer, scratch: &mut Vec<Vec3>) {
    let (width, height) = (fb.width, fb.height);
    if width == 0 || height == 0 {
        return;
    }
    scratch.resize(width * height, Vec3::ZERO);

    let src = fb.linear();
    let at = |x: i32, y: i32| {
        let x = x.clamp(0, width as i32 - 1) as usize;
        let y = y.clamp(0, height as i32 - 1) as usize;
        src[y * width + x]
    };

    scratch
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i32;
            for (x, out) in row.iter_mut().enumerate() {
                let x = x as i32;
                let c_m = at(x, y);
                let l_m = luma(c_m);
                let l_nw = luma(at(x - 1, y - 1));
                let l_ne = luma(at(x + 1, y - 1));
                let l_sw = luma(at(x - 1, y + 1));
                let l_se = luma(at(x + 1, y + 1));

                let l_min = l_m.min(l_nw.min(l_ne).min(l_sw.min(l_se)));
                let l_max = l_m.max(l_nw.max(l_ne).max(l_sw.max(l_se)));

                if l_max - l_min < EDGE_THRESHOLD_MIN.max(l_max * EDGE_THRESHOLD) {
                    *out = c_m;
                    continue;
                }

                let dir_x = -((l_nw + l_ne) - (l_sw + l_se));
                let dir_y = (l_nw + l_sw) - (l_ne + l_se);
                let reduce = ((l_nw + l_ne + l_sw + l_se) * (0.25 * REDUCE_MUL)).max(REDUCE_MIN);
                let rcp_min = 1.0 / (dir_x.abs().min(dir_y.abs()) + reduce);
                let dir_x = (dir_x * rcp_min).clamp(-SPAN_MAX, SPAN_MAX);
                let dir_y = (dir_y * rcp_min).clamp(-SPAN_MAX, SPAN_MAX);

                let tap = |t: f32| at(x + (dir_x * t) as i32, y + (dir_y * t) as i32);
                let rgb_a = (tap(1.0 / 3.0) + tap(2.0 / 3.0)) * 0.5;
                let rgb_b = rgb_a * 0.5 + (c_m + tap(1.0)) * 0.25;

                let l_b = luma(rgb_b);
                *out = if l_b < l_min || l_b > l_max { rgb_a } else { rgb_b };
            }
        });

    fb.linear_mut().copy_from_slice(scratch);
}

/// Expose, tone map (or clamp), optionally dither and encode into the BGRA8 plane.
pub fn resolve(fb: &mut Framebuffer, exposure: f32, tonemap: bool, dither: bool) {
    let width = fb.width;
    if width == 0 {
        return;
    }
    let (linear, color) = fb.planes_mut();

    color
        .par_chunks_mut(width)
        .zip(linear.par_chunks(width))
        .enumerate()
        .for_each(|(y, (dst, src))| {
            let pattern = (y & 1) << 1;
            for (x, (out, c)) in dst.iter_mut().zip(src).enumerate() {
                let exposed = *c * exposure;
                let mut mapped = if tonemap {
                    Vec3::new(aces_filmic(exposed.x), aces_filmic(exposed.y), aces_filmic(exposed.z))
                } else {
                    exposed.clamp(Vec3::ZERO, Vec3::ONE)
                };
                if dither {
                    mapped += Vec3::splat(DITHER[pattern | (x & 1)]);
                }
                *out = pack_bgra(
                    linear_to_srgb_u8(mapped.x),
                    linear_to_srgb_u8(mapped.y),
                    linear_to_srgb_u8(mapped.z),
                );
            }
        });
}
