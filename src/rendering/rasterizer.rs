/// Tile-based triangle rasterizer
///
/// Triangles are clipped, fan-triangulated and set up once, binned into
/// 32×32 tiles, then every tile is scanned on its own worker. Rows are
/// walked with incremental edge functions, four pixels at a time through
/// `F32x4` with a scalar tail. Pixel centers exactly on an edge follow the
/// top-left rule, so a shared edge is drawn by one triangle only.
use super::clipper::{clip_triangle, ClipVertex};
use super::fragment::{FragmentContext, FragmentShader, FragmentVarying, PreparedLight};
use super::framebuffer::{DepthBuffer, FrameTile, Framebuffer};
use super::geometry::Triangle;
use super::simd::F32x4;
use super::tiles::{tile_max_depths, BinOrder, TileBins, TileGrid, TILE_SIZE};
use crate::perf::FUNCTION_COUNTERS;
use crate::scene::{AlphaMode, FrameContext, MaterialId, MaterialPool, PbrMaterial};
use crate::count_call;
use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;
use std::ops::{Add, AddAssign};

// Work granularity for the parallel setup and binning passes.
const SETUP_CHUNK: usize = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RasterConfig {
    /// Tile edge length in pixels.
    pub tile_size: usize,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
        }
    }
}

/// Counts from one `rasterize` call. Pixel counts are accumulated per tile
/// and summed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RasterStats {
    /// Triangles handed to the rasterizer.
    pub triangles_input: u64,
    /// Input triangles that clipping removed entirely.
    pub triangles_clipped: u64,
    /// Post-clip triangles that survived setup.
    pub triangles_raster: u64,
    /// Covered pixels that reached the depth test.
    pub pixels_tested: u64,
    /// Pixels that were shaded and written or blended.
    pub pixels_shaded: u64,
}

impl Add for RasterStats {
    type Output = Self;
    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for RasterStats {
    fn add_assign(&mut self, rhs: Self) {
        self.triangles_input += rhs.triangles_input;
        self.triangles_clipped += rhs.triangles_clipped;
        self.triangles_raster += rhs.triangles_raster;
        self.pixels_tested += rhs.pixels_tested;
        self.pixels_shaded += rhs.pixels_shaded;
    }
}

/// Abstraction over a render target that supports depth-tested pixel writes.
pub trait PixelTarget {
    /// Full framebuffer width (stride for indexing).
    fn width(&self) -> usize;
    /// Full framebuffer height.
    fn full_height(&self) -> usize;
    /// Rectangle covered by this target in framebuffer coordinates:
    /// (x0, y0, width, height).
    fn rect(&self) -> (usize, usize, usize, usize);
    /// # Safety
    /// `index .. index + 4` must lie in one row of `rect`.
    unsafe fn depth_ptr(&self, index: usize) -> *const f32;
    /// # Safety
    /// `index` must lie inside `rect`.
    unsafe fn stored_depth(&self, index: usize) -> f32;
    /// # Safety
    /// `index` must lie inside `rect`.
    unsafe fn write(&mut self, index: usize, color: Vec3, depth: f32);
    /// # Safety
    /// `index` must lie inside `rect`.
    unsafe fn blend(&mut self, index: usize, color: Vec3, alpha: f32);
}

impl<'a> PixelTarget for FrameTile<'a> {
    #[inline]
    fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn full_height(&self) -> usize {
        self.full_height
    }

    #[inline]
    fn rect(&self) -> (usize, usize, usize, usize) {
        FrameTile::rect(self)
    }

    #[inline(always)]
    unsafe fn depth_ptr(&self, index: usize) -> *const f32 {
        FrameTile::depth_ptr(self, index)
    }

    #[inline(always)]
    unsafe fn stored_depth(&self, index: usize) -> f32 {
        self.depth_at(index)
    }

    #[inline(always)]
    unsafe fn write(&mut self, index: usize, color: Vec3, depth: f32) {
        FrameTile::write(self, index, color, depth);
    }

    #[inline(always)]
    unsafe fn blend(&mut self, index: usize, color: Vec3, alpha: f32) {
        FrameTile::blend(self, index, color, alpha);
    }
}

/// `a·x + b·y + c`, positive inside for counter-clockwise (NDC) triangles.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EdgeCoefficients {
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

impl EdgeCoefficients {
    /// Edge from `p` to `q`; evaluates to `edge_function(p, q, point)`.
    #[inline]
    pub fn new(p: Vec2, q: Vec2) -> Self {
        Self {
            a: q.y - p.y,
            b: p.x - q.x,
            c: q.x * p.y - p.x * q.y,
        }
    }

    #[inline(always)]
    pub fn eval(&self, x: f32, y: f32) -> f32 {
        self.a * x + self.b * y + self.c
    }

    /// Left or top edge in screen space: pixel centers lying exactly on it
    /// belong to this triangle.
    #[inline(always)]
    pub fn owns_boundary(&self) -> bool {
        self.a > 0.0 || (self.a == 0.0 && self.b > 0.0)
    }

    #[inline(always)]
    fn covers(&self, w: f32) -> bool {
        w > 0.0 || (w == 0.0 && self.owns_boundary())
    }

    #[inline(always)]
    fn covers4(&self, w: F32x4, zero: F32x4) -> u32 {
        if self.owns_boundary() {
            w.ge_mask(zero)
        } else {
            w.gt_mask(zero)
        }
    }
}

/// Edge function for barycentric coordinates
/// Returns 2x the signed area of the triangle
#[inline]
pub fn edge_function(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

/// Convert NDC coordinates to screen space
#[inline]
pub fn ndc_to_screen(ndc: Vec2, width: f32, height: f32) -> Vec2 {
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * width,
        (1.0 - ndc.y) * 0.5 * height, // Flip Y for screen coordinates
    )
}

/// Undo texture-coordinate wrap-around across the 0/1 boundary.
/// Each axis is handled on its own: when corners sit both below 0.25 and
/// above 0.75, the smaller group is moved by one (ties move the low group up).
pub fn fix_uv_seam(uvs: &mut [Vec2; 3]) {
    for axis in 0..2 {
        let low = uvs.map(|uv| uv[axis] < 0.25);
        let high = uvs.map(|uv| uv[axis] > 0.75);
        let low_count = low.iter().filter(|&&b| b).count();
        let high_count = high.iter().filter(|&&b| b).count();
        if low_count == 0 || high_count == 0 {
            continue;
        }
        for (i, uv) in uvs.iter_mut().enumerate() {
            if low_count <= high_count {
                if low[i] {
                    uv[axis] += 1.0;
                }
            } else if high[i] {
                uv[axis] -= 1.0;
            }
        }
    }
}

/// Screen-space triangle ready for scanning. Attributes are pre-divided by
/// clip w so they interpolate linearly in screen space.
#[derive(Copy, Clone, Debug)]
pub struct RasterTriangle {
    pub screen: [Vec2; 3],
    /// NDC depth per corner
    pub z: [f32; 3],
    pub inv_w: [f32; 3],
    pub normal_w: [Vec3; 3],
    pub world_w: [Vec3; 3],
    pub uv_w: [Vec2; 3],
    /// Zero unless the material has a normal map.
    pub tangent_w: [Vec4; 3],
    /// Inclusive pixel bounds, clamped to the viewport
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub area: f32,
    pub inv_area: f32,
    /// Edge opposite each corner: edges[i] weights corner i.
    pub edges: [EdgeCoefficients; 3],
    pub z_min: f32,
    pub material: MaterialId,
}

impl RasterTriangle {
    /// Project three clipped corners. `None` for triangles that cannot
    /// produce a fragment: non-positive w, non-finite input, zero area,
    /// back faces of single-sided materials, or no covered pixel center.
    pub fn setup(
        corners: &[ClipVertex; 3],
        material: MaterialId,
        double_sided: bool,
        needs_tangent: bool,
        width: usize,
        height: usize,
    ) -> Option<Self> {
        let mut v = *corners;
        if v.iter().any(|c| c.clip.w <= 0.0 || !c.clip.is_finite()) {
            return None;
        }

        let (fw, fh) = (width as f32, height as f32);
        let project = |c: &ClipVertex| {
            let ndc = c.clip.truncate() / c.clip.w;
            (ndc_to_screen(ndc.truncate(), fw, fh), ndc.z)
        };
        let mut s = [project(&v[0]), project(&v[1]), project(&v[2])];

        let mut area = edge_function(s[0].0, s[1].0, s[2].0);
        if area == 0.0 || !area.is_finite() {
            return None;
        }
        if area < 0.0 {
            if !double_sided {
                count_call!(FUNCTION_COUNTERS.triangles_backface_culled);
                return None;
            }
            // Re-wind so the scan can assume positive edge values inside.
            v.swap(1, 2);
            s.swap(1, 2);
            area = -area;
        }

        let screen = [s[0].0, s[1].0, s[2].0];
        let z = [s[0].1, s[1].1, s[2].1];

        let min_sx = screen[0].x.min(screen[1].x).min(screen[2].x);
        let max_sx = screen[0].x.max(screen[1].x).max(screen[2].x);
        let min_sy = screen[0].y.min(screen[1].y).min(screen[2].y);
        let max_sy = screen[0].y.max(screen[1].y).max(screen[2].y);

        // Pixel centers sit at +0.5.
        let min_x = ((min_sx - 0.5).ceil() as i32).max(0);
        let max_x = ((max_sx - 0.5).floor() as i32).min(width as i32 - 1);
        let min_y = ((min_sy - 0.5).ceil() as i32).max(0);
        let max_y = ((max_sy - 0.5).floor() as i32).min(height as i32 - 1);
        if min_x > max_x || min_y > max_y {
            return None;
        }

        let inv_w = [1.0 / v[0].clip.w, 1.0 / v[1].clip.w, 1.0 / v[2].clip.w];

        let mut uvs = [v[0].uv, v[1].uv, v[2].uv];
        fix_uv_seam(&mut uvs);

        let tangent_w = if needs_tangent {
            [0, 1, 2].map(|i| v[i].tangent * inv_w[i])
        } else {
            [Vec4::ZERO; 3]
        };

        Some(Self {
            screen,
            z,
            inv_w,
            normal_w: [0, 1, 2].map(|i| v[i].normal * inv_w[i]),
            world_w: [0, 1, 2].map(|i| v[i].world * inv_w[i]),
            uv_w: [0, 1, 2].map(|i| uvs[i] * inv_w[i]),
            tangent_w,
            min_x,
            min_y,
            max_x,
            max_y,
            area,
            inv_area: 1.0 / area,
            edges: [
                EdgeCoefficients::new(screen[1], screen[2]),
                EdgeCoefficients::new(screen[2], screen[0]),
                EdgeCoefficients::new(screen[0], screen[1]),
            ],
            z_min: z[0].min(z[1]).min(z[2]),
            material,
        })
    }

    /// Perspective-correct varyings at linear barycentrics `b` and interpolated `1/w`.
    #[inline(always)]
    pub fn varying(&self, b: [f32; 3], inv_w: f32) -> FragmentVarying {
        let w = 1.0 / inv_w;
        let tangent = if self.tangent_w[0] == Vec4::ZERO
            && self.tangent_w[1] == Vec4::ZERO
            && self.tangent_w[2] == Vec4::ZERO
        {
            Vec4::ZERO
        } else {
            (self.tangent_w[0] * b[0] + self.tangent_w[1] * b[1] + self.tangent_w[2] * b[2]) * w
        };
        FragmentVarying {
            normal: (self.normal_w[0] * b[0] + self.normal_w[1] * b[1] + self.normal_w[2] * b[2]) * w,
            world_position: (self.world_w[0] * b[0] + self.world_w[1] * b[1] + self.world_w[2] * b[2])
                * w,
            uv: (self.uv_w[0] * b[0] + self.uv_w[1] * b[1] + self.uv_w[2] * b[2]) * w,
            tangent,
        }
    }
}

/// Per-frame shading inputs shared by every tile.
struct ShadingInputs<'a> {
    frame: &'a FrameContext<'a>,
    materials: &'a MaterialPool,
    lights: &'a [PreparedLight],
}

impl<'a> ShadingInputs<'a> {
    #[inline]
    fn context(&self, material: &'a PbrMaterial) -> FragmentContext<'a> {
        let environment = self.frame.loaded_environment();
        FragmentContext {
            camera_position: self.frame.camera_position,
            material,
            lights: self.lights,
            ambient: self.frame.ambient,
            images: self.frame.images,
            samplers: self.frame.samplers,
            environment,
            ibl_intensity: self.frame.ibl_intensity,
        }
    }
}

pub struct Rasterizer {
    pub config: RasterConfig,
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(RasterConfig::default())
    }
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    /// Clip, fan-triangulate and set up every triangle, preserving input order.
    pub fn prepare(
        &self,
        triangles: &[Triangle],
        materials: &MaterialPool,
        width: usize,
        height: usize,
    ) -> (Vec<RasterTriangle>, RasterStats) {
        let parts: Vec<(Vec<RasterTriangle>, RasterStats)> = triangles
            .par_chunks(SETUP_CHUNK)
            .map(|chunk| {
                let mut out = Vec::with_capacity(chunk.len());
                let mut stats = RasterStats::default();
                for tri in chunk {
                    let Some(material) = materials.get(tri.material) else {
                        continue;
                    };
                    let polygon = clip_triangle(&tri.vertices);
                    if polygon.is_empty() {
                        count_call!(FUNCTION_COUNTERS.triangles_clipped_away);
                        stats.triangles_clipped += 1;
                        continue;
                    }
                    for corners in polygon.fan() {
                        if let Some(rt) = RasterTriangle::setup(
                            &corners,
                            tri.material,
                            material.double_sided,
                            material.normal_texture.is_some(),
                            width,
                            height,
                        ) {
                            out.push(rt);
                            stats.triangles_raster += 1;
                        }
                    }
                }
                (out, stats)
            })
            .collect();

        let total = parts.iter().map(|(tris, _)| tris.len()).sum();
        let mut raster = Vec::with_capacity(total);
        let mut stats = RasterStats {
            triangles_input: triangles.len() as u64,
            ..Default::default()
        };
        for (tris, part_stats) in parts {
            raster.extend(tris);
            stats += part_stats;
        }
        (raster, stats)
    }

    /// Bin prepared triangles into tiles, in order.
    pub fn bin(&self, triangles: &[RasterTriangle], grid: TileGrid, order: BinOrder) -> TileBins {
        let parts: Vec<TileBins> = triangles
            .par_chunks(SETUP_CHUNK)
            .enumerate()
            .map(|(chunk_index, chunk)| {
                let mut bins = TileBins::new(grid);
                let base = chunk_index * SETUP_CHUNK;
                for (i, rt) in chunk.iter().enumerate() {
                    bins.add((base + i) as u32, rt.min_x, rt.min_y, rt.max_x, rt.max_y);
                }
                bins
            })
            .collect();

        let mut bins = TileBins::merge_all(grid, &parts);
        if order == BinOrder::FrontToBack {
            let z_min: Vec<f32> = triangles.iter().map(|rt| rt.z_min).collect();
            bins.sort_front_to_back(&z_min);
        }
        bins
    }

    /// Rasterize a batch of triangles into the framebuffer.
    pub fn rasterize(
        &self,
        triangles: &[Triangle],
        materials: &MaterialPool,
        frame: &FrameContext,
        fb: &mut Framebuffer,
        depth: &mut DepthBuffer,
        order: BinOrder,
    ) -> RasterStats {
        let (width, height) = (fb.width, fb.height);
        if triangles.is_empty() || width == 0 || height == 0 {
            return RasterStats {
                triangles_input: triangles.len() as u64,
                ..Default::default()
            };
        }

        let (raster, mut stats) = self.prepare(triangles, materials, width, height);
        if raster.is_empty() {
            return stats;
        }

        let tile_size = self.config.tile_size.max(1);
        let grid = TileGrid::new(width, height, tile_size);
        let bins = self.bin(&raster, grid, order);
        let max_depths = tile_max_depths(&grid, depth);

        let lights: Vec<PreparedLight> = frame.lights.iter().map(PreparedLight::from).collect();
        let inputs = ShadingInputs {
            frame,
            materials,
            lights: &lights,
        };

        let tiles = fb.split_into_tiles(depth, tile_size, tile_size);
        if tiles.len() != grid.tile_count() {
            return stats;
        }

        stats += tiles
            .into_par_iter()
            .enumerate()
            .map(|(index, mut tile)| {
                rasterize_tile(&mut tile, bins.bin(index), &raster, max_depths[index], &inputs)
            })
            .reduce(RasterStats::default, |a, b| a + b);

        stats
    }
}

fn rasterize_tile<T: PixelTarget>(
    target: &mut T,
    bin: &[u32],
    triangles: &[RasterTriangle],
    tile_max_depth: f32,
    inputs: &ShadingInputs,
) -> RasterStats {
    let mut stats = RasterStats::default();
    for &index in bin {
        let rt = &triangles[index as usize];
        count_call!(FUNCTION_COUNTERS.tile_triangle_visits);
        if rt.z_min > tile_max_depth {
            count_call!(FUNCTION_COUNTERS.tile_depth_culled);
            continue;
        }
        let Some(material) = inputs.materials.get(rt.material) else {
            continue;
        };
        let ctx = inputs.context(material);
        scan_triangle(target, rt, &ctx, &mut stats);
    }
    stats
}

/// Scan the part of `rt` inside the target's rectangle.
pub fn scan_triangle<T: PixelTarget>(
    target: &mut T,
    rt: &RasterTriangle,
    ctx: &FragmentContext,
    stats: &mut RasterStats,
) {
    let (tx0, ty0, tw, th) = target.rect();
    if tw == 0 || th == 0 {
        return;
    }
    let x_start = rt.min_x.max(tx0 as i32);
    let x_end = rt.max_x.min((tx0 + tw - 1) as i32);
    let y_start = rt.min_y.max(ty0 as i32);
    let y_end = rt.max_y.min((ty0 + th - 1) as i32);
    if x_start > x_end || y_start > y_end {
        return;
    }

    let width = target.width();
    let [e0, e1, e2] = rt.edges;
    let [z0, z1, z2] = rt.z;
    let [iw0, iw1, iw2] = rt.inv_w;
    let inv_area = rt.inv_area;

    let zero = F32x4::splat(0.0);
    let ramp = F32x4::ramp();
    let inv_area_v = F32x4::splat(inv_area);
    let (z0v, z1v, z2v) = (F32x4::splat(z0), F32x4::splat(z1), F32x4::splat(z2));
    let (iw0v, iw1v, iw2v) = (F32x4::splat(iw0), F32x4::splat(iw1), F32x4::splat(iw2));
    let (a0v, a1v, a2v) = (F32x4::splat(e0.a), F32x4::splat(e1.a), F32x4::splat(e2.a));

    let start_x = x_start as f32 + 0.5;

    for y in y_start..=y_end {
        let py = y as f32 + 0.5;
        let row_base = y as usize * width;

        // Edge values at the first pixel center of the row.
        let mut w0 = e0.eval(start_x, py);
        let mut w1 = e1.eval(start_x, py);
        let mut w2 = e2.eval(start_x, py);

        let mut x = x_start;
        while x + 3 <= x_end {
            count_call!(FUNCTION_COUNTERS.simd_batches);
            let w0v = F32x4::splat(w0) + ramp * a0v;
            let w1v = F32x4::splat(w1) + ramp * a1v;
            let w2v = F32x4::splat(w2) + ramp * a2v;

            let covered = e0.covers4(w0v, zero) & e1.covers4(w1v, zero) & e2.covers4(w2v, zero);
            if covered != 0 {
                let b0 = w0v * inv_area_v;
                let b1 = w1v * inv_area_v;
                let b2 = w2v * inv_area_v;
                let depth = b0 * z0v + b1 * z1v + b2 * z2v;
                let inv_w = b0 * iw0v + b1 * iw1v + b2 * iw2v;

                let index = row_base + x as usize;
                // Safety: x..x+4 lies inside this target's row span.
                let stored = unsafe { F32x4::load(target.depth_ptr(index)) };
                let pass = covered
                    & depth.ge_mask(zero)
                    & depth.lt_mask(stored)
                    & inv_w.gt_mask(zero);

                stats.pixels_tested += covered.count_ones() as u64;

                if pass != 0 {
                    let (b0, b1, b2) = (b0.to_array(), b1.to_array(), b2.to_array());
                    let depth = depth.to_array();
                    let inv_w = inv_w.to_array();
                    for lane in 0..4 {
                        if pass & (1 << lane) != 0 {
                            shade_pixel(
                                target,
                                rt,
                                ctx,
                                index + lane,
                                [b0[lane], b1[lane], b2[lane]],
                                depth[lane],
                                inv_w[lane],
                                stats,
                            );
                        }
                    }
                }
            }

            w0 += e0.a * 4.0;
            w1 += e1.a * 4.0;
            w2 += e2.a * 4.0;
            x += 4;
        }

        // Scalar tail for remaining pixels on this row.
        while x <= x_end {
            if e0.covers(w0) && e1.covers(w1) && e2.covers(w2) {
                count_call!(FUNCTION_COUNTERS.scalar_pixels);
                stats.pixels_tested += 1;

                let b = [w0 * inv_area, w1 * inv_area, w2 * inv_area];
                let depth = b[0] * z0 + b[1] * z1 + b[2] * z2;
                let inv_w = b[0] * iw0 + b[1] * iw1 + b[2] * iw2;
                let index = row_base + x as usize;

                // Safety: (x, y) lies inside this target's rectangle.
                let stored = unsafe { target.stored_depth(index) };
                if depth >= 0.0 && depth < stored && inv_w > 0.0 {
                    shade_pixel(target, rt, ctx, index, b, depth, inv_w, stats);
                }
            }

            w0 += e0.a;
            w1 += e1.a;
            w2 += e2.a;
            x += 1;
        }
    }
}

/// Alpha handling, shading and the final write for one depth-passing pixel.
#[inline]
#[allow(clippy::too_many_arguments)]
fn shade_pixel<T: PixelTarget>(
    target: &mut T,
    rt: &RasterTriangle,
    ctx: &FragmentContext,
    index: usize,
    b: [f32; 3],
    depth: f32,
    inv_w: f32,
    stats: &mut RasterStats,
) {
    let varying = rt.varying(b, inv_w);
    let material = ctx.material;
    let base = FragmentShader::base_color(ctx, varying.uv);

    if material.alpha_mode == AlphaMode::Mask && base.w < material.alpha_cutoff {
        count_call!(FUNCTION_COUNTERS.alpha_discards);
        return;
    }

    let color = FragmentShader::shade_surface(ctx, &varying, base);
    // Safety: callers only pass indices inside the target's rectangle.
    unsafe {
        match material.alpha_mode {
            AlphaMode::Blend => {
                count_call!(FUNCTION_COUNTERS.blended_pixels);
                target.blend(index, color, base.w.clamp(0.0, 1.0));
            }
            AlphaMode::Opaque | AlphaMode::Mask => target.write(index, color, depth),
        }
    }
    stats.pixels_shaded += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::framebuffer::DEPTH_FAR;
    use crate::scene::PbrMaterial;
    use glam::Mat4;

    struct TestTarget {
        width: usize,
        height: usize,
        color: Vec<Vec3>,
        depth: Vec<f32>,
        pixels_written: usize,
    }

    impl TestTarget {
        fn new(width: usize, height: usize) -> Self {
            let len = width * height;
            Self {
                width,
                height,
                color: vec![Vec3::ZERO; len],
                depth: vec![DEPTH_FAR; len],
                pixels_written: 0,
            }
        }
    }

    impl PixelTarget for TestTarget {
        fn width(&self) -> usize {
            self.width
        }

        fn full_height(&self) -> usize {
            self.height
        }

        fn rect(&self) -> (usize, usize, usize, usize) {
            (0, 0, self.width, self.height)
        }

        unsafe fn depth_ptr(&self, index: usize) -> *const f32 {
            self.depth.as_ptr().add(index)
        }

        unsafe fn stored_depth(&self, index: usize) -> f32 {
            self.depth[index]
        }

        unsafe fn write(&mut self, index: usize, color: Vec3, depth: f32) {
            self.color[index] = color;
            self.depth[index] = depth;
            self.pixels_written += 1;
        }

        unsafe fn blend(&mut self, index: usize, color: Vec3, alpha: f32) {
            self.color[index] = color * alpha + self.color[index] * (1.0 - alpha);
            self.pixels_written += 1;
        }
    }

    fn corner(x: f32, y: f32, z: f32, w: f32) -> ClipVertex {
        ClipVertex {
            clip: Vec4::new(x * w, y * w, z * w, w),
            normal: Vec3::Z,
            ..Default::default()
        }
    }

    fn emissive_context(material: &PbrMaterial) -> FragmentContext<'_> {
        FragmentContext {
            camera_position: Vec3::new(0.0, 0.0, 5.0),
            material,
            lights: &[],
            ambient: Vec3::ZERO,
            images: &[],
            samplers: &[],
            environment: None,
            ibl_intensity: 0.0,
        }
    }

    #[test]
    fn edge_coefficients_match_edge_function() {
        let (p, q, r) = (Vec2::new(1.0, 2.0), Vec2::new(7.0, 3.0), Vec2::new(4.0, -5.0));
        let e = EdgeCoefficients::new(p, q);
        assert!((e.eval(r.x, r.y) - edge_function(p, q, r)).abs() < 1e-4);
    }

    #[test]
    fn seam_fix_moves_minority_side() {
        let mut uvs = [Vec2::new(0.95, 0.5), Vec2::new(0.9, 0.5), Vec2::new(0.05, 0.5)];
        fix_uv_seam(&mut uvs);
        assert!((uvs[2].x - 1.05).abs() < 1e-6);

        let mut uvs = [Vec2::new(0.95, 0.5), Vec2::new(0.1, 0.5), Vec2::new(0.05, 0.5)];
        fix_uv_seam(&mut uvs);
        assert!((uvs[0].x + 0.05).abs() < 1e-6);

        let mut uvs = [Vec2::new(0.4, 0.5), Vec2::new(0.5, 0.6), Vec2::new(0.6, 0.5)];
        let before = uvs;
        fix_uv_seam(&mut uvs);
        assert_eq!(uvs, before);
    }

    #[test]
    fn back_face_is_culled_unless_double_sided() {
        // Clockwise in NDC
        let cw = [
            corner(-0.5, -0.5, 0.5, 1.0),
            corner(0.0, 0.5, 0.5, 1.0),
            corner(0.5, -0.5, 0.5, 1.0),
        ];
        assert!(RasterTriangle::setup(&cw, MaterialId(0), false, false, 16, 16).is_none());
        let rt = RasterTriangle::setup(&cw, MaterialId(0), true, false, 16, 16).unwrap();
        assert!(rt.area > 0.0);
    }

    #[test]
    fn sliver_between_pixel_centers_is_dropped() {
        let tri = [
            corner(-0.99, -0.99, 0.5, 1.0),
            corner(-0.98, -0.99, 0.5, 1.0),
            corner(-0.985, -0.98, 0.5, 1.0),
        ];
        assert!(RasterTriangle::setup(&tri, MaterialId(0), false, false, 16, 16).is_none());
    }

    #[test]
    fn full_screen_triangle_covers_every_pixel() {
        let material = PbrMaterial::new(Vec3::ZERO, 0.0, 1.0).with_emissive(Vec3::ONE);
        let ctx = emissive_context(&material);
        let tri = [
            corner(-1.0, -1.0, 0.5, 1.0),
            corner(3.0, -1.0, 0.5, 1.0),
            corner(-1.0, 3.0, 0.5, 1.0),
        ];
        let rt = RasterTriangle::setup(&tri, MaterialId(0), false, false, 13, 7).unwrap();
        let mut target = TestTarget::new(13, 7);
        let mut stats = RasterStats::default();
        scan_triangle(&mut target, &rt, &ctx, &mut stats);
        assert_eq!(target.pixels_written, 13 * 7);
        assert_eq!(stats.pixels_shaded, 13 * 7);
        assert!(target.depth.iter().all(|&d| (d - 0.5).abs() < 1e-6));
    }

    #[test]
    fn top_left_rule_matches_screen_orientation() {
        let (tl, tr, bl, br) = (Vec2::new(0.0, 0.0), Vec2::new(8.0, 0.0), Vec2::new(0.0, 8.0), Vec2::new(8.0, 8.0));
        // Positive-inside screen triangle tl -> bl -> br walks down its left side.
        assert!(EdgeCoefficients::new(tl, bl).owns_boundary());
        assert!(!EdgeCoefficients::new(bl, br).owns_boundary());
        // tl -> br -> tr: the top edge runs right to left.
        assert!(EdgeCoefficients::new(tr, tl).owns_boundary());
        assert!(!EdgeCoefficients::new(br, tr).owns_boundary());
        // Either side of a shared edge, exactly one owner.
        assert_ne!(
            EdgeCoefficients::new(tl, br).owns_boundary(),
            EdgeCoefficients::new(br, tl).owns_boundary()
        );
    }

    #[test]
    fn shared_edges_are_drawn_once() {
        let material = PbrMaterial::new(Vec3::ZERO, 0.0, 1.0)
            .with_emissive(Vec3::ONE)
            .with_alpha(AlphaMode::Blend, 0.5);
        let ctx = emissive_context(&material);
        // On a 9x9 target pixel centers sit exactly on the quad diagonal and
        // on both splits through the origin.
        let quads = [
            [(-1.0, -1.0), (1.0, -1.0), (1.0, 0.0), (-1.0, 0.0)],
            [(-1.0, 0.0), (1.0, 0.0), (1.0, 1.0), (-1.0, 1.0)],
            [(-1.0, -1.0), (0.0, -1.0), (0.0, 1.0), (-1.0, 1.0)],
            [(0.0, -1.0), (1.0, -1.0), (1.0, 1.0), (0.0, 1.0)],
            [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)],
        ];
        let mut target = TestTarget::new(9, 9);
        let mut stats = RasterStats::default();
        for q in &quads {
            let v = q.map(|(x, y)| corner(x, y, 0.5, 1.0));
            for tri in [[v[0], v[1], v[2]], [v[0], v[2], v[3]]] {
                let rt = RasterTriangle::setup(&tri, MaterialId(0), false, false, 9, 9).unwrap();
                scan_triangle(&mut target, &rt, &ctx, &mut stats);
            }
        }
        // Three coverings: top and bottom halves, left and right halves, whole quad.
        assert_eq!(target.pixels_written, 3 * 9 * 9);
        assert!(target.color.iter().all(|&c| (c - Vec3::splat(0.875)).length() < 1e-6));
    }

    #[test]
    fn nearer_triangle_wins_regardless_of_order() {
        let material = PbrMaterial::new(Vec3::ZERO, 0.0, 1.0).with_emissive(Vec3::ONE);
        let ctx = emissive_context(&material);
        let make = |z: f32| {
            let tri = [
                corner(-1.0, -1.0, z, 1.0),
                corner(3.0, -1.0, z, 1.0),
                corner(-1.0, 3.0, z, 1.0),
            ];
            RasterTriangle::setup(&tri, MaterialId(0), false, false, 8, 8).unwrap()
        };
        let (near, far) = (make(0.25), make(0.75));
        for order in [[&near, &far], [&far, &near]] {
            let mut target = TestTarget::new(8, 8);
            let mut stats = RasterStats::default();
            for rt in order {
                scan_triangle(&mut target, rt, &ctx, &mut stats);
            }
            assert!(target.depth.iter().all(|&d| (d - 0.25).abs() < 1e-6));
        }
    }

    #[test]
    fn rasterize_reports_stats() {
        let mut queue = crate::scene::RenderQueue::new();
        let material = queue.add_material(PbrMaterial::new(Vec3::ONE, 0.0, 1.0));
        let corners = [
            corner(-1.0, -1.0, 0.5, 1.0),
            corner(1.0, -1.0, 0.5, 1.0),
            corner(1.0, 1.0, 0.5, 1.0),
        ];
        let behind = [
            corner(-1.0, -1.0, -0.5, 1.0),
            corner(1.0, -1.0, -0.5, 1.0),
            corner(1.0, 1.0, -0.5, 1.0),
        ];
        let triangles = [
            Triangle {
                vertices: corners,
                material,
            },
            Triangle {
                vertices: behind,
                material,
            },
        ];

        let frame = FrameContext::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::new(0.0, 0.0, 5.0));
        let mut fb = Framebuffer::new(40, 40);
        let mut depth = DepthBuffer::new(40, 40);
        let stats = Rasterizer::default().rasterize(
            &triangles,
            &queue.materials,
            &frame,
            &mut fb,
            &mut depth,
            BinOrder::FrontToBack,
        );
        assert_eq!(stats.triangles_input, 2);
        assert_eq!(stats.triangles_clipped, 1);
        assert_eq!(stats.triangles_raster, 1);
        // Half the viewport plus the diagonal, which is a left edge.
        assert_eq!(stats.pixels_shaded, 40 * 41 / 2);
        assert_eq!(stats.pixels_tested, stats.pixels_shaded);
    }
}
