/// Frame orchestration
///
/// Stage order per frame:
/// 1. Sort draw items (opaque, masked, then translucent back-to-front)
/// 2. Build clip-space triangles in parallel, split by pass
/// 3. Opaque pass: front-to-back bins, depth writes
/// 4. Sky fill wherever depth was left at the far plane
/// 5. Blend pass: submission order, no depth writes
/// 6. FXAA and resolve to BGRA8
use super::environment::EnvironmentMap;
use super::framebuffer::{DepthBuffer, Framebuffer, DEPTH_FAR};
use super::geometry::{GeometryProcessor, Triangle};
use super::postprocess::{apply_fxaa, init_color_tables, resolve};
use super::rasterizer::{RasterConfig, RasterStats, Rasterizer};
use super::tiles::BinOrder;
use crate::config::RendererConfig;
use crate::perf::PerfTimer;
use crate::scene::{AlphaMode, DrawItem, FrameContext, MaterialPool, RenderQueue};
use glam::{Mat4, Vec3, Vec4};
use log::{debug, warn};
use rayon::prelude::*;
use std::cmp::Ordering;

// Pixels whose depth is this close to the far plane show the sky.
const SKY_DEPTH: f32 = DEPTH_FAR - 1e-6;

/// Post-processing switches for one frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PassContext {
    pub enable_fxaa: bool,
    pub enable_tonemap: bool,
    pub exposure: f32,
    pub dither: bool,
}

impl Default for PassContext {
    fn default() -> Self {
        Self {
            enable_fxaa: true,
            enable_tonemap: true,
            exposure: 1.0,
            dither: false,
        }
    }
}

impl From<&RendererConfig> for PassContext {
    fn from(config: &RendererConfig) -> Self {
        Self {
            enable_fxaa: config.enable_fxaa,
            enable_tonemap: config.enable_tonemap,
            exposure: config.exposure,
            dither: config.dither,
        }
    }
}

/// Timings (milliseconds) and counts for one rendered frame.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RenderStats {
    pub build_ms: f64,
    pub raster_ms: f64,
    pub sky_ms: f64,
    pub post_ms: f64,
    pub draw_items: usize,
    pub triangles_built: u64,
    pub triangles_clipped: u64,
    pub triangles_raster: u64,
    pub pixels_tested: u64,
    pub pixels_shaded: u64,
}

impl RenderStats {
    #[inline]
    pub fn total_ms(&self) -> f64 {
        self.build_ms + self.raster_ms + self.sky_ms + self.post_ms
    }

    fn add_raster(&mut self, raster: &RasterStats) {
        self.triangles_clipped += raster.triangles_clipped;
        self.triangles_raster += raster.triangles_raster;
        self.pixels_tested += raster.pixels_tested;
        self.pixels_shaded += raster.pixels_shaded;
    }
}

pub struct RenderPipeline {
    rasterizer: Rasterizer,
    fxaa_scratch: Vec<Vec3>,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(RasterConfig::default())
    }
}

impl RenderPipeline {
    /// Forces the color lookup tables so the first frame does not pay for them.
    pub fn new(config: RasterConfig) -> Self {
        init_color_tables();
        Self {
            rasterizer: Rasterizer::new(config),
            fxaa_scratch: Vec::new(),
        }
    }

    pub fn set_raster_config(&mut self, config: RasterConfig) {
        self.rasterizer.config = config;
    }

    /// Render `queue` into already-cleared color and depth buffers.
    pub fn render(
        &mut self,
        queue: &RenderQueue,
        frame: &FrameContext,
        fb: &mut Framebuffer,
        depth: &mut DepthBuffer,
        pass: &PassContext,
    ) -> RenderStats {
        let mut stats = RenderStats {
            draw_items: queue.items.len(),
            ..Default::default()
        };

        let timer = PerfTimer::new("geometry");
        let items = sort_draw_items(&queue.items, &queue.materials, frame.camera_position);
        let (opaque, blend) = build_triangles(queue, &items, frame.view_projection());
        stats.build_ms = timer.elapsed_ms();
        stats.triangles_built = (opaque.len() + blend.len()) as u64;
        drop(timer);

        let timer = PerfTimer::new("opaque pass");
        let raster = self.rasterizer.rasterize(
            &opaque,
            &queue.materials,
            frame,
            fb,
            depth,
            BinOrder::FrontToBack,
        );
        stats.add_raster(&raster);
        stats.raster_ms += timer.elapsed_ms();
        drop(timer);

        if let Some(env) = frame.loaded_environment() {
            let timer = PerfTimer::new("sky");
            fill_sky(fb, depth, env, frame.inverse_view_projection());
            stats.sky_ms = timer.elapsed_ms();
        }

        if !blend.is_empty() {
            let timer = PerfTimer::new("blend pass");
            let raster = self.rasterizer.rasterize(
                &blend,
                &queue.materials,
                frame,
                fb,
                depth,
                BinOrder::Submission,
            );
            stats.add_raster(&raster);
            stats.raster_ms += timer.elapsed_ms();
        }

        let timer = PerfTimer::new("post");
        if pass.enable_fxaa {
            apply_fxaa(fb, &mut self.fxaa_scratch);
        }
        resolve(fb, pass.exposure, pass.enable_tonemap, pass.dither);
        stats.post_ms = timer.elapsed_ms();

        debug!(
            "pipeline: {} items, {} opaque + {} blend triangles, build {:.2}ms raster {:.2}ms sky {:.2}ms post {:.2}ms",
            stats.draw_items,
            opaque.len(),
            blend.len(),
            stats.build_ms,
            stats.raster_ms,
            stats.sky_ms,
            stats.post_ms
        );

        stats
    }
}

#[inline]
fn alpha_rank(mode: AlphaMode) -> u8 {
    match mode {
        AlphaMode::Opaque => 0,
        AlphaMode::Mask => 1,
        AlphaMode::Blend => 2,
    }
}

/// Stable draw order: opaque, then masked, then translucent farthest first.
/// Ties fall back to material then mesh so state changes stay grouped.
/// Items with an unknown material sort with the opaque group.
pub fn sort_draw_items(items: &[DrawItem], materials: &MaterialPool, camera_position: Vec3) -> Vec<DrawItem> {
    let mode = |item: &DrawItem| {
        materials
            .get(item.material)
            .map_or(AlphaMode::Opaque, |m| m.alpha_mode)
    };

    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| {
        let (mode_a, mode_b) = (mode(a), mode(b));
        alpha_rank(mode_a)
            .cmp(&alpha_rank(mode_b))
            .then_with(|| {
                if mode_a == AlphaMode::Blend && mode_b == AlphaMode::Blend {
                    let da = a.position().distance_squared(camera_position);
                    let db = b.position().distance_squared(camera_position);
                    db.total_cmp(&da)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.material.cmp(&b.material))
            .then_with(|| a.mesh.cmp(&b.mesh))
    });
    sorted
}

/// Build every item's triangles in parallel. Opaque and masked items go to
/// the first list, blended items to the second; both keep item order.
fn build_triangles(queue: &RenderQueue, items: &[DrawItem], view_proj: Mat4) -> (Vec<Triangle>, Vec<Triangle>) {
    items
        .par_iter()
        .fold(
            || (GeometryProcessor::new(), Vec::new(), Vec::new()),
            |(mut geometry, mut opaque, mut blend), item| {
                let (Some(mesh), Some(material)) =
                    (queue.meshes.get(item.mesh), queue.materials.get(item.material))
                else {
                    warn!(
                        "skipping draw item with mesh {:?} / material {:?}: unknown id",
                        item.mesh, item.material
                    );
                    return (geometry, opaque, blend);
                };
                let out = if material.alpha_mode == AlphaMode::Blend {
                    &mut blend
                } else {
                    &mut opaque
                };
                geometry.build(mesh, item, view_proj, out);
                (geometry, opaque, blend)
            },
        )
        .map(|(_, opaque, blend)| (opaque, blend))
        .reduce(
            || (Vec::new(), Vec::new()),
            |(mut opaque, mut blend), (o, b)| {
                opaque.extend(o);
                blend.extend(b);
                (opaque, blend)
            },
        )
}

/// World-space view ray through the center of pixel (x, y).
#[inline]
pub fn pixel_ray_direction(inv_view_proj: Mat4, x: usize, y: usize, width: usize, height: usize) -> Vec3 {
    let ndc_x = (x as f32 + 0.5) / width as f32 * 2.0 - 1.0;
    let ndc_y = 1.0 - (y as f32 + 0.5) / height as f32 * 2.0;
    let near = inv_view_proj * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let far = inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
    (far.truncate() / far.w - near.truncate() / near.w).normalize_or_zero()
}

/// Replace every pixel still at the far plane with the environment seen
/// along its view ray. Depth is left untouched.
pub fn fill_sky(fb: &mut Framebuffer, depth: &DepthBuffer, env: &EnvironmentMap, inv_view_proj: Mat4) {
    let (width, height) = (fb.width, fb.height);
    if width == 0 || height == 0 {
        return;
    }
    let stripes = rayon::current_num_threads() * 4;
    fb.split_into_stripes(depth, stripes)
        .into_par_iter()
        .for_each(|mut slice| {
            for y_local in 0..slice.height {
                let y = slice.y0 + y_local;
                let (color, depth) = slice.row_mut(y_local);
                for (x, (c, &d)) in color.iter_mut().zip(depth).enumerate() {
                    if d >= SKY_DEPTH {
                        *c = env.sample_direction(pixel_ray_direction(inv_view_proj, x, y, width, height));
                    }
                }
            }
        });
}
