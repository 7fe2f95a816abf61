/// Renderer facade: owns the color and depth buffers and drives the pipeline.
use super::framebuffer::{DepthBuffer, Framebuffer};
use super::pipeline::{PassContext, RenderPipeline, RenderStats};
use crate::config::RendererConfig;
use crate::scene::{FrameContext, RenderQueue};
use glam::Vec3;
use log::{debug, info};

pub struct Renderer {
    framebuffer: Framebuffer,
    depth: DepthBuffer,
    config: RendererConfig,
    pipeline: RenderPipeline,
    frame_index: u64,
}

impl Renderer {
    pub fn new(width: usize, height: usize, config: RendererConfig) -> Self {
        info!("renderer {}x{} (tile size {})", width, height, config.raster.tile_size);
        Self {
            framebuffer: Framebuffer::new(width, height),
            depth: DepthBuffer::new(width, height),
            pipeline: RenderPipeline::new(config.raster),
            config,
            frame_index: 0,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.framebuffer.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.framebuffer.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if width == self.width() && height == self.height() {
            return;
        }
        debug!("resize {}x{} -> {}x{}", self.width(), self.height(), width, height);
        self.framebuffer.resize(width, height);
        self.depth.resize(width, height);
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RendererConfig) {
        self.pipeline.set_raster_config(config.raster);
        self.config = config;
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn depth(&self) -> &DepthBuffer {
        &self.depth
    }

    /// Clear both buffers and render one frame. Image-based lighting is
    /// dropped from `frame` when the config disables it.
    pub fn render(&mut self, queue: &RenderQueue, frame: &FrameContext) -> RenderStats {
        self.framebuffer.clear_linear(Vec3::ZERO);
        self.depth.clear();

        let pass = PassContext::from(&self.config);
        let mut frame = frame.clone();
        frame.ibl_intensity = if self.config.enable_ibl {
            frame.ibl_intensity * self.config.ibl_intensity
        } else {
            0.0
        };
        let stats = self
            .pipeline
            .render(queue, &frame, &mut self.framebuffer, &mut self.depth, &pass);

        self.frame_index += 1;
        debug!(
            "frame {}: {:.2}ms, {} items, {} triangles ({} clipped), {} pixels shaded",
            self.frame_index,
            stats.total_ms(),
            stats.draw_items,
            stats.triangles_raster,
            stats.triangles_clipped,
            stats.pixels_shaded
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::framebuffer::DEPTH_FAR;
    use crate::scene::{Mesh, PbrMaterial};
    use glam::Mat4;

    #[test]
    fn empty_queue_leaves_cleared_buffers() {
        let mut renderer = Renderer::new(16, 8, RendererConfig::default());
        let frame = FrameContext::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::Z);
        let stats = renderer.render(&RenderQueue::new(), &frame);
        assert_eq!(stats.draw_items, 0);
        assert!(renderer.depth().data().iter().all(|&d| d == DEPTH_FAR));
        assert!(renderer.framebuffer().color().iter().all(|&c| c == 0xFF00_0000));
    }

    #[test]
    fn resize_reallocates_both_buffers() {
        let mut renderer = Renderer::new(16, 8, RendererConfig::default());
        renderer.resize(32, 20);
        assert_eq!(renderer.framebuffer().linear().len(), 32 * 20);
        assert_eq!(renderer.depth().data().len(), 32 * 20);
    }

    #[test]
    fn emissive_quad_fills_the_viewport() {
        let mut queue = RenderQueue::new();
        let mesh = queue.add_mesh(Mesh::quad(1.0));
        let material = queue.add_material(PbrMaterial::new(Vec3::ZERO, 0.0, 1.0).with_emissive(Vec3::splat(0.5)));
        queue.push(mesh, material, Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5)));

        let config = RendererConfig::default().with_post_process(false, false, 1.0);
        let mut renderer = Renderer::new(8, 8, config);
        // Identity camera: the quad spans NDC [-1, 1] at depth 0.5.
        let frame = FrameContext::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::new(0.0, 0.0, 5.0));
        let stats = renderer.render(&queue, &frame);
        // The shared diagonal belongs to one triangle only.
        assert_eq!(stats.pixels_shaded, 64);
        assert!(renderer.depth().data().iter().all(|&d| (d - 0.5).abs() < 1e-6));
        let lit = renderer.framebuffer().linear_at(4, 4);
        assert!((lit - Vec3::splat(0.5)).length() < 1e-5);
    }
}
