/// Renderer configuration
/// Post-processing switches, lighting defaults and rasterizer tuning in one place.
use crate::rendering::rasterizer::RasterConfig;
use crate::scene::FrameContextOptions;

/// Top-level renderer configuration.
#[derive(Copy, Clone, Debug)]
pub struct RendererConfig {
    /// Run the luma-based edge anti-aliasing pass on the linear plane.
    pub enable_fxaa: bool,
    /// Apply the ACES curve before sRGB encoding. When disabled the
    /// exposed linear value is clamped instead.
    pub enable_tonemap: bool,
    /// Linear multiplier applied before tone mapping.
    pub exposure: f32,
    /// Add a 2x2 ordered dither before quantizing to 8 bits.
    pub dither: bool,
    /// Use the environment map for image-based ambient lighting.
    pub enable_ibl: bool,
    /// Scale of the image-based lighting term.
    pub ibl_intensity: f32,
    /// Camera and lighting defaults used when building a frame context.
    pub frame: FrameContextOptions,
    pub raster: RasterConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enable_fxaa: true,
            enable_tonemap: true,
            exposure: 1.0,
            dither: false,
            enable_ibl: true,
            ibl_intensity: 1.0,
            frame: FrameContextOptions::default(),
            raster: RasterConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Builder-style toggle for both post-processing passes.
    pub fn with_post_process(mut self, enable_fxaa: bool, enable_tonemap: bool, exposure: f32) -> Self {
        self.enable_fxaa = enable_fxaa;
        self.enable_tonemap = enable_tonemap;
        self.exposure = exposure;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_post_processing() {
        let cfg = RendererConfig::default();
        assert!(cfg.enable_fxaa);
        assert!(cfg.enable_tonemap);
        assert_eq!(cfg.exposure, 1.0);
        assert_eq!(cfg.raster.tile_size, 32);
    }

    #[test]
    fn post_process_builder_overrides_fields() {
        let cfg = RendererConfig::default().with_post_process(false, false, 2.5);
        assert!(!cfg.enable_fxaa);
        assert!(!cfg.enable_tonemap);
        assert_eq!(cfg.exposure, 2.5);
    }
}
