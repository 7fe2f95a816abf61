/// Soft PBR - CPU tile-based physically based software rasterizer
/// Clip, bin, shade and resolve entirely on the CPU
pub mod camera;
pub mod config;
pub mod error;
pub mod perf;
pub mod rendering;
pub mod scene;

pub use camera::OrbitCamera;
pub use config::RendererConfig;
pub use error::EnvironmentError;
pub use perf::{CounterSnapshot, FunctionCounters, PerfTimer, FUNCTION_COUNTERS};
pub use rendering::{
    BinOrder, DepthBuffer, EnvironmentMap, Framebuffer, HdrImage, PassContext, RasterStats,
    Rasterizer, RenderPipeline, RenderStats, Renderer, Sampler, TextureImage, DEPTH_FAR, TILE_SIZE,
};
pub use scene::{
    AlphaMode, DirectionalLight, DrawItem, FrameContext, FrameContextBuilder, FrameContextOptions,
    MaterialId, MaterialPool, Mesh, MeshId, MeshPool, PbrMaterial, RenderQueue, TextureBinding,
    Vertex,
};
