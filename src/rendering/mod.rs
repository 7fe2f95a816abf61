/// Software rasterization pipeline
/// Clip, bin into tiles, shade in parallel, then resolve to 8-bit color
pub mod framebuffer;
pub mod rasterizer;
pub mod simd;
pub mod clipper;
pub mod vertex_shader;
pub mod geometry;
pub mod texture;
pub mod fragment;
pub mod environment;
pub mod tiles;
pub mod postprocess;
pub mod pipeline;
pub mod renderer;

pub use framebuffer::{DepthBuffer, FrameSlice, FrameTile, Framebuffer, DEPTH_FAR};
pub use rasterizer::{RasterConfig, RasterStats, Rasterizer};
pub use simd::F32x4;
pub use clipper::{clip_triangle, ClipPolygon, ClipVertex};
pub use vertex_shader::VertexShader;
pub use geometry::{GeometryProcessor, Triangle};
pub use texture::{FilterMode, Sampler, TextureImage, WrapMode};
pub use fragment::{FragmentContext, FragmentShader, FragmentVarying, PreparedLight};
pub use environment::{EnvironmentConfig, EnvironmentMap, HdrImage};
pub use tiles::{BinOrder, TileBins, TileGrid, TILE_SIZE};
pub use postprocess::{aces_filmic, apply_fxaa, linear_to_srgb_u8, pack_bgra, resolve};
pub use pipeline::{PassContext, RenderPipeline, RenderStats};
pub use renderer::Renderer;
