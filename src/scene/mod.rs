/// Scene-side data consumed by the renderer
/// Meshes and materials live in arena pools; draw items refer to them by index.
pub mod draw;
pub mod frame;
pub mod light;
pub mod material;
pub mod mesh;

pub use draw::{DrawItem, MaterialId, MaterialPool, MeshId, MeshPool, RenderQueue};
pub use frame::{FrameContext, FrameContextBuilder, FrameContextOptions};
pub use light::DirectionalLight;
pub use material::{AlphaMode, PbrMaterial, TextureBinding};
pub use mesh::{Mesh, Vertex};
