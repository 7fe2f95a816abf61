/// Model-view-projection transform for one draw item.
use glam::{Mat4, Vec4};

#[derive(Copy, Clone, Debug)]
pub struct VertexShader {
    pub mvp: Mat4,
}

impl VertexShader {
    #[inline]
    pub fn new(mvp: Mat4) -> Self {
        Self { mvp }
    }

    /// Homogeneous position to clip space.
    #[inline(always)]
    pub fn transform(&self, position: Vec4) -> Vec4 {
        self.mvp * position
    }
}
