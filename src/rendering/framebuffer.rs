/// Framebuffer for software rendering
/// Stores linear HDR color, the resolved 8-bit plane and depth
///
/// Memory layout:
/// - Hot metadata (width, height) stored first for bounds checking
/// - Planes are separate Vecs so passes that only touch one stay cache friendly
use glam::Vec3;
use std::marker::PhantomData;

/// Cleared depth value; anything nearer than this has been written.
pub const DEPTH_FAR: f32 = 1.0;

pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    // Shading output, unclamped
    linear: Vec<Vec3>,
    // Resolved BGRA8 (b | g << 8 | r << 16 | a << 24)
    color: Vec<u32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let pixel_count = width * height;
        Self {
            width,
            height,
            linear: vec![Vec3::ZERO; pixel_count],
            color: vec![0; pixel_count],
        }
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// Fill the linear plane with one color.
    pub fn clear_linear(&mut self, clear: Vec3) {
        self.linear.fill(clear);
    }

    /// Fill the resolved plane with one packed color.
    pub fn clear_color(&mut self, clear: u32) {
        self.color.fill(clear);
    }

    #[inline]
    pub fn linear(&self) -> &[Vec3] {
        &self.linear
    }

    #[inline]
    pub fn linear_mut(&mut self) -> &mut [Vec3] {
        &mut self.linear
    }

    #[inline]
    pub fn color(&self) -> &[u32] {
        &self.color
    }

    #[inline]
    pub fn color_mut(&mut self) -> &mut [u32] {
        &mut self.color
    }

    /// Both planes at once, for passes that read one and write the other.
    #[inline]
    pub fn planes_mut(&mut self) -> (&mut [Vec3], &mut [u32]) {
        (&mut self.linear, &mut self.color)
    }

    #[inline]
    pub fn linear_at(&self, x: usize, y: usize) -> Vec3 {
        self.linear[y * self.width + x]
    }

    /// Resize framebuffer
    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        let pixel_count = width * height;
        self.linear.resize(pixel_count, Vec3::ZERO);
        self.color.resize(pixel_count, 0);
    }

    /// Split the framebuffer into horizontal stripes for multi-core passes.
    /// Each stripe owns a disjoint subset of rows, so they can run in parallel.
    /// The depth plane is shared read-only.
    pub fn split_into_stripes<'a>(
        &'a mut self,
        depth: &'a DepthBuffer,
        stripes: usize,
    ) -> Vec<FrameSlice<'a>> {
        let stripes = stripes.max(1);
        let width = self.width;
        let height = self.height;

        if depth.width != width || depth.height != height {
            log::warn!(
                "depth buffer {}x{} does not match framebuffer {}x{}",
                depth.width,
                depth.height,
                width,
                height
            );
            return Vec::new();
        }

        let mut slices = Vec::with_capacity(stripes);

        let mut remaining_linear: &mut [Vec3] = self.linear.as_mut_slice();
        let mut remaining_depth: &[f32] = depth.data.as_slice();

        let mut y0 = 0usize;
        let rows_per_stripe = height.div_ceil(stripes);

        for _ in 0..stripes {
            if y0 >= height {
                break;
            }
            let rows = (height - y0).min(rows_per_stripe);
            let pixels = rows * width;

            let (linear_head, linear_tail) = remaining_linear.split_at_mut(pixels);
            let (depth_head, depth_tail) = remaining_depth.split_at(pixels);

            slices.push(FrameSlice {
                width,
                full_height: height,
                y0,
                height: rows,
                linear: linear_head,
                depth: depth_head,
            });

            remaining_linear = linear_tail;
            remaining_depth = depth_tail;
            y0 += rows;
        }

        slices
    }

    /// Split the framebuffer into 2D tiles for cache-friendly, tile-based rendering.
    /// Tiles partition both X and Y dimensions; each tile owns a disjoint rectangle
    /// of pixels, making them suitable for parallel processing without overlap.
    /// Tiles are emitted row-major, matching `TileGrid` indices.
    pub fn split_into_tiles<'a>(
        &'a mut self,
        depth: &'a mut DepthBuffer,
        tile_width: usize,
        tile_height: usize,
    ) -> Vec<FrameTile<'a>> {
        let tile_width = tile_width.max(1);
        let tile_height = tile_height.max(1);

        let width = self.width;
        let height = self.height;

        if depth.width != width || depth.height != height {
            log::warn!(
                "depth buffer {}x{} does not match framebuffer {}x{}",
                depth.width,
                depth.height,
                width,
                height
            );
            return Vec::new();
        }

        let linear_ptr = self.linear.as_mut_ptr();
        let depth_ptr = depth.data.as_mut_ptr();

        let mut tiles = Vec::new();

        let mut y0 = 0usize;
        while y0 < height {
            let h = (height - y0).min(tile_height);
            let mut x0 = 0usize;
            while x0 < width {
                let w = (width - x0).min(tile_width);
                tiles.push(FrameTile {
                    width,
                    full_height: height,
                    x0,
                    y0,
                    tile_width: w,
                    tile_height: h,
                    linear_ptr,
                    depth_ptr,
                    _borrow: PhantomData,
                });
                x0 += tile_width;
            }
            y0 += tile_height;
        }

        tiles
    }
}

/// Per-pixel depth in [0, 1], cleared to `DEPTH_FAR`.
pub struct DepthBuffer {
    pub width: usize,
    pub height: usize,
    data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![DEPTH_FAR; width * height],
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(DEPTH_FAR);
    }

    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.resize(width * height, DEPTH_FAR);
    }
}

/// View into a contiguous set of rows in the framebuffer.
/// Used for row-parallel passes where each worker owns a disjoint band.
pub struct FrameSlice<'a> {
    pub width: usize,
    pub full_height: usize,
    pub y0: usize,
    pub height: usize,
    pub linear: &'a mut [Vec3],
    pub depth: &'a [f32],
}

impl<'a> FrameSlice<'a> {
    /// Slice bounds: (x0, y0, x1, y1) in global framebuffer coordinates
    #[inline(always)]
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (0, self.y0, self.width, self.y0 + self.height)
    }

    /// Mutable color row and read-only depth row for a row local to this slice.
    #[inline]
    pub fn row_mut(&mut self, y_local: usize) -> (&mut [Vec3], &[f32]) {
        let start = y_local * self.width;
        let end = start + self.width;
        (&mut self.linear[start..end], &self.depth[start..end])
    }
}

/// View into a rectangular tile of the framebuffer.
/// Unlike `FrameSlice`, tiles partition both X and Y. Internally they use raw
/// pointers into the backing planes; callers must ensure tiles do not
/// overlap when used in parallel.
pub struct FrameTile<'a> {
    pub width: usize,
    pub full_height: usize,
    pub x0: usize,
    pub y0: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    linear_ptr: *mut Vec3,
    depth_ptr: *mut f32,
    _borrow: PhantomData<&'a mut [f32]>,
}

// Safety: FrameTile only carries raw pointers into planes that are mutably
// borrowed for 'a by `split_into_tiles`. The tiles produced by one split
// cover disjoint (x0, y0, tile_width, tile_height) rectangles and every
// access below stays inside the tile's own rectangle, so tiles handed to
// different threads never touch the same pixel.
unsafe impl<'a> Send for FrameTile<'a> {}
unsafe impl<'a> Sync for FrameTile<'a> {}

impl<'a> FrameTile<'a> {
    /// Rectangle covered by this tile: (x0, y0, width, height).
    #[inline(always)]
    pub fn rect(&self) -> (usize, usize, usize, usize) {
        (self.x0, self.y0, self.tile_width, self.tile_height)
    }

    /// Stored depth at a framebuffer index.
    ///
    /// # Safety
    /// `index` must address a pixel inside this tile.
    #[inline(always)]
    pub unsafe fn depth_at(&self, index: usize) -> f32 {
        *self.depth_ptr.add(index)
    }

    /// # Safety
    /// `index` and the three pixels after it must lie inside one row of this tile.
    #[inline(always)]
    pub unsafe fn depth_ptr(&self, index: usize) -> *const f32 {
        self.depth_ptr.add(index)
    }

    /// # Safety
    /// `index` must address a pixel inside this tile.
    #[inline(always)]
    pub unsafe fn color_at(&self, index: usize) -> Vec3 {
        *self.linear_ptr.add(index)
    }

    /// # Safety
    /// `index` must address a pixel inside this tile.
    #[inline(always)]
    pub unsafe fn write(&mut self, index: usize, color: Vec3, depth: f32) {
        *self.linear_ptr.add(index) = color;
        *self.depth_ptr.add(index) = depth;
    }

    /// `dst = src * alpha + dst * (1 - alpha)`; depth is left alone.
    ///
    /// # Safety
    /// `index` must address a pixel inside this tile.
    #[inline(always)]
    pub unsafe fn blend(&mut self, index: usize, color: Vec3, alpha: f32) {
        let dst = &mut *self.linear_ptr.add(index);
        *dst = color * alpha + *dst * (1.0 - alpha);
    }
}
