/// Screen tiling and per-tile triangle bins
///
/// Key Design Principles:
/// 1. Tile size: 32×32 pixels (4KB depth + 12KB linear color stays in L1/L2)
/// 2. Binning: every triangle goes into each tile its bounding box overlaps
/// 3. Chunk-local bins: workers bin their own slice of triangles, then the
///    bins are merged in chunk order so submission order survives
/// 4. Tile max depth: one read-only pass before the scan lets whole
///    triangles be rejected per tile
use super::framebuffer::DepthBuffer;
use rayon::prelude::*;

/// Tile edge length in pixels.
pub const TILE_SIZE: usize = 32;

/// How each tile's bin is ordered before scanning.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOrder {
    /// Stable sort by nearest depth; used for opaque and masked geometry.
    FrontToBack,
    /// Keep the order triangles were submitted in; used for blending.
    Submission,
}

/// Row-major grid of tiles covering a `width` x `height` viewport once.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    pub width: usize,
    pub height: usize,
    pub tile_size: usize,
    pub tiles_x: usize,
    pub tiles_y: usize,
}

impl TileGrid {
    pub fn new(width: usize, height: usize, tile_size: usize) -> Self {
        let tile_size = tile_size.max(1);
        Self {
            width,
            height,
            tile_size,
            tiles_x: width.div_ceil(tile_size),
            tiles_y: height.div_ceil(tile_size),
        }
    }

    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// (x0, y0, width, height) of a tile; edge tiles are smaller.
    #[inline]
    pub fn tile_rect(&self, index: usize) -> (usize, usize, usize, usize) {
        let tx = index % self.tiles_x;
        let ty = index / self.tiles_x;
        let x0 = tx * self.tile_size;
        let y0 = ty * self.tile_size;
        let x1 = (x0 + self.tile_size).min(self.width);
        let y1 = (y0 + self.tile_size).min(self.height);
        (x0, y0, x1 - x0, y1 - y0)
    }

    /// Inclusive tile range overlapped by an inclusive pixel box, or `None`
    /// when the box misses the viewport.
    #[inline]
    pub fn overlapping(
        &self,
        min_x: i32,
        min_y: i32,
        max_x: i32,
        max_y: i32,
    ) -> Option<(usize, usize, usize, usize)> {
        if self.tiles_x == 0 || self.tiles_y == 0 {
            return None;
        }
        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let max_y = max_y.min(self.height as i32 - 1);
        if min_x > max_x || min_y > max_y {
            return None;
        }
        let ts = self.tile_size;
        Some((
            min_x as usize / ts,
            min_y as usize / ts,
            (max_x as usize / ts).min(self.tiles_x - 1),
            (max_y as usize / ts).min(self.tiles_y - 1),
        ))
    }
}

/// Per-tile lists of triangle indices.
#[derive(Clone, Debug)]
pub struct TileBins {
    pub grid: TileGrid,
    pub bins: Vec<Vec<u32>>,
}

impl TileBins {
    pub fn new(grid: TileGrid) -> Self {
        Self {
            grid,
            bins: vec![Vec::new(); grid.tile_count()],
        }
    }

    /// Clear all bins (reuse allocations)
    pub fn clear(&mut self) {
        for bin in &mut self.bins {
            bin.clear();
        }
    }

    /// Add a triangle to every tile its inclusive pixel box overlaps.
    /// Returns false when it touches no tile.
    pub fn add(&mut self, triangle: u32, min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> bool {
        let Some((tx0, ty0, tx1, ty1)) = self.grid.overlapping(min_x, min_y, max_x, max_y) else {
            return false;
        };
        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                self.bins[ty * self.grid.tiles_x + tx].push(triangle);
            }
        }
        true
    }

    #[inline]
    pub fn bin(&self, tile: usize) -> &[u32] {
        &self.bins[tile]
    }

    /// Append `other`'s bins after this one's, tile by tile.
    pub fn merge(&mut self, other: &TileBins) {
        debug_assert_eq!(self.grid, other.grid);
        for (dst, src) in self.bins.iter_mut().zip(&other.bins) {
            dst.extend_from_slice(src);
        }
    }

    /// Merge chunk-local bins in chunk order.
    pub fn merge_all(grid: TileGrid, parts: &[TileBins]) -> TileBins {
        let mut merged = TileBins::new(grid);
        merged
            .bins
            .par_iter_mut()
            .enumerate()
            .for_each(|(tile, dst)| {
                let total = parts.iter().map(|p| p.bins[tile].len()).sum();
                dst.reserve(total);
                for part in parts {
                    dst.extend_from_slice(&part.bins[tile]);
                }
            });
        merged
    }

    /// Stable sort of every bin by the key of each triangle (nearest depth).
    pub fn sort_front_to_back(&mut self, z_min: &[f32]) {
        self.bins.par_iter_mut().for_each(|bin| {
            bin.sort_by(|&a, &b| z_min[a as usize].total_cmp(&z_min[b as usize]));
        });
    }

    pub fn total_entries(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }
}

/// Farthest stored depth of every tile, computed in parallel.
pub fn tile_max_depths(grid: &TileGrid, depth: &DepthBuffer) -> Vec<f32> {
    let data = depth.data();
    let stride = depth.width;
    (0..grid.tile_count())
        .into_par_iter()
        .map(|tile| {
            let (x0, y0, w, h) = grid.tile_rect(tile);
            let mut max_depth = 0.0f32;
            for y in y0..y0 + h {
                let row = &data[y * stride + x0..y * stride + x0 + w];
                max_depth = row.iter().fold(max_depth, |m, &d| m.max(d));
            }
            max_depth
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_counts_partial_tiles() {
        let grid = TileGrid::new(1280, 720, 32);
        assert_eq!(grid.tiles_x, 40);
        assert_eq!(grid.tiles_y, 23);
        assert_eq!(grid.tile_rect(grid.tile_count() - 1), (1248, 704, 32, 16));
    }

    #[test]
    fn triangle_lands_in_overlapped_tiles_only() {
        let mut bins = TileBins::new(TileGrid::new(128, 128, 32));
        assert!(bins.add(0, 20, 20, 40, 40));
        assert_eq!(bins.bin(0), &[0]);
        assert_eq!(bins.bin(1), &[0]);
        assert_eq!(bins.bin(4), &[0]);
        assert_eq!(bins.bin(5), &[0]);
        assert!(bins.bin(2).is_empty());
        assert_eq!(bins.total_entries(), 4);
    }

    #[test]
    fn off_screen_box_is_not_binned() {
        let mut bins = TileBins::new(TileGrid::new(64, 64, 32));
        assert!(!bins.add(0, -10, -10, -1, 30));
        assert!(!bins.add(1, 64, 0, 90, 10));
        assert_eq!(bins.total_entries(), 0);
    }

    #[test]
    fn merge_keeps_chunk_order() {
        let grid = TileGrid::new(64, 32, 32);
        let mut a = TileBins::new(grid);
        let mut b = TileBins::new(grid);
        a.add(0, 0, 0, 63, 31);
        b.add(1, 0, 0, 10, 10);
        a.add(2, 40, 0, 50, 10);
        let merged = TileBins::merge_all(grid, &[a.clone(), b.clone()]);
        assert_eq!(merged.bin(0), &[0, 1]);
        assert_eq!(merged.bin(1), &[0, 2]);

        a.merge(&b);
        assert_eq!(a.bin(0), merged.bin(0));
    }

    #[test]
    fn front_to_back_sort_is_stable() {
        let mut bins = TileBins::new(TileGrid::new(32, 32, 32));
        for i in 0..4 {
            bins.add(i, 0, 0, 1, 1);
        }
        bins.sort_front_to_back(&[0.5, 0.1, 0.5, 0.2]);
        assert_eq!(bins.bin(0), &[1, 3, 0, 2]);
    }

    #[test]
    fn max_depth_per_tile() {
        let mut depth = DepthBuffer::new(64, 32);
        depth.data_mut().fill(0.25);
        depth.data_mut()[40] = 0.75;
        let grid = TileGrid::new(64, 32, 32);
        assert_eq!(tile_max_depths(&grid, &depth), vec![0.25, 0.75]);
    }
}
