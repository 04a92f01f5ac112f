use std::{collections::HashMap, sync::Arc};

use thiserror::Error;

use crate::Extent;

/// Output scale of the pixelation model. Tile extents are rounded to multiples of this so every
/// upscaled tile lands on the integer output pixel grid.
pub const MODEL_SCALE_FACTOR: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridPlanError {
    #[error("Canvas {0} has no area")]
    EmptyCanvas(Extent),
    #[error("Maximum tile size {max_tile_size} must exceed twice the overlap {overlap}")]
    InvalidOverlapValue { max_tile_size: u32, overlap: u32 },
    #[error("Tile alignment must be at least 1")]
    InvalidAlignment,
}

/// Source-space rectangle of one tile together with its position in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpec {
    pub col: u32,
    pub row: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The part of a tile that is actually written to the output, in source pixels.
///
/// `x`/`y` are canvas coordinates, `src_x`/`src_y` the matching offset inside the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteRegion {
    pub x: u32,
    pub y: u32,
    pub src_x: u32,
    pub src_y: u32,
    pub width: u32,
    pub height: u32,
}

impl PasteRegion {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            src_x: self.src_x * factor,
            src_y: self.src_y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingGrid {
    canvas: Extent,
    tile_extent: Extent,
    overlap: u32,
    horizontal_count: u32,
    vertical_count: u32,
    tiles: Vec<TileSpec>,
}

struct AxisPlan {
    count: u32,
    extent: u32,
}

/// Returns `2 * overlap` if it leaves room for tile content inside `max_tile_size`.
pub(crate) fn double_overlap_within(
    max_tile_size: u32,
    overlap: u32,
) -> Result<u32, GridPlanError> {
    match overlap.checked_mul(2) {
        Some(double_overlap) if double_overlap < max_tile_size => Ok(double_overlap),
        _ => Err(GridPlanError::InvalidOverlapValue {
            max_tile_size,
            overlap,
        }),
    }
}

fn plan_axis(size: u32, max_tile_size: u32, double_overlap: u32, align: u32) -> AxisPlan {
    if size <= max_tile_size {
        return AxisPlan {
            count: 1,
            extent: size,
        };
    }

    let count = 1 + (size - max_tile_size).div_ceil(max_tile_size - double_overlap);
    let extent = size.div_ceil(count * align) * align + double_overlap;

    // With tiny tiles the alignment can push trailing origins onto or past the canvas edge.
    // Those tiles would be empty, so they are never emitted.
    let stride = extent - double_overlap;
    AxisPlan {
        count: count.min(size.div_ceil(stride)),
        extent,
    }
}

/// Plans a tiling grid whose extents are aligned to the fixed model scale factor.
pub fn plan_grid(
    canvas_width: u32,
    canvas_height: u32,
    max_tile_size: u32,
    overlap: u32,
) -> Result<TilingGrid, GridPlanError> {
    plan_grid_aligned(
        canvas_width,
        canvas_height,
        max_tile_size,
        overlap,
        MODEL_SCALE_FACTOR,
    )
}

/// Plans a tiling grid, rounding multi-tile extents up to a multiple of `align`.
///
/// Tiles are returned in row-major order. Neighbouring tiles share a band of `2 * overlap`
/// source pixels; tiles in the last column/row are clipped to the canvas instead of padded.
pub fn plan_grid_aligned(
    canvas_width: u32,
    canvas_height: u32,
    max_tile_size: u32,
    overlap: u32,
    align: u32,
) -> Result<TilingGrid, GridPlanError> {
    let canvas = Extent::new(canvas_width, canvas_height);
    if canvas.is_empty() {
        return Err(GridPlanError::EmptyCanvas(canvas));
    }
    let double_overlap = double_overlap_within(max_tile_size, overlap)?;
    if align == 0 {
        return Err(GridPlanError::InvalidAlignment);
    }

    let horizontal = plan_axis(canvas_width, max_tile_size, double_overlap, align);
    let vertical = plan_axis(canvas_height, max_tile_size, double_overlap, align);
    let tile_extent = Extent::new(horizontal.extent, vertical.extent);
    let stride = tile_extent.stride_with_overlap(double_overlap);

    let mut tiles = Vec::with_capacity((horizontal.count * vertical.count) as usize);
    for row in 0..vertical.count {
        for col in 0..horizontal.count {
            let x = col * stride.width;
            let y = row * stride.height;
            let x2 = (x + tile_extent.width).min(canvas_width);
            let y2 = (y + tile_extent.height).min(canvas_height);
            tiles.push(TileSpec {
                col,
                row,
                x,
                y,
                width: x2 - x,
                height: y2 - y,
            });
        }
    }

    log::debug!(
        "Planned {}x{} tiles of {} for canvas {}",
        horizontal.count,
        vertical.count,
        tile_extent,
        canvas
    );

    Ok(TilingGrid {
        canvas,
        tile_extent,
        overlap,
        horizontal_count: horizontal.count,
        vertical_count: vertical.count,
        tiles,
    })
}

impl TilingGrid {
    pub fn canvas(&self) -> Extent {
        self.canvas
    }

    /// Extent of an unclipped tile. Equals the canvas along an axis that fits in a single tile.
    pub fn tile_extent(&self) -> Extent {
        self.tile_extent
    }

    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    pub fn horizontal_count(&self) -> u32 {
        self.horizontal_count
    }

    pub fn vertical_count(&self) -> u32 {
        self.vertical_count
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[TileSpec] {
        &self.tiles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TileSpec> {
        self.tiles.iter()
    }

    /// Returns the seam-trimmed region of `tile` that ends up in the output.
    ///
    /// Every tile except the first of its row/column drops `overlap` pixels on the leading
    /// edge, every tile except the last drops `overlap` pixels on the trailing edge. The
    /// regions of all tiles therefore partition the canvas.
    pub fn paste_region(&self, tile: &TileSpec) -> PasteRegion {
        let (x, x_end) = self.trimmed_span(
            tile.col,
            self.horizontal_count,
            tile.x,
            tile.width,
            self.tile_extent.width,
        );
        let (y, y_end) = self.trimmed_span(
            tile.row,
            self.vertical_count,
            tile.y,
            tile.height,
            self.tile_extent.height,
        );

        PasteRegion {
            x,
            y,
            src_x: x - tile.x,
            src_y: y - tile.y,
            width: x_end - x,
            height: y_end - y,
        }
    }

    fn trimmed_span(
        &self,
        index: u32,
        count: u32,
        origin: u32,
        length: u32,
        extent: u32,
    ) -> (u32, u32) {
        let end = origin + length;
        let end = if index + 1 == count {
            end
        } else {
            end.min(origin + extent - self.overlap)
        };
        let lead = if index == 0 { 0 } else { self.overlap };
        ((origin + lead).min(end), end)
    }
}

impl<'a> IntoIterator for &'a TilingGrid {
    type Item = &'a TileSpec;
    type IntoIter = std::slice::Iter<'a, TileSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GridKey {
    canvas: Extent,
    max_tile_size: u32,
    overlap: u32,
    align: u32,
}

/// Memoizes grids by their planning inputs.
#[derive(Debug, Default)]
pub struct GridCache {
    grids: HashMap<GridKey, Arc<TilingGrid>>,
}

impl GridCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_plan(
        &mut self,
        canvas: Extent,
        max_tile_size: u32,
        overlap: u32,
        align: u32,
    ) -> Result<Arc<TilingGrid>, GridPlanError> {
        let key = GridKey {
            canvas,
            max_tile_size,
            overlap,
            align,
        };
        if let Some(grid) = self.grids.get(&key) {
            return Ok(grid.clone());
        }

        let grid = Arc::new(plan_grid_aligned(
            canvas.width,
            canvas.height,
            max_tile_size,
            overlap,
            align,
        )?);
        self.grids.insert(key, grid.clone());
        Ok(grid)
    }

    pub fn len(&self) -> usize {
        self.grids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }
}
