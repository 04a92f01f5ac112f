use std::fmt;

use image::{imageops, RgbaImage};
use thiserror::Error;

use crate::config::ConfigError;
use crate::grid_planner::{TileSpec, TilingGrid};
use crate::inference::{InferenceError, TileInference};
use crate::mask::OverlayMask;
use crate::Extent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Mask,
    InferenceBackend,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::Mask => write!(f, "overlay mask"),
            Collaborator::InferenceBackend => write!(f, "inference backend"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("Invalid tiling configuration")]
    Configuration(#[from] ConfigError),
    #[error("The {0} is not loaded")]
    MissingCollaborator(Collaborator),
    #[error("Inference failed for tile x{col}y{row}")]
    Inference {
        col: u32,
        row: u32,
        #[source]
        source: InferenceError,
    },
}

fn check_output_shape(
    output: RgbaImage,
    tile: &TileSpec,
    scale_factor: u32,
) -> Result<RgbaImage, InferenceError> {
    let expected = Extent::new(tile.width, tile.height).scaled(scale_factor);
    let got = Extent::new(output.width(), output.height());
    if got != expected {
        return Err(InferenceError::ShapeMismatch { expected, got });
    }
    Ok(output)
}

/// Runs `backend` over every tile of `grid` and stitches the results into a new raster that is
/// `scale_factor` times the size of `source`.
///
/// Tiles are processed one at a time in grid order. Each tile is cut from `source`, stamped with
/// `mask` and inferred; only its seam-trimmed paste region is copied into the output, so no
/// output pixel is written twice. The first failing tile aborts the run and no partial output
/// is returned.
pub async fn composite<B>(
    source: &RgbaImage,
    grid: &TilingGrid,
    mask: &OverlayMask,
    backend: &mut B,
    scale_factor: u32,
) -> Result<RgbaImage, CompositeError>
where
    B: TileInference,
{
    if scale_factor == 0 {
        return Err(ConfigError::InvalidScaleFactor.into());
    }
    let source_extent = Extent::new(source.width(), source.height());
    if grid.canvas() != source_extent {
        return Err(ConfigError::GridMismatch {
            grid: grid.canvas(),
            image: source_extent,
        }
        .into());
    }

    let output_extent = source_extent.scaled(scale_factor);
    let mut output = RgbaImage::new(output_extent.width, output_extent.height);

    for (i, tile) in grid.iter().enumerate() {
        log::info!(
            "Processing tile {}/{} (x{}y{})",
            i + 1,
            grid.len(),
            tile.col,
            tile.row
        );

        let mut input =
            imageops::crop_imm(source, tile.x, tile.y, tile.width, tile.height).to_image();
        mask.stamp(&mut input);

        let inferred = backend
            .infer(&input)
            .await
            .and_then(|result| check_output_shape(result, tile, scale_factor))
            .map_err(|source| {
                log::error!("Tile x{}y{} failed: {}", tile.col, tile.row, source);
                CompositeError::Inference {
                    col: tile.col,
                    row: tile.row,
                    source,
                }
            })?;

        let region = grid.paste_region(tile).scaled(scale_factor);
        if region.is_empty() {
            continue;
        }
        let trimmed = imageops::crop_imm(
            &inferred,
            region.src_x,
            region.src_y,
            region.width,
            region.height,
        );
        imageops::replace(&mut output, &*trimmed, region.x as i64, region.y as i64);
    }

    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::grid_planner::plan_grid;
    use image::Rgba;

    fn nearest_upscale(tile: &RgbaImage, factor: u32) -> RgbaImage {
        RgbaImage::from_fn(tile.width() * factor, tile.height() * factor, |x, y| {
            *tile.get_pixel(x / factor, y / factor)
        })
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x / 256) + (y / 256)) as u8, 255])
        })
    }

    fn transparent_mask() -> OverlayMask {
        OverlayMask::from_image(RgbaImage::new(1, 1)).unwrap()
    }

    #[test]
    fn test_identity_upscale_is_seamless() {
        let source = gradient(300, 170);
        let grid = plan_grid(300, 170, 64, 4).unwrap();
        let mut calls = 0;
        let mut backend = |tile: &RgbaImage| -> Result<RgbaImage, InferenceError> {
            calls += 1;
            Ok(nearest_upscale(tile, 4))
        };

        let output =
            pollster::block_on(composite(&source, &grid, &transparent_mask(), &mut backend, 4))
                .unwrap();

        assert_eq!(calls, grid.len());
        assert_eq!(output, nearest_upscale(&source, 4));
    }

    #[test]
    fn test_each_output_pixel_owned_by_one_tile() {
        let source = gradient(800, 600);
        let grid = plan_grid(800, 600, 392, 8).unwrap();
        let mut index = 0u8;
        let mut backend = |tile: &RgbaImage| -> Result<RgbaImage, InferenceError> {
            index += 1;
            Ok(RgbaImage::from_pixel(
                tile.width() * 4,
                tile.height() * 4,
                Rgba([index, 0, 0, 255]),
            ))
        };

        let output =
            pollster::block_on(composite(&source, &grid, &transparent_mask(), &mut backend, 4))
                .unwrap();

        for (i, tile) in grid.iter().enumerate() {
            let region = grid.paste_region(tile).scaled(4);
            for y in region.y..region.y + region.height {
                for x in region.x..region.x + region.width {
                    assert_eq!(output.get_pixel(x, y)[0], i as u8 + 1, "pixel ({x}, {y})");
                }
            }
        }
        assert!(output.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_mask_is_applied_before_inference() {
        let source = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let grid = plan_grid(40, 40, 16, 2).unwrap();
        let mask = OverlayMask::from_image(RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([200, 100, 50, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        }))
        .unwrap();
        let mut seen = Vec::new();
        let mut backend = |tile: &RgbaImage| -> Result<RgbaImage, InferenceError> {
            seen.push((*tile.get_pixel(0, 0), *tile.get_pixel(1, 0)));
            Ok(nearest_upscale(tile, 4))
        };

        let output = pollster::block_on(composite(&source, &grid, &mask, &mut backend, 4)).unwrap();

        assert_eq!(seen.len(), grid.len());
        assert!(seen
            .iter()
            .all(|&(stamped, clear)| stamped == Rgba([200, 100, 50, 255])
                && clear == Rgba([0, 0, 0, 255])));
        // Only the first tile's origin survives trimming.
        assert_eq!(*output.get_pixel(3, 3), Rgba([200, 100, 50, 255]));
        assert_eq!(*output.get_pixel(4, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_wrong_output_shape_fails_on_first_tile() {
        let source = gradient(100, 100);
        let grid = plan_grid(100, 100, 32, 4).unwrap();
        let mut calls = 0;
        let mut backend = |tile: &RgbaImage| -> Result<RgbaImage, InferenceError> {
            calls += 1;
            Ok(RgbaImage::new(tile.width() * 2, tile.height() * 2))
        };

        let err = pollster::block_on(composite(&source, &grid, &transparent_mask(), &mut backend, 4))
            .unwrap_err();

        assert_eq!(calls, 1);
        match err {
            CompositeError::Inference {
                col: 0,
                row: 0,
                source: InferenceError::ShapeMismatch { expected, got },
            } => {
                let first = grid.tiles()[0];
                assert_eq!(expected, Extent::new(first.width * 4, first.height * 4));
                assert_eq!(got, Extent::new(first.width * 2, first.height * 2));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_backend_failure_reports_tile() {
        let source = gradient(100, 100);
        let grid = plan_grid(100, 100, 40, 4).unwrap();
        let failing = grid.tiles()[grid.horizontal_count() as usize + 1];
        let mut calls = 0;
        let mut backend = |tile: &RgbaImage| -> Result<RgbaImage, InferenceError> {
            calls += 1;
            if calls == grid.horizontal_count() as usize + 2 {
                Err(InferenceError::backend("device lost"))
            } else {
                Ok(nearest_upscale(tile, 4))
            }
        };

        let err = pollster::block_on(composite(&source, &grid, &transparent_mask(), &mut backend, 4))
            .unwrap_err();

        assert_eq!(calls, grid.horizontal_count() as usize + 2);
        assert!(matches!(
            err,
            CompositeError::Inference { col, row, source: InferenceError::Backend(_) }
                if col == failing.col && row == failing.row
        ));
    }

    #[test]
    fn test_grid_mismatch_is_rejected_before_inference() {
        let source = gradient(64, 64);
        let grid = plan_grid(128, 64, 32, 4).unwrap();
        let mut calls = 0;
        let mut backend = |tile: &RgbaImage| -> Result<RgbaImage, InferenceError> {
            calls += 1;
            Ok(nearest_upscale(tile, 4))
        };

        let err = pollster::block_on(composite(&source, &grid, &transparent_mask(), &mut backend, 4))
            .unwrap_err();

        assert_eq!(calls, 0);
        assert!(matches!(
            err,
            CompositeError::Configuration(ConfigError::GridMismatch { .. })
        ));
    }

    #[test]
    fn test_other_scale_factor() {
        let source = gradient(90, 50);
        let grid = crate::grid_planner::plan_grid_aligned(90, 50, 32, 2, 3).unwrap();
        let mut backend = |tile: &RgbaImage| -> Result<RgbaImage, InferenceError> {
            Ok(nearest_upscale(tile, 3))
        };

        let output =
            pollster::block_on(composite(&source, &grid, &transparent_mask(), &mut backend, 3))
                .unwrap();

        assert_eq!(output, nearest_upscale(&source, 3));
    }
}
