use thiserror::Error;

use crate::grid_planner::{double_overlap_within, GridPlanError, MODEL_SCALE_FACTOR};
use crate::Extent;

pub const DEFAULT_MAX_TILE_SIZE: u32 = 256;
pub const DEFAULT_OVERLAP: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("The tiling grid cannot be planned")]
    Grid(#[from] GridPlanError),
    #[error("Scale factor must be at least 1")]
    InvalidScaleFactor,
    #[error("The grid was planned for {grid} but the image is {image}")]
    GridMismatch { grid: Extent, image: Extent },
}

/// Tiling parameters of a pixelation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingConfig {
    /// Upper bound of a tile's extent along either axis, in source pixels.
    pub max_tile_size: u32,
    /// Source pixels trimmed from each shared tile edge. Neighbouring tiles share twice this.
    pub overlap: u32,
    /// Factor the model upscales each tile by.
    pub scale_factor: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            max_tile_size: DEFAULT_MAX_TILE_SIZE,
            overlap: DEFAULT_OVERLAP,
            scale_factor: MODEL_SCALE_FACTOR,
        }
    }
}

impl TilingConfig {
    pub fn with_max_tile_size(mut self, max_tile_size: u32) -> Self {
        self.max_tile_size = max_tile_size;
        self
    }

    pub fn with_overlap(mut self, overlap: u32) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_scale_factor(mut self, scale_factor: u32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scale_factor == 0 {
            return Err(ConfigError::InvalidScaleFactor);
        }
        double_overlap_within(self.max_tile_size, self.overlap)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TilingConfig::default();
        assert_eq!(config.max_tile_size, 256);
        assert_eq!(config.overlap, 4);
        assert_eq!(config.scale_factor, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_fit_tile() {
        let config = TilingConfig::default().with_max_tile_size(16).with_overlap(8);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Grid(GridPlanError::InvalidOverlapValue {
                max_tile_size: 16,
                overlap: 8
            }))
        );
    }

    #[test]
    fn test_huge_overlap_is_rejected() {
        let config = TilingConfig::default().with_overlap(1 << 31);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Grid(GridPlanError::InvalidOverlapValue {
                max_tile_size: 256,
                overlap: 1 << 31
            }))
        );
        let config = config.with_max_tile_size(u32::MAX);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_scale_factor() {
        let config = TilingConfig::default().with_scale_factor(0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidScaleFactor));
    }
}
