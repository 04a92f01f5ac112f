use std::path::Path;

use image::{imageops, RgbaImage};
use thiserror::Error;

use crate::Extent;

#[derive(Debug, Error)]
pub enum MaskError {
    #[error("The mask image could not be read")]
    ReadError(#[from] image::ImageError),
    #[error("The mask image is empty")]
    EmptyMask,
}

/// Fixed overlay pattern stamped onto every tile before inference.
///
/// The pixelation model was trained on inputs carrying this stamp, so it is part of the model
/// input contract rather than an optional effect.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayMask {
    pattern: RgbaImage,
}

impl OverlayMask {
    pub fn from_image(pattern: RgbaImage) -> Result<Self, MaskError> {
        if pattern.width() == 0 || pattern.height() == 0 {
            return Err(MaskError::EmptyMask);
        }
        Ok(Self { pattern })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MaskError> {
        log::debug!("Loading overlay mask from {}", path.as_ref().display());
        Self::from_image(image::open(path)?.to_rgba8())
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.pattern.width(), self.pattern.height())
    }

    pub fn pattern(&self) -> &RgbaImage {
        &self.pattern
    }

    /// Composites the mask over `tile` at its origin, clipped to the tile bounds.
    pub fn stamp(&self, tile: &mut RgbaImage) {
        imageops::overlay(tile, &self.pattern, 0, 0);
    }
}
