use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;

use crate::compositor::{composite, Collaborator, CompositeError};
use crate::config::{ConfigError, TilingConfig};
use crate::grid_planner::{GridCache, TilingGrid};
use crate::inference::TileInference;
use crate::mask::{MaskError, OverlayMask};
use crate::source::{prepare_source, PrepareError};
use crate::Extent;

#[derive(Debug, Error)]
pub enum PixelateError {
    #[error("The overlay mask could not be loaded")]
    Mask(#[from] MaskError),
    #[error("The source image could not be prepared")]
    Prepare(#[from] PrepareError),
    #[error("The image could not be composited")]
    Composite(#[from] CompositeError),
}

/// Everything one pixelation run needs from its caller.
#[derive(Debug, Clone)]
pub struct PixelateRequest {
    pub source: RgbaImage,
    /// Width of the pixel-art result in art pixels. Defaults to a quarter of the source width
    /// for the stock model.
    pub pixel_width: Option<u32>,
    pub config: TilingConfig,
}

impl PixelateRequest {
    pub fn new(source: RgbaImage) -> Self {
        Self {
            source,
            pixel_width: None,
            config: TilingConfig::default(),
        }
    }

    pub fn with_pixel_width(mut self, pixel_width: u32) -> Self {
        self.pixel_width = Some(pixel_width);
        self
    }

    pub fn with_config(mut self, config: TilingConfig) -> Self {
        self.config = config;
        self
    }
}

/// Long-lived pixelation session.
///
/// Holds the inference backend and the overlay mask, both loaded once and reused for every
/// run, plus the grids planned so far. Nothing else survives between runs.
pub struct Pixelator<B> {
    backend: Option<B>,
    mask: Option<OverlayMask>,
    grids: GridCache,
}

impl<B> Default for Pixelator<B> {
    fn default() -> Self {
        Self {
            backend: None,
            mask: None,
            grids: GridCache::new(),
        }
    }
}

impl<B> Pixelator<B>
where
    B: TileInference,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collaborators(backend: B, mask: OverlayMask) -> Self {
        Self {
            backend: Some(backend),
            mask: Some(mask),
            grids: GridCache::new(),
        }
    }

    pub fn set_backend(&mut self, backend: B) {
        self.backend = Some(backend);
    }

    pub fn set_mask(&mut self, mask: OverlayMask) {
        self.mask = Some(mask);
    }

    pub fn load_mask<P: AsRef<Path>>(&mut self, path: P) -> Result<(), PixelateError> {
        self.set_mask(OverlayMask::open(path)?);
        Ok(())
    }

    fn collaborators(&mut self) -> Result<(&OverlayMask, &mut B), CompositeError> {
        match (self.mask.as_ref(), self.backend.as_mut()) {
            (None, _) => Err(CompositeError::MissingCollaborator(Collaborator::Mask)),
            (_, None) => Err(CompositeError::MissingCollaborator(
                Collaborator::InferenceBackend,
            )),
            (Some(mask), Some(backend)) => Ok((mask, backend)),
        }
    }

    /// Returns the (cached) grid for a prepared source of `canvas` size.
    pub fn plan(
        &mut self,
        canvas: Extent,
        config: &TilingConfig,
    ) -> Result<Arc<TilingGrid>, ConfigError> {
        config.validate()?;
        Ok(self.grids.get_or_plan(
            canvas,
            config.max_tile_size,
            config.overlap,
            config.scale_factor,
        )?)
    }

    /// Prepares the request's source, plans its grid and composites the upscaled result.
    ///
    /// Fails before any tile is processed if the backend or the mask is missing or the
    /// configuration is invalid.
    pub async fn run(&mut self, request: &PixelateRequest) -> Result<RgbaImage, PixelateError> {
        self.collaborators()?;
        let config = &request.config;
        config.validate().map_err(CompositeError::from)?;

        let source = prepare_source(&request.source, request.pixel_width, config.scale_factor)?;
        let grid = self
            .plan(Extent::new(source.width(), source.height()), config)
            .map_err(CompositeError::from)?;
        log::info!(
            "Pixelating {}x{} source with {} tiles",
            source.width(),
            source.height(),
            grid.len()
        );

        let (mask, backend) = self.collaborators()?;
        let output = composite(&source, &grid, mask, backend, config.scale_factor).await?;
        Ok(output)
    }
}
