use image::RgbaImage;
use thiserror::Error;

use crate::Extent;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("The inference backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("The inference output has shape {got}, expected {expected}")]
    ShapeMismatch { expected: Extent, got: Extent },
}

impl InferenceError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Backend(err.into())
    }
}

/// Capability to run the upscaling model on a single tile.
///
/// Implementations must return a raster exactly `scale_factor` times the size of `tile` in both
/// axes. Calls are never issued concurrently.
#[allow(async_fn_in_trait)]
pub trait TileInference {
    async fn infer(&mut self, tile: &RgbaImage) -> Result<RgbaImage, InferenceError>;
}

/// Synchronous closures can stand in for a model, e.g. a nearest neighbour upscaler in tests.
impl<F> TileInference for F
where
    F: FnMut(&RgbaImage) -> Result<RgbaImage, InferenceError>,
{
    async fn infer(&mut self, tile: &RgbaImage) -> Result<RgbaImage, InferenceError> {
        self(tile)
    }
}
