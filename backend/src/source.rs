use image::{imageops, RgbaImage};
use thiserror::Error;

use crate::Extent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareError {
    #[error("The source image is empty")]
    EmptyImage,
    #[error("Pixel width must be at least 1")]
    InvalidPixelWidth,
    #[error("Scale factor must be at least 1")]
    InvalidScaleFactor,
}

/// Computes the pixel-art resolution for an image of `image` size.
///
/// Without an explicit `pixel_width` every `scale_factor` image pixels become one art pixel.
/// The height follows from the image's aspect ratio.
pub fn pixel_extent(
    image: Extent,
    pixel_width: Option<u32>,
    scale_factor: u32,
) -> Result<Extent, PrepareError> {
    if image.is_empty() {
        return Err(PrepareError::EmptyImage);
    }
    if scale_factor == 0 {
        return Err(PrepareError::InvalidScaleFactor);
    }

    let width = match pixel_width {
        Some(0) => return Err(PrepareError::InvalidPixelWidth),
        Some(width) => width,
        None => ((image.width as f64 / scale_factor as f64).round() as u32).max(1),
    };
    let height = ((width as f64 / image.width as f64) * image.height as f64).round() as u32;

    Ok(Extent::new(width, height.max(1)))
}

/// Resizes `image` so both dimensions are `scale_factor` times its pixel-art resolution.
pub fn prepare_source(
    image: &RgbaImage,
    pixel_width: Option<u32>,
    scale_factor: u32,
) -> Result<RgbaImage, PrepareError> {
    let pixels = pixel_extent(
        Extent::new(image.width(), image.height()),
        pixel_width,
        scale_factor,
    )?;
    let canvas = pixels.scaled(scale_factor);

    if canvas.as_pair() == image.dimensions() {
        return Ok(image.clone());
    }
    log::debug!(
        "Resizing source from {}x{} to {} ({} art pixels)",
        image.width(),
        image.height(),
        canvas,
        pixels
    );
    Ok(imageops::resize(
        image,
        canvas.width,
        canvas.height,
        imageops::FilterType::Triangle,
    ))
}
