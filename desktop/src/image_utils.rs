use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{DynamicImage, RgbaImage};

pub fn load_image<T: AsRef<Path>>(p: T) -> anyhow::Result<RgbaImage> {
    let image = image::open(&p)
        .with_context(|| format!("Could not read image {}", p.as_ref().display()))?;
    Ok(image.to_rgba8())
}

pub fn save_image(image: &RgbaImage, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    match image.save(path) {
        Err(image::ImageError::Unsupported(_)) => {
            // Formats without an alpha channel (e.g. JPEG) get the RGB part only.
            log::debug!("Dropping alpha channel for {}", path.display());
            DynamicImage::ImageRgba8(image.clone())
                .to_rgb8()
                .save(path)
                .with_context(|| format!("Could not write image {}", path.display()))
        }
        result => result.with_context(|| format!("Could not write image {}", path.display())),
    }
}

/// Builds the output path for `input` from `output_pattern`.
///
/// `%NAME%` is replaced with the input file name without extension. If the rendered pattern has
/// no extension, the input's extension is used.
pub fn render_output_pattern(input: &str, output_pattern: &str) -> anyhow::Result<PathBuf> {
    let input_path = Path::new(input);
    let input_name = input_path
        .file_stem()
        .with_context(|| format!("{input} has no file name"))?
        .to_str()
        .context("File path cannot be represented as UTF-8")?;
    let output = PathBuf::from(output_pattern.replace("%NAME%", input_name));

    if output.extension().is_some() {
        return Ok(output);
    }
    let input_extension = input_path
        .extension()
        .with_context(|| format!("{input} has no extension and neither has the output"))?;
    Ok(output.with_extension(input_extension))
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_render_output_pattern() {
        assert_eq!(
            render_output_pattern("photos/cat.png", "out/%NAME%_pixel").unwrap(),
            PathBuf::from("out/cat_pixel.png")
        );
        assert_eq!(
            render_output_pattern("photos/cat.png", "out/%NAME%.webp").unwrap(),
            PathBuf::from("out/cat.webp")
        );
        assert_eq!(
            render_output_pattern("dog.jpeg", "result").unwrap(),
            PathBuf::from("result.jpeg")
        );
        assert!(render_output_pattern("noext", "result").is_err());
    }

    #[test]
    fn test_save_and_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        let image = RgbaImage::from_fn(5, 4, |x, y| Rgba([x as u8, y as u8, 3, 128]));

        save_image(&image, &path).unwrap();

        assert_eq!(load_image(&path).unwrap(), image);
    }

    #[test]
    fn test_save_jpeg_drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.jpg");
        let image = RgbaImage::from_pixel(8, 8, Rgba([200, 10, 10, 255]));

        save_image(&image, &path).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (8, 8));
        assert_eq!(loaded.get_pixel(3, 3)[3], 255);
    }

    #[test]
    fn test_load_missing_image() {
        assert!(load_image("/definitely/not/here.png").is_err());
    }
}
