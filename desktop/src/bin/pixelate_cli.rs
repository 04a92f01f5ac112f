use std::fs::File;
use std::str::FromStr;

use anyhow::Context;
use backend::config::{TilingConfig, DEFAULT_MAX_TILE_SIZE, DEFAULT_OVERLAP};
use backend::grid_planner::MODEL_SCALE_FACTOR;
use backend::model_runner::{ImageColorModel, ModelRunner};
use backend::model_value_range::ModelValueRange;
use backend::pixelator::{PixelateRequest, Pixelator};
use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser, Subcommand};
use desktop::image_utils::{load_image, render_output_pattern, save_image};

#[derive(Debug, Parser)]
#[command(name = "pixelate-cli")]
#[command(about = "Turn images into pixel art with a tiled upscaling model", long_about = None)]
struct PixelateCli {
    #[command(subcommand)]
    command: PixelateCommands,
}

#[derive(Debug, Subcommand)]
enum PixelateCommands {
    /// pixelate images with an ONNX model and its overlay mask
    Pixelate(ImageProcessingArgs),
}

#[derive(Debug, Clone, PartialEq)]
struct ArgColorModel(ImageColorModel);

impl FromStr for ArgColorModel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uppercase = s.to_uppercase();
        Ok(match uppercase.as_ref() {
            "BGR" => ArgColorModel(ImageColorModel::BGR),
            "RGB" => ArgColorModel(ImageColorModel::RGB),
            _ => anyhow::bail!("Color model {} not known, must be one of (RGB, BGR)", s),
        })
    }
}

#[derive(Debug, Args)]
struct ModelArgs {
    #[arg(long, value_name = "ONNX_MODEL")]
    /// path of the ONNX upscaling model
    model: String,
    #[arg(long, value_name = "MASK_IMAGE")]
    /// path of the overlay mask stamped onto every tile
    mask: String,
    #[arg(long, default_value = "RGB")]
    /// the expected color channel order of the model
    channel_order: ArgColorModel,
    #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
    /// the value range for input values. Can be a positive float number for [0,x] ranges or "+-x"
    /// for [-x,x] ranges
    input_range: ModelValueRange,
    #[arg(long, default_value = "1.0", allow_hyphen_values = true)]
    /// the value range for output values. Can be a positive float number for [0,x] ranges or "+-x"
    /// for [-x,x] ranges
    output_range: ModelValueRange,
}

#[derive(Debug, Args)]
struct TilingArgs {
    #[arg(long)]
    /// width of the result in art pixels, defaults to the image width divided by the scale factor
    pixel_width: Option<u32>,
    #[arg(long, default_value_t = DEFAULT_MAX_TILE_SIZE)]
    /// upper bound of a tile's extent in source pixels
    max_tile_size: u32,
    #[arg(long, default_value_t = DEFAULT_OVERLAP)]
    /// source pixels trimmed from every shared tile edge
    overlap: u32,
    #[arg(long, default_value_t = MODEL_SCALE_FACTOR)]
    /// factor the model upscales each tile by
    scale_factor: u32,
}

#[derive(Debug, Args)]
#[command(flatten_help = true)]
struct ImageProcessingArgs {
    #[arg(value_name = "IMAGE", required = true)]
    /// paths for the input images
    images: Vec<String>,
    #[arg(value_name = "OUTPUT_PATTERN")]
    /// pattern for the output images, %NAME% will be replaced with the input image filename without extension
    output_pattern: String,
    #[command(flatten)]
    model: ModelArgs,
    #[command(flatten)]
    tiling: TilingArgs,
}

impl ImageProcessingArgs {
    fn validate(&self) {
        if self.images.len() > 1 && !self.output_pattern.contains("%NAME%") {
            let mut cmd = PixelateCli::command();
            cmd.error(
                ErrorKind::ValueValidation,
                "OUTPUT_PATTERN must include %NAME% if multiple IMAGE entries are used",
            )
            .exit();
        }
    }

    fn tiling_config(&self) -> TilingConfig {
        TilingConfig::default()
            .with_max_tile_size(self.tiling.max_tile_size)
            .with_overlap(self.tiling.overlap)
            .with_scale_factor(self.tiling.scale_factor)
    }
}

fn open_pixelator(args: &ModelArgs) -> anyhow::Result<Pixelator<ModelRunner>> {
    let mut model_file =
        File::open(&args.model).with_context(|| format!("Could not open model {}", args.model))?;
    let runner = ModelRunner::new(
        &mut model_file,
        args.channel_order.0,
        args.input_range,
        args.output_range,
    )
    .with_context(|| format!("Could not load model {}", args.model))?;

    let mut pixelator = Pixelator::new();
    pixelator.set_backend(runner);
    pixelator
        .load_mask(&args.mask)
        .with_context(|| format!("Could not load mask {}", args.mask))?;
    Ok(pixelator)
}

async fn run_async(args: PixelateCli) -> anyhow::Result<()> {
    let PixelateCommands::Pixelate(image_processing_args) = &args.command;
    image_processing_args.validate();

    let config = image_processing_args.tiling_config();
    config.validate().context("Invalid tiling options")?;
    let mut pixelator = open_pixelator(&image_processing_args.model)?;

    println!(
        "Starting pixelation for {} images...",
        image_processing_args.images.len()
    );

    for input in &image_processing_args.images {
        let output = render_output_pattern(input, &image_processing_args.output_pattern)?;
        let request = PixelateRequest {
            source: load_image(input)?,
            pixel_width: image_processing_args.tiling.pixel_width,
            config,
        };

        let result = pixelator
            .run(&request)
            .await
            .with_context(|| format!("Failed to pixelate {input}"))?;

        save_image(&result, &output)?;
        println!("Done: {} -> {}", input, output.display());
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = PixelateCli::parse();

    pollster::block_on(run_async(args))
}
