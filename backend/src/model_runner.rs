use std::collections::HashMap;
use std::io::Read;

use image::{Rgba, RgbaImage};
use ndarray::{Array4, Ix4};
use thiserror::Error;
use tract_core::model::{TypedModel, TypedRunnableModel};
use tract_onnx::prelude::*;

use crate::inference::{InferenceError, TileInference};
use crate::model_value_range::ModelValueRange;
use crate::Extent;

#[derive(Debug, Error)]
pub enum ModelRunnerError {
    #[error("The model is not parseable: {0}")]
    ParseError(TractError),
    #[error("The model could not be prepared for {extent} tiles: {cause}")]
    PlanError { extent: Extent, cause: TractError },
    #[error("Running the model failed: {0}")]
    RunError(TractError),
    #[error("The model produced no output")]
    NoOutput,
    #[error("The models output is unsupported (a [1,3,h,w] shaped output is required, got {0:?})")]
    InvalidOutputShape(Vec<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageColorModel {
    RGB,
    BGR,
}

impl ImageColorModel {
    /// Index of the RGBA pixel channel feeding model channel `channel`.
    fn pixel_channel(&self, channel: usize) -> usize {
        match self {
            ImageColorModel::RGB => channel,
            ImageColorModel::BGR => 2 - channel,
        }
    }
}

fn tile_to_tensor(
    tile: &RgbaImage,
    color_model: ImageColorModel,
    range: &ModelValueRange,
) -> Tensor {
    let (width, height) = tile.dimensions();
    Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, channel, y, x)| {
            let pixel = tile.get_pixel(x as u32, y as u32);
            range.pixel_value_to_model(pixel[color_model.pixel_channel(channel)])
        },
    )
    .into()
}

fn tensor_to_tile(
    output: &Tensor,
    color_model: ImageColorModel,
    range: &ModelValueRange,
) -> Result<RgbaImage, ModelRunnerError> {
    let view = output
        .to_array_view::<f32>()
        .map_err(ModelRunnerError::RunError)?;
    let shape = view.shape().to_vec();
    if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
        return Err(ModelRunnerError::InvalidOutputShape(shape));
    }
    let view = view
        .into_dimensionality::<Ix4>()
        .map_err(|_| ModelRunnerError::InvalidOutputShape(shape.clone()))?;

    Ok(RgbaImage::from_fn(shape[3] as u32, shape[2] as u32, |x, y| {
        let mut pixel = Rgba([0, 0, 0, u8::MAX]);
        for channel in 0..3 {
            let value = view[[0, channel, y as usize, x as usize]];
            pixel[color_model.pixel_channel(channel)] = range.model_value_to_pixel(value);
        }
        pixel
    }))
}

/// Runs an ONNX upscaling model with `[1, 3, h, w]` input and `[1, 3, H, W]` output on tiles.
///
/// The model's spatial dimensions are left symbolic in the file, so an optimized plan is built
/// for every distinct tile extent and kept for later tiles and runs.
pub struct ModelRunner {
    model: InferenceModel,
    plans: HashMap<Extent, TypedRunnableModel<TypedModel>>,
    color_model: ImageColorModel,
    input_range: ModelValueRange,
    output_range: ModelValueRange,
}

impl ModelRunner {
    pub fn new<R>(
        input: &mut R,
        color_model: ImageColorModel,
        input_range: ModelValueRange,
        output_range: ModelValueRange,
    ) -> Result<Self, ModelRunnerError>
    where
        R: Read,
    {
        let model = tract_onnx::onnx()
            .model_for_read(input)
            .map_err(ModelRunnerError::ParseError)?;
        log::info!(
            "Loaded model with {} input(s) and {} output(s)",
            model.inputs.len(),
            model.outputs.len()
        );

        Ok(Self {
            model,
            plans: HashMap::new(),
            color_model,
            input_range,
            output_range,
        })
    }

    fn plan_for(
        &mut self,
        extent: Extent,
    ) -> Result<&TypedRunnableModel<TypedModel>, ModelRunnerError> {
        if !self.plans.contains_key(&extent) {
            log::debug!("Optimizing model for {} tiles", extent);
            let plan = self
                .model
                .clone()
                .with_input_fact(
                    0,
                    f32::fact([1, 3, extent.height as usize, extent.width as usize]).into(),
                )
                .and_then(|model| model.into_optimized())
                .and_then(|model| model.into_runnable())
                .map_err(|cause| ModelRunnerError::PlanError { extent, cause })?;
            self.plans.insert(extent, plan);
        }
        Ok(&self.plans[&extent])
    }

    pub fn process_tile(&mut self, tile: &RgbaImage) -> Result<RgbaImage, ModelRunnerError> {
        let input = tile_to_tensor(tile, self.color_model, &self.input_range);
        let plan = self.plan_for(Extent::new(tile.width(), tile.height()))?;
        let mut outputs = plan
            .run(tvec!(input.into()))
            .map_err(ModelRunnerError::RunError)?;
        if outputs.is_empty() {
            return Err(ModelRunnerError::NoOutput);
        }
        let output = outputs.remove(0).into_tensor();
        tensor_to_tile(&output, self.color_model, &self.output_range)
    }
}

impl TileInference for ModelRunner {
    async fn infer(&mut self, tile: &RgbaImage) -> Result<RgbaImage, InferenceError> {
        self.process_tile(tile).map_err(InferenceError::backend)
    }
}
