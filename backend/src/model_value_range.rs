use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelValueMode {
    /// Values are centered on 0 (and have a negative and positive part)
    Symmetric,
    /// Values are not centered on zero and are positive
    Asymmetric,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelValueRange {
    value_mode: ModelValueMode,
    max_abs_value: f32,
}

impl Default for ModelValueRange {
    fn default() -> Self {
        Self::asymmetric(1.0)
    }
}

impl ModelValueRange {
    /// Create a new symmetric model value range
    pub const fn symmetric(max_abs_value: f32) -> Self {
        Self {
            value_mode: ModelValueMode::Symmetric,
            max_abs_value,
        }
    }

    /// Create a new asymmetric model value range
    pub const fn asymmetric(max_abs_value: f32) -> Self {
        Self {
            value_mode: ModelValueMode::Asymmetric,
            max_abs_value,
        }
    }

    /// Transform a single 8 bit channel value to a f32 value in the range specified by self
    pub fn pixel_value_to_model(&self, pixel_value: u8) -> f32 {
        let asymmetric_value = ((pixel_value as f32) / (u8::MAX as f32)) * self.max_abs_value;
        match self.value_mode {
            ModelValueMode::Symmetric => (asymmetric_value * 2.0) - self.max_abs_value,
            ModelValueMode::Asymmetric => asymmetric_value,
        }
    }

    /// Transform a value in the value range specified by self into the [0,1] range
    pub fn normalize_model_value(&self, model_value: f32) -> f32 {
        let shifted = match self.value_mode {
            ModelValueMode::Symmetric => (model_value + self.max_abs_value) / 2.0,
            ModelValueMode::Asymmetric => model_value,
        };
        shifted / self.max_abs_value
    }

    /// Transform a model output value back to an 8 bit channel value, clamping out-of-range values
    pub fn model_value_to_pixel(&self, model_value: f32) -> u8 {
        (self.normalize_model_value(model_value).clamp(0.0, 1.0) * u8::MAX as f32).round() as u8
    }
}

impl FromStr for ModelValueRange {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(max) = s.strip_prefix("+-") {
            max.parse().map(ModelValueRange::symmetric)
        } else {
            s.parse().map(ModelValueRange::asymmetric)
        }
    }
}
