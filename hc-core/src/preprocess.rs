//! Preprocessing utilities for preparing scans for the segmentation model.
//!
//! The grid is resized to the model's spatial size, scaled into `[0, 1]` by
//! dividing by 255 and framed as a `[1, 1, H, W]` tensor.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use log::Level;
use ndarray::{Array4, ArrayView2, s};

use hc_utils::{InputDimensions, ResizeQuality, timing_guard};

use crate::decode::PixelGrid;
use crate::error::{MeasureError, Result};

/// Spatial size of the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(256, 256)
    }
}

impl std::fmt::Display for InputSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for preparing a grid before inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub input_size: InputSize,
    pub resize_quality: ResizeQuality,
}

impl PreprocessConfig {
    fn resize_filter(&self) -> FilterType {
        match self.resize_quality {
            ResizeQuality::Quality => FilterType::Triangle,
            ResizeQuality::Speed => FilterType::Nearest,
        }
    }
}

impl From<InputDimensions> for InputSize {
    fn from(dimensions: InputDimensions) -> Self {
        InputSize::new(dimensions.width, dimensions.height)
    }
}

impl From<InputDimensions> for PreprocessConfig {
    fn from(dimensions: InputDimensions) -> Self {
        PreprocessConfig {
            input_size: dimensions.into(),
            resize_quality: dimensions.resize_quality,
        }
    }
}

impl From<&InputDimensions> for PreprocessConfig {
    fn from(dimensions: &InputDimensions) -> Self {
        (*dimensions).into()
    }
}

/// Normalized `[1, 1, H, W]` tensor handed to the segmentation model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    tensor: Array4<f32>,
}

impl ModelInput {
    /// Wrap an existing tensor, checking the batch and channel framing.
    pub fn from_array(tensor: Array4<f32>) -> Result<Self> {
        let shape = tensor.shape();
        if shape[0] != 1 || shape[1] != 1 || shape[2] == 0 || shape[3] == 0 {
            return Err(MeasureError::Shape(format!(
                "model input must be [1, 1, H, W] with non-zero H and W (got {shape:?})"
            )));
        }
        Ok(Self { tensor })
    }

    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    /// Logical shape, always `[1, 1, H, W]`.
    pub fn shape(&self) -> [usize; 4] {
        let s = self.tensor.shape();
        [s[0], s[1], s[2], s[3]]
    }

    pub fn size(&self) -> InputSize {
        let [_, _, h, w] = self.shape();
        InputSize::new(w as u32, h as u32)
    }

    /// The single `H x W` plane.
    pub fn plane(&self) -> ArrayView2<'_, f32> {
        self.tensor.slice(s![0, 0, .., ..])
    }
}

/// Resize, normalize and frame `grid` for the model.
///
/// The same grid and config always yield a bit-identical tensor. A tensor whose
/// spatial size differs from `config.input_size` is reported as
/// [`MeasureError::Shape`]; with a working resize this cannot happen.
pub fn prepare(grid: &PixelGrid, config: &PreprocessConfig) -> Result<ModelInput> {
    let _guard = timing_guard("hc_core::preprocess", Level::Debug);
    let InputSize { width, height } = config.input_size;
    if width == 0 || height == 0 {
        return Err(MeasureError::Shape(format!(
            "target size must be non-zero (got {})",
            config.input_size
        )));
    }

    let resized: Cow<'_, PixelGrid> = if grid.dimensions() == (width, height) {
        Cow::Borrowed(grid)
    } else {
        Cow::Owned(imageops::resize(grid, width, height, config.resize_filter()))
    };
    if resized.dimensions() != (width, height) {
        return Err(MeasureError::Shape(format!(
            "resize produced {}x{}, expected {}",
            resized.width(),
            resized.height(),
            config.input_size
        )));
    }

    let data: Vec<f32> = resized
        .as_raw()
        .iter()
        .map(|&v| f32::from(v) / 255.0)
        .collect();
    let tensor = Array4::from_shape_vec((1, 1, height as usize, width as usize), data)
        .map_err(|e| MeasureError::Shape(format!("failed to frame model input: {e}")))?;
    ModelInput::from_array(tensor)
}
