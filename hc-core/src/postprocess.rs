//! Raw model output to an 8-bit binary mask.
//!
//! This is the only place where thresholding happens. The result depends on
//! the raw tensor and the config alone.

use image::{GrayImage, Luma};
use log::Level;
use ndarray::{ArrayView3, Axis, Ix3};

use hc_utils::{MaskActivation, MaskSettings, timing_guard};

use crate::error::{MeasureError, Result};
use crate::model::RawMask;
use crate::preprocess::InputSize;

/// Thresholding policy for single-channel output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinarizeConfig {
    /// Foreground cut-off on the `[0, 1]` scale.
    pub threshold: f32,
    pub activation: MaskActivation,
    /// Spatial size the mask must have; `None` accepts any size.
    pub expected_size: Option<InputSize>,
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            activation: MaskActivation::Identity,
            expected_size: None,
        }
    }
}

impl From<MaskSettings> for BinarizeConfig {
    fn from(settings: MaskSettings) -> Self {
        Self {
            threshold: settings.threshold,
            activation: settings.activation,
            expected_size: None,
        }
    }
}

impl From<&MaskSettings> for BinarizeConfig {
    fn from(settings: &MaskSettings) -> Self {
        (*settings).into()
    }
}

/// An `H x W` mask holding only [`BinaryMask::BACKGROUND`] and [`BinaryMask::FOREGROUND`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    pub const BACKGROUND: u8 = 0;
    pub const FOREGROUND: u8 = 255;

    /// Treat every non-zero pixel of `image` as foreground.
    pub fn from_gray(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            if pixel[0] != Self::BACKGROUND {
                pixel[0] = Self::FOREGROUND;
            }
        }
        Self(image)
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn foreground_pixels(&self) -> usize {
        self.0
            .as_raw()
            .iter()
            .filter(|&&v| v == Self::FOREGROUND)
            .count()
    }
}

/// Strip batch/channel framing from `raw` and threshold it into a mask.
///
/// Accepted shapes are `[H, W]`, `[1, H, W]` and `[1, C, H, W]`. With one
/// channel the (optionally sigmoid-activated) value is scaled to `0..=255`,
/// rounded, and compared against `threshold * 255`. With several channels a
/// pixel is foreground when its highest-scoring class is not class 0.
pub fn binarize(raw: &RawMask, config: &BinarizeConfig) -> Result<BinaryMask> {
    let _guard = timing_guard("hc_core::binarize", Level::Debug);
    let planes = channel_planes(raw)?;
    let (channels, height, width) = planes.dim();

    if height == 0 || width == 0 || channels == 0 {
        return Err(MeasureError::Postprocess(format!(
            "model output has an empty dimension {:?}",
            raw.shape()
        )));
    }
    if let Some(expected) = config.expected_size {
        if (width, height) != (expected.width as usize, expected.height as usize) {
            return Err(MeasureError::Postprocess(format!(
                "model output is {width}x{height}, expected {expected}"
            )));
        }
    }
    if planes.iter().any(|v| !v.is_finite()) {
        return Err(MeasureError::Postprocess(
            "model output contains non-finite values".into(),
        ));
    }

    let mut mask = GrayImage::new(width as u32, height as u32);
    if channels == 1 {
        let cutoff = (config.threshold.clamp(0.0, 1.0) * 255.0).round() as u8;
        for ((y, x), &value) in planes.index_axis(Axis(0), 0).indexed_iter() {
            if to_level(value, config.activation) >= cutoff {
                mask.put_pixel(x as u32, y as u32, Luma([BinaryMask::FOREGROUND]));
            }
        }
    } else {
        for y in 0..height {
            for x in 0..width {
                if argmax_class(&planes, y, x) != 0 {
                    mask.put_pixel(x as u32, y as u32, Luma([BinaryMask::FOREGROUND]));
                }
            }
        }
    }
    Ok(BinaryMask(mask))
}

fn channel_planes(raw: &RawMask) -> Result<ArrayView3<'_, f32>> {
    let view = raw.values().view();
    let planes = match raw.shape() {
        [_, _] => view.insert_axis(Axis(0)).into_dimensionality::<Ix3>(),
        [1, _, _] => view.into_dimensionality::<Ix3>(),
        [1, _, _, _] => view.index_axis_move(Axis(0), 0).into_dimensionality::<Ix3>(),
        other => {
            return Err(MeasureError::Postprocess(format!(
                "unsupported model output shape {other:?}; expected [H, W], [1, H, W] or [1, C, H, W]"
            )));
        }
    };
    planes.map_err(|e| MeasureError::Postprocess(format!("failed to detach mask planes: {e}")))
}

/// Scale a raw score to the `0..=255` intensity range.
fn to_level(value: f32, activation: MaskActivation) -> u8 {
    let probability = match activation {
        MaskActivation::Identity => value,
        MaskActivation::Sigmoid => 1.0 / (1.0 + (-value).exp()),
    };
    (probability.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Index of the best-scoring class; ties go to the lower index.
fn argmax_class(planes: &ArrayView3<'_, f32>, y: usize, x: usize) -> usize {
    let mut best = 0;
    let mut best_score = planes[[0, y, x]];
    for class in 1..planes.len_of(Axis(0)) {
        let score = planes[[class, y, x]];
        if score > best_score {
            best = class;
            best_score = score;
        }
    }
    best
}
