//! The image-to-measurement pipeline.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::error::{DecodingError, ImageFormatHint};
use image::{DynamicImage, ImageError, ImageFormat};
use log::{Level, debug, info};
use serde::Serialize;

use hc_utils::{AppSettings, decode_base64, encode_base64, timing_guard};

use crate::contour::{MeasureConfig, Measurement, measure};
use crate::decode::{PixelGrid, decode, grid_from_image};
use crate::error::{MeasureError, Result};
use crate::model::{OnnxSegmentationModel, SegmentationModel};
use crate::postprocess::{BinarizeConfig, binarize};
use crate::preprocess::{PreprocessConfig, prepare};

/// Per-stage settings, fixed for the lifetime of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub binarize: BinarizeConfig,
    pub measure: MeasureConfig,
}

impl From<&AppSettings> for PipelineConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            preprocess: (&settings.input).into(),
            binarize: (&settings.mask).into(),
            measure: (&settings.measurement).into(),
        }
    }
}

/// Successful outcome of one pipeline run.
///
/// Serializes as `{ "circumference": .., "overlay": .., ... }` with the overlay
/// as base64-encoded PNG.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementResult {
    circumference: f64,
    overlay: String,
    contour_count: usize,
    area: f64,
    mask_size: (u32, u32),
}

impl MeasurementResult {
    /// Perimeter of the measured contour, in mask pixels.
    pub fn circumference(&self) -> f64 {
        self.circumference
    }

    /// Base64-encoded PNG overlay.
    pub fn overlay(&self) -> &str {
        &self.overlay
    }

    /// Raw PNG bytes of the overlay.
    pub fn overlay_png(&self) -> Result<Vec<u8>> {
        decode_base64(&self.overlay).map_err(|e| {
            MeasureError::Overlay(ImageError::Decoding(DecodingError::new(
                ImageFormatHint::Exact(ImageFormat::Png),
                e,
            )))
        })
    }

    pub fn contour_count(&self) -> usize {
        self.contour_count
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn mask_size(&self) -> (u32, u32) {
        self.mask_size
    }
}

/// Decode, preprocess, segment, binarize and measure, strictly in that order.
///
/// The model is loaded once and shared; `run` takes `&self`, so one pipeline
/// can serve any number of threads.
#[derive(Debug, Clone)]
pub struct MeasurementPipeline {
    model: Arc<dyn SegmentationModel>,
    config: PipelineConfig,
}

impl MeasurementPipeline {
    /// Bind a segmentation model to the pipeline configuration.
    ///
    /// Fails with [`MeasureError::CapabilityUnavailable`] when the model
    /// declares an input size other than `config.preprocess.input_size`.
    pub fn new(model: Arc<dyn SegmentationModel>, mut config: PipelineConfig) -> Result<Self> {
        let input_size = config.preprocess.input_size;
        if let Some(declared) = model.input_size() {
            if declared != input_size {
                return Err(MeasureError::CapabilityUnavailable(format!(
                    "model expects {declared} input but the pipeline is configured for {input_size}"
                )));
            }
        }
        config.binarize.expected_size = Some(input_size);
        Ok(Self { model, config })
    }

    /// Load the ONNX model named by `settings` and build a pipeline around it.
    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        let config = PipelineConfig::from(settings);
        let model_path = settings.resolved_model_path();
        info!(
            "Loading segmentation model from {} at {}",
            model_path.display(),
            config.preprocess.input_size
        );
        let model = OnnxSegmentationModel::load(&model_path, config.preprocess.input_size)?;
        Self::new(Arc::new(model), config)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Measure one encoded image.
    pub fn run(&self, bytes: &[u8]) -> Result<MeasurementResult> {
        let _guard = timing_guard("hc_core::run", Level::Debug);
        let grid = decode(bytes)?;
        self.run_grid(&grid)
    }

    /// Read `path` and measure its contents.
    pub fn run_path<P: AsRef<Path>>(&self, path: P) -> Result<MeasurementResult> {
        let path = path.as_ref();
        let _guard = timing_guard("hc_core::run_path", Level::Debug);
        let bytes = fs::read(path)?;
        debug!("read {} bytes from {}", bytes.len(), path.display());
        self.run(&bytes)
    }

    /// Measure an already decoded image.
    pub fn measure_image(&self, image: &DynamicImage) -> Result<MeasurementResult> {
        let _guard = timing_guard("hc_core::measure_image", Level::Debug);
        let grid = grid_from_image(image)?;
        self.run_grid(&grid)
    }

    fn run_grid(&self, grid: &PixelGrid) -> Result<MeasurementResult> {
        let input = prepare(grid, &self.config.preprocess)?;
        let raw = {
            let _guard = timing_guard("hc_core::segment", Level::Debug);
            self.model.segment(&input)?
        };
        let mask = binarize(&raw, &self.config.binarize)?;
        let Measurement {
            circumference,
            contour_count,
            area,
            overlay_png,
            ..
        } = measure(&mask, &self.config.measure)?;

        debug!(
            "{}x{} image -> circumference {circumference:.3}px ({contour_count} contour(s))",
            grid.width(),
            grid.height()
        );
        Ok(MeasurementResult {
            circumference,
            overlay: encode_base64(&overlay_png),
            contour_count,
            area,
            mask_size: (mask.width(), mask.height()),
        })
    }
}
