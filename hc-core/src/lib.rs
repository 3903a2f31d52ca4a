//! Head-circumference measurement from ultrasound images.
//!
//! One encoded image goes in; the perimeter of the segmented head boundary and
//! a PNG overlay come out. The stages run strictly in sequence:
//! [`decode`](decode::decode) → [`prepare`](preprocess::prepare) →
//! [`SegmentationModel::segment`] → [`binarize`](postprocess::binarize) →
//! [`measure`](contour::measure). [`MeasurementPipeline`] composes them and
//! maps every failure to a single [`MeasureError`].

/// Closed-contour extraction, perimeter and overlay rendering.
pub mod contour;
/// Image bytes to a single-channel pixel grid.
pub mod decode;
/// Failure taxonomy.
pub mod error;
/// The segmentation capability and its ONNX implementation.
pub mod model;
/// End-to-end orchestration.
pub mod pipeline;
/// Raw model output to a binary mask.
pub mod postprocess;
/// Resizing and tensor framing.
pub mod preprocess;

pub use contour::{
    Contour, ContourApproximation, MeasureConfig, Measurement, external_contours, measure,
};
pub use decode::{PixelGrid, decode, grid_from_image};
pub use error::{ErrorKind, MeasureError, Result};
pub use model::{FnSegmentationModel, OnnxSegmentationModel, RawMask, SegmentationModel};
pub use pipeline::{MeasurementPipeline, MeasurementResult, PipelineConfig};
pub use postprocess::{BinarizeConfig, BinaryMask, binarize};
pub use preprocess::{InputSize, ModelInput, PreprocessConfig, prepare};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
